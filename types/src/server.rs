use k8s_openapi::{
    api::core::v1::PodSpec,
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single dedicated game-server instance. The controller keeps exactly
/// one Pod alive for each Server and negotiates deletion with the sidecar
/// running inside that Pod.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "network.unfamousthomas.me",
    version = "v1alpha1",
    kind = "Server",
    plural = "servers",
    derive = "PartialEq",
    status = "ServerStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.lastUpdated\", \"name\": \"AGE\", \"type\": \"date\" }"
)]
pub struct ServerSpec {
    /// Pod template for the game server. Immutable once created; the
    /// sidecar container is injected on top of it at Pod creation time.
    pub pod: PodSpec,

    /// Grace period after which deletion proceeds without sidecar consent,
    /// e.g. "40m". Unset means the sidecar is always consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// If true, deletion skips the consent handshake entirely.
    #[serde(default)]
    pub allow_force_delete: bool,
}

/// Status object for the [`Server`] resource.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct ServerStatus {
    /// Condition set (`PodCreated`, `PodFailed`, `Finalizing`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,

    /// Timestamp of when the [`ServerStatus`] object was last updated.
    #[serde(rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Time>,
}

impl Server {
    /// Name of the Pod owned by this Server.
    pub fn pod_name(&self) -> String {
        format!("{}-pod", self.metadata.name.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_name_is_suffixed() {
        let mut server = Server::default();
        server.metadata.name = Some("match-1".to_string());
        assert_eq!(server.pod_name(), "match-1-pod");
    }
}
