use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Autoscale policy kinds. Plain strings so unsupported values reach the
/// reconciler and are reported as events rather than decode failures.
pub mod policy_kind {
    pub const WEBHOOK: &str = "webhook";
}

/// Sync strategy kinds.
pub mod sync_kind {
    pub const FIXED_INTERVAL: &str = "fixedinterval";
}

/// A periodic driver that consults an external policy endpoint and
/// rewrites the replica count of a GameType in the same namespace.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "network.unfamousthomas.me",
    version = "v1alpha1",
    kind = "GameAutoscaler",
    plural = "gameautoscalers",
    derive = "PartialEq",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".spec.game_name\", \"name\": \"GAME\", \"type\": \"string\" }"
)]
pub struct GameAutoscalerSpec {
    /// Name of the target GameType.
    pub game_name: String,

    pub policy: AutoscalePolicy,

    pub sync: AutoscaleSync,
}

/// How to decide the desired replica count.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct AutoscalePolicy {
    #[serde(rename = "type")]
    pub kind: String,

    pub webhook: WebhookPolicy,
}

/// Endpoint of the scaling decision webhook: either an absolute URL or an
/// in-cluster service reference, plus a required path.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct WebhookPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceRef>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct ServiceRef {
    pub name: String,
    pub namespace: String,
    pub port: i32,
}

/// When to consult the policy endpoint.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct AutoscaleSync {
    #[serde(rename = "type")]
    pub kind: String,

    /// Interval between webhook calls, e.g. "5s".
    pub interval: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_uses_type_on_the_wire() {
        let spec: GameAutoscalerSpec = serde_json::from_value(serde_json::json!({
            "game_name": "minigame",
            "policy": {
                "type": "webhook",
                "webhook": {
                    "service": {"name": "scaler", "namespace": "default", "port": 8080},
                    "path": "scale"
                }
            },
            "sync": {"type": "fixedinterval", "interval": "5s"}
        }))
        .unwrap();

        assert_eq!(spec.policy.kind, policy_kind::WEBHOOK);
        assert_eq!(spec.sync.kind, sync_kind::FIXED_INTERVAL);
        assert_eq!(spec.policy.webhook.service.as_ref().unwrap().port, 8080);
        assert!(spec.policy.webhook.url.is_none());

        let round_trip = serde_json::to_value(&spec).unwrap();
        assert_eq!(round_trip["policy"]["type"], "webhook");
        assert_eq!(round_trip["sync"]["type"], "fixedinterval");
    }

    #[test]
    fn unknown_policy_kind_still_decodes() {
        // Validation happens in the reconciler and admission logic, not at
        // the serde layer.
        let spec: GameAutoscalerSpec = serde_json::from_value(serde_json::json!({
            "game_name": "minigame",
            "policy": {"type": "crystal-ball", "webhook": {}},
            "sync": {"type": "fixedinterval", "interval": "5s"}
        }))
        .unwrap();
        assert_eq!(spec.policy.kind, "crystal-ball");
    }
}
