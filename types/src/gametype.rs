use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::FleetSpec;

/// A Fleet template whose pod specification is immutable: changing it
/// causes a replacement Fleet to be created and the old one drained.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "network.unfamousthomas.me",
    version = "v1alpha1",
    kind = "GameType",
    plural = "gametypes",
    derive = "PartialEq",
    status = "GameTypeStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.current_fleet\", \"name\": \"FLEET\", \"type\": \"string\" }"
)]
pub struct GameTypeSpec {
    /// Template for the single active Fleet of this game.
    pub fleet: FleetSpec,
}

/// Status object for the [`GameType`] resource.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct GameTypeStatus {
    /// Name of the currently active Fleet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_fleet: Option<String>,

    /// Timestamp of when the [`GameTypeStatus`] object was last updated.
    #[serde(rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Time>,
}
