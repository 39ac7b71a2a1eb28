use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ServerSpec;

/// Age ordering used when a Fleet must pick a scale-down victim. Kept as
/// plain strings so unknown values survive deserialization and can be
/// rejected with a proper error instead of failing to decode the object.
pub mod age_priority {
    pub const OLDEST_FIRST: &str = "oldest_first";
    pub const NEWEST_FIRST: &str = "newest_first";

    pub fn is_valid(value: &str) -> bool {
        matches!(value, OLDEST_FIRST | NEWEST_FIRST)
    }
}

/// A replica set of Servers with an age-based eviction policy.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "network.unfamousthomas.me",
    version = "v1alpha1",
    kind = "Fleet",
    plural = "fleets",
    derive = "PartialEq",
    status = "FleetStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".spec.scaling.replicas\", \"name\": \"DESIRED\", \"type\": \"integer\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.current_replicas\", \"name\": \"CURRENT\", \"type\": \"integer\" }"
)]
pub struct FleetSpec {
    /// Template for the Servers this Fleet owns.
    pub server: ServerSpec,

    pub scaling: FleetScaling,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct FleetScaling {
    /// How many Server replicas should exist.
    pub replicas: i32,

    /// Prefer evicting Servers whose sidecar already permits deletion.
    #[serde(default = "default_prioritize_allowed")]
    pub prioritize_allowed: bool,

    /// Whether scale-down picks the oldest or the newest Server.
    #[serde(default = "default_age_priority")]
    pub age_priority: String,
}

fn default_prioritize_allowed() -> bool {
    true
}

fn default_age_priority() -> String {
    age_priority::OLDEST_FIRST.to_string()
}

impl Default for FleetScaling {
    fn default() -> Self {
        FleetScaling {
            replicas: 1,
            prioritize_allowed: default_prioritize_allowed(),
            age_priority: default_age_priority(),
        }
    }
}

/// Status object for the [`Fleet`] resource.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct FleetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,

    /// Observed count of Servers labelled with this Fleet's name. Reported,
    /// never commanded.
    #[serde(default)]
    pub current_replicas: i32,

    /// Timestamp of when the [`FleetStatus`] object was last updated.
    #[serde(rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Time>,
}

/// Whether two Fleet specs would produce the same Pods. Scaling and
/// consent knobs are deliberately ignored; only the pod template counts.
pub fn are_fleet_pods_equal(a: &FleetSpec, b: &FleetSpec) -> bool {
    a.server.pod == b.server.pod
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec};

    fn fleet_spec(image: &str, replicas: i32) -> FleetSpec {
        FleetSpec {
            server: ServerSpec {
                pod: PodSpec {
                    containers: vec![Container {
                        name: "game".to_string(),
                        image: Some(image.to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                ..Default::default()
            },
            scaling: FleetScaling {
                replicas,
                ..Default::default()
            },
        }
    }

    #[test]
    fn pods_equal_ignores_scaling() {
        let a = fleet_spec("game:v1", 3);
        let b = fleet_spec("game:v1", 7);
        assert!(are_fleet_pods_equal(&a, &b));
    }

    #[test]
    fn pods_differ_on_image_change() {
        let a = fleet_spec("game:v1", 3);
        let b = fleet_spec("game:v2", 3);
        assert!(!are_fleet_pods_equal(&a, &b));
    }

    #[test]
    fn scaling_defaults() {
        let scaling: FleetScaling = serde_json::from_str(r#"{"replicas": 2}"#).unwrap();
        assert_eq!(scaling.replicas, 2);
        assert!(scaling.prioritize_allowed);
        assert_eq!(scaling.age_priority, age_priority::OLDEST_FIRST);
    }
}
