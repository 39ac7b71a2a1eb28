//! Defaulting and validation rules applied at admission time. The HTTP
//! admission plumbing lives outside this crate; these functions are the
//! whole policy and are unit-tested directly.

use crate::{
    FleetSpec, GameAutoscalerSpec, GameTypeSpec, ServerSpec, age_priority, policy_kind, sync_kind,
};

/// Timeout applied to Servers that do not specify one.
pub const DEFAULT_SERVER_TIMEOUT: &str = "40m";

/// Warnings attached to an otherwise admitted object.
pub type Warnings = Vec<String>;

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn invalid<T>(message: impl Into<String>) -> Result<T, ValidationError> {
    Err(ValidationError(message.into()))
}

/// Default the Server's consent timeout.
pub fn default_server(spec: &mut ServerSpec) {
    if spec.timeout.is_none() {
        spec.timeout = Some(DEFAULT_SERVER_TIMEOUT.to_string());
    }
}

/// Default the Fleet's embedded Server template.
pub fn default_fleet(spec: &mut FleetSpec) {
    default_server(&mut spec.server);
}

/// Default the GameType's embedded Fleet template.
pub fn default_gametype(spec: &mut GameTypeSpec) {
    default_fleet(&mut spec.fleet);
}

pub fn validate_server_create(spec: &ServerSpec) -> Result<(), ValidationError> {
    if spec.pod.containers.is_empty() {
        return invalid("at least 1 container required");
    }
    Ok(())
}

pub fn validate_server_update(old: &ServerSpec, new: &ServerSpec) -> Result<(), ValidationError> {
    if old.pod != new.pod {
        return invalid("updating a servers pod spec is not allowed, please remake the server");
    }
    Ok(())
}

pub fn validate_fleet_create(spec: &FleetSpec) -> Result<(), ValidationError> {
    validate_fleet_priorities(spec)
}

/// Pod templates are immutable; consent knobs may change but only affect
/// Servers created afterwards, which is worth a warning.
pub fn validate_fleet_update(old: &FleetSpec, new: &FleetSpec) -> Result<Warnings, ValidationError> {
    validate_fleet_priorities(new)?;

    let mut warnings = Warnings::new();
    if old.server.timeout != new.server.timeout {
        warnings.push("New timeout will not affect previously created servers".to_string());
    }
    if old.server.allow_force_delete != new.server.allow_force_delete {
        warnings.push("New allowForceDelete will not affect previously created servers".to_string());
    }
    if old.server.pod != new.server.pod {
        return invalid("pod template cannot be updated");
    }
    Ok(warnings)
}

fn validate_fleet_priorities(spec: &FleetSpec) -> Result<(), ValidationError> {
    if !age_priority::is_valid(&spec.scaling.age_priority) {
        return invalid(format!("unknown priority {}", spec.scaling.age_priority));
    }
    Ok(())
}

pub fn validate_gametype_create(spec: &GameTypeSpec) -> Result<(), ValidationError> {
    let containers = &spec.fleet.server.pod.containers;
    for container in containers {
        if container.image.as_deref().unwrap_or_default().is_empty() {
            return invalid("image is required for every container");
        }
    }
    if containers.is_empty() {
        return invalid("at least one container is required");
    }
    Ok(())
}

/// Create and update share the same rules.
pub fn validate_autoscaler(spec: &GameAutoscalerSpec) -> Result<(), ValidationError> {
    if spec.game_name.is_empty() {
        return invalid("GameAutoscaler must specify game_name");
    }

    if spec.policy.kind == policy_kind::WEBHOOK
        && spec.policy.webhook.service.is_none()
        && spec.policy.webhook.url.is_none()
    {
        return invalid("cannot create GameAutoscaler without url or service specified");
    }

    if spec.sync.kind == sync_kind::FIXED_INTERVAL {
        let interval = parse_duration::parse(&spec.sync.interval)
            .map_err(|e| ValidationError(format!("invalid sync interval: {}", e)))?;
        if interval.is_zero() {
            return invalid("cannot create GameAutoscaler without proper sync interval");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AutoscalePolicy, AutoscaleSync, FleetScaling, ServiceRef, WebhookPolicy};
    use k8s_openapi::api::core::v1::{Container, PodSpec};

    fn server_spec(images: &[&str]) -> ServerSpec {
        ServerSpec {
            pod: PodSpec {
                containers: images
                    .iter()
                    .enumerate()
                    .map(|(i, image)| Container {
                        name: format!("container-{}", i),
                        image: (!image.is_empty()).then(|| image.to_string()),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn fleet_spec(images: &[&str]) -> FleetSpec {
        FleetSpec {
            server: server_spec(images),
            scaling: FleetScaling::default(),
        }
    }

    fn autoscaler_spec() -> GameAutoscalerSpec {
        GameAutoscalerSpec {
            game_name: "minigame".to_string(),
            policy: AutoscalePolicy {
                kind: policy_kind::WEBHOOK.to_string(),
                webhook: WebhookPolicy {
                    url: Some("http://scaler.example.com".to_string()),
                    path: Some("scale".to_string()),
                    service: None,
                },
            },
            sync: AutoscaleSync {
                kind: sync_kind::FIXED_INTERVAL.to_string(),
                interval: "10s".to_string(),
            },
        }
    }

    #[test]
    fn server_timeout_defaulted() {
        let mut spec = server_spec(&["game:v1"]);
        default_server(&mut spec);
        assert_eq!(spec.timeout.as_deref(), Some(DEFAULT_SERVER_TIMEOUT));
    }

    #[test]
    fn server_timeout_preserved() {
        let mut spec = server_spec(&["game:v1"]);
        spec.timeout = Some("5m".to_string());
        default_server(&mut spec);
        assert_eq!(spec.timeout.as_deref(), Some("5m"));
    }

    #[test]
    fn gametype_default_reaches_embedded_server() {
        let mut spec = GameTypeSpec {
            fleet: fleet_spec(&["game:v1"]),
        };
        default_gametype(&mut spec);
        assert_eq!(
            spec.fleet.server.timeout.as_deref(),
            Some(DEFAULT_SERVER_TIMEOUT)
        );
    }

    #[test]
    fn server_create_requires_container() {
        assert!(validate_server_create(&server_spec(&[])).is_err());
        assert!(validate_server_create(&server_spec(&["game:v1"])).is_ok());
    }

    #[test]
    fn server_update_rejects_pod_change() {
        let old = server_spec(&["game:v1"]);
        let new = server_spec(&["game:v2"]);
        assert!(validate_server_update(&old, &new).is_err());
        assert!(validate_server_update(&old, &old.clone()).is_ok());
    }

    #[test]
    fn server_update_allows_consent_knob_change() {
        let old = server_spec(&["game:v1"]);
        let mut new = old.clone();
        new.allow_force_delete = true;
        new.timeout = Some("1h".to_string());
        assert!(validate_server_update(&old, &new).is_ok());
    }

    #[test]
    fn fleet_rejects_unknown_priority() {
        let mut spec = fleet_spec(&["game:v1"]);
        spec.scaling.age_priority = "largest_first".to_string();
        let err = validate_fleet_create(&spec).unwrap_err();
        assert!(err.0.contains("largest_first"));
    }

    #[test]
    fn fleet_accepts_known_priorities() {
        for priority in [age_priority::OLDEST_FIRST, age_priority::NEWEST_FIRST] {
            let mut spec = fleet_spec(&["game:v1"]);
            spec.scaling.age_priority = priority.to_string();
            assert!(validate_fleet_create(&spec).is_ok());
        }
    }

    #[test]
    fn fleet_update_rejects_pod_template_change() {
        let old = fleet_spec(&["game:v1"]);
        let new = fleet_spec(&["game:v2"]);
        assert!(validate_fleet_update(&old, &new).is_err());
    }

    #[test]
    fn fleet_update_warns_on_consent_knob_changes() {
        let old = fleet_spec(&["game:v1"]);
        let mut new = old.clone();
        new.server.timeout = Some("1h".to_string());
        new.server.allow_force_delete = true;
        let warnings = validate_fleet_update(&old, &new).unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("timeout"));
        assert!(warnings[1].contains("allowForceDelete"));
    }

    #[test]
    fn fleet_update_clean_change_has_no_warnings() {
        let old = fleet_spec(&["game:v1"]);
        let mut new = old.clone();
        new.scaling.replicas = 9;
        assert_eq!(validate_fleet_update(&old, &new).unwrap().len(), 0);
    }

    #[test]
    fn gametype_requires_images() {
        let spec = GameTypeSpec {
            fleet: fleet_spec(&["game:v1", ""]),
        };
        assert!(validate_gametype_create(&spec).is_err());
    }

    #[test]
    fn gametype_requires_containers() {
        let spec = GameTypeSpec {
            fleet: fleet_spec(&[]),
        };
        assert!(validate_gametype_create(&spec).is_err());
        let spec = GameTypeSpec {
            fleet: fleet_spec(&["game:v1"]),
        };
        assert!(validate_gametype_create(&spec).is_ok());
    }

    #[test]
    fn autoscaler_valid_spec_passes() {
        assert!(validate_autoscaler(&autoscaler_spec()).is_ok());
    }

    #[test]
    fn autoscaler_requires_game_name() {
        let mut spec = autoscaler_spec();
        spec.game_name = String::new();
        assert!(validate_autoscaler(&spec).is_err());
    }

    #[test]
    fn autoscaler_webhook_requires_url_or_service() {
        let mut spec = autoscaler_spec();
        spec.policy.webhook.url = None;
        assert!(validate_autoscaler(&spec).is_err());

        spec.policy.webhook.service = Some(ServiceRef {
            name: "scaler".to_string(),
            namespace: "default".to_string(),
            port: 8080,
        });
        assert!(validate_autoscaler(&spec).is_ok());
    }

    #[test]
    fn autoscaler_rejects_bad_interval() {
        let mut spec = autoscaler_spec();
        spec.sync.interval = "0s".to_string();
        assert!(validate_autoscaler(&spec).is_err());

        spec.sync.interval = "soon".to_string();
        assert!(validate_autoscaler(&spec).is_err());
    }
}
