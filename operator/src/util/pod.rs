use super::Error;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, LocalObjectReference, ObjectFieldSelector, Pod,
};
use kube::{ResourceExt, api::ObjectMeta, api::Resource};
use loputoo_types::{Server, labels};

/// Name of the injected consent sidecar container.
pub const SIDECAR_CONTAINER_NAME: &str = "loputoo-sidecar";

/// Image used for the sidecar when `SIDECAR_IMAGE` is not set.
pub const DEFAULT_SIDECAR_IMAGE: &str = "ghcr.io/unfamousthomas/sidecar:latest";

/// Port the sidecar's consent API listens on inside every server pod.
pub const SIDECAR_PORT: i32 = 8080;

/// Builds the Pod for a Server: the user's template plus the consent
/// sidecar, identity environment variables in every container, and an
/// owner reference back to the Server.
pub fn build_server_pod(
    server: &Server,
    sidecar_image: &str,
    image_pull_secret: Option<&str>,
) -> Result<Pod, Error> {
    let name = server
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| Error::UserInput("Server is missing metadata.name".to_string()))?;
    let owner_ref = server
        .controller_owner_ref(&())
        .ok_or_else(|| Error::UserInput("Server is missing object metadata".to_string()))?;

    let mut labels = server.labels().clone();
    labels.insert(labels::SERVER.to_string(), name.to_string());

    let fleet_name = server.labels().get(labels::FLEET).cloned();
    let game_name = server.labels().get(labels::GAME_TYPE).cloned();

    let mut spec = server.spec.pod.clone();
    spec.containers.push(sidecar_container(sidecar_image));
    for container in &mut spec.containers {
        inject_identity_env(container, name, fleet_name.as_deref(), game_name.as_deref());
    }
    if let Some(secret) = image_pull_secret {
        spec.image_pull_secrets
            .get_or_insert_default()
            .push(LocalObjectReference {
                name: secret.to_string(),
            });
    }

    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(server.pod_name()),
            namespace: server.metadata.namespace.clone(),
            labels: Some(labels),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        spec: Some(spec),
        status: None,
    })
}

fn sidecar_container(image: &str) -> Container {
    Container {
        name: SIDECAR_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: SIDECAR_PORT,
            ..Default::default()
        }]),
        ..Default::default()
    }
}

fn inject_identity_env(
    container: &mut Container,
    server_name: &str,
    fleet_name: Option<&str>,
    game_name: Option<&str>,
) {
    let mut env = vec![
        EnvVar {
            name: "CONTAINER_IMAGE".to_string(),
            value: container.image.clone(),
            ..Default::default()
        },
        EnvVar {
            name: "SERVER_NAME".to_string(),
            value: Some(server_name.to_string()),
            ..Default::default()
        },
    ];
    if let Some(fleet) = fleet_name {
        env.push(EnvVar {
            name: "FLEET_NAME".to_string(),
            value: Some(fleet.to_string()),
            ..Default::default()
        });
    }
    if let Some(game) = game_name {
        env.push(EnvVar {
            name: "GAME_NAME".to_string(),
            value: Some(game.to_string()),
            ..Default::default()
        });
    }
    env.push(field_ref_env("POD_IP", "status.podIP"));
    env.push(field_ref_env("NODE_NAME", "spec.nodeName"));
    container.env.get_or_insert_default().extend(env);
}

fn field_ref_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodSpec;
    use loputoo_types::ServerSpec;
    use std::collections::BTreeMap;

    fn test_server() -> Server {
        let mut server = Server {
            metadata: ObjectMeta {
                name: Some("match-1".to_string()),
                namespace: Some("games".to_string()),
                uid: Some("abc-123".to_string()),
                labels: Some(BTreeMap::from([(
                    labels::FLEET.to_string(),
                    "lobby".to_string(),
                )])),
                ..Default::default()
            },
            spec: ServerSpec {
                pod: PodSpec {
                    containers: vec![Container {
                        name: "game".to_string(),
                        image: Some("game:v1".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                ..Default::default()
            },
            status: None,
        };
        server.spec.timeout = Some("40m".to_string());
        server
    }

    #[test]
    fn pod_carries_name_labels_and_owner() {
        let pod = build_server_pod(&test_server(), DEFAULT_SIDECAR_IMAGE, None).unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("match-1-pod"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("games"));

        let labels = pod.metadata.labels.unwrap();
        assert_eq!(labels.get(labels::SERVER).map(String::as_str), Some("match-1"));
        assert_eq!(labels.get(labels::FLEET).map(String::as_str), Some("lobby"));

        let owners = pod.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "Server");
        assert_eq!(owners[0].name, "match-1");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn sidecar_is_appended_to_user_containers() {
        let pod = build_server_pod(&test_server(), "sidecar:test", None).unwrap();
        let containers = pod.spec.unwrap().containers;
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "game");
        assert_eq!(containers[1].name, SIDECAR_CONTAINER_NAME);
        assert_eq!(containers[1].image.as_deref(), Some("sidecar:test"));
        assert_eq!(
            containers[1].ports.as_ref().unwrap()[0].container_port,
            SIDECAR_PORT
        );
    }

    #[test]
    fn every_container_gets_identity_env() {
        let pod = build_server_pod(&test_server(), DEFAULT_SIDECAR_IMAGE, None).unwrap();
        for container in pod.spec.unwrap().containers {
            let env = container.env.unwrap();
            let names: Vec<_> = env.iter().map(|e| e.name.as_str()).collect();
            for expected in ["CONTAINER_IMAGE", "SERVER_NAME", "FLEET_NAME", "POD_IP", "NODE_NAME"] {
                assert!(names.contains(&expected), "missing {}", expected);
            }
            let pod_ip = env.iter().find(|e| e.name == "POD_IP").unwrap();
            assert_eq!(
                pod_ip
                    .value_from
                    .as_ref()
                    .unwrap()
                    .field_ref
                    .as_ref()
                    .unwrap()
                    .field_path,
                "status.podIP"
            );
        }
    }

    #[test]
    fn image_pull_secret_is_attached_when_configured() {
        let pod = build_server_pod(&test_server(), DEFAULT_SIDECAR_IMAGE, Some("registry-creds"))
            .unwrap();
        let secrets = pod.spec.unwrap().image_pull_secrets.unwrap();
        assert_eq!(secrets[0].name, "registry-creds");

        let pod = build_server_pod(&test_server(), DEFAULT_SIDECAR_IMAGE, None).unwrap();
        assert!(pod.spec.unwrap().image_pull_secrets.is_none());
    }
}
