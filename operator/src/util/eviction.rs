//! Scale-down victim selection: age ordering with an optional
//! allowed-first preference.

use super::{Error, sidecar};
use async_trait::async_trait;
use k8s_openapi::{api::core::v1::Pod, jiff::Timestamp};
use kube::{Api, Client, Resource};
use loputoo_types::{Fleet, Server, age_priority};

/// Probe for "does this Server's sidecar currently permit deletion?".
/// Unlike the deletion gate this never signals shutdown; eviction only
/// peeks at the current consent state.
#[async_trait]
pub trait EvictionProbe: Send + Sync {
    async fn is_delete_allowed(&self, server: &Server) -> Result<bool, Error>;
}

pub struct SidecarEvictionProbe {
    pub client: Client,
}

#[async_trait]
impl EvictionProbe for SidecarEvictionProbe {
    async fn is_delete_allowed(&self, server: &Server) -> Result<bool, Error> {
        let namespace = server
            .meta()
            .namespace
            .as_deref()
            .ok_or_else(|| Error::UserInput("Server is missing metadata.namespace".to_string()))?;
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = api.get(&server.pod_name()).await?;
        // A probe failure counts as "not allowed" rather than aborting the
        // whole eviction pass.
        Ok(sidecar::is_delete_allowed(&pod).await.unwrap_or(false))
    }
}

/// Picks the Server a Fleet should delete next, honoring the Fleet's
/// `age_priority` and `prioritize_allowed` settings. Servers with equal
/// creation timestamps are ordered by position in the input; callers must
/// not rely on any particular choice among equally-aged peers.
pub async fn find_delete_server<'a>(
    fleet: &Fleet,
    servers: &'a [Server],
    probe: &dyn EvictionProbe,
) -> Result<&'a Server, Error> {
    let strategy = fleet.spec.scaling.age_priority.as_str();
    let delete_first = fleet.spec.scaling.prioritize_allowed;

    match strategy {
        age_priority::OLDEST_FIRST => get_oldest_server(servers, delete_first, probe).await,
        age_priority::NEWEST_FIRST => get_newest_server(servers, delete_first, probe).await,
        _ => Err(Error::UnknownAgePriority(strategy.to_string())),
    }
}

fn created_at(server: &Server) -> Timestamp {
    server
        .meta()
        .creation_timestamp
        .as_ref()
        .map(|t| t.0)
        .unwrap_or(Timestamp::UNIX_EPOCH)
}

/// The oldest Server, or the oldest among those permitting deletion when
/// `delete_first` is set and any such Server exists.
async fn get_oldest_server<'a>(
    servers: &'a [Server],
    delete_first: bool,
    probe: &dyn EvictionProbe,
) -> Result<&'a Server, Error> {
    let mut oldest: Option<(&Server, Timestamp)> = None;
    let mut oldest_allowed: Option<(&Server, Timestamp)> = None;

    for server in servers {
        let created = created_at(server);
        if oldest.is_none_or(|(_, t)| created < t) {
            oldest = Some((server, created));
        }
        if delete_first && probe.is_delete_allowed(server).await? {
            if oldest_allowed.is_none_or(|(_, t)| created < t) {
                oldest_allowed = Some((server, created));
            }
        }
    }

    oldest_allowed
        .or(oldest)
        .map(|(server, _)| server)
        .ok_or(Error::NoServers)
}

/// The newest Server, with the same allowed-first preference.
async fn get_newest_server<'a>(
    servers: &'a [Server],
    delete_first: bool,
    probe: &dyn EvictionProbe,
) -> Result<&'a Server, Error> {
    let mut newest: Option<(&Server, Timestamp)> = None;
    let mut newest_allowed: Option<(&Server, Timestamp)> = None;

    for server in servers {
        let created = created_at(server);
        if newest.is_none_or(|(_, t)| created > t) {
            newest = Some((server, created));
        }
        if delete_first && probe.is_delete_allowed(server).await? {
            if newest_allowed.is_none_or(|(_, t)| created > t) {
                newest_allowed = Some((server, created));
            }
        }
    }

    newest_allowed
        .or(newest)
        .map(|(server, _)| server)
        .ok_or(Error::NoServers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::{apimachinery::pkg::apis::meta::v1::Time, jiff::SignedDuration};
    use kube::api::ObjectMeta;
    use loputoo_types::{FleetScaling, FleetSpec};
    use std::collections::HashMap;

    struct FakeProbe {
        deletion_state: HashMap<String, bool>,
    }

    #[async_trait]
    impl EvictionProbe for FakeProbe {
        async fn is_delete_allowed(&self, server: &Server) -> Result<bool, Error> {
            Ok(*self
                .deletion_state
                .get(server.metadata.name.as_deref().unwrap_or_default())
                .unwrap_or(&false))
        }
    }

    fn probe(allowed: &[&str]) -> FakeProbe {
        FakeProbe {
            deletion_state: allowed.iter().map(|name| (name.to_string(), true)).collect(),
        }
    }

    fn server(name: &str, age_minutes: i64) -> Server {
        Server {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                creation_timestamp: Some(Time::from(
                    Timestamp::now() - SignedDuration::from_secs(age_minutes * 60),
                )),
                ..Default::default()
            },
            spec: Default::default(),
            status: None,
        }
    }

    fn fleet(age_priority: &str, prioritize_allowed: bool) -> Fleet {
        Fleet {
            metadata: ObjectMeta {
                name: Some("lobby".to_string()),
                ..Default::default()
            },
            spec: FleetSpec {
                server: Default::default(),
                scaling: FleetScaling {
                    replicas: 1,
                    prioritize_allowed,
                    age_priority: age_priority.to_string(),
                },
            },
            status: None,
        }
    }

    // server-1 is the oldest, server-2 the newest, server-3 in between.
    fn servers() -> Vec<Server> {
        vec![
            server("server-1", 60),
            server("server-2", 0),
            server("server-3", 59),
        ]
    }

    #[tokio::test]
    async fn finds_oldest() {
        let servers = servers();
        let victim = find_delete_server(
            &fleet(age_priority::OLDEST_FIRST, false),
            &servers,
            &probe(&[]),
        )
        .await
        .unwrap();
        assert_eq!(victim.metadata.name.as_deref(), Some("server-1"));
    }

    #[tokio::test]
    async fn finds_oldest_with_delete_allowed() {
        let servers = servers();
        let victim = find_delete_server(
            &fleet(age_priority::OLDEST_FIRST, true),
            &servers,
            &probe(&["server-2", "server-3"]),
        )
        .await
        .unwrap();
        assert_eq!(victim.metadata.name.as_deref(), Some("server-3"));
    }

    #[tokio::test]
    async fn finds_newest() {
        let servers = servers();
        let victim = find_delete_server(
            &fleet(age_priority::NEWEST_FIRST, false),
            &servers,
            &probe(&[]),
        )
        .await
        .unwrap();
        assert_eq!(victim.metadata.name.as_deref(), Some("server-2"));
    }

    #[tokio::test]
    async fn finds_newest_with_delete_allowed() {
        let servers = servers();
        let victim = find_delete_server(
            &fleet(age_priority::NEWEST_FIRST, true),
            &servers,
            &probe(&["server-1", "server-3"]),
        )
        .await
        .unwrap();
        assert_eq!(victim.metadata.name.as_deref(), Some("server-3"));
    }

    #[tokio::test]
    async fn falls_back_when_nothing_is_allowed() {
        let servers = servers();
        let victim = find_delete_server(
            &fleet(age_priority::OLDEST_FIRST, true),
            &servers,
            &probe(&[]),
        )
        .await
        .unwrap();
        assert_eq!(victim.metadata.name.as_deref(), Some("server-1"));
    }

    #[tokio::test]
    async fn empty_fleet_is_an_error() {
        let result = find_delete_server(
            &fleet(age_priority::OLDEST_FIRST, false),
            &[],
            &probe(&[]),
        )
        .await;
        assert!(matches!(result, Err(Error::NoServers)));
    }

    #[tokio::test]
    async fn unknown_strategy_is_an_error() {
        let servers = servers();
        let result = find_delete_server(&fleet("largest_first", false), &servers, &probe(&[])).await;
        assert!(matches!(result, Err(Error::UnknownAgePriority(_))));
    }
}
