use super::{Error, sidecar};
use async_trait::async_trait;
use k8s_openapi::{api::core::v1::Pod, jiff::Timestamp};
use kube::Resource;
use loputoo_types::Server;

/// Answers "may the operator delete this Server right now?".
///
/// Swapped for a fake in tests; the production gate talks to the pod's
/// sidecar.
#[async_trait]
pub trait DeletionGate: Send + Sync {
    async fn is_deletion_allowed(&self, server: &Server, pod: &Pod) -> Result<bool, Error>;
}

/// The production gate. Precedence: force flag, then expired timeout,
/// then sidecar consent. The shutdown POST is only a signal; the answer
/// comes from `/allow_delete`.
pub struct SidecarDeletionGate;

#[async_trait]
impl DeletionGate for SidecarDeletionGate {
    async fn is_deletion_allowed(&self, server: &Server, pod: &Pod) -> Result<bool, Error> {
        if server.spec.allow_force_delete {
            return Ok(true);
        }

        if let Some(timeout) = server.spec.timeout.as_deref()
            && let Some(deleted_at) = server.meta().deletion_timestamp.as_ref()
        {
            let timeout = parse_duration::parse(timeout)?;
            let waited = Timestamp::now().duration_since(deleted_at.0);
            if waited.as_secs() >= timeout.as_secs() as i64 {
                return Ok(true);
            }
        }

        sidecar::request_shutdown(pod).await?;
        sidecar::is_delete_allowed(pod).await
    }
}
