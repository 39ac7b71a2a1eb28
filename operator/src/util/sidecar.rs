//! HTTP client for the consent sidecar running inside every server pod.

use super::{Error, pod::SIDECAR_PORT};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct AllowDeleteResponse {
    allowed: bool,
}

#[derive(Serialize)]
struct ShutdownRequest {
    shutdown: bool,
}

/// Asks the pod's sidecar whether the game server permits deletion.
pub async fn is_delete_allowed(pod: &Pod) -> Result<bool, Error> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let response = client
        .get(format!("{}allow_delete", pod_base_address(pod)?))
        .send()
        .await?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(Error::SidecarStatus(response.status()));
    }
    let body: AllowDeleteResponse = response.json().await?;
    Ok(body.allowed)
}

/// Tells the pod's sidecar that the operator wants the game server gone,
/// so the server can begin draining. A signal, not a wait: deletion only
/// proceeds once a later probe sees `allowed = true`.
pub async fn request_shutdown(pod: &Pod) -> Result<(), Error> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let response = client
        .post(format!("{}shutdown", pod_base_address(pod)?))
        .json(&ShutdownRequest { shutdown: true })
        .send()
        .await?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(Error::SidecarStatus(response.status()));
    }
    Ok(())
}

fn pod_base_address(pod: &Pod) -> Result<String, Error> {
    let ip = pod
        .status
        .as_ref()
        .and_then(|s| s.pod_ip.as_deref())
        .ok_or_else(|| Error::UserInput(format!("Pod '{}' has no IP yet", pod.name_any())))?;
    Ok(format!("http://{}:{}/", ip, SIDECAR_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;

    #[test]
    fn base_address_uses_pod_ip() {
        let pod = Pod {
            status: Some(PodStatus {
                pod_ip: Some("10.1.2.3".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(pod_base_address(&pod).unwrap(), "http://10.1.2.3:8080/");
    }

    #[test]
    fn base_address_requires_pod_ip() {
        let pod = Pod::default();
        assert!(pod_base_address(&pod).is_err());
    }
}
