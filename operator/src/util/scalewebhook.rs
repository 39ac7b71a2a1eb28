//! Client for the external autoscaling decision endpoint.

use super::Error;
use async_trait::async_trait;
use loputoo_types::{GameAutoscaler, GameType, WebhookPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body POSTed to the policy endpoint.
#[derive(Serialize, Debug, PartialEq)]
pub struct AutoscaleRequest {
    pub game_name: String,
    pub current_replicas: i32,
}

/// Decision returned by the policy endpoint.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AutoscaleResponse {
    pub scale: bool,
    pub desired_replicas: i32,
}

/// The outbound webhook call, behind a trait so reconciler flow can be
/// exercised without a live endpoint.
#[async_trait]
pub trait ScaleWebhook: Send + Sync {
    async fn send_scale_request(
        &self,
        autoscaler: &GameAutoscaler,
        gametype: &GameType,
    ) -> Result<AutoscaleResponse, Error>;
}

pub struct HttpScaleWebhook;

#[async_trait]
impl ScaleWebhook for HttpScaleWebhook {
    async fn send_scale_request(
        &self,
        autoscaler: &GameAutoscaler,
        gametype: &GameType,
    ) -> Result<AutoscaleResponse, Error> {
        let url = webhook_url(&autoscaler.spec.policy.webhook)?;
        let request = AutoscaleRequest {
            game_name: autoscaler.spec.game_name.clone(),
            current_replicas: gametype.spec.fleet.scaling.replicas,
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let response = client.post(url).json(&request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status != reqwest::StatusCode::OK {
            return Err(Error::WebhookStatus { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Resolves the endpoint: an absolute URL wins, otherwise the in-cluster
/// service DNS name is assembled. The path is always required.
pub fn webhook_url(webhook: &WebhookPolicy) -> Result<String, Error> {
    let base = if let Some(url) = webhook.url.as_deref() {
        url.to_string()
    } else if let Some(service) = webhook.service.as_ref() {
        format!(
            "http://{}.{}.svc.cluster.local:{}",
            service.name, service.namespace, service.port
        )
    } else {
        return Err(Error::UserInput(
            "webhook policy specifies neither url nor service".to_string(),
        ));
    };
    let path = webhook.path.as_deref().ok_or(Error::MissingWebhookPath)?;
    Ok(format!("{}/{}", base, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loputoo_types::ServiceRef;

    #[test]
    fn absolute_url_wins() {
        let webhook = WebhookPolicy {
            url: Some("http://scaler.example.com:9000".to_string()),
            path: Some("scale".to_string()),
            service: Some(ServiceRef {
                name: "ignored".to_string(),
                namespace: "ignored".to_string(),
                port: 1,
            }),
        };
        assert_eq!(
            webhook_url(&webhook).unwrap(),
            "http://scaler.example.com:9000/scale"
        );
    }

    #[test]
    fn service_reference_builds_cluster_dns() {
        let webhook = WebhookPolicy {
            url: None,
            path: Some("scale".to_string()),
            service: Some(ServiceRef {
                name: "scaler".to_string(),
                namespace: "autoscaling".to_string(),
                port: 8080,
            }),
        };
        assert_eq!(
            webhook_url(&webhook).unwrap(),
            "http://scaler.autoscaling.svc.cluster.local:8080/scale"
        );
    }

    #[test]
    fn path_is_required() {
        let webhook = WebhookPolicy {
            url: Some("http://scaler.example.com".to_string()),
            path: None,
            service: None,
        };
        assert!(matches!(
            webhook_url(&webhook),
            Err(Error::MissingWebhookPath)
        ));
    }

    #[test]
    fn url_or_service_is_required() {
        let webhook = WebhookPolicy {
            url: None,
            path: Some("scale".to_string()),
            service: None,
        };
        assert!(matches!(webhook_url(&webhook), Err(Error::UserInput(_))));
    }
}
