#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid user input: {0}")]
    UserInput(String),

    #[error("HTTP request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Parse duration: {source}")]
    ParseDuration {
        #[from]
        source: parse_duration::parse::Error,
    },

    /// Consent was withheld by the sidecar. Retryable: the reconciliation
    /// fails so the controller comes back later, without touching state.
    #[error("deletion of server '{0}' is not currently allowed")]
    DeletionNotAllowed(String),

    #[error("sidecar request returned: {0}")]
    SidecarStatus(reqwest::StatusCode),

    #[error("invalid webhook response: {status}. Raw response: {body}")]
    WebhookStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid scaling strategy: {0}")]
    UnknownAgePriority(String),

    #[error("no servers found")]
    NoServers,

    #[error("missing path")]
    MissingWebhookPath,
}
