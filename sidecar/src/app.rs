use std::{ops::Deref, sync::Arc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Consent flags for the co-located game server. Ephemeral: a pod restart
/// resets both to false.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsentState {
    /// Set by the game server once it considers itself drained.
    pub delete_allowed: bool,

    /// Set by the operator to ask the game server to start draining.
    pub shutdown_requested: bool,
}

pub struct AppInner {
    pub cancel: CancellationToken,
    pub state: Mutex<ConsentState>,
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl Deref for App {
    type Target = AppInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl App {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(AppInner {
                cancel,
                state: Mutex::new(ConsentState::default()),
            }),
        }
    }
}
