use std::time::Duration;

pub mod conditions;
pub mod events;
pub mod eviction;
pub mod finalizer;
pub mod gate;
pub mod patch;
pub mod pod;
pub mod scalewebhook;
pub mod sidecar;

pub(crate) mod colors;

mod error;

pub use error::*;

/// The default interval for requeuing a managed resource.
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Requeue delay after a scaling or replacement step; the next pass picks
/// up where this one left off.
pub(crate) const SCALE_STEP_INTERVAL: Duration = Duration::from_secs(2);

/// Name of the kubernetes resource manager.
pub(crate) const MANAGER_NAME: &str = "loputoo-operator";
