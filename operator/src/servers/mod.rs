mod actions;
mod reconcile;

pub use reconcile::{PodConfig, run};
