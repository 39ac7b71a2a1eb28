pub mod admission;

mod autoscaler;
mod fleet;
mod gametype;
mod server;

pub use autoscaler::*;
pub use fleet::*;
pub use gametype::*;
pub use server::*;

/// API group shared by all custom resources in this crate.
pub const GROUP: &str = "network.unfamousthomas.me";

/// Label keys the controllers use to tie children to their parents.
pub mod labels {
    /// Set on a Server's Pod, value is the Server name.
    pub const SERVER: &str = "server";

    /// Set on Servers created by a Fleet, value is the Fleet name.
    pub const FLEET: &str = "fleet";

    /// Set on Fleets created by a GameType, value is the GameType name.
    pub const GAME_TYPE: &str = "type";
}

/// Finalizer names recorded on managed objects. These are part of the
/// external contract and must not change between releases.
pub mod finalizers {
    /// Present on every managed Server and its Pod.
    pub const SERVER: &str = "servers.unfamousthomas.me/finalizer";

    /// Present on every managed Fleet.
    pub const FLEET: &str = "fleets.unfamousthomas.me/finalizer";

    /// Present on every managed GameType.
    pub const GAME_TYPE: &str = "gametype.unfamousthomas.me/finalizer";
}
