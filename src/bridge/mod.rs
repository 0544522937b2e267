//! Bridging core: per-device ThingsBoard sessions, the shared ChirpStack
//! uplink listener, and the registry that ties the two together.
//!
//! ## Module Structure
//!
//! - `registry`: Device table and session lifecycle (`Registry`)
//! - `session`: Per-device ThingsBoard MQTT session (`DeviceSession`)
//! - `topic`: Topic constants and wildcard matching
//! - `uplink`: Shared ChirpStack uplink listener (`UplinkListener`)

pub mod registry;
pub mod session;
pub mod topic;
pub mod uplink;

// Re-export main types for convenience
pub use registry::Registry;
pub use uplink::{radio_session, UplinkHandle, UplinkListener};
