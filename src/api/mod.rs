//! HTTP control plane: device registration, listing, and removal.

pub mod handlers;
pub mod routes;

pub use routes::router;
