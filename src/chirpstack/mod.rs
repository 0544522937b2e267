//! ChirpStack gRPC API client.

pub mod client;
pub mod proto;

pub use client::EnqueueClient;
