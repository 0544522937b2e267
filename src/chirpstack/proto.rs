//! Hand-maintained subset of the ChirpStack v4 `api.DeviceService` protobuf
//! definitions (`chirpstack-api`, `api/device.proto`).
//!
//! Only the messages the bridge exchanges are defined; unknown fields are
//! skipped on decode, so this stays wire-compatible with the full upstream
//! schema. Field numbers must match the upstream proto exactly.

/// A single item in a device's downlink queue.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceQueueItem {
    /// ID (UUID), assigned by the server.
    #[prost(string, tag = "1")]
    pub id: String,
    /// Device EUI (EUI64).
    #[prost(string, tag = "2")]
    pub dev_eui: String,
    /// Confirmed delivery.
    #[prost(bool, tag = "3")]
    pub confirmed: bool,
    /// FPort (must be > 0).
    #[prost(uint32, tag = "4")]
    pub f_port: u32,
    /// Raw downlink payload.
    #[prost(bytes = "vec", tag = "5")]
    pub data: Vec<u8>,
}

/// Request for `api.DeviceService/Enqueue`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnqueueDeviceQueueItemRequest {
    #[prost(message, optional, tag = "1")]
    pub queue_item: Option<DeviceQueueItem>,
}

/// Response for `api.DeviceService/Enqueue`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EnqueueDeviceQueueItemResponse {
    /// ID of the enqueued item (UUID).
    #[prost(string, tag = "1")]
    pub id: String,
}

/// Full gRPC method path of the enqueue RPC.
pub const ENQUEUE_PATH: &str = "/api.DeviceService/Enqueue";
