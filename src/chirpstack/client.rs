//! Downlink enqueue client for the ChirpStack gRPC API.

use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use crate::chirpstack::proto;
use crate::common::error::EnqueueError;
use crate::config::ChirpstackConfig;

/// Client for `api.DeviceService/Enqueue`.
///
/// Holds one lazily-connected channel shared by every device session; clones
/// are cheap and multiplex over the same connection. The bearer token is
/// parsed once at construction and attached to every request.
#[derive(Clone)]
pub struct EnqueueClient {
    grpc: Grpc<Channel>,
    authorization: MetadataValue<Ascii>,
    downlink_fport: u8,
}

impl EnqueueClient {
    /// Build a client against the configured API endpoint.
    ///
    /// No connection is made here; the channel connects on first use and
    /// reconnects on its own afterwards.
    pub fn new(config: &ChirpstackConfig, downlink_fport: u8) -> Result<Self, EnqueueError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", config.api_server))?;
        let channel = endpoint.connect_lazy();
        let authorization = MetadataValue::try_from(format!("Bearer {}", config.api_key))?;

        Ok(Self {
            grpc: Grpc::new(channel),
            authorization,
            downlink_fport,
        })
    }

    /// Enqueue an unconfirmed downlink for a device and return the queue
    /// item id assigned by the server.
    pub async fn enqueue(&self, dev_eui: &str, payload: Vec<u8>) -> Result<String, EnqueueError> {
        let item = proto::DeviceQueueItem {
            id: String::new(),
            dev_eui: dev_eui.to_string(),
            confirmed: false,
            f_port: u32::from(self.downlink_fport),
            data: payload,
        };

        let mut request = Request::new(proto::EnqueueDeviceQueueItemRequest {
            queue_item: Some(item),
        });
        request
            .metadata_mut()
            .insert("authorization", self.authorization.clone());

        let mut grpc = self.grpc.clone();
        grpc.ready().await.map_err(EnqueueError::Transport)?;

        let codec: ProstCodec<
            proto::EnqueueDeviceQueueItemRequest,
            proto::EnqueueDeviceQueueItemResponse,
        > = ProstCodec::default();
        let path = PathAndQuery::from_static(proto::ENQUEUE_PATH);

        let response = grpc.unary(request, path, codec).await?;
        Ok(response.into_inner().id)
    }
}
