//! Seams to the transport layer and to the consumers of incoming events.

use crate::communication::{
    CommunicationError, CommunicationMessage, EndpointId, EventRegistration, SerializedType,
    StreamTransferInformation,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Fire-and-forget delivery of a message to an endpoint.
pub trait SendMessages: Send + Sync {
    fn send(
        &self,
        endpoint: &EndpointId,
        message: CommunicationMessage,
    ) -> Result<(), CommunicationError>;
}

impl<F> SendMessages for F
where
    F: Fn(&EndpointId, CommunicationMessage) -> Result<(), CommunicationError> + Send + Sync,
{
    fn send(
        &self,
        endpoint: &EndpointId,
        message: CommunicationMessage,
    ) -> Result<(), CommunicationError> {
        self(endpoint, message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pushes a local file to the receiver described by a transfer descriptor.
///
/// Implementations block until the transfer is done and should give up with
/// [`CommunicationError::UploadCanceled`] once `cancel` is set.
pub trait UploadData: Send + Sync {
    fn upload(
        &self,
        path: &Path,
        transfer: &StreamTransferInformation,
        cancel: &CancellationToken,
    ) -> Result<(), CommunicationError>;
}

impl<F> UploadData for F
where
    F: Fn(&Path, &StreamTransferInformation, &CancellationToken) -> Result<(), CommunicationError>
        + Send
        + Sync,
{
    fn upload(
        &self,
        path: &Path,
        transfer: &StreamTransferInformation,
        cancel: &CancellationToken,
    ) -> Result<(), CommunicationError> {
        self(path, transfer, cancel)
    }
}

/// Receives connection lifecycle events of remote endpoints.
pub trait ConnectionSink: Send + Sync {
    fn endpoint_connected(&self, endpoint: &EndpointId, address: &str, channel_type: &str);

    fn endpoint_disconnected(&self, endpoint: &EndpointId);
}

/// Hands every lifecycle event to each sink in turn.
impl ConnectionSink for Vec<Arc<dyn ConnectionSink>> {
    fn endpoint_connected(&self, endpoint: &EndpointId, address: &str, channel_type: &str) {
        for sink in self {
            sink.endpoint_connected(endpoint, address, channel_type);
        }
    }

    fn endpoint_disconnected(&self, endpoint: &EndpointId) {
        for sink in self {
            sink.endpoint_disconnected(endpoint);
        }
    }
}

/// Receives the command and notification sets remote endpoints announce.
pub trait RegistrationSink: Send + Sync {
    fn remote_command_registered(&self, endpoint: &EndpointId, command: &SerializedType);

    fn remote_notification_registered(&self, endpoint: &EndpointId, notification: &SerializedType);
}

/// Receives notifications raised by remote endpoints.
pub trait NotificationSink: Send + Sync {
    fn notification_raised(
        &self,
        endpoint: &EndpointId,
        registration: &EventRegistration,
        arguments: &serde_json::Value,
    );
}

impl<F> NotificationSink for F
where
    F: Fn(&EndpointId, &EventRegistration, &serde_json::Value) + Send + Sync,
{
    fn notification_raised(
        &self,
        endpoint: &EndpointId,
        registration: &EventRegistration,
        arguments: &serde_json::Value,
    ) {
        self(endpoint, registration, arguments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAddress {
    pub address: String,
    pub channel_type: String,
}

/// The remote endpoints currently connected, with the address each announced.
#[derive(Debug, Clone, Default)]
pub struct KnownEndpoints {
    endpoints: Arc<RwLock<BTreeMap<EndpointId, EndpointAddress>>>,
}

impl KnownEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> Vec<EndpointId> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn address(&self, endpoint: &EndpointId) -> Option<EndpointAddress> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .cloned()
    }

    pub fn contains(&self, endpoint: &EndpointId) -> bool {
        self.address(endpoint).is_some()
    }
}

impl ConnectionSink for KnownEndpoints {
    fn endpoint_connected(&self, endpoint: &EndpointId, address: &str, channel_type: &str) {
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                endpoint.clone(),
                EndpointAddress {
                    address: address.to_string(),
                    channel_type: channel_type.to_string(),
                },
            );
    }

    fn endpoint_disconnected(&self, endpoint: &EndpointId) {
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(endpoint);
    }
}
