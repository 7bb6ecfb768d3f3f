//! What connected remote endpoints offer.
//!
//! [`RemoteCommandHub`] and [`RemoteNotificationHub`] ask every endpoint that
//! connects for its command sets or notification sets, keep the answer per
//! endpoint, pick up sets announced later, and forget an endpoint once it
//! disconnects. Wire them in as the [`ConnectionSink`] of the connect and
//! disconnect processors and as the [`RegistrationSink`] of the matching
//! registration processor.

use crate::communication::{
    CommunicationError, CommunicationMessage, ConnectionSink, EndpointId, MessageBody,
    MessageHandler, RegistrationSink, ResponseFuture, SendMessages, SerializedType,
};
use crate::core::logging::{LogSeverity, Logger};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

/// A change in what one remote endpoint offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAvailability {
    /// The endpoint answered the information request with these set names.
    SignedIn {
        endpoint: EndpointId,
        sets: Vec<String>,
    },
    SignedOff {
        endpoint: EndpointId,
    },
}

type AvailabilityListener = Arc<dyn Fn(&RemoteAvailability) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProxyKind {
    Commands,
    Notifications,
}

impl ProxyKind {
    fn request(self) -> MessageBody {
        match self {
            ProxyKind::Commands => MessageBody::CommandInformationRequest,
            ProxyKind::Notifications => MessageBody::NotificationInformationRequest,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ProxyKind::Commands => "commands",
            ProxyKind::Notifications => "notifications",
        }
    }
}

#[derive(Default)]
struct HubState {
    waiting: BTreeSet<EndpointId>,
    sets: BTreeMap<EndpointId, BTreeMap<String, SerializedType>>,
}

/// State shared between a hub and the continuations of its pending requests.
struct Shared {
    kind: ProxyKind,
    state: Mutex<HubState>,
    listeners: RwLock<Vec<AvailabilityListener>>,
    logger: Logger,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, severity: LogSeverity, text: &str) {
        (self.logger)(severity, text)
    }

    fn raise(&self, change: RemoteAvailability) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(&change);
        }
    }

    fn store_response(
        &self,
        endpoint: &EndpointId,
        result: &Result<CommunicationMessage, CommunicationError>,
    ) {
        let label = self.kind.label();
        let types = match result.as_ref().map(CommunicationMessage::body) {
            Ok(MessageBody::EndpointProxyTypesResponse { proxy_types }) => Some(proxy_types),
            Ok(other) => {
                self.log(
                    LogSeverity::Warning,
                    &format!(
                        "The {label} of endpoint [{endpoint}] were missing from its {} reply",
                        other.kind()
                    ),
                );
                None
            }
            Err(e) => {
                self.log(
                    LogSeverity::Warning,
                    &format!("Requesting {label} from endpoint [{endpoint}] failed: {e}"),
                );
                None
            }
        };

        let (stored, was_waiting) = {
            let mut state = self.state();
            let was_waiting = state.waiting.remove(endpoint);
            let stored = match types {
                Some(types) if was_waiting && !types.is_empty() => {
                    let sets = state.sets.entry(endpoint.clone()).or_default();
                    for set in types {
                        sets.entry(set.name.clone()).or_insert_with(|| set.clone());
                    }
                    Some(types.iter().map(|set| set.name.clone()).collect::<Vec<_>>())
                }
                _ => None,
            };
            (stored, was_waiting)
        };

        if let Some(types) = types.filter(|_| was_waiting) {
            self.log(
                LogSeverity::Trace,
                &format!("Received {} {label} from endpoint [{endpoint}].", types.len()),
            );
        }
        if was_waiting {
            self.log(
                LogSeverity::Trace,
                &format!("No longer waiting for {label} from endpoint [{endpoint}]."),
            );
        }
        if let Some(sets) = stored {
            self.raise(RemoteAvailability::SignedIn {
                endpoint: endpoint.clone(),
                sets,
            });
        }
    }
}

/// Tracks the sets of one kind offered by remote endpoints.
struct RemoteProxyHub {
    local: EndpointId,
    handler: Weak<MessageHandler>,
    sender: Arc<dyn SendMessages>,
    shared: Arc<Shared>,
}

impl RemoteProxyHub {
    fn new(
        kind: ProxyKind,
        local: EndpointId,
        handler: &Arc<MessageHandler>,
        sender: Arc<dyn SendMessages>,
        logger: Logger,
    ) -> Self {
        Self {
            local,
            handler: Arc::downgrade(handler),
            sender,
            shared: Arc::new(Shared {
                kind,
                state: Mutex::default(),
                listeners: RwLock::default(),
                logger,
            }),
        }
    }

    fn request_information(&self, endpoint: &EndpointId) {
        let label = self.shared.kind.label();
        {
            let mut state = self.shared.state();
            if state.sets.contains_key(endpoint) {
                return;
            }
            if !state.waiting.insert(endpoint.clone()) {
                drop(state);
                self.shared.log(
                    LogSeverity::Trace,
                    &format!("Already waiting for {label} from endpoint [{endpoint}]."),
                );
                return;
            }
        }

        // The reply may arrive before `send` returns, so the lock must be free here.
        match self.send_request(endpoint) {
            Ok(response) => {
                let shared = self.shared.clone();
                let endpoint = endpoint.clone();
                response.on_complete(move |result| shared.store_response(&endpoint, result));
            }
            Err(e) => {
                self.shared.state().waiting.remove(endpoint);
                self.shared.log(
                    LogSeverity::Error,
                    &format!("Could not ask endpoint [{endpoint}] for its {label}: {e}"),
                );
            }
        }
    }

    fn send_request(&self, endpoint: &EndpointId) -> Result<ResponseFuture, CommunicationError> {
        let handler = self
            .handler
            .upgrade()
            .ok_or(CommunicationError::ResponseCanceled)?;
        let message = CommunicationMessage::new(self.local.clone(), self.shared.kind.request());
        let id = message.id();
        let response = handler.forward_response(endpoint, id)?;
        if let Err(e) = self.sender.send(endpoint, message) {
            handler.cancel_response(id);
            return Err(e);
        }
        Ok(response)
    }

    fn forget(&self, endpoint: &EndpointId) {
        let label = self.shared.kind.label();
        let (was_waiting, had_sets) = {
            let mut state = self.shared.state();
            (
                state.waiting.remove(endpoint),
                state.sets.remove(endpoint).is_some(),
            )
        };
        if was_waiting {
            self.shared.log(
                LogSeverity::Trace,
                &format!("No longer waiting for {label} from endpoint [{endpoint}]."),
            );
        }
        if had_sets {
            self.shared.log(
                LogSeverity::Trace,
                &format!("Removing {label} for endpoint [{endpoint}]."),
            );
        }
        self.shared.raise(RemoteAvailability::SignedOff {
            endpoint: endpoint.clone(),
        });
    }

    /// Adds a set announced after the initial exchange.
    fn add(&self, endpoint: &EndpointId, set: &SerializedType) {
        self.shared
            .state()
            .sets
            .entry(endpoint.clone())
            .or_default()
            .entry(set.name.clone())
            .or_insert_with(|| set.clone());
        self.shared.log(
            LogSeverity::Trace,
            &format!(
                "Endpoint [{endpoint}] added {} to its {}.",
                set.name,
                self.shared.kind.label()
            ),
        );
    }

    fn endpoints(&self) -> Vec<EndpointId> {
        self.shared.state().sets.keys().cloned().collect()
    }

    fn sets(&self, endpoint: &EndpointId) -> Vec<SerializedType> {
        self.shared
            .state()
            .sets
            .get(endpoint)
            .map(|sets| sets.values().cloned().collect())
            .unwrap_or_default()
    }

    fn set(&self, endpoint: &EndpointId, name: &str) -> Option<SerializedType> {
        self.shared
            .state()
            .sets
            .get(endpoint)
            .and_then(|sets| sets.get(name))
            .cloned()
    }

    fn has_sets_for(&self, endpoint: &EndpointId) -> bool {
        self.shared.state().sets.contains_key(endpoint)
    }

    fn is_waiting_for(&self, endpoint: &EndpointId) -> bool {
        self.shared.state().waiting.contains(endpoint)
    }

    fn on_availability_change<F>(&self, listener: F)
    where
        F: Fn(&RemoteAvailability) + Send + Sync + 'static,
    {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }
}

/// The command sets offered by connected remote endpoints.
pub struct RemoteCommandHub {
    hub: RemoteProxyHub,
}

impl RemoteCommandHub {
    /// `handler` receives the replies to the information requests this hub sends.
    pub fn new(
        local: EndpointId,
        handler: &Arc<MessageHandler>,
        sender: Arc<dyn SendMessages>,
        logger: Logger,
    ) -> Self {
        Self {
            hub: RemoteProxyHub::new(ProxyKind::Commands, local, handler, sender, logger),
        }
    }

    /// Endpoints that reported at least one command set.
    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.hub.endpoints()
    }

    pub fn command_sets(&self, endpoint: &EndpointId) -> Vec<SerializedType> {
        self.hub.sets(endpoint)
    }

    pub fn command_set(&self, endpoint: &EndpointId, name: &str) -> Option<SerializedType> {
        self.hub.set(endpoint, name)
    }

    pub fn has_commands_for(&self, endpoint: &EndpointId) -> bool {
        self.hub.has_sets_for(endpoint)
    }

    pub fn has_command_set(&self, endpoint: &EndpointId, name: &str) -> bool {
        self.hub.set(endpoint, name).is_some()
    }

    pub fn is_waiting_for(&self, endpoint: &EndpointId) -> bool {
        self.hub.is_waiting_for(endpoint)
    }

    pub fn on_availability_change<F>(&self, listener: F)
    where
        F: Fn(&RemoteAvailability) + Send + Sync + 'static,
    {
        self.hub.on_availability_change(listener)
    }
}

impl ConnectionSink for RemoteCommandHub {
    fn endpoint_connected(&self, endpoint: &EndpointId, _: &str, _: &str) {
        self.hub.request_information(endpoint)
    }

    fn endpoint_disconnected(&self, endpoint: &EndpointId) {
        self.hub.forget(endpoint)
    }
}

impl RegistrationSink for RemoteCommandHub {
    fn remote_command_registered(&self, endpoint: &EndpointId, command: &SerializedType) {
        self.hub.add(endpoint, command)
    }

    fn remote_notification_registered(&self, _: &EndpointId, _: &SerializedType) {}
}

/// The notification sets offered by connected remote endpoints.
pub struct RemoteNotificationHub {
    hub: RemoteProxyHub,
}

impl RemoteNotificationHub {
    pub fn new(
        local: EndpointId,
        handler: &Arc<MessageHandler>,
        sender: Arc<dyn SendMessages>,
        logger: Logger,
    ) -> Self {
        Self {
            hub: RemoteProxyHub::new(ProxyKind::Notifications, local, handler, sender, logger),
        }
    }

    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.hub.endpoints()
    }

    pub fn notification_sets(&self, endpoint: &EndpointId) -> Vec<SerializedType> {
        self.hub.sets(endpoint)
    }

    pub fn notification_set(&self, endpoint: &EndpointId, name: &str) -> Option<SerializedType> {
        self.hub.set(endpoint, name)
    }

    pub fn has_notifications_for(&self, endpoint: &EndpointId) -> bool {
        self.hub.has_sets_for(endpoint)
    }

    pub fn has_notification_set(&self, endpoint: &EndpointId, name: &str) -> bool {
        self.hub.set(endpoint, name).is_some()
    }

    pub fn is_waiting_for(&self, endpoint: &EndpointId) -> bool {
        self.hub.is_waiting_for(endpoint)
    }

    pub fn on_availability_change<F>(&self, listener: F)
    where
        F: Fn(&RemoteAvailability) + Send + Sync + 'static,
    {
        self.hub.on_availability_change(listener)
    }
}

impl ConnectionSink for RemoteNotificationHub {
    fn endpoint_connected(&self, endpoint: &EndpointId, _: &str, _: &str) {
        self.hub.request_information(endpoint)
    }

    fn endpoint_disconnected(&self, endpoint: &EndpointId) {
        self.hub.forget(endpoint)
    }
}

impl RegistrationSink for RemoteNotificationHub {
    fn remote_command_registered(&self, _: &EndpointId, _: &SerializedType) {}

    fn remote_notification_registered(&self, endpoint: &EndpointId, notification: &SerializedType) {
        self.hub.add(endpoint, notification)
    }
}
