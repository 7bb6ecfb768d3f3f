//! Locally offered command sets and notification sets.

use crate::communication::{
    CommandResult, CommandTask, CommunicationError, CommunicationMessage, EndpointId,
    EventRegistration, InvocationParameter, KnownEndpoints, MessageBody, SendMessages,
    SerializedType,
};
use crate::core::logging::{LogSeverity, Logger};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: String,
    pub parameter_types: Vec<String>,
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_types.join(", "))
    }
}

/// A named group of commands that remote endpoints may invoke.
pub trait CommandSet: Send + Sync {
    fn name(&self) -> &str;

    fn methods(&self) -> Vec<MethodSignature>;

    /// Starts the member whose name and parameter types match exactly.
    fn invoke(
        &self,
        member: &str,
        parameters: &[InvocationParameter],
    ) -> Result<CommandTask, CommunicationError>;

    fn serialized_type(&self) -> SerializedType {
        SerializedType {
            name: self.name().to_string(),
            members: self.methods().iter().map(ToString::to_string).collect(),
        }
    }
}

type CommandHandler = Box<dyn Fn(&[serde_json::Value]) -> CommandTask + Send + Sync>;

/// A [`CommandSet`] backed by closures.
pub struct LocalCommandSet {
    name: String,
    methods: Vec<(MethodSignature, CommandHandler)>,
}

impl LocalCommandSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Adds a member that finishes before returning.
    pub fn with_method<F>(self, name: &str, parameter_types: &[&str], handler: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> anyhow::Result<CommandResult> + Send + Sync + 'static,
    {
        self.with_deferred_method(name, parameter_types, move |args| {
            CommandTask::from_result(handler(args))
        })
    }

    /// Adds a member that hands back a task finishing later.
    pub fn with_deferred_method<F>(mut self, name: &str, parameter_types: &[&str], handler: F) -> Self
    where
        F: Fn(&[serde_json::Value]) -> CommandTask + Send + Sync + 'static,
    {
        let signature = MethodSignature {
            name: name.to_string(),
            parameter_types: parameter_types.iter().map(|t| t.to_string()).collect(),
        };
        self.methods.push((signature, Box::new(handler)));
        self
    }
}

impl CommandSet for LocalCommandSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn methods(&self) -> Vec<MethodSignature> {
        self.methods.iter().map(|(s, _)| s.clone()).collect()
    }

    fn invoke(
        &self,
        member: &str,
        parameters: &[InvocationParameter],
    ) -> Result<CommandTask, CommunicationError> {
        let handler = self.methods.iter().find(|(signature, _)| {
            signature.name == member
                && signature.parameter_types.len() == parameters.len()
                && signature
                    .parameter_types
                    .iter()
                    .zip(parameters)
                    .all(|(expected, given)| *expected == given.type_name)
        });

        match handler {
            Some((_, handler)) => {
                let args: Vec<_> = parameters.iter().map(|p| p.value.clone()).collect();
                Ok(handler(&args))
            }
            None => Err(CommunicationError::UnknownCommandMember {
                command_set: self.name.clone(),
                member: member.to_string(),
                parameters: parameters
                    .iter()
                    .map(|p| p.type_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Sends messages from the local endpoint to every known remote endpoint.
#[derive(Clone)]
pub struct Broadcaster {
    local: EndpointId,
    sender: Arc<dyn SendMessages>,
    endpoints: KnownEndpoints,
    logger: Logger,
}

impl Broadcaster {
    pub fn new(
        local: EndpointId,
        sender: Arc<dyn SendMessages>,
        endpoints: KnownEndpoints,
        logger: Logger,
    ) -> Self {
        Self {
            local,
            sender,
            endpoints,
            logger,
        }
    }

    pub fn local(&self) -> &EndpointId {
        &self.local
    }

    pub fn send_to(&self, endpoint: &EndpointId, body: MessageBody) -> Result<(), CommunicationError> {
        self.sender
            .send(endpoint, CommunicationMessage::new(self.local.clone(), body))
    }

    /// Sends `body` to `targets`, logging each failed delivery. Returns the delivered count.
    pub fn send_to_all(&self, targets: &[EndpointId], body: &MessageBody) -> usize {
        let mut delivered = 0;
        for endpoint in targets {
            match self.send_to(endpoint, body.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => (self.logger)(
                    LogSeverity::Error,
                    &format!("Failed to send {} to {endpoint}: {e}", body.kind()),
                ),
            }
        }
        delivered
    }

    pub fn broadcast(&self, body: &MessageBody) -> usize {
        self.send_to_all(&self.endpoints.ids(), body)
    }
}

/// The command sets this endpoint offers.
#[derive(Default)]
pub struct CommandCollection {
    sets: RwLock<BTreeMap<String, Arc<dyn CommandSet>>>,
    broadcaster: Option<Broadcaster>,
}

impl CommandCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces every later registration to the known endpoints.
    pub fn with_broadcaster(mut self, broadcaster: Broadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn register(&self, set: Arc<dyn CommandSet>) -> Result<(), CommunicationError> {
        let descriptor = set.serialized_type();
        {
            let mut sets = self.sets.write().unwrap_or_else(PoisonError::into_inner);
            if sets.contains_key(set.name()) {
                return Err(CommunicationError::CommandSetAlreadyRegistered(
                    set.name().to_string(),
                ));
            }
            sets.insert(set.name().to_string(), set);
        }

        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(&MessageBody::NewCommandRegistered {
                command: descriptor,
            });
        }
        Ok(())
    }

    pub fn command_set(&self, name: &str) -> Option<Arc<dyn CommandSet>> {
        self.sets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn serialized_types(&self) -> Vec<SerializedType> {
        self.sets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|set| set.serialized_type())
            .collect()
    }
}

#[derive(Default)]
struct NotificationState {
    sets: BTreeMap<String, SerializedType>,
    listeners: BTreeMap<EventRegistration, Vec<EndpointId>>,
}

/// The notification sets this endpoint offers, and who listens to which event.
pub struct LocalNotificationCollection {
    broadcaster: Broadcaster,
    state: Mutex<NotificationState>,
}

impl LocalNotificationCollection {
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self {
            broadcaster,
            state: Mutex::new(NotificationState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, NotificationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a notification set whose `members` are its event names, and tells
    /// every known endpoint about it.
    pub fn store(&self, notification: SerializedType) -> Result<(), CommunicationError> {
        {
            let mut state = self.state();
            if state.sets.contains_key(&notification.name) {
                return Err(CommunicationError::NotificationSetAlreadyRegistered(
                    notification.name,
                ));
            }
            state
                .sets
                .insert(notification.name.clone(), notification.clone());
        }

        self.broadcaster
            .broadcast(&MessageBody::NewNotificationRegistered { notification });
        Ok(())
    }

    pub fn serialized_types(&self) -> Vec<SerializedType> {
        self.state().sets.values().cloned().collect()
    }

    fn ensure_known(state: &NotificationState, registration: &EventRegistration) -> Result<(), CommunicationError> {
        let known = state
            .sets
            .get(&registration.notification_set)
            .is_some_and(|set| set.members.contains(&registration.event_name));
        if known {
            Ok(())
        } else {
            Err(CommunicationError::UnknownNotification(registration.to_string()))
        }
    }

    pub fn register_for_notification(
        &self,
        endpoint: &EndpointId,
        registration: &EventRegistration,
    ) -> Result<(), CommunicationError> {
        let mut state = self.state();
        Self::ensure_known(&state, registration)?;
        let listeners = state.listeners.entry(registration.clone()).or_default();
        if !listeners.contains(endpoint) {
            listeners.push(endpoint.clone());
        }
        Ok(())
    }

    /// Stops sending `registration` to `endpoint`. Unknown listeners are ignored.
    pub fn unregister_from_notification(
        &self,
        endpoint: &EndpointId,
        registration: &EventRegistration,
    ) -> Result<(), CommunicationError> {
        let mut state = self.state();
        Self::ensure_known(&state, registration)?;
        if let Some(listeners) = state.listeners.get_mut(registration) {
            listeners.retain(|e| e != endpoint);
            if listeners.is_empty() {
                state.listeners.remove(registration);
            }
        }
        Ok(())
    }

    pub fn listeners(&self, registration: &EventRegistration) -> Vec<EndpointId> {
        self.state()
            .listeners
            .get(registration)
            .cloned()
            .unwrap_or_default()
    }

    /// Sends the event to every listener. Returns how many deliveries succeeded.
    pub fn raise(
        &self,
        registration: &EventRegistration,
        arguments: serde_json::Value,
    ) -> Result<usize, CommunicationError> {
        let listeners = {
            let state = self.state();
            Self::ensure_known(&state, registration)?;
            state.listeners.get(registration).cloned().unwrap_or_default()
        };

        let body = MessageBody::NotificationRaised {
            registration: registration.clone(),
            arguments,
        };
        Ok(self.broadcaster.send_to_all(&listeners, &body))
    }
}
