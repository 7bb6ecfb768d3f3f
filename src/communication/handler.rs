//! Routes incoming messages: responses to whoever waits for them, everything
//! else to the registered processors.

use crate::communication::{
    CommunicationError, CommunicationMessage, EndpointId, MessageId, MessageKind,
    MessageProcessAction,
};
use crate::core::logging::{LogSeverity, Logger};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

type ResponseResult = Result<CommunicationMessage, CommunicationError>;
type ResponseContinuation = Box<dyn FnOnce(&ResponseResult) + Send>;
type PendingTable = Mutex<FxHashMap<MessageId, PendingResponse>>;

#[derive(Default)]
struct SlotState {
    result: Option<ResponseResult>,
    continuations: Vec<ResponseContinuation>,
}

#[derive(Default)]
struct ResponseSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl ResponseSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the first result and runs the continuations outside the lock.
    fn fill(&self, result: ResponseResult) {
        let continuations = {
            let mut state = self.lock();
            if state.result.is_some() {
                return;
            }
            state.result = Some(result.clone());
            self.ready.notify_all();
            std::mem::take(&mut state.continuations)
        };
        for continuation in continuations {
            continuation(&result);
        }
    }
}

/// The eventual response to a sent message.
#[derive(Clone)]
pub struct ResponseFuture {
    id: MessageId,
    slot: Arc<ResponseSlot>,
    pending: Weak<PendingTable>,
}

impl ResponseFuture {
    /// Id of the message this future waits to see answered.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Blocks until the response arrives or the wait is canceled.
    pub fn wait(&self) -> ResponseResult {
        let guard = self.slot.lock();
        let guard = self
            .slot
            .ready
            .wait_while(guard, |state| state.result.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .result
            .clone()
            .unwrap_or(Err(CommunicationError::ResponseCanceled))
    }

    /// Like [`Self::wait`], but gives up after `timeout`.
    ///
    /// Giving up abandons the request: its pending entry is dropped and every
    /// other waiter on the same response sees the timeout too.
    pub fn wait_timeout(&self, timeout: Duration) -> ResponseResult {
        {
            let guard = self.slot.lock();
            let (guard, _) = self
                .slot
                .ready
                .wait_timeout_while(guard, timeout, |state| state.result.is_none())
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(result) = &guard.result {
                return result.clone();
            }
        }

        if let Some(pending) = self.pending.upgrade() {
            let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
            if pending
                .get(&self.id)
                .is_some_and(|entry| Arc::ptr_eq(&entry.slot, &self.slot))
            {
                pending.remove(&self.id);
            }
        }
        // A response that slipped in before the entry was removed still wins.
        self.slot.fill(Err(CommunicationError::ResponseTimedOut));
        self.slot
            .lock()
            .result
            .clone()
            .unwrap_or(Err(CommunicationError::ResponseTimedOut))
    }

    pub fn try_result(&self) -> Option<ResponseResult> {
        self.slot.lock().result.clone()
    }

    /// Runs `continuation` once the response arrives or the wait ends.
    ///
    /// It runs inline on the thread that completes the response, or right away
    /// when the outcome is already known.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&ResponseResult) + Send + 'static,
    {
        let finished = {
            let mut state = self.slot.lock();
            if state.result.is_none() {
                state.continuations.push(Box::new(continuation));
                return;
            }
            state.result.clone()
        };
        if let Some(result) = finished {
            continuation(&result);
        }
    }
}

/// Decides whether a processor wants a message.
pub trait MessageFilter: Send + Sync {
    fn matches(&self, message: &CommunicationMessage) -> bool;
}

impl MessageFilter for MessageKind {
    fn matches(&self, message: &CommunicationMessage) -> bool {
        *self == message.kind()
    }
}

impl<F> MessageFilter for F
where
    F: Fn(&CommunicationMessage) -> bool + Send + Sync,
{
    fn matches(&self, message: &CommunicationMessage) -> bool {
        self(message)
    }
}

struct PendingResponse {
    endpoint: EndpointId,
    slot: Arc<ResponseSlot>,
}

type FilteredAction = (Box<dyn MessageFilter>, Arc<dyn MessageProcessAction>);

pub struct MessageHandler {
    pending: Arc<PendingTable>,
    actions: RwLock<Vec<FilteredAction>>,
    last_chance: RwLock<Option<Arc<dyn MessageProcessAction>>>,
    logger: Logger,
}

impl MessageHandler {
    pub fn new(logger: Logger) -> Self {
        Self {
            pending: Arc::default(),
            actions: RwLock::new(Vec::new()),
            last_chance: RwLock::new(None),
            logger,
        }
    }

    fn pending(&self) -> MutexGuard<'_, FxHashMap<MessageId, PendingResponse>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers interest in the response `endpoint` sends to message `in_response_to`.
    pub fn forward_response(
        &self,
        endpoint: &EndpointId,
        in_response_to: MessageId,
    ) -> Result<ResponseFuture, CommunicationError> {
        if in_response_to.is_none() {
            return Err(CommunicationError::MissingResponseId);
        }
        let mut pending = self.pending();
        let entry = pending
            .entry(in_response_to)
            .or_insert_with(|| PendingResponse {
                endpoint: endpoint.clone(),
                slot: Arc::default(),
            });
        Ok(ResponseFuture {
            id: in_response_to,
            slot: entry.slot.clone(),
            pending: Arc::downgrade(&self.pending),
        })
    }

    /// Stops waiting for the response to `in_response_to`. Returns `false` if
    /// nothing was waiting.
    pub fn cancel_response(&self, in_response_to: MessageId) -> bool {
        let waiting = self.pending().remove(&in_response_to);
        match waiting {
            Some(waiting) => {
                waiting.slot.fill(Err(CommunicationError::ResponseCanceled));
                true
            }
            None => false,
        }
    }

    pub fn pending_responses(&self) -> usize {
        self.pending().len()
    }

    pub fn act_on_arrival(
        &self,
        filter: impl MessageFilter + 'static,
        action: Arc<dyn MessageProcessAction>,
    ) {
        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Box::new(filter), action));
    }

    /// Installs `action` for the kind it declares, or as the last-chance
    /// handler if it accepts any message.
    pub fn register_processor(&self, action: Arc<dyn MessageProcessAction>) {
        match action.message_type_to_process() {
            Some(kind) => self.act_on_arrival(kind, action),
            None => {
                *self
                    .last_chance
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(action)
            }
        }
    }

    pub fn process_message(&self, message: &CommunicationMessage) {
        if message.is_response() {
            let waiting = self.pending().remove(&message.in_response_to());
            match waiting {
                Some(waiting) => waiting.slot.fill(Ok(message.clone())),
                None => (self.logger)(
                    LogSeverity::Warning,
                    &format!("Dropping unexpected response {message}"),
                ),
            }
            return;
        }

        if message.kind() == MessageKind::EndpointDisconnect {
            self.cancel_where(|pending| pending.endpoint == *message.origin());
        }

        let matching: Vec<_> = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(filter, _)| filter.matches(message))
            .map(|(_, action)| action.clone())
            .collect();

        if matching.is_empty() {
            let last_chance = self
                .last_chance
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match last_chance {
                Some(action) => action.invoke(message),
                None => (self.logger)(
                    LogSeverity::Debug,
                    &format!("No processor for {message}"),
                ),
            }
            return;
        }

        for action in matching {
            action.invoke(message);
        }
    }

    /// Cancels every pending response once the local channel is gone.
    pub fn on_local_channel_closed(&self) {
        self.cancel_where(|_| true);
    }

    fn cancel_where(&self, predicate: impl Fn(&PendingResponse) -> bool) {
        let canceled: Vec<_> = {
            let mut pending = self.pending();
            let ids: Vec<_> = pending
                .iter()
                .filter(|(_, p)| predicate(p))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| pending.remove(id)).collect()
        };
        for waiting in canceled {
            waiting.slot.fill(Err(CommunicationError::ResponseCanceled));
        }
    }
}
