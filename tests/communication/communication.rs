use apollo::communication::{
    Broadcaster, CancellationToken, CommandCollection, CommandInformationRequestProcessAction,
    CommandInvokedProcessAction, CommandResult, CommunicationError, CommunicationMessage,
    ConnectionSink, DataDownloadProcessAction, EndpointConnectProcessAction,
    EndpointDisconnectProcessAction, EndpointId, EventRegistration, InvocationParameter,
    KnownEndpoints, LocalCommandSet, LocalNotificationCollection, MessageBody, MessageHandler,
    MethodInvocation, NewCommandRegisteredProcessAction, NewNotificationRegisteredProcessAction,
    NotificationInformationRequestProcessAction, NotificationRaisedProcessAction,
    RegisterForNotificationProcessAction, RemoteAvailability, RemoteCommandHub,
    RemoteNotificationHub, ReplySender, SendMessages, SerializedType, StreamTransferInformation,
    UnknownMessageTypeProcessAction, WaitingUploads,
};
use apollo::core::config::CommunicationConfig;
use apollo::core::logging::{LogSeverity, Logger};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(5);

/// Delivers every message straight into the handler of the target endpoint.
#[derive(Clone, Default)]
struct Network {
    handlers: Arc<RwLock<BTreeMap<EndpointId, Arc<MessageHandler>>>>,
}

impl Network {
    fn attach(&self, endpoint: &EndpointId, handler: Arc<MessageHandler>) {
        self.handlers
            .write()
            .expect("network lock")
            .insert(endpoint.clone(), handler);
    }

    fn sender(&self) -> Arc<dyn SendMessages> {
        let handlers = self.handlers.clone();
        Arc::new(
            move |to: &EndpointId, message: CommunicationMessage| -> Result<(), CommunicationError> {
                let handler = handlers
                    .read()
                    .expect("network lock")
                    .get(to)
                    .cloned()
                    .ok_or_else(|| CommunicationError::Transport(format!("{to} is unreachable")))?;
                handler.process_message(&message);
                Ok(())
            },
        )
    }
}

type Log = Arc<Mutex<Vec<(LogSeverity, String)>>>;

fn logger() -> (Logger, Log) {
    let log: Log = Arc::default();
    let sink = log.clone();
    let logger: Logger = Arc::new(move |severity, text: &str| {
        sink.lock().expect("log lock").push((severity, text.to_string()))
    });
    (logger, log)
}

fn id(name: &str) -> EndpointId {
    EndpointId::new(name).expect("endpoint id")
}

struct Server {
    id: EndpointId,
    known: Arc<KnownEndpoints>,
    notifications: Arc<LocalNotificationCollection>,
    uploads: Arc<WaitingUploads>,
    log: Log,
}

fn server(network: &Network) -> Server {
    let server_id = id("server");
    let (logger, log) = logger();
    let sender = network.sender();
    let replies = ReplySender::new(server_id.clone(), sender.clone(), logger.clone());
    let known = Arc::new(KnownEndpoints::new());

    let commands = Arc::new(CommandCollection::new());
    commands
        .register(Arc::new(LocalCommandSet::new("calculator").with_method(
            "add",
            &["int", "int"],
            |args| {
                let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
                Ok(CommandResult::Value(json!(sum)))
            },
        )))
        .expect("register calculator");

    let broadcaster = Broadcaster::new(
        server_id.clone(),
        sender.clone(),
        known.as_ref().clone(),
        logger.clone(),
    );
    let notifications = Arc::new(LocalNotificationCollection::new(broadcaster));
    notifications
        .store(SerializedType::new("project", ["opened"]))
        .expect("store notifications");

    let uploads = Arc::new(WaitingUploads::new());
    let uploader = |path: &Path,
                    transfer: &StreamTransferInformation,
                    cancel: &CancellationToken|
     -> Result<(), CommunicationError> {
        if cancel.is_canceled() {
            return Err(CommunicationError::UploadCanceled);
        }
        fs::copy(path, &transfer.address)
            .map(|_| ())
            .map_err(|e| CommunicationError::UploadFailed(e.to_string()))
    };

    let handler = Arc::new(MessageHandler::new(logger));
    handler.register_processor(Arc::new(CommandInvokedProcessAction::new(
        commands.clone(),
        replies.clone(),
    )));
    handler.register_processor(Arc::new(CommandInformationRequestProcessAction::new(
        commands,
        replies.clone(),
    )));
    handler.register_processor(Arc::new(NotificationInformationRequestProcessAction::new(
        notifications.clone(),
        replies.clone(),
    )));
    handler.register_processor(Arc::new(EndpointConnectProcessAction::from_config(
        &CommunicationConfig::default(),
        known.clone(),
        replies.clone(),
    )));
    handler.register_processor(Arc::new(EndpointDisconnectProcessAction::new(known.clone())));
    handler.register_processor(Arc::new(RegisterForNotificationProcessAction::new(
        notifications.clone(),
        replies.clone(),
    )));
    handler.register_processor(Arc::new(DataDownloadProcessAction::new(
        uploads.clone(),
        Arc::new(uploader),
        replies.clone(),
    )));
    handler.register_processor(Arc::new(UnknownMessageTypeProcessAction::new(replies)));
    network.attach(&server_id, handler);

    Server {
        id: server_id,
        known,
        notifications,
        uploads,
        log,
    }
}

struct Client {
    id: EndpointId,
    handler: Arc<MessageHandler>,
    sender: Arc<dyn SendMessages>,
    raised: Arc<Mutex<Vec<(EventRegistration, serde_json::Value)>>>,
}

impl Client {
    /// Sends `body` to `to` and waits for the correlated reply.
    fn request(&self, to: &EndpointId, body: MessageBody) -> CommunicationMessage {
        let message = CommunicationMessage::new(self.id.clone(), body);
        let response = self
            .handler
            .forward_response(to, message.id())
            .expect("forward response");
        self.sender.send(to, message).expect("send");
        response.wait_timeout(WAIT).expect("response")
    }
}

fn client(network: &Network) -> Client {
    let client_id = id("client");
    let (logger, _) = logger();
    let handler = Arc::new(MessageHandler::new(logger));
    let raised = Arc::new(Mutex::new(Vec::new()));
    let sink = raised.clone();
    handler.register_processor(Arc::new(NotificationRaisedProcessAction::new(Arc::new(
        move |_: &EndpointId, registration: &EventRegistration, arguments: &serde_json::Value| {
            sink.lock()
                .expect("raised lock")
                .push((registration.clone(), arguments.clone()));
        },
    ))));
    network.attach(&client_id, handler.clone());

    Client {
        id: client_id,
        handler,
        sender: network.sender(),
        raised,
    }
}

fn invoke(member: &str, values: &[i64]) -> MessageBody {
    MessageBody::CommandInvoked {
        invocation: MethodInvocation::new(
            "calculator",
            member,
            values
                .iter()
                .map(|v| InvocationParameter::new("int", json!(v)))
                .collect(),
        ),
    }
}

#[test]
fn command_invocation_returns_value() {
    let network = Network::default();
    let server = server(&network);
    let client = client(&network);

    let reply = client.request(&server.id, invoke("add", &[2, 3]));
    assert_eq!(reply.body(), &MessageBody::CommandInvokedResponse { result: json!(5) });
    assert_eq!(reply.origin(), &server.id);
    assert!(server.log.lock().expect("log").iter().any(|(severity, text)| {
        *severity == LogSeverity::Trace
            && text == "Received request to execute command: calculator.add"
    }));
}

#[test]
fn unknown_member_returns_failure_without_detail() {
    let network = Network::default();
    let server = server(&network);
    let client = client(&network);

    let reply = client.request(&server.id, invoke("multiply", &[2, 3]));
    assert_eq!(reply.body(), &MessageBody::Failure);
    assert!(
        server
            .log
            .lock()
            .expect("log")
            .iter()
            .any(|(severity, _)| *severity == LogSeverity::Error)
    );
}

#[test]
fn command_information_lists_calculator() {
    let network = Network::default();
    let server = server(&network);
    let client = client(&network);

    let reply = client.request(&server.id, MessageBody::CommandInformationRequest);
    match reply.body() {
        MessageBody::EndpointProxyTypesResponse { proxy_types } => {
            assert_eq!(proxy_types[0].name, "calculator");
            assert_eq!(proxy_types[0].members, vec!["add(int, int)"]);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[test]
fn unhandled_message_is_answered_with_unknown_type() {
    let network = Network::default();
    let server = server(&network);
    let client = client(&network);

    let reply = client.request(&server.id, MessageBody::NotificationInformationRequest);
    assert_eq!(reply.body(), &MessageBody::UnknownMessageType);
}

#[test]
fn connected_client_receives_raised_notifications() {
    let network = Network::default();
    let server = server(&network);
    let client = client(&network);

    client
        .sender
        .send(
            &server.id,
            CommunicationMessage::new(
                client.id.clone(),
                MessageBody::EndpointConnect {
                    channel_type: "named_pipe".to_string(),
                    address: "net.pipe://localhost/apollo/pipe_7".to_string(),
                },
            ),
        )
        .expect("connect");
    assert!(server.known.contains(&client.id));

    let opened = EventRegistration::new("project", "opened");
    let reply = client.request(
        &server.id,
        MessageBody::RegisterForNotification {
            registration: opened.clone(),
        },
    );
    assert_eq!(reply.body(), &MessageBody::Success);

    let delivered = server
        .notifications
        .raise(&opened, json!({"name": "apollo"}))
        .expect("raise");
    assert_eq!(delivered, 1);
    assert_eq!(
        *client.raised.lock().expect("raised"),
        vec![(opened, json!({"name": "apollo"}))]
    );
}

#[test]
fn data_download_copies_registered_file_once() {
    let network = Network::default();
    let server = server(&network);
    let client = client(&network);
    let tmp = tempdir().expect("tempdir");
    let source = tmp.path().join("source.bin");
    let target = tmp.path().join("target.bin");
    fs::write(&source, b"payload").expect("write source");

    let token = server.uploads.register(&source);
    let request = MessageBody::DataDownloadRequest {
        token,
        transfer: StreamTransferInformation {
            channel_type: "named_pipe".to_string(),
            address: target.display().to_string(),
            start_position: 0,
        },
    };

    let reply = client.request(&server.id, request.clone());
    assert_eq!(reply.body(), &MessageBody::Success);
    assert_eq!(fs::read(&target).expect("read target"), b"payload");

    let again = client.request(&server.id, request);
    assert_eq!(again.body(), &MessageBody::Failure);
}

#[test]
fn disconnect_cancels_outstanding_requests() {
    let network = Network::default();
    let server = server(&network);
    let client = client(&network);

    let message = CommunicationMessage::new(client.id.clone(), MessageBody::CommandInformationRequest);
    let pending = client
        .handler
        .forward_response(&server.id, message.id())
        .expect("forward response");

    client.handler.process_message(&CommunicationMessage::new(
        server.id.clone(),
        MessageBody::EndpointDisconnect {
            closing_channel_type: Some("named_pipe".to_string()),
        },
    ));
    assert_eq!(pending.wait(), Err(CommunicationError::ResponseCanceled));
}

struct Observer {
    id: EndpointId,
    handler: Arc<MessageHandler>,
    commands: Arc<RemoteCommandHub>,
    notifications: Arc<RemoteNotificationHub>,
    changes: Arc<Mutex<Vec<RemoteAvailability>>>,
}

/// An endpoint that learns what the endpoints connecting to it offer.
fn observer(network: &Network) -> Observer {
    let observer_id = id("observer");
    let (logger, _) = logger();
    let sender = network.sender();
    let replies = ReplySender::new(observer_id.clone(), sender.clone(), logger.clone());
    let handler = Arc::new(MessageHandler::new(logger.clone()));

    let commands = Arc::new(RemoteCommandHub::new(
        observer_id.clone(),
        &handler,
        sender.clone(),
        logger.clone(),
    ));
    let notifications = Arc::new(RemoteNotificationHub::new(
        observer_id.clone(),
        &handler,
        sender,
        logger,
    ));
    let changes = Arc::new(Mutex::new(Vec::new()));
    let seen = changes.clone();
    commands.on_availability_change(move |change| {
        seen.lock().expect("changes lock").push(change.clone())
    });

    let sinks: Vec<Arc<dyn ConnectionSink>> = vec![
        Arc::new(KnownEndpoints::new()),
        commands.clone(),
        notifications.clone(),
    ];
    let lifecycle: Arc<dyn ConnectionSink> = Arc::new(sinks);
    handler.register_processor(Arc::new(EndpointConnectProcessAction::from_config(
        &CommunicationConfig::default(),
        lifecycle.clone(),
        replies,
    )));
    handler.register_processor(Arc::new(EndpointDisconnectProcessAction::new(lifecycle)));
    handler.register_processor(Arc::new(NewCommandRegisteredProcessAction::new(
        commands.clone(),
    )));
    handler.register_processor(Arc::new(NewNotificationRegisteredProcessAction::new(
        notifications.clone(),
    )));
    network.attach(&observer_id, handler.clone());

    Observer {
        id: observer_id,
        handler,
        commands,
        notifications,
        changes,
    }
}

#[test]
fn connecting_endpoint_is_asked_for_its_commands_and_notifications() {
    let network = Network::default();
    let server = server(&network);
    let observer = observer(&network);
    let send = network.sender();

    send.send(
        &observer.id,
        CommunicationMessage::new(
            server.id.clone(),
            MessageBody::EndpointConnect {
                channel_type: "tcp".to_string(),
                address: "127.0.0.1:9000".to_string(),
            },
        ),
    )
    .expect("connect");

    assert_eq!(observer.handler.pending_responses(), 0);
    assert!(!observer.commands.is_waiting_for(&server.id));
    assert!(observer.commands.has_command_set(&server.id, "calculator"));
    assert!(!observer.commands.has_command_set(&server.id, "scheduler"));
    assert_eq!(
        observer.commands.command_sets(&server.id)[0].members,
        vec!["add(int, int)".to_string()]
    );
    assert!(observer.notifications.has_notification_set(&server.id, "project"));
    assert_eq!(
        *observer.changes.lock().expect("changes"),
        vec![RemoteAvailability::SignedIn {
            endpoint: server.id.clone(),
            sets: vec!["calculator".to_string()],
        }]
    );

    send.send(
        &observer.id,
        CommunicationMessage::new(
            server.id.clone(),
            MessageBody::NewCommandRegistered {
                command: SerializedType::new("scheduler", ["start(string)"]),
            },
        ),
    )
    .expect("announce");
    assert!(observer.commands.has_command_set(&server.id, "scheduler"));

    send.send(
        &observer.id,
        CommunicationMessage::new(
            server.id.clone(),
            MessageBody::EndpointDisconnect {
                closing_channel_type: Some("tcp".to_string()),
            },
        ),
    )
    .expect("disconnect");
    assert!(observer.commands.endpoints().is_empty());
    assert!(observer.notifications.endpoints().is_empty());
    assert!(!observer.commands.has_command_set(&server.id, "calculator"));
    assert_eq!(
        observer.changes.lock().expect("changes").last(),
        Some(&RemoteAvailability::SignedOff {
            endpoint: server.id.clone(),
        })
    );
}
