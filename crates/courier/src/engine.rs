//! The per-connection protocol engine.
//!
//! One [`ProtocolEngine`] exists per connection. It owns that
//! connection's login state and local subscriptions and turns each
//! inbound [`Frame`] into a list of [`Action`]s for the connection driver
//! to carry out against the broker.
//!
//! The engine never touches a socket or the broker directly. The only
//! side effects it performs itself are calls into the [`SessionStore`].
//!
//! # State machine
//!
//! ```text
//!                 CONNECT ok
//!  NotLoggedIn ──────────────→ LoggedIn { user, subscriptions }
//!   │   ↑                          │
//!   │   └─ other command:          │ DISCONNECT, or any protocol error
//!   │      ERROR, stays here       ↓
//!   └── CONNECT refused ───────→ Terminating
//! ```
//!
//! A rejected command before login is deliberately not fatal: the client
//! gets an ERROR and may still CONNECT.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use courier_protocol::{Command, Frame};
use courier_session::{LoginStatus, SessionStore};
use courier_transport::ConnectionId;

/// Protocol version announced in CONNECTED frames.
pub const PROTOCOL_VERSION: &str = "1.2";

/// Login state of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for a successful CONNECT.
    NotLoggedIn,
    /// Logged in as `user`.
    LoggedIn {
        user: String,
        /// subscription id → destination
        subscriptions: HashMap<String, String>,
    },
    /// Done. No further frames are processed.
    Terminating,
}

/// Something the connection driver must do after a frame was processed.
///
/// Actions are listed in the order they must be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a frame back to this connection.
    Reply(Frame),
    /// Fan `frame` out to every subscriber of `topic`.
    Publish { topic: String, frame: Frame },
    /// Register (or re-point) this connection's subscription to `topic`.
    Subscribe { topic: String, sub_id: String },
    /// Stop delivering `topic` to this connection.
    Unsubscribe { topic: String },
    /// Close the connection once pending replies are flushed.
    Disconnect,
}

/// Result of one state transition.
struct Transition {
    next: EngineState,
    actions: Vec<Action>,
}

impl Transition {
    fn to(next: EngineState, actions: Vec<Action>) -> Self {
        Self { next, actions }
    }
}

/// Interprets frames for one connection.
pub struct ProtocolEngine<S: SessionStore> {
    conn_id: ConnectionId,
    store: Arc<S>,
    state: EngineState,
}

impl<S: SessionStore> ProtocolEngine<S> {
    pub fn new(conn_id: ConnectionId, store: Arc<S>) -> Self {
        Self {
            conn_id,
            store,
            state: EngineState::NotLoggedIn,
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// The logged-in username, if any.
    pub fn user(&self) -> Option<&str> {
        match &self.state {
            EngineState::LoggedIn { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn is_terminating(&self) -> bool {
        self.state == EngineState::Terminating
    }

    /// Processes one inbound frame.
    ///
    /// Frames arriving after the engine reached [`EngineState::Terminating`]
    /// are ignored.
    pub fn process(&mut self, frame: Frame) -> Vec<Action> {
        let state = mem::replace(&mut self.state, EngineState::Terminating);
        let transition = match state {
            EngineState::Terminating => {
                tracing::trace!(
                    conn = %self.conn_id,
                    command = %frame.command(),
                    "frame after termination ignored"
                );
                Transition::to(EngineState::Terminating, Vec::new())
            }
            EngineState::NotLoggedIn => self.not_logged_in(&frame),
            EngineState::LoggedIn {
                user,
                subscriptions,
            } => self.logged_in(user, subscriptions, &frame),
        };
        self.state = transition.next;
        transition.actions
    }

    /// Ends the engine's life after transport loss.
    ///
    /// Logs the user out if the connection was still logged in. Calling it
    /// again is a no-op.
    pub fn shutdown(&mut self) {
        let state = mem::replace(&mut self.state, EngineState::Terminating);
        if let EngineState::LoggedIn { user, .. } = state {
            tracing::debug!(conn = %self.conn_id, %user, "engine shutdown");
            self.store.logout(self.conn_id);
        }
    }

    // ---------------------------------------------------------------------
    // Per-state dispatch
    // ---------------------------------------------------------------------

    fn not_logged_in(&self, frame: &Frame) -> Transition {
        if *frame.command() == Command::Connect {
            return self.connect(frame);
        }
        tracing::debug!(
            conn = %self.conn_id,
            command = %frame.command(),
            "rejected before login"
        );
        Transition::to(
            EngineState::NotLoggedIn,
            vec![Action::Reply(error_frame(
                frame,
                "User not logged in",
                "You must log in before sending other commands.",
            ))],
        )
    }

    fn logged_in(
        &self,
        user: String,
        mut subscriptions: HashMap<String, String>,
        frame: &Frame,
    ) -> Transition {
        match frame.command() {
            Command::Connect => self.fail(
                true,
                frame,
                "Already logged in",
                &format!("This connection is already logged in as '{user}'."),
            ),
            Command::Send => self.send(user, subscriptions, frame),
            Command::Subscribe => {
                let Some(topic) = frame.non_empty_header("destination") else {
                    return self.fail(
                        true,
                        frame,
                        "Missing destination",
                        "SUBSCRIBE requires a non-empty 'destination' header.",
                    );
                };
                let Some(sub_id) = frame.non_empty_header("id") else {
                    return self.fail(
                        true,
                        frame,
                        "Missing subscription id",
                        "SUBSCRIBE requires a non-empty 'id' header.",
                    );
                };
                if let Some(existing) = subscriptions.get(sub_id) {
                    return self.fail(
                        true,
                        frame,
                        "Duplicate subscription id",
                        &format!(
                            "Subscription id '{sub_id}' is already in use \
                             for '{existing}'."
                        ),
                    );
                }

                subscriptions.insert(sub_id.to_string(), topic.to_string());
                let mut actions = vec![Action::Subscribe {
                    topic: topic.to_string(),
                    sub_id: sub_id.to_string(),
                }];
                actions.extend(receipt_for(frame));
                Transition::to(
                    EngineState::LoggedIn {
                        user,
                        subscriptions,
                    },
                    actions,
                )
            }
            Command::Unsubscribe => {
                let Some(sub_id) = frame.non_empty_header("id") else {
                    return self.fail(
                        true,
                        frame,
                        "Missing subscription id",
                        "UNSUBSCRIBE requires a non-empty 'id' header.",
                    );
                };
                let Some(topic) = subscriptions.remove(sub_id) else {
                    return self.fail(
                        true,
                        frame,
                        "Unknown subscription id",
                        &format!("No subscription with id '{sub_id}' exists."),
                    );
                };

                // Another local id on the same topic keeps it alive; point
                // the registry at that one instead.
                let remaining = subscriptions
                    .iter()
                    .find(|(_, t)| **t == topic)
                    .map(|(id, _)| id.clone());
                let mut actions = vec![match remaining {
                    Some(sub_id) => Action::Subscribe { topic, sub_id },
                    None => Action::Unsubscribe { topic },
                }];
                actions.extend(receipt_for(frame));
                Transition::to(
                    EngineState::LoggedIn {
                        user,
                        subscriptions,
                    },
                    actions,
                )
            }
            Command::Disconnect => {
                let mut actions: Vec<Action> =
                    receipt_for(frame).into_iter().collect();
                self.store.logout(self.conn_id);
                tracing::info!(
                    conn = %self.conn_id,
                    %user,
                    "client disconnected"
                );
                actions.push(Action::Disconnect);
                Transition::to(EngineState::Terminating, actions)
            }
            other if other.is_server_only() => self.fail(
                true,
                frame,
                "Unknown command",
                &format!("The command '{other}' is only sent by the server."),
            ),
            other => self.fail(
                true,
                frame,
                "Unknown command",
                &format!("The command '{other}' is not recognized."),
            ),
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    fn connect(&self, frame: &Frame) -> Transition {
        let mut credentials = Vec::with_capacity(3);
        for name in ["login", "passcode", "host"] {
            match frame.header(name) {
                Some(value) => credentials.push(value),
                None => {
                    return self.fail(
                        false,
                        frame,
                        "Missing credentials",
                        &format!("CONNECT requires the '{name}' header."),
                    );
                }
            }
        }
        let (login, passcode) = (credentials[0], credentials[1]);

        let status = self.store.login(self.conn_id, login, passcode);
        let refusal = match status {
            LoginStatus::Success | LoginStatus::Relogged => {
                tracing::debug!(
                    conn = %self.conn_id,
                    user = login,
                    %status,
                    "connected"
                );
                return Transition::to(
                    EngineState::LoggedIn {
                        user: login.to_string(),
                        subscriptions: HashMap::new(),
                    },
                    vec![Action::Reply(
                        Frame::new(Command::Connected)
                            .with_header("version", PROTOCOL_VERSION),
                    )],
                );
            }
            LoginStatus::AlreadyConnectedElsewhere => "Client already connected",
            LoginStatus::AlreadyLoggedIn => "User already logged in",
            LoginStatus::WrongPassword => "Wrong password",
        };
        self.fail(
            false,
            frame,
            refusal,
            &format!("Login as '{login}' was refused: {status}."),
        )
    }

    fn send(
        &self,
        user: String,
        subscriptions: HashMap<String, String>,
        frame: &Frame,
    ) -> Transition {
        let Some(topic) = frame.non_empty_header("destination") else {
            return self.fail(
                true,
                frame,
                "Missing destination",
                "SEND requires a non-empty 'destination' header.",
            );
        };
        if !subscriptions.values().any(|t| t == topic) {
            return self.fail(
                true,
                frame,
                "Not subscribed",
                &format!(
                    "You must be subscribed to '{topic}' to send to it."
                ),
            );
        }

        if let Some(filename) = frame.non_empty_header("file-name") {
            self.store.track_upload(&user, filename, topic);
        }

        let message = Frame::new(Command::Message)
            .with_header("destination", topic)
            .with_body(frame.body());
        let mut actions = vec![Action::Publish {
            topic: topic.to_string(),
            frame: message,
        }];
        actions.extend(receipt_for(frame));
        Transition::to(
            EngineState::LoggedIn {
                user,
                subscriptions,
            },
            actions,
        )
    }

    /// Shared failure path: ERROR reply, logout if needed, terminate.
    fn fail(
        &self,
        logged_in: bool,
        frame: &Frame,
        message: &str,
        detail: &str,
    ) -> Transition {
        tracing::debug!(
            conn = %self.conn_id,
            command = %frame.command(),
            reason = message,
            "protocol error"
        );
        if logged_in {
            self.store.logout(self.conn_id);
        }
        Transition::to(
            EngineState::Terminating,
            vec![
                Action::Reply(error_frame(frame, message, detail)),
                Action::Disconnect,
            ],
        )
    }
}

/// Builds an ERROR frame describing why `offending` was rejected.
pub fn error_frame(offending: &Frame, message: &str, detail: &str) -> Frame {
    let mut error = Frame::new(Command::Error).with_header("message", message);
    if let Some(receipt) = offending.header("receipt") {
        error.set_header("receipt-id", receipt);
    }
    error.with_body(format!(
        "The message:\n-----\n{}\n-----\n{detail}",
        offending.to_wire_string()
    ))
}

fn receipt_for(frame: &Frame) -> Option<Action> {
    frame.header("receipt").map(|receipt| {
        Action::Reply(
            Frame::new(Command::Receipt).with_header("receipt-id", receipt),
        )
    })
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use courier_session::InMemorySessionStore;

    type Engine = ProtocolEngine<InMemorySessionStore>;

    fn engine(id: u64, store: &Arc<InMemorySessionStore>) -> Engine {
        ProtocolEngine::new(ConnectionId::new(id), Arc::clone(store))
    }

    fn connect_frame(user: &str, pass: &str) -> Frame {
        Frame::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", "stomp.example")
            .with_header("login", user)
            .with_header("passcode", pass)
    }

    fn subscribe_frame(topic: &str, id: &str) -> Frame {
        Frame::new(Command::Subscribe)
            .with_header("destination", topic)
            .with_header("id", id)
    }

    fn unsubscribe_frame(id: &str) -> Frame {
        Frame::new(Command::Unsubscribe).with_header("id", id)
    }

    fn logged_in(id: u64, store: &Arc<InMemorySessionStore>) -> Engine {
        let mut engine = engine(id, store);
        engine.process(connect_frame(&format!("user{id}"), "pw"));
        assert!(engine.user().is_some());
        engine
    }

    fn single_reply(actions: &[Action]) -> &Frame {
        match actions {
            [Action::Reply(frame)] => frame,
            other => panic!("expected one reply, got {other:?}"),
        }
    }

    /// Asserts the ERROR-then-Disconnect shape and returns the ERROR.
    fn fatal_error(actions: &[Action]) -> &Frame {
        match actions {
            [Action::Reply(frame), Action::Disconnect] => {
                assert_eq!(frame.command(), &Command::Error);
                frame
            }
            other => panic!("expected ERROR + Disconnect, got {other:?}"),
        }
    }

    // =====================================================================
    // Login gating
    // =====================================================================

    #[test]
    fn test_process_non_connect_before_login_replies_error_and_stays_open() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = engine(1, &store);

        for frame in [
            subscribe_frame("/a", "1"),
            Frame::new(Command::Send).with_header("destination", "/a"),
            Frame::new(Command::Unsubscribe).with_header("id", "1"),
            Frame::new(Command::Disconnect),
            Frame::new(Command::Unknown("BEGIN".into())),
        ] {
            let actions = engine.process(frame);
            let reply = single_reply(&actions);
            assert_eq!(reply.command(), &Command::Error);
            assert!(reply.header("message").unwrap().contains("not logged in"));
            assert_eq!(engine.state(), &EngineState::NotLoggedIn);
        }

        let actions = engine.process(connect_frame("alice", "123"));
        assert_eq!(single_reply(&actions).command(), &Command::Connected);
    }

    // =====================================================================
    // CONNECT
    // =====================================================================

    #[test]
    fn test_connect_success_replies_connected_with_version() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = engine(1, &store);

        let actions = engine.process(connect_frame("alice", "123"));

        let reply = single_reply(&actions);
        assert_eq!(reply.command(), &Command::Connected);
        assert_eq!(reply.header("version"), Some("1.2"));
        assert_eq!(engine.user(), Some("alice"));
        assert!(store.is_logged_in("alice"));
    }

    #[test]
    fn test_connect_missing_host_is_fatal() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = engine(1, &store);
        let frame = Frame::new(Command::Connect)
            .with_header("login", "alice")
            .with_header("passcode", "123");

        let actions = engine.process(frame);

        let error = fatal_error(&actions);
        assert_eq!(error.header("message"), Some("Missing credentials"));
        assert!(error.body().contains("'host'"));
        assert!(engine.is_terminating());
        assert!(!store.is_logged_in("alice"));
    }

    #[test]
    fn test_connect_wrong_password_is_fatal() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut first = engine(1, &store);
        first.process(connect_frame("alice", "123"));
        first.process(Frame::new(Command::Disconnect));

        let mut second = engine(2, &store);
        let actions = second.process(connect_frame("alice", "bad"));

        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("Wrong password")
        );
        assert!(second.is_terminating());
    }

    #[test]
    fn test_connect_user_active_elsewhere_is_fatal() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut first = engine(1, &store);
        first.process(connect_frame("alice", "123"));

        let mut second = engine(2, &store);
        let actions = second.process(connect_frame("alice", "123"));

        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("User already logged in")
        );
        // The first session is untouched.
        let owner = store.user_on(ConnectionId::new(1));
        assert_eq!(owner.as_deref(), Some("alice"));
    }

    #[test]
    fn test_connect_twice_logs_out_and_terminates() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = engine(1, &store);
        engine.process(connect_frame("alice", "123"));

        let actions = engine.process(connect_frame("alice", "123"));

        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("Already logged in")
        );
        assert!(!store.is_logged_in("alice"));
    }

    // =====================================================================
    // SUBSCRIBE / UNSUBSCRIBE
    // =====================================================================

    #[test]
    fn test_subscribe_registers_and_honors_receipt() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);

        let actions = engine.process(
            subscribe_frame("/topic/news", "1").with_header("receipt", "r1"),
        );

        assert_eq!(
            actions,
            vec![
                Action::Subscribe {
                    topic: "/topic/news".into(),
                    sub_id: "1".into()
                },
                Action::Reply(
                    Frame::new(Command::Receipt).with_header("receipt-id", "r1")
                ),
            ]
        );
    }

    #[test]
    fn test_subscribe_duplicate_id_is_fatal() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);
        engine.process(subscribe_frame("/a", "1"));

        let actions = engine.process(subscribe_frame("/b", "1"));

        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("Duplicate subscription id")
        );
        assert!(!store.is_logged_in("user1"));
    }

    #[test]
    fn test_subscribe_missing_id_is_fatal() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);

        let frame =
            Frame::new(Command::Subscribe).with_header("destination", "/a");
        let actions = engine.process(frame);

        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("Missing subscription id")
        );
    }

    #[test]
    fn test_unsubscribe_then_reuse_id() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);
        engine.process(subscribe_frame("/a", "1"));

        let actions = engine.process(unsubscribe_frame("1"));
        assert_eq!(actions, vec![Action::Unsubscribe { topic: "/a".into() }]);

        let actions = engine.process(subscribe_frame("/b", "1"));
        assert!(matches!(actions[0], Action::Subscribe { .. }));
        assert!(!engine.is_terminating());
    }

    #[test]
    fn test_unsubscribe_missing_and_unknown_ids_differ() {
        let store = Arc::new(InMemorySessionStore::new());

        let mut missing = logged_in(1, &store);
        let actions = missing.process(Frame::new(Command::Unsubscribe));
        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("Missing subscription id")
        );

        let mut unknown = logged_in(2, &store);
        let actions = unknown.process(unsubscribe_frame("9"));
        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("Unknown subscription id")
        );
    }

    #[test]
    fn test_unsubscribe_keeps_topic_while_another_id_remains() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);
        engine.process(subscribe_frame("/a", "1"));
        engine.process(subscribe_frame("/a", "2"));

        let actions = engine.process(unsubscribe_frame("2"));

        assert_eq!(
            actions,
            vec![Action::Subscribe {
                topic: "/a".into(),
                sub_id: "1".into()
            }]
        );
    }

    // =====================================================================
    // SEND
    // =====================================================================

    #[test]
    fn test_send_subscribed_publishes_message_then_receipt() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);
        engine.process(subscribe_frame("/topic/news", "1"));

        let actions = engine.process(
            Frame::new(Command::Send)
                .with_header("destination", "/topic/news")
                .with_header("receipt", "7")
                .with_body("goal!\nsecond line"),
        );

        assert_eq!(actions.len(), 2);
        match &actions[0] {
            Action::Publish { topic, frame } => {
                assert_eq!(topic, "/topic/news");
                assert_eq!(frame.command(), &Command::Message);
                assert_eq!(frame.header("destination"), Some("/topic/news"));
                assert_eq!(frame.body(), "goal!\nsecond line");
                assert!(frame.header("receipt").is_none());
            }
            other => panic!("expected Publish, got {other:?}"),
        }
        assert_eq!(
            actions[1],
            Action::Reply(
                Frame::new(Command::Receipt).with_header("receipt-id", "7")
            )
        );
    }

    #[test]
    fn test_send_unsubscribed_topic_is_fatal() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);
        engine.process(subscribe_frame("/topic/news", "1"));

        let actions = engine.process(
            Frame::new(Command::Send).with_header("destination", "/topic/other"),
        );

        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("Not subscribed")
        );
        assert!(engine.is_terminating());
    }

    #[test]
    fn test_send_empty_destination_is_fatal() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);

        let actions = engine
            .process(Frame::new(Command::Send).with_header("destination", ""));

        assert_eq!(
            fatal_error(&actions).header("message"),
            Some("Missing destination")
        );
    }

    #[test]
    fn test_send_with_file_name_tracks_upload() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);
        engine.process(subscribe_frame("/topic/a", "1"));

        engine.process(
            Frame::new(Command::Send)
                .with_header("destination", "/topic/a")
                .with_header("file-name", "events1.json"),
        );

        let report = store.report();
        assert_eq!(report.users[0].uploads.len(), 1);
        assert_eq!(report.users[0].uploads[0].filename, "events1.json");
    }

    // =====================================================================
    // DISCONNECT / shutdown / errors
    // =====================================================================

    #[test]
    fn test_disconnect_sends_receipt_then_logs_out() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);

        let actions = engine
            .process(Frame::new(Command::Disconnect).with_header("receipt", "77"));

        assert_eq!(
            actions,
            vec![
                Action::Reply(
                    Frame::new(Command::Receipt).with_header("receipt-id", "77")
                ),
                Action::Disconnect,
            ]
        );
        assert!(engine.is_terminating());
        assert!(!store.is_logged_in("user1"));
    }

    #[test]
    fn test_process_after_terminating_is_ignored() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);
        engine.process(Frame::new(Command::Disconnect));

        assert!(engine.process(subscribe_frame("/a", "1")).is_empty());
    }

    #[test]
    fn test_shutdown_logs_out_logged_in_user() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut engine = logged_in(1, &store);

        engine.shutdown();
        engine.shutdown();

        assert!(engine.is_terminating());
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_unknown_and_server_only_commands_are_fatal() {
        let store = Arc::new(InMemorySessionStore::new());

        for (id, command) in [
            (1, Command::Unknown("ABORT".into())),
            (2, Command::Message),
            (3, Command::Error),
        ] {
            let mut engine = logged_in(id, &store);
            let name = command.as_str().to_string();
            let actions = engine.process(Frame::new(command));
            let error = fatal_error(&actions);
            assert_eq!(error.header("message"), Some("Unknown command"));
            assert!(error.body().contains(&format!("'{name}'")));
        }
    }

    #[test]
    fn test_error_frame_quotes_offending_frame_and_echoes_receipt() {
        let offending = Frame::new(Command::Send)
            .with_header("destination", "/x")
            .with_header("receipt", "42")
            .with_body("payload");

        let error = error_frame(&offending, "Not subscribed", "details here");

        assert_eq!(error.header("message"), Some("Not subscribed"));
        assert_eq!(error.header("receipt-id"), Some("42"));
        assert_eq!(
            error.body(),
            "The message:\n-----\nSEND\ndestination:/x\nreceipt:42\n\npayload\
             \n-----\ndetails here"
        );
    }
}
