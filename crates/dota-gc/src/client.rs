//! The GC client: single owner of the session, registry and caches.
//!
//! Every state change goes through `&mut GcClient`, whether it comes from a
//! timer deadline, an inbound message or a caller. The event loop in
//! [`crate::driver`] is the usual owner; tests drive it directly.

use std::sync::Arc;

use dota_gc_config::{ConfigError, GcConfig};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::cache::SessionCaches;
use crate::codec::{Codec, DecodeError, display_name};
use crate::correlator::{GcSender, PendingCallback, ReplyReceiver};
use crate::error::RequestError;
use crate::ids::to_account_id;
use crate::messages::{
    ConnectionStatus, K_EMSG_GC_CLIENT_CONNECTION_STATUS, K_EMSG_GC_CLIENT_HELLO,
    K_EMSG_GC_CLIENT_WELCOME,
};
use crate::notification::{Notification, NotificationSink, Notifications};
use crate::routing::{HandlerContext, HandlerRegistry, RouteOutcome, invoke_guarded};
use crate::session::{
    HelloTick, RetryPolicy, Session, SessionState, SessionStateWatch, StatusChange,
};
use crate::transport::{InboundMessage, Transport};

/// Client for one app's Game Coordinator.
pub struct GcClient {
    session: Session,
    registry: HandlerRegistry,
    codec: Arc<dyn Codec>,
    sender: GcSender,
    caches: SessionCaches,
    notifications: NotificationSink,
    state_watch: SessionStateWatch,
}

impl GcClient {
    /// Build a client from a finished registry.
    ///
    /// Returns the receiving end of the notification stream alongside it.
    /// Settings that would stall the retry loops are rejected.
    pub fn new(
        config: &GcConfig,
        transport: Arc<dyn Transport>,
        codec: Arc<dyn Codec>,
        registry: HandlerRegistry,
    ) -> Result<(Self, Notifications), ConfigError> {
        config.validate()?;
        let (notifications, rx) = NotificationSink::channel();
        let mut types: Vec<u32> = registry.registered_types().collect();
        types.sort_unstable();
        tracing::debug!(app_id = config.app_id, ?types, "GC client created");

        let client = Self {
            session: Session::new(RetryPolicy::from(config)),
            registry,
            codec,
            sender: GcSender::new(transport, config.app_id),
            caches: SessionCaches::default(),
            notifications,
            state_watch: SessionStateWatch::new(),
        };
        Ok((client, rx))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Report the app as running and start knocking on the GC's door.
    ///
    /// Clears all session caches. Calling it again restarts the hello loop
    /// rather than adding a second one.
    pub fn launch(&mut self) {
        self.launch_at(Instant::now());
    }

    /// [`GcClient::launch`] with an explicit clock reading.
    pub fn launch_at(&mut self, now: Instant) {
        let app_id = self.sender.app_id();
        tracing::debug!(app_id, "Launching");

        let account_id = self.sender.transport().steam_id().map(to_account_id);
        self.caches.reset(account_id);
        self.sender.transport().announce_presence(&[app_id]);
        self.session.launch(now);
        self.publish_state();
    }

    /// Stop the hello loop and report that no app is running.
    pub fn exit(&mut self) {
        tracing::debug!(app_id = self.sender.app_id(), "Exiting");
        self.session.exit();
        self.publish_state();

        if self.sender.transport().steam_id().is_some() {
            self.sender.transport().announce_presence(&[]);
        }
    }

    /// Earliest pending timer deadline, if a retry loop is running.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.timer().map(|timer| timer.deadline())
    }

    /// Handle a timer deadline. Sends at most one hello per call.
    pub fn on_timer(&mut self, now: Instant) {
        match self.session.hello_tick(now) {
            HelloTick::Idle => {}
            HelloTick::Cancelled => tracing::debug!("Ready, hello loop stopped"),
            HelloTick::Send { timed_out } => {
                if timed_out {
                    tracing::warn!("ClientHello unanswered for too long, reporting timeout");
                    self.notifications.emit(Notification::HelloTimeout);
                }
                tracing::debug!(attempt = self.session.hello_attempts(), "Sending ClientHello");
                self.sender
                    .send_raw(K_EMSG_GC_CLIENT_HELLO, self.codec.encode_hello(), None);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Accept a message from the transport. Messages for other apps are
    /// dropped.
    pub fn handle_inbound(&mut self, msg: InboundMessage) {
        if msg.app_id != self.sender.app_id() {
            tracing::trace!(app_id = msg.app_id, "Ignoring message for another app");
            return;
        }
        self.dispatch(msg.msg_type, &msg.payload);
    }

    /// Route one message. Never fails: problems become notifications.
    pub fn dispatch(&mut self, msg_type: u32, payload: &[u8]) {
        tracing::debug!(msg_type, name = %self.message_name(msg_type), "fromGC");

        match msg_type {
            K_EMSG_GC_CLIENT_WELCOME => self.on_welcome(payload),
            K_EMSG_GC_CLIENT_CONNECTION_STATUS => self.on_connection_status(payload),
            _ => {
                let mut ctx = HandlerContext::new(
                    msg_type,
                    &mut self.caches,
                    self.session.is_ready(),
                    &self.sender,
                );
                match self.registry.route(&mut ctx, payload) {
                    RouteOutcome::Handled => {}
                    RouteOutcome::Failed(error) => self.report_fault(msg_type, error),
                    RouteOutcome::Unhandled => {
                        let name = self.message_name(msg_type);
                        self.notifications
                            .emit(Notification::Unhandled { msg_type, name });
                    }
                }
            }
        }
    }

    fn on_welcome(&mut self, payload: &[u8]) {
        if self.session.state() == SessionState::Disconnected {
            tracing::debug!("Welcome after exit, ignoring");
            return;
        }
        let became_ready = self.session.welcome();
        tracing::debug!(became_ready, "Received client welcome");

        if let Some(hook) = self.registry.welcome_hook() {
            let mut ctx = HandlerContext::new(
                K_EMSG_GC_CLIENT_WELCOME,
                &mut self.caches,
                true,
                &self.sender,
            );
            if let Err(error) = invoke_guarded(hook, &mut ctx, payload) {
                self.report_fault(K_EMSG_GC_CLIENT_WELCOME, error);
            }
        }

        if became_ready {
            self.publish_state();
            self.notifications.emit(Notification::Ready);
        }
    }

    fn on_connection_status(&mut self, payload: &[u8]) {
        let status = match self.codec.decode_connection_status(payload) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Undecodable connection status: {e}");
                return;
            }
        };

        match self.session.connection_status_changed(status, Instant::now()) {
            StatusChange::Unchanged => {}
            StatusChange::Regained => {
                tracing::debug!("GC connection status regained");
                self.publish_state();
                self.notifications.emit(Notification::Ready);
            }
            StatusChange::Lost => {
                tracing::debug!(
                    status = status.name(),
                    code = status.as_i32(),
                    "GC connection status unreliable"
                );
                self.publish_state();
                self.notifications.emit(Notification::Unready);
            }
        }
    }

    fn report_fault(&self, msg_type: u32, error: String) {
        let name = self.message_name(msg_type);
        tracing::error!(msg_type, %name, "Handler failed: {error}");
        self.notifications.emit(Notification::HandlerFailed {
            msg_type,
            name,
            error,
        });
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Fire-and-forget send. Fails with [`RequestError::NotReady`] before the
    /// session is established.
    pub fn send_to_gc(&self, msg_type: u32, payload: Vec<u8>) -> Result<(), RequestError> {
        self.sender.send(self.is_ready(), msg_type, payload)
    }

    /// Send and deliver the transport-correlated reply to `pending`.
    ///
    /// When not ready the callback runs synchronously with
    /// [`RequestError::NotReady`] and nothing is sent.
    pub fn request<T: 'static>(
        &self,
        msg_type: u32,
        payload: Vec<u8>,
        pending: PendingCallback<T>,
    ) -> Result<(), RequestError> {
        self.sender
            .request(self.is_ready(), msg_type, payload, pending)
    }

    /// [`GcClient::request`] resolving through a [`ReplyReceiver`].
    pub fn request_async<T, D>(&self, msg_type: u32, payload: Vec<u8>, decode: D) -> ReplyReceiver<T>
    where
        T: Send + 'static,
        D: FnOnce(Vec<u8>) -> Result<T, DecodeError> + Send + 'static,
    {
        let (pending, rx) = ReplyReceiver::channel(decode);
        // A not-ready failure is already delivered through the receiver.
        let _ = self.request(msg_type, payload, pending);
        rx
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Whether the GC session is established.
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Last connection status reported by the GC.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.session.connection_status()
    }

    /// Hellos sent since launch or the last timeout report.
    pub fn hello_attempts(&self) -> u32 {
        self.session.hello_attempts()
    }

    /// Session caches filled in by the domain handlers.
    pub fn caches(&self) -> &SessionCaches {
        &self.caches
    }

    /// Account id of the logged-in user, known after launch.
    pub fn account_id(&self) -> Option<u32> {
        self.caches.account_id
    }

    /// Subscribe to session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_watch.subscribe()
    }

    /// Name of `msg_type` for diagnostics.
    pub fn message_name(&self, msg_type: u32) -> String {
        display_name(self.codec.as_ref(), msg_type)
    }

    fn publish_state(&self) {
        self.state_watch.set(self.session.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BaseCodec;
    use crate::error::HandlerError;
    use crate::messages::DOTA_APP_ID;
    use crate::test_support::*;
    use std::sync::Mutex;

    fn launched() -> (GcClient, Notifications, Arc<RecordingTransport>) {
        let transport = RecordingTransport::logged_in();
        let (mut client, rx) = client_with(&transport, HandlerRegistry::new());
        client.launch();
        (client, rx, transport)
    }

    fn ready() -> (GcClient, Notifications, Arc<RecordingTransport>) {
        let (mut client, mut rx, transport) = launched();
        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[]);
        drain(&mut rx);
        (client, rx, transport)
    }

    #[test]
    fn test_launch_announces_and_arms_timer() {
        let (client, mut rx, transport) = launched();

        assert_eq!(*transport.announcements.lock().unwrap(), vec![vec![DOTA_APP_ID]]);
        assert_eq!(client.state(), SessionState::Announcing);
        assert!(client.next_deadline().is_some());
        assert_eq!(client.account_id(), Some(123));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_hello_sent_on_tick_with_header() {
        let (mut client, _rx, transport) = launched();
        tick(&mut client);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type, K_EMSG_GC_CLIENT_HELLO);
        assert_eq!(sent[0].app_id, DOTA_APP_ID);
        assert_eq!(sent[0].header.client_steam_id, Some(STEAM_ID));
        assert!(sent[0].payload.is_empty());
    }

    #[test]
    fn test_hello_timeout_after_eleven_ticks() {
        let (mut client, mut rx, transport) = launched();

        for _ in 0..11 {
            tick(&mut client);
        }

        assert_eq!(drain(&mut rx), vec![Notification::HelloTimeout]);
        assert_eq!(client.hello_attempts(), 1);
        assert!(client.next_deadline().is_some(), "retry loop keeps running");
        assert_eq!(transport.sent_count(K_EMSG_GC_CLIENT_HELLO), 11);
    }

    #[test]
    fn test_welcome_emits_ready_once() {
        let (mut client, mut rx, _transport) = launched();
        tick(&mut client);
        tick(&mut client);

        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[]);
        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[]);

        assert_eq!(drain(&mut rx), vec![Notification::Ready]);
        assert!(client.is_ready());
        assert!(client.next_deadline().is_none());
    }

    #[test]
    fn test_ready_sends_reach_transport() {
        let (client, _rx, transport) = ready();
        client.send_to_gc(7004, vec![1, 2]).unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type, 7004);
        assert_eq!(sent[0].payload, vec![1, 2]);
        assert!(sent[0].on_reply.is_none());
    }

    #[test]
    fn test_not_ready_request_fails_synchronously() {
        let (client, _rx, transport) = launched();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);

        let result = client.request(
            7004,
            vec![],
            PendingCallback::raw(move |r| {
                *seen_clone.lock().unwrap() = Some(matches!(r, Err(RequestError::NotReady)));
            }),
        );

        assert!(matches!(result, Err(RequestError::NotReady)));
        assert_eq!(*seen.lock().unwrap(), Some(true));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_request_reply_decoded_once() {
        let (client, _rx, transport) = ready();
        let replies = Arc::new(Mutex::new(Vec::new()));
        let replies_clone = Arc::clone(&replies);

        client
            .request(
                7004,
                vec![],
                PendingCallback::decoded(
                    |payload: Vec<u8>| Ok(payload.len()),
                    move |r| replies_clone.lock().unwrap().push(r.unwrap()),
                ),
            )
            .unwrap();

        assert_eq!(transport.sent_count(7004), 1);
        transport.take_reply()(InboundMessage {
            app_id: DOTA_APP_ID,
            msg_type: 7005,
            payload: vec![0; 4],
        });
        assert_eq!(*replies.lock().unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_request_async_not_ready() {
        let (client, _rx, _transport) = launched();
        let rx = client.request_async(7004, vec![], |payload: Vec<u8>| Ok(payload));
        assert!(matches!(rx.recv().await, Err(RequestError::NotReady)));
    }

    #[test]
    fn test_unhandled_reports_name() {
        let (mut client, mut rx, _transport) = ready();
        client.dispatch(7004, &[]);
        client.dispatch(9999, &[]);

        assert_eq!(
            drain(&mut rx),
            vec![
                Notification::Unhandled {
                    msg_type: 7004,
                    name: "k_EMsgGCPracticeLobbyCreate".into(),
                },
                Notification::Unhandled {
                    msg_type: 9999,
                    name: "Unknown(9999)".into(),
                },
            ]
        );
    }

    #[test]
    fn test_faulty_handler_does_not_break_session() {
        let transport = RecordingTransport::logged_in();
        let mut registry = HandlerRegistry::new();
        registry
            .register(7004, |_: &mut HandlerContext<'_>, _: &[u8]| -> Result<(), HandlerError> {
                panic!("lobby decode exploded")
            })
            .unwrap();
        registry
            .register(7005, |ctx: &mut HandlerContext<'_>, payload: &[u8]| {
                ctx.caches.party = Some(payload.to_vec());
                Ok(())
            })
            .unwrap();
        let (mut client, mut rx) = client_with(&transport, registry);
        client.launch();
        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[]);
        drain(&mut rx);

        client.dispatch(7004, &[]);
        client.dispatch(7005, &[7]);

        let notes = drain(&mut rx);
        assert!(matches!(
            notes.as_slice(),
            [Notification::HandlerFailed { msg_type: 7004, .. }]
        ));
        assert!(client.is_ready());
        assert_eq!(client.caches().party, Some(vec![7]));
    }

    #[test]
    fn test_welcome_hook_fills_caches() {
        let transport = RecordingTransport::logged_in();
        let mut registry = HandlerRegistry::new();
        registry.set_welcome_hook(|ctx: &mut HandlerContext<'_>, payload: &[u8]| {
            ctx.caches.inventory.push(payload.to_vec());
            Ok(())
        });
        let (mut client, _rx) = client_with(&transport, registry);
        client.launch();

        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[1, 2, 3]);
        assert_eq!(client.caches().inventory, vec![vec![1, 2, 3]]);

        client.launch();
        assert!(client.caches().inventory.is_empty(), "launch resets caches");
    }

    #[test]
    fn test_failing_welcome_hook_still_readies() {
        let transport = RecordingTransport::logged_in();
        let mut registry = HandlerRegistry::new();
        registry.set_welcome_hook(
            |_: &mut HandlerContext<'_>, _: &[u8]| -> Result<(), HandlerError> {
                Err(HandlerError::Failed("truncated SO cache".into()))
            },
        );
        let (mut client, mut rx) = client_with(&transport, registry);
        client.launch();
        tick(&mut client);

        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[]);

        let notes = drain(&mut rx);
        assert!(
            matches!(
                notes.as_slice(),
                [
                    Notification::HandlerFailed {
                        msg_type: K_EMSG_GC_CLIENT_WELCOME,
                        ..
                    },
                    Notification::Ready,
                ]
            ),
            "unexpected notifications: {notes:?}"
        );
        assert!(client.is_ready());
        assert!(client.next_deadline().is_none());
    }

    #[test]
    fn test_panicking_welcome_hook_still_readies() {
        let transport = RecordingTransport::logged_in();
        let mut registry = HandlerRegistry::new();
        registry.set_welcome_hook(
            |_: &mut HandlerContext<'_>, _: &[u8]| -> Result<(), HandlerError> {
                panic!("cache blob exploded")
            },
        );
        let (mut client, mut rx) = client_with(&transport, registry);
        client.launch();

        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[]);

        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 2);
        assert!(matches!(
            &notes[0],
            Notification::HandlerFailed { msg_type: K_EMSG_GC_CLIENT_WELCOME, error, .. }
                if error.contains("cache blob exploded")
        ));
        assert_eq!(notes[1], Notification::Ready);
        assert!(client.next_deadline().is_none());
    }

    #[test]
    fn test_zero_hello_interval_rejected() {
        let transport = RecordingTransport::logged_in();
        let config = GcConfig {
            hello_interval_ms: 0,
            ..Default::default()
        };
        let result = GcClient::new(
            &config,
            transport,
            Arc::new(BaseCodec::new()),
            HandlerRegistry::new(),
        );
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "hello_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_lost_and_regained_session() {
        let (mut client, mut rx, _transport) = ready();

        client.dispatch(
            K_EMSG_GC_CLIENT_CONNECTION_STATUS,
            &status_payload(ConnectionStatus::NoSession),
        );
        assert_eq!(client.state(), SessionState::Recovering);
        assert!(client.next_deadline().is_some());

        client.dispatch(
            K_EMSG_GC_CLIENT_CONNECTION_STATUS,
            &status_payload(ConnectionStatus::HaveSession),
        );
        assert!(client.is_ready());
        assert!(client.next_deadline().is_none());
        assert_eq!(drain(&mut rx), vec![Notification::Unready, Notification::Ready]);
    }

    #[test]
    fn test_status_pushes_are_level_triggered() {
        let (mut client, mut rx, _transport) = ready();
        let lost = status_payload(ConnectionStatus::Suspended);
        let regained = status_payload(ConnectionStatus::HaveSession);

        client.dispatch(K_EMSG_GC_CLIENT_CONNECTION_STATUS, &lost);
        client.dispatch(K_EMSG_GC_CLIENT_CONNECTION_STATUS, &lost);
        client.dispatch(K_EMSG_GC_CLIENT_CONNECTION_STATUS, &regained);
        client.dispatch(K_EMSG_GC_CLIENT_CONNECTION_STATUS, &regained);

        assert_eq!(drain(&mut rx), vec![Notification::Unready, Notification::Ready]);
    }

    #[test]
    fn test_recovery_sends_hellos() {
        let (mut client, _rx, transport) = ready();
        client.dispatch(
            K_EMSG_GC_CLIENT_CONNECTION_STATUS,
            &status_payload(ConnectionStatus::NoSession),
        );

        tick(&mut client);
        tick(&mut client);
        assert_eq!(transport.sent_count(K_EMSG_GC_CLIENT_HELLO), 2);
        assert!(client.send_to_gc(7004, vec![]).is_err());
    }

    #[test]
    fn test_garbage_status_ignored() {
        let (mut client, mut rx, _transport) = ready();
        client.dispatch(K_EMSG_GC_CLIENT_CONNECTION_STATUS, &[0xff, 0xff, 0xff]);
        assert!(client.is_ready());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_exit_stops_everything() {
        let (mut client, mut rx, transport) = launched();
        let deadline = client.next_deadline().unwrap();
        client.exit();

        client.on_timer(deadline);
        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[]);

        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(transport.sent.lock().unwrap().is_empty());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(
            transport.announcements.lock().unwrap().last(),
            Some(&Vec::new())
        );
    }

    #[test]
    fn test_exit_without_steam_id_does_not_announce() {
        let transport = Arc::new(RecordingTransport::default());
        let (mut client, _rx) = client_with(&transport, HandlerRegistry::new());
        client.launch();
        client.exit();

        assert_eq!(*transport.announcements.lock().unwrap(), vec![vec![DOTA_APP_ID]]);
        assert_eq!(client.account_id(), None);
    }

    #[test]
    fn test_inbound_for_other_app_dropped() {
        let (mut client, mut rx, _transport) = launched();
        client.handle_inbound(InboundMessage {
            app_id: 730,
            msg_type: K_EMSG_GC_CLIENT_WELCOME,
            payload: vec![],
        });
        assert!(!client.is_ready());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_state_watch_follows_transitions() {
        let (mut client, _rx, _transport) = launched();
        let state = client.subscribe_state();
        assert_eq!(*state.borrow(), SessionState::Announcing);

        client.dispatch(K_EMSG_GC_CLIENT_WELCOME, &[]);
        assert_eq!(*state.borrow(), SessionState::Ready);
    }
}
