//! Recording transport shared by the unit tests.

use std::sync::{Arc, Mutex};

use dota_gc_config::GcConfig;
use prost::Message;

use crate::client::GcClient;
use crate::codec::BaseCodec;
use crate::messages::{CMsgConnectionStatus, ConnectionStatus, ProtoHeader};
use crate::notification::{Notification, Notifications};
use crate::routing::HandlerRegistry;
use crate::transport::{ReplyFn, Transport};

pub const STEAM_ID: u64 = 76_561_197_960_265_851;

/// One captured `send_raw` call.
pub struct SentMessage {
    pub app_id: u32,
    pub msg_type: u32,
    pub header: ProtoHeader,
    pub payload: Vec<u8>,
    pub on_reply: Option<ReplyFn>,
}

#[derive(Default)]
pub struct RecordingTransport {
    pub steam_id: Mutex<Option<u64>>,
    pub announcements: Mutex<Vec<Vec<u32>>>,
    pub sent: Mutex<Vec<SentMessage>>,
}

impl RecordingTransport {
    pub fn logged_in() -> Arc<Self> {
        let transport = Self::default();
        *transport.steam_id.lock().unwrap() = Some(STEAM_ID);
        Arc::new(transport)
    }

    pub fn sent_types(&self) -> Vec<u32> {
        self.sent.lock().unwrap().iter().map(|m| m.msg_type).collect()
    }

    pub fn sent_count(&self, msg_type: u32) -> usize {
        self.sent_types().iter().filter(|t| **t == msg_type).count()
    }

    /// Remove and return the reply continuation of the last send.
    pub fn take_reply(&self) -> ReplyFn {
        let mut sent = self.sent.lock().unwrap();
        let last = sent.last_mut().expect("something was sent");
        last.on_reply.take().expect("send carried a continuation")
    }
}

impl Transport for RecordingTransport {
    fn steam_id(&self) -> Option<u64> {
        *self.steam_id.lock().unwrap()
    }

    fn announce_presence(&self, app_ids: &[u32]) {
        self.announcements.lock().unwrap().push(app_ids.to_vec());
    }

    fn send_raw(
        &self,
        app_id: u32,
        msg_type: u32,
        header: &ProtoHeader,
        payload: Vec<u8>,
        on_reply: Option<ReplyFn>,
    ) {
        self.sent.lock().unwrap().push(SentMessage {
            app_id,
            msg_type,
            header: *header,
            payload,
            on_reply,
        });
    }
}

pub fn client_with(
    transport: &Arc<RecordingTransport>,
    registry: HandlerRegistry,
) -> (GcClient, Notifications) {
    let codec = BaseCodec::new().with_names([(7004, "k_EMsgGCPracticeLobbyCreate")]);
    GcClient::new(
        &GcConfig::default(),
        transport.clone(),
        Arc::new(codec),
        registry,
    )
    .expect("default config is valid")
}

pub fn status_payload(status: ConnectionStatus) -> Vec<u8> {
    CMsgConnectionStatus {
        status: Some(status.as_i32()),
        ..Default::default()
    }
    .encode_to_vec()
}

pub fn drain(rx: &mut Notifications) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

/// Fire the client's timer at its own deadline.
pub fn tick(client: &mut GcClient) {
    let deadline = client.next_deadline().expect("timer armed");
    client.on_timer(deadline);
}
