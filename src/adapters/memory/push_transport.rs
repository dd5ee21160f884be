//! Scripted in-memory push transport for testing.
//!
//! Each `connect` call consumes the next scripted outcome: either a refusal
//! or an accepted channel whose server side is driven through a
//! [`PushPeer`]. With nothing scripted, connects are refused.
//!
//! # Example
//!
//! ```ignore
//! let transport = Arc::new(InMemoryPushTransport::new());
//! let peer = transport.accept_next();
//!
//! manager.connect();
//! peer.send_json(&json!({"type": "initial_state", "cases": []}));
//! peer.drop_connection(); // unclean close, triggers reconnect
//! ```

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::ports::{FrameSink, InboundFrame, PushChannel, PushTransport, PushTransportError};

enum ScriptedConnect {
    Refuse(String),
    Accept(Arc<PeerState>),
}

/// In-memory `PushTransport` driven by a connect script.
pub struct InMemoryPushTransport {
    script: Mutex<VecDeque<ScriptedConnect>>,
    connect_delay: Mutex<Duration>,
    connects: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl InMemoryPushTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            connect_delay: Mutex::new(Duration::ZERO),
            connects: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// The next connect succeeds. Returns the server side of that channel.
    pub fn accept_next(&self) -> PushPeer {
        let state = Arc::new(PeerState::default());
        self.push_script(ScriptedConnect::Accept(Arc::clone(&state)));
        PushPeer { state }
    }

    /// The next connect fails with `reason`.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.push_script(ScriptedConnect::Refuse(reason.into()));
    }

    /// Delay applied to every connect before it resolves.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Number of connect calls made so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// URLs passed to connect, in call order.
    pub fn connected_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn push_script(&self, entry: ScriptedConnect) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(entry);
    }
}

impl Default for InMemoryPushTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTransport for InMemoryPushTransport {
    async fn connect(&self, url: &str) -> Result<PushChannel, PushTransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        let delay = *self.connect_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(ScriptedConnect::Accept(state)) => {
                let (tx, rx) = unbounded();
                *state.frames.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
                state.accepted.store(true, Ordering::SeqCst);
                Ok(PushChannel {
                    frames: rx.boxed(),
                    sink: Box::new(InMemorySink { state }),
                })
            }
            Some(ScriptedConnect::Refuse(reason)) => Err(PushTransportError::Connect(reason)),
            None => Err(PushTransportError::Connect(
                "no scripted connection".to_string(),
            )),
        }
    }
}

#[derive(Default)]
struct PeerState {
    frames: Mutex<Option<UnboundedSender<InboundFrame>>>,
    sent: Mutex<Vec<String>>,
    accepted: AtomicBool,
    client_closed: AtomicBool,
}

struct InMemorySink {
    state: Arc<PeerState>,
}

#[async_trait]
impl FrameSink for InMemorySink {
    async fn send_text(&mut self, text: String) -> Result<(), PushTransportError> {
        if self.state.client_closed.load(Ordering::SeqCst) {
            return Err(PushTransportError::Closed);
        }
        self.state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PushTransportError> {
        self.state.client_closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Server side of a scripted push channel.
#[derive(Clone)]
pub struct PushPeer {
    state: Arc<PeerState>,
}

impl PushPeer {
    /// Delivers a frame to the client. Returns false if the channel is gone
    /// or was never opened.
    pub fn send_frame(&self, frame: InboundFrame) -> bool {
        match &*self.state.frames.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(tx) => tx.unbounded_send(frame).is_ok(),
            None => false,
        }
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send_frame(InboundFrame::Text(text.into()))
    }

    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Closes with a close frame. `clean` selects normal closure.
    pub fn close(&self, clean: bool) -> bool {
        self.send_frame(InboundFrame::Closed { clean })
    }

    /// Ends the frame stream without a close frame (abrupt drop).
    pub fn drop_connection(&self) {
        if let Some(tx) = self
            .state
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            tx.close_channel();
        }
    }

    /// True once the client's connect call picked up this channel.
    pub fn is_accepted(&self) -> bool {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// True once the client closed its sink.
    pub fn client_closed(&self) -> bool {
        self.state.client_closed.load(Ordering::SeqCst)
    }

    /// Text frames the client has sent.
    pub fn received(&self) -> Vec<String> {
        self.state
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
