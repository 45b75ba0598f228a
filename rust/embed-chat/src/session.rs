//! Handshake state for one embedding instance.
//!
//! A [`ChannelSession`] owns every platform resource the handshake needs:
//! the window listener and heartbeat while it waits for the Guest, and the
//! adopted port afterwards.
//!
//! ```text
//!              acquire(matching initialize)
//! Handshaking ───────────────────────────────▸ Connected
//!      │                                           │
//!      │ teardown / timeout                        │ teardown
//!      ▼                                           ▼
//!    Closed ◂──────────────────────────────────────┘
//! ```
//!
//! The window listener and heartbeat are released exactly once: on the
//! transition out of `Handshaking`, whichever way it goes.
//!
//! Because the window listener goes away on adoption, a [`crate::ChatEmbed`]
//! never sees a second `initialize` at all. [`Acquisition::Duplicate`] only
//! arises when a session is driven directly and keeps receiving window
//! messages; the extra port is then closed and the adopted one kept.

use embed_chat_protocol::{ChannelId, HostMessage, Initialize};
use tracing::{debug, trace};

use crate::{
    EmbedError,
    transport::{Port, Runtime, Subscription, WindowMessage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    Handshaking,
    Connected,
    Closed,
}

/// What [`ChannelSession::acquire`] made of a window message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// Not addressed to this session, or not usable; keep waiting
    Ignored,
    /// A valid announcement arrived after a port was already adopted; the
    /// new port was dropped
    Duplicate,
    /// The announced port was adopted and started
    Adopted,
}

/// The live handshake/communication state of one session.
pub struct ChannelSession<R: Runtime> {
    channel_id: ChannelId,
    state: HandshakeState,
    port: Option<R::Port>,
    port_listener: Option<R::Handle>,
    window_listener: Option<R::Handle>,
    heartbeat: Option<R::Handle>,
    deadline: Option<R::Handle>,
}

impl<R: Runtime> ChannelSession<R> {
    /// A session waiting for a Guest to answer on `channel_id`
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            state: HandshakeState::Handshaking,
            port: None,
            port_listener: None,
            window_listener: None,
            heartbeat: None,
            deadline: None,
        }
    }

    /// The channel this session answers to
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// The heartbeat ping for this session
    pub fn identify_message(&self) -> HostMessage {
        HostMessage::IdentifyParent {
            channel_id: self.channel_id.clone(),
        }
    }

    /// Whether the Guest's port has been adopted and the session is live
    pub fn is_connected(&self) -> bool {
        self.state == HandshakeState::Connected
    }

    /// Whether the session is still waiting for the Guest
    pub fn is_handshaking(&self) -> bool {
        self.state == HandshakeState::Handshaking
    }

    /// The adopted port, once connected
    pub fn port(&self) -> Option<&R::Port> {
        self.port.as_ref()
    }

    /// Hold the pre-handshake window listener. Replaces (and cancels) any
    /// previous one so at most one is ever live.
    pub fn hold_window_listener(&mut self, handle: R::Handle) {
        replace(&mut self.window_listener, handle);
    }

    /// Hold the heartbeat timer. Replaces (and cancels) any previous one.
    pub fn hold_heartbeat(&mut self, handle: R::Handle) {
        replace(&mut self.heartbeat, handle);
    }

    /// Hold the handshake deadline timer
    pub fn hold_deadline(&mut self, handle: R::Handle) {
        replace(&mut self.deadline, handle);
    }

    /// Hold the listener attached to the adopted port
    pub fn hold_port_listener(&mut self, handle: R::Handle) {
        replace(&mut self.port_listener, handle);
    }

    /// Whether a heartbeat timer is currently held
    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// Whether a window listener is currently held
    pub fn has_window_listener(&self) -> bool {
        self.window_listener.is_some()
    }

    /// Validate a pre-handshake window message and adopt its port.
    ///
    /// Only `{type: 'initialize', channelId: <ours>, replyTo: <port>}` is
    /// accepted. Everything else is dropped without complaint: any page
    /// may be broadcasting to the same window.
    pub fn acquire(
        &mut self,
        message: WindowMessage<R::Port>,
        expected_origin: Option<&str>,
    ) -> Acquisition {
        if let Some(expected) = expected_origin {
            if message.origin.as_deref() != Some(expected) {
                trace!(origin = ?message.origin, "Dropping window message from unexpected origin");
                return Acquisition::Ignored;
            }
        }

        let Some(initialize) = Initialize::parse(&message.data) else {
            return Acquisition::Ignored;
        };

        if initialize.channel_id != self.channel_id {
            return Acquisition::Ignored;
        }

        let Some(port) = message.reply_to else {
            trace!(channel = %self.channel_id, "Announcement without a port; still waiting");
            return Acquisition::Ignored;
        };

        match self.state {
            HandshakeState::Handshaking => {
                port.start();
                self.port = Some(port);
                self.state = HandshakeState::Connected;
                Acquisition::Adopted
            }
            HandshakeState::Connected => {
                debug!(channel = %self.channel_id, "Rejecting second handshake; keeping the adopted port");
                port.close();
                Acquisition::Duplicate
            }
            HandshakeState::Closed => Acquisition::Ignored,
        }
    }

    /// Stop heartbeating and stop listening on the window. Called once the
    /// port is adopted.
    pub fn finish_handshake(&mut self) {
        release(&mut self.heartbeat);
        release(&mut self.deadline);
        release(&mut self.window_listener);
    }

    /// Send a message on the adopted port
    pub fn post(&self, message: &HostMessage) -> Result<(), EmbedError> {
        let port = match (&self.state, &self.port) {
            (HandshakeState::Connected, Some(port)) => port,
            _ => return Err(EmbedError::NotConnected),
        };

        port.post(&serde_json::to_value(message)?)
    }

    /// Release every resource the session holds. Safe to call any number
    /// of times.
    pub fn teardown(&mut self) {
        if self.state == HandshakeState::Closed {
            return;
        }

        self.state = HandshakeState::Closed;
        self.finish_handshake();
        release(&mut self.port_listener);

        if let Some(port) = self.port.take() {
            port.close();
        }

        debug!(channel = %self.channel_id, "Session torn down");
    }
}

impl<R: Runtime> Drop for ChannelSession<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn replace<H: Subscription>(slot: &mut Option<H>, handle: H) {
    release(slot);
    *slot = Some(handle);
}

fn release<H: Subscription>(slot: &mut Option<H>) {
    if let Some(mut handle) = slot.take() {
        handle.cancel();
    }
}
