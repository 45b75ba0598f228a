//! The seams between the protocol and the platform that carries it.
//!
//! The protocol never touches a window, a port or a timer directly. It asks
//! a [`Runtime`] for them, which keeps the state machine testable off the
//! browser (see `helpers::MockRuntime`) and lets `web::WebRuntime` bind
//! it to `web-sys`.
//!
//! Everything here is single-threaded: handlers are plain `FnMut` boxes and
//! are only ever called from the platform's event loop, never re-entrantly
//! from inside a `Runtime` method.

use std::time::Duration;

use serde_json::Value;

use crate::{EmbedError, LaunchForm};

/// A registration that can be undone: a listener, an interval or a timeout.
///
/// `cancel` must be idempotent. Implementations also cancel on drop, so a
/// handle that goes out of scope never leaves a timer running.
pub trait Subscription {
    /// Stop delivering callbacks
    fn cancel(&mut self);
}

/// A dedicated, in-order, two-way message channel to the Guest.
pub trait Port {
    /// Begin delivering queued messages
    fn start(&self);

    /// Send a structured message to the other end
    fn post(&self, message: &Value) -> Result<(), EmbedError>;

    /// Close this end of the channel
    fn close(&self);
}

/// A message delivered to the Host window before the handshake.
#[derive(Clone, Debug)]
pub struct WindowMessage<P> {
    /// Origin of the sending document, when the platform reports one
    pub origin: Option<String>,
    /// The message as JSON; non-JSON members (such as ports) are absent
    pub data: Value,
    /// The `replyTo` port carried by the message, if any
    pub reply_to: Option<P>,
}

/// Receives pre-handshake window messages.
pub type WindowHandler<P> = Box<dyn FnMut(WindowMessage<P>)>;

/// Receives messages from an adopted port.
pub type PortHandler = Box<dyn FnMut(Value)>;

/// The platform the protocol runs on.
pub trait Runtime: 'static {
    /// Port type carried in `initialize` announcements
    type Port: Port + 'static;

    /// Handle returned for every registration
    type Handle: Subscription + 'static;

    /// Post a message into the Guest's window. `target_origin` is `*`
    /// unless the Host pinned the Guest's origin.
    fn post_to_guest(&self, message: &Value, target_origin: &str) -> Result<(), EmbedError>;

    /// Navigate the Guest's window by submitting `form`
    fn submit_form(&self, form: &LaunchForm) -> Result<(), EmbedError>;

    /// Subscribe to messages posted to the Host's window
    fn listen_window(
        &self,
        handler: WindowHandler<Self::Port>,
    ) -> Result<Self::Handle, EmbedError>;

    /// Subscribe to messages arriving on `port`
    fn listen_port(&self, port: &Self::Port, handler: PortHandler)
    -> Result<Self::Handle, EmbedError>;

    /// Call `tick` every `period` until the handle is cancelled
    fn interval(&self, period: Duration, tick: Box<dyn FnMut()>)
    -> Result<Self::Handle, EmbedError>;

    /// Call `fire` once after `delay` unless the handle is cancelled first
    fn timeout(&self, delay: Duration, fire: Box<dyn FnOnce()>)
    -> Result<Self::Handle, EmbedError>;
}
