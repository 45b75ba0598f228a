use std::{fmt::Debug, rc::Rc, time::Duration};

use serde_json::Value;

/// How often the Host pings the Guest window while waiting for it.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Chat header used when neither the launch config nor a setter provides
/// one.
pub const DEFAULT_HEADER: &str = "Chat";

/// Configuration for a [`crate::ChatEmbed`]
#[derive(Clone, Debug)]
pub struct HostOptions {
    /// Period of the `identify-parent` heartbeat (default: 100ms)
    pub heartbeat_interval: Duration,

    /// Give up on the handshake after this long. `None` waits forever.
    pub init_timeout: Option<Duration>,

    /// Only accept announcements from, and only ping, this origin. `None`
    /// pings with `*` and accepts any origin; the channel id remains the
    /// only check in that case.
    pub expected_origin: Option<String>,

    /// Header used when none is configured
    pub default_header: String,

    /// Scope the chat to a storage container (`b!…`); its site URL is
    /// resolved at launch
    pub container_id: Option<String>,

    /// Design-system theme snapshot forwarded in `configure`
    pub theme_v8: Option<Value>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            init_timeout: None,
            expected_origin: None,
            default_header: DEFAULT_HEADER.to_string(),
            container_id: None,
            theme_v8: None,
        }
    }
}

impl HostOptions {
    /// Set the heartbeat period
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Abandon the handshake after `timeout`
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = Some(timeout);
        self
    }

    /// Pin the Guest's origin
    pub fn with_expected_origin(mut self, origin: impl Into<String>) -> Self {
        self.expected_origin = Some(origin.into());
        self
    }

    /// Override the fallback header
    pub fn with_default_header(mut self, header: impl Into<String>) -> Self {
        self.default_header = header.into();
        self
    }

    /// Scope the chat to a container
    pub fn with_container_id(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    /// Forward a design-system theme snapshot
    pub fn with_theme_v8(mut self, theme: Value) -> Self {
        self.theme_v8 = Some(theme);
        self
    }

    pub(crate) fn target_origin(&self) -> &str {
        self.expected_origin.as_deref().unwrap_or("*")
    }
}

/// Host callback; receives the full inbound envelope.
pub type EnvelopeCallback = Rc<dyn Fn(&Value)>;

/// Callbacks the Guest can trigger.
#[derive(Clone, Default)]
pub struct HostCallbacks {
    pub(crate) on_notification: Option<EnvelopeCallback>,
    pub(crate) on_chat_close: Option<EnvelopeCallback>,
}

impl HostCallbacks {
    /// Called for `open-successful` notifications
    pub fn on_notification(mut self, callback: impl Fn(&Value) + 'static) -> Self {
        self.on_notification = Some(Rc::new(callback));
        self
    }

    /// Called when the Guest sends `close`. The port stays open; closing
    /// it is up to the application.
    pub fn on_chat_close(mut self, callback: impl Fn(&Value) + 'static) -> Self {
        self.on_chat_close = Some(Rc::new(callback));
        self
    }
}

impl Debug for HostCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCallbacks")
            .field("on_notification", &self.on_notification.is_some())
            .field("on_chat_close", &self.on_chat_close.is_some())
            .finish()
    }
}
