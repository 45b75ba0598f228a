//! In-memory stand-ins for the browser, for driving a [`crate::ChatEmbed`]
//! from tests.
//!
//! Nothing here runs on its own: timers fire when the test calls
//! [`MockRuntime::tick`] or [`MockRuntime::fire_timeouts`], and messages
//! arrive when it calls [`MockRuntime::announce`] or [`MockRuntime::deliver`].

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
    rc::{Rc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use embed_chat_protocol::ChannelId;
use serde_json::{Value, json};
use url::Url;

use crate::{
    AuthProvider, ContainerId, EmbedError, LaunchForm, SiteResolver,
    transport::{Port, PortHandler, Runtime, Subscription, WindowHandler, WindowMessage},
};

#[derive(Debug, Default)]
struct PortState {
    started: Cell<bool>,
    closed: Cell<bool>,
    sent: RefCell<Vec<Value>>,
}

/// The Host's end of a channel created by a fake Guest.
#[derive(Debug, Clone, Default)]
pub struct MockPort {
    inner: Rc<PortState>,
}

impl MockPort {
    /// Whether the Host started the port
    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }

    /// Whether the Host closed the port
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Everything the Host posted on the port, in order
    pub fn sent(&self) -> Vec<Value> {
        self.inner.sent.borrow().clone()
    }

    /// The `type` of everything posted, in order
    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|message| message["type"].as_str().map(str::to_owned))
            .collect()
    }

    /// The command names of every `command` posted, in order
    pub fn sent_commands(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter(|message| message["type"] == "command")
            .filter_map(|message| message["data"]["command"].as_str().map(str::to_owned))
            .collect()
    }

    fn same(&self, other: &MockPort) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Port for MockPort {
    fn start(&self) {
        self.inner.started.set(true);
    }

    fn post(&self, message: &Value) -> Result<(), EmbedError> {
        if self.is_closed() {
            return Err(EmbedError::Transport("port is closed".into()));
        }
        self.inner.sent.borrow_mut().push(message.clone());
        Ok(())
    }

    fn close(&self) {
        self.inner.closed.set(true);
    }
}

#[derive(Default)]
struct RuntimeState {
    next_id: u64,
    live: BTreeSet<u64>,
    window: BTreeMap<u64, WindowHandler<MockPort>>,
    ports: BTreeMap<u64, (MockPort, PortHandler)>,
    intervals: BTreeMap<u64, (Duration, Box<dyn FnMut()>)>,
    timeouts: BTreeMap<u64, (Duration, Box<dyn FnOnce()>)>,
    guest_posts: Vec<(Value, String)>,
    forms: Vec<LaunchForm>,
    refuse_forms: bool,
    on_submit: Option<Rc<dyn Fn(&LaunchForm)>>,
}

impl RuntimeState {
    fn register(&mut self) -> u64 {
        self.next_id += 1;
        self.live.insert(self.next_id);
        self.next_id
    }
}

/// Cancels one mock registration; also cancels on drop.
pub struct MockHandle {
    id: u64,
    runtime: Weak<RefCell<RuntimeState>>,
}

impl Subscription for MockHandle {
    fn cancel(&mut self) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };

        // Keep the removed handlers alive until the borrow is released.
        let removed = {
            let mut state = runtime.borrow_mut();
            if !state.live.remove(&self.id) {
                return;
            }
            (
                state.window.remove(&self.id),
                state.ports.remove(&self.id),
                state.intervals.remove(&self.id),
                state.timeouts.remove(&self.id),
            )
        };
        drop(removed);
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A recording, manually driven [`Runtime`].
#[derive(Clone, Default)]
pub struct MockRuntime {
    inner: Rc<RefCell<RuntimeState>>,
}

impl MockRuntime {
    /// A runtime whose form submissions fail
    pub fn refusing_forms() -> Self {
        let runtime = Self::default();
        runtime.inner.borrow_mut().refuse_forms = true;
        runtime
    }

    /// Run `hook` while each launch form is being submitted, the way a
    /// browser runs script during navigation
    pub fn on_submit(&self, hook: impl Fn(&LaunchForm) + 'static) {
        self.inner.borrow_mut().on_submit = Some(Rc::new(hook));
    }

    fn handle(&self, id: u64) -> MockHandle {
        MockHandle {
            id,
            runtime: Rc::downgrade(&self.inner),
        }
    }

    fn is_live(&self, id: u64) -> bool {
        self.inner.borrow().live.contains(&id)
    }

    /// Deliver a window message to every window listener
    pub fn deliver_window(&self, message: WindowMessage<MockPort>) {
        let ids: Vec<u64> = self.inner.borrow().window.keys().copied().collect();
        for id in ids {
            let Some(mut handler) = self.inner.borrow_mut().window.remove(&id) else {
                continue;
            };
            handler(message.clone());
            if self.is_live(id) {
                self.inner.borrow_mut().window.insert(id, handler);
            }
        }
    }

    /// Play the Guest announcing itself on `channel_id` from `origin`.
    /// Returns the port the Host should adopt.
    pub fn announce(&self, channel_id: &ChannelId, origin: &str) -> MockPort {
        let port = MockPort::default();
        self.deliver_window(WindowMessage {
            origin: Some(origin.to_owned()),
            data: json!({ "type": "initialize", "channelId": channel_id }),
            reply_to: Some(port.clone()),
        });
        port
    }

    /// Play the Guest posting `message` on `port`
    pub fn deliver(&self, port: &MockPort, message: Value) {
        let ids: Vec<u64> = self
            .inner
            .borrow()
            .ports
            .iter()
            .filter(|(_, (listened, _))| listened.same(port))
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let Some((listened, mut handler)) = self.inner.borrow_mut().ports.remove(&id) else {
                continue;
            };
            handler(message.clone());
            if self.is_live(id) {
                self.inner.borrow_mut().ports.insert(id, (listened, handler));
            }
        }
    }

    /// Run every live interval once
    pub fn tick(&self) {
        let ids: Vec<u64> = self.inner.borrow().intervals.keys().copied().collect();
        for id in ids {
            let Some((period, mut tick)) = self.inner.borrow_mut().intervals.remove(&id) else {
                continue;
            };
            tick();
            if self.is_live(id) {
                self.inner.borrow_mut().intervals.insert(id, (period, tick));
            }
        }
    }

    /// Fire every pending timeout
    pub fn fire_timeouts(&self) {
        let due: Vec<_> = {
            let mut state = self.inner.borrow_mut();
            let due = std::mem::take(&mut state.timeouts);
            for id in due.keys() {
                state.live.remove(id);
            }
            due.into_values().collect()
        };

        for (_, fire) in due {
            fire();
        }
    }

    /// Messages posted into the Guest window, with their target origin
    pub fn guest_posts(&self) -> Vec<(Value, String)> {
        self.inner.borrow().guest_posts.clone()
    }

    /// How many `identify-parent` pings were posted
    pub fn identify_count(&self) -> usize {
        self.inner
            .borrow()
            .guest_posts
            .iter()
            .filter(|(message, _)| message["type"] == "identify-parent")
            .count()
    }

    /// Forms submitted into the Guest window
    pub fn forms(&self) -> Vec<LaunchForm> {
        self.inner.borrow().forms.clone()
    }

    /// Every registration not yet cancelled
    pub fn live_subscriptions(&self) -> usize {
        self.inner.borrow().live.len()
    }

    #[allow(missing_docs)]
    pub fn window_listeners(&self) -> usize {
        self.inner.borrow().window.len()
    }

    #[allow(missing_docs)]
    pub fn intervals(&self) -> usize {
        self.inner.borrow().intervals.len()
    }

    #[allow(missing_docs)]
    pub fn pending_timeouts(&self) -> Vec<Duration> {
        self.inner
            .borrow()
            .timeouts
            .values()
            .map(|(delay, _)| *delay)
            .collect()
    }

    /// Period of every live interval
    pub fn interval_periods(&self) -> Vec<Duration> {
        self.inner
            .borrow()
            .intervals
            .values()
            .map(|(period, _)| *period)
            .collect()
    }
}

impl Runtime for MockRuntime {
    type Port = MockPort;
    type Handle = MockHandle;

    fn post_to_guest(&self, message: &Value, target_origin: &str) -> Result<(), EmbedError> {
        self.inner
            .borrow_mut()
            .guest_posts
            .push((message.clone(), target_origin.to_owned()));
        Ok(())
    }

    fn submit_form(&self, form: &LaunchForm) -> Result<(), EmbedError> {
        let hook = {
            let mut state = self.inner.borrow_mut();
            if state.refuse_forms {
                return Err(EmbedError::Transport("guest window is gone".into()));
            }
            state.forms.push(form.clone());
            state.on_submit.clone()
        };

        if let Some(hook) = hook {
            hook(form);
        }
        Ok(())
    }

    fn listen_window(&self, handler: WindowHandler<MockPort>) -> Result<MockHandle, EmbedError> {
        let mut state = self.inner.borrow_mut();
        let id = state.register();
        state.window.insert(id, handler);
        Ok(self.handle(id))
    }

    fn listen_port(&self, port: &MockPort, handler: PortHandler) -> Result<MockHandle, EmbedError> {
        let mut state = self.inner.borrow_mut();
        let id = state.register();
        state.ports.insert(id, (port.clone(), handler));
        Ok(self.handle(id))
    }

    fn interval(&self, period: Duration, tick: Box<dyn FnMut()>) -> Result<MockHandle, EmbedError> {
        let mut state = self.inner.borrow_mut();
        let id = state.register();
        state.intervals.insert(id, (period, tick));
        Ok(self.handle(id))
    }

    fn timeout(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> Result<MockHandle, EmbedError> {
        let mut state = self.inner.borrow_mut();
        let id = state.register();
        state.timeouts.insert(id, (delay, fire));
        Ok(self.handle(id))
    }
}

/// An [`AuthProvider`] that always answers the same way.
#[derive(Debug, Clone)]
pub struct StaticAuthProvider {
    hostname: String,
    token: Result<String, String>,
}

impl StaticAuthProvider {
    /// Always hands out `token` for `hostname`
    pub fn new(hostname: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            token: Ok(token.into()),
        }
    }

    /// Always fails with `reason`
    pub fn failing(hostname: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            token: Err(reason.into()),
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl AuthProvider for StaticAuthProvider {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn get_token(&self) -> Result<String, EmbedError> {
        self.token.clone().map_err(EmbedError::Token)
    }
}

/// A [`SiteResolver`] that always answers the same way.
#[derive(Debug, Clone)]
pub struct StaticSiteResolver {
    site: Result<Url, String>,
}

impl StaticSiteResolver {
    /// Every container lives on `site`
    pub fn new(site: Url) -> Self {
        Self { site: Ok(site) }
    }

    /// Resolution always fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            site: Err(reason.into()),
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl SiteResolver for StaticSiteResolver {
    async fn resolve_site_url(
        &self,
        container: &ContainerId,
        _token: &str,
    ) -> Result<Url, EmbedError> {
        self.site
            .clone()
            .map_err(|reason| EmbedError::SiteResolution {
                container: container.to_string(),
                reason,
            })
    }
}
