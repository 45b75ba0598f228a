//! The embedding host: one [`ChatEmbed`] per chat iframe.
//!
//! State lives behind an `Rc<RefCell<..>>`. Every closure handed to the
//! [`Runtime`] holds only a `Weak` reference, so a host that is dropped
//! tears itself down instead of being kept alive by its own listeners.
//! Application callbacks run after the state borrow is released and may
//! call back into the host.

use std::{
    cell::RefCell,
    fmt::Debug,
    rc::Rc,
};

use embed_chat_protocol::{
    ChannelId, ChatConfigState, ChatTheme, CommandId, CommandIds, DataSource, GuestMessage,
    GuestResult, HostCommand, HostMessage, ZeroQueryPrompts,
};
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, trace, warn};

use crate::{
    AuthProvider, ConfigPusher, ContainerId, EmbedError, GraphSiteResolver, HostCallbacks,
    HostOptions, LaunchConfig, LaunchForm, PendingRequests, ProtocolConfig, SiteResolver,
    host_url, launch_url,
    router::{Reaction, route},
    session::{Acquisition, ChannelSession},
    transport::{Runtime, WindowMessage},
};

/// Where a [`ChatEmbed`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Constructed; `open_chat` has not been called (or failed)
    Idle,
    /// Acquiring a token and resolving the launch URL
    Launching,
    /// The Guest was navigated; waiting for its `initialize`
    Handshaking,
    /// A port is live
    Connected,
    /// The Guest did not answer within the configured timeout
    TimedOut,
    /// Torn down; the instance is inert
    TornDown,
}

struct HostState<R: Runtime> {
    runtime: Rc<R>,
    options: HostOptions,
    callbacks: HostCallbacks,
    container: Option<ContainerId>,
    pusher: ConfigPusher,
    auth_token: Option<String>,
    session: Option<ChannelSession<R>>,
    pending: PendingRequests,
    ids: CommandIds,
    launched: bool,
    phase: watch::Sender<SessionPhase>,
}

impl<R: Runtime> HostState<R> {
    fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.phase.send_replace(phase);
    }

    fn connected_session(&self) -> Result<&ChannelSession<R>, EmbedError> {
        self.session
            .as_ref()
            .filter(|session| session.is_connected())
            .ok_or(EmbedError::NotConnected)
    }

    /// Send a Host command on the live port
    fn send(&mut self, command: HostCommand) -> Result<CommandId, EmbedError> {
        let session = self
            .session
            .as_ref()
            .filter(|session| session.is_connected())
            .ok_or(EmbedError::NotConnected)?;
        let id = self.ids.next_id();
        let name = command.name();
        session.post(&HostMessage::Command { id, data: command })?;
        trace!(%id, command = name, "Sent command");
        Ok(id)
    }

    fn push(&mut self, command: HostCommand) {
        let name = command.name();
        match self.send(command) {
            Ok(_) => {}
            Err(EmbedError::NotConnected) => {
                trace!(command = name, "Not connected; change will ride on configure")
            }
            Err(error) => warn!(command = name, %error, "Failed to send command"),
        }
    }

    /// Undo a launch that failed before the Guest was reached
    fn abandon_launch(&mut self) {
        if self.phase() != SessionPhase::Launching {
            return;
        }
        self.session = None;
        self.auth_token = None;
        self.launched = false;
        self.set_phase(SessionPhase::Idle);
    }

    fn teardown(&mut self) {
        if self.phase() == SessionPhase::TornDown {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.teardown();
        }
        self.pending.fail_all();
        self.set_phase(SessionPhase::TornDown);
        info!("Chat embed torn down");
    }
}

impl<R: Runtime> Drop for HostState<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

type Shared<R> = Rc<RefCell<HostState<R>>>;

/// Host side of one embedded chat.
///
/// ```ignore
/// let embed = ChatEmbed::new(runtime, auth, HostOptions::default(), HostCallbacks::default())?;
/// embed.open_chat(Some(LaunchConfig { header: Some("Contoso".into()), ..Default::default() })).await?;
/// embed.set_instruction("Answer in French");
/// ```
pub struct ChatEmbed<R: Runtime> {
    state: Shared<R>,
    auth: Rc<dyn AuthProvider>,
    site_resolver: Rc<dyn SiteResolver>,
    phase: watch::Receiver<SessionPhase>,
}

impl<R: Runtime> Clone for ChatEmbed<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            auth: self.auth.clone(),
            site_resolver: self.site_resolver.clone(),
            phase: self.phase.clone(),
        }
    }
}

impl<R: Runtime> Debug for ChatEmbed<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEmbed")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl<R: Runtime> ChatEmbed<R> {
    /// Create an embed for the Guest window behind `runtime`. Fails if
    /// `options` names a malformed container id.
    pub fn new(
        runtime: R,
        auth: impl AuthProvider + 'static,
        options: HostOptions,
        callbacks: HostCallbacks,
    ) -> Result<Self, EmbedError> {
        let container = options
            .container_id
            .as_deref()
            .map(ContainerId::parse)
            .transpose()?;

        let mut pusher = ConfigPusher::default();
        pusher.set_theme_v8(options.theme_v8.clone());

        let (phase, receiver) = watch::channel(SessionPhase::Idle);

        let state = HostState {
            runtime: Rc::new(runtime),
            options,
            callbacks,
            container,
            pusher,
            auth_token: None,
            session: None,
            pending: PendingRequests::default(),
            ids: CommandIds::default(),
            launched: false,
            phase,
        };

        Ok(Self {
            state: Rc::new(RefCell::new(state)),
            auth: Rc::new(auth),
            site_resolver: Rc::new(GraphSiteResolver::default()),
            phase: receiver,
        })
    }

    /// Resolve container sites with `resolver` instead of Graph
    pub fn with_site_resolver(mut self, resolver: impl SiteResolver + 'static) -> Self {
        self.site_resolver = Rc::new(resolver);
        self
    }

    /// The current lifecycle phase
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// The channel of the current session, once launched
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.state
            .borrow()
            .session
            .as_ref()
            .map(|session| session.channel_id().clone())
    }

    /// A snapshot of the configuration the Guest is (or will be) given
    pub fn config(&self) -> ChatConfigState {
        self.state.borrow().pusher.state().clone()
    }

    /// Open the chat in the Guest window.
    ///
    /// Acquires a token, resolves the launch URL, navigates the Guest with
    /// a POST form and starts waiting for it to announce itself. Resolves
    /// once the form is submitted; use [`ChatEmbed::connected`] to wait for
    /// the handshake. If acquiring the token or resolving the site fails
    /// the embed returns to [`SessionPhase::Idle`] and may be launched
    /// again.
    pub async fn open_chat(&self, launch: Option<LaunchConfig>) -> Result<(), EmbedError> {
        {
            let mut state = self.state.borrow_mut();
            if state.phase() == SessionPhase::TornDown {
                return Err(EmbedError::TornDown);
            }
            if state.launched {
                return Err(EmbedError::AlreadyLaunched);
            }
            state.launched = true;

            let default_header = state.options.default_header.clone();
            state
                .pusher
                .apply_launch(launch.unwrap_or_default(), &default_header);
            state.set_phase(SessionPhase::Launching);
        }

        let result = self.launch().await;
        if let Err(error) = &result {
            warn!(%error, "Failed to open chat");
            self.state.borrow_mut().abandon_launch();
        }
        result
    }

    async fn launch(&self) -> Result<(), EmbedError> {
        let token = self.auth.get_token().await?;

        let container = self.state.borrow().container.clone();
        let site = match container {
            Some(container) => {
                self.site_resolver
                    .resolve_site_url(&container, &token)
                    .await?
            }
            None => host_url(self.auth.hostname())?,
        };

        let channel_id = ChannelId::generate();
        let form = LaunchForm::new(
            launch_url(&site, &ProtocolConfig::new(channel_id.clone()))?,
            &token,
        );

        let runtime = {
            let state = self.state.borrow();
            if state.phase() != SessionPhase::Launching {
                return Err(EmbedError::TornDown);
            }
            state.runtime.clone()
        };

        // Runs outside any state borrow; a thrown JS exception skips
        // destructors and would leave the borrow flag set.
        runtime.submit_form(&form)?;

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.phase() != SessionPhase::Launching {
            return Err(EmbedError::TornDown);
        }
        state.auth_token = Some(token);
        info!(channel = %channel_id, site = %site, "Launched chat");

        // Nothing the Guest does can run before this returns, so listening
        // now cannot miss its announcement.
        let mut session = ChannelSession::new(channel_id);

        let weak = Rc::downgrade(&self.state);
        session.hold_window_listener(state.runtime.listen_window(Box::new(move |message| {
            if let Some(shared) = weak.upgrade() {
                on_window_message(&shared, message);
            }
        }))?);

        let weak = Rc::downgrade(&self.state);
        session.hold_heartbeat(
            state
                .runtime
                .interval(state.options.heartbeat_interval, Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        heartbeat(&shared.borrow());
                    }
                }))?,
        );

        if let Some(timeout) = state.options.init_timeout {
            let weak = Rc::downgrade(&self.state);
            session.hold_deadline(state.runtime.timeout(timeout, Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    handshake_expired(&shared);
                }
            }))?);
        }

        state.session = Some(session);
        state.set_phase(SessionPhase::Handshaking);
        Ok(())
    }

    /// Wait until the Guest has connected. Fails with
    /// [`EmbedError::HandshakeTimeout`] if the init timeout elapses first
    /// and with [`EmbedError::TornDown`] if the embed is torn down.
    pub async fn connected(&self) -> Result<(), EmbedError> {
        let mut phase = self.phase.clone();
        loop {
            let current = *phase.borrow_and_update();
            match current {
                SessionPhase::Connected => return Ok(()),
                SessionPhase::TimedOut => {
                    let timeout = self.state.borrow().options.init_timeout.unwrap_or_default();
                    return Err(EmbedError::HandshakeTimeout(timeout));
                }
                SessionPhase::TornDown => return Err(EmbedError::TornDown),
                SessionPhase::Idle | SessionPhase::Launching | SessionPhase::Handshaking => {}
            }

            if phase.changed().await.is_err() {
                return Err(EmbedError::TornDown);
            }
        }
    }

    /// Send `command` and wait for the Guest's `result`
    pub async fn request(&self, command: HostCommand) -> Result<GuestResult, EmbedError> {
        let receiver = {
            let mut state = self.state.borrow_mut();
            let id = state.send(command)?;
            let (sender, receiver) = oneshot::channel();
            state.pending.register(id, sender);
            receiver
        };

        receiver.await.map_err(|_| EmbedError::TornDown)?
    }

    fn update(&self, change: impl FnOnce(&mut ConfigPusher) -> HostCommand) {
        let mut state = self.state.borrow_mut();
        let command = change(&mut state.pusher);
        state.push(command);
    }

    /// Replace the assistant instruction
    pub fn set_instruction(&self, instruction: impl Into<String>) {
        let instruction = instruction.into();
        self.update(|pusher| pusher.set_instruction(instruction));
    }

    /// Pre-fill the chat input
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.update(|pusher| pusher.set_prompt(prompt));
    }

    /// Ground the chat on `data_sources`; `None` clears them
    pub fn set_data_sources(&self, data_sources: Option<Vec<DataSource>>) {
        self.update(|pusher| pusher.set_data_sources(data_sources));
    }

    /// Suggestions shown before the first query; `None` clears them
    pub fn set_zero_query_prompts(&self, prompts: Option<ZeroQueryPrompts>) {
        self.update(|pusher| pusher.set_zero_query_prompts(prompts));
    }

    /// Suggestions shown alongside the conversation; `None` clears them
    pub fn set_suggested_prompts(&self, prompts: Option<Vec<String>>) {
        self.update(|pusher| pusher.set_suggested_prompts(prompts));
    }

    /// Replace the theme; dark mode maps to `isDarkModeEnabled`
    pub fn set_theme(&self, theme: ChatTheme) {
        self.update(|pusher| pusher.set_theme(theme));
    }

    /// Release every listener, timer and port, and fail outstanding
    /// requests. Idempotent.
    pub fn teardown(&self) {
        self.state.borrow_mut().teardown();
    }

    #[cfg(test)]
    fn downgrade(&self) -> std::rc::Weak<RefCell<HostState<R>>> {
        Rc::downgrade(&self.state)
    }
}

fn heartbeat<R: Runtime>(state: &HostState<R>) {
    let Some(session) = state.session.as_ref().filter(|s| s.is_handshaking()) else {
        return;
    };

    let ping = match serde_json::to_value(session.identify_message()) {
        Ok(ping) => ping,
        Err(error) => {
            warn!(%error, "Unable to encode heartbeat");
            return;
        }
    };

    trace!(channel = %session.channel_id(), "Heartbeat");
    if let Err(error) = state
        .runtime
        .post_to_guest(&ping, state.options.target_origin())
    {
        debug!(%error, "Heartbeat not delivered");
    }
}

fn handshake_expired<R: Runtime>(shared: &Shared<R>) {
    let mut state = shared.borrow_mut();
    let Some(session) = state.session.as_mut().filter(|s| s.is_handshaking()) else {
        return;
    };

    session.teardown();
    state.pending.fail_all();
    state.set_phase(SessionPhase::TimedOut);
    warn!(
        timeout = ?state.options.init_timeout,
        "Guest did not complete the handshake in time"
    );
}

fn on_window_message<R: Runtime>(shared: &Shared<R>, message: WindowMessage<R::Port>) {
    let mut guard = shared.borrow_mut();
    let state = &mut *guard;
    let Some(session) = state.session.as_mut() else {
        return;
    };

    if session.acquire(message, state.options.expected_origin.as_deref())
        != Acquisition::Adopted
    {
        return;
    }

    match adopt(shared, state) {
        Ok(()) => {
            state.set_phase(SessionPhase::Connected);
            if let Some(session) = state.session.as_ref() {
                info!(channel = %session.channel_id(), "Guest connected");
            }
        }
        Err(error) => {
            warn!(%error, "Unable to complete the handshake");
            state.teardown();
        }
    }
}

/// Listen on the freshly adopted port, activate it and push the full
/// configuration.
fn adopt<R: Runtime>(shared: &Shared<R>, state: &mut HostState<R>) -> Result<(), EmbedError> {
    let session = state.session.as_mut().ok_or(EmbedError::NotConnected)?;
    let port = session.port().ok_or(EmbedError::NotConnected)?;

    let weak = Rc::downgrade(shared);
    let listener = state.runtime.listen_port(port, Box::new(move |message| {
        if let Some(shared) = weak.upgrade() {
            on_port_message(&shared, message);
        }
    }))?;
    session.hold_port_listener(listener);
    session.finish_handshake();

    session.post(&HostMessage::Activate)?;
    let configure = state.pusher.configure();
    state.send(configure)?;
    Ok(())
}

fn on_port_message<R: Runtime>(shared: &Shared<R>, envelope: Value) {
    let message = match GuestMessage::parse(envelope) {
        Ok(message) => message,
        Err(error) => {
            debug!(%error, "Dropping malformed envelope");
            return;
        }
    };

    let invocation = {
        let mut guard = shared.borrow_mut();
        let state = &mut *guard;
        let Ok(session) = state.connected_session() else {
            return;
        };

        let routed = route(message, state.auth_token.as_deref());
        for reply in &routed.replies {
            if let Err(error) = session.post(reply) {
                warn!(%error, "Failed to reply to guest");
            }
        }

        match routed.reaction {
            Reaction::None => None,
            Reaction::Acknowledged(id) => {
                if !state.pending.acknowledge(id) {
                    trace!(%id, "Acknowledged command has no waiter");
                }
                None
            }
            Reaction::Completed(result) => {
                let id = result.id;
                if !state.pending.resolve(result) {
                    debug!(%id, "Result for a command nobody is waiting on");
                }
                None
            }
            Reaction::Notify(envelope) => state
                .callbacks
                .on_notification
                .clone()
                .map(|callback| (callback, envelope)),
            Reaction::CloseChat(envelope) => state
                .callbacks
                .on_chat_close
                .clone()
                .map(|callback| (callback, envelope)),
        }
    };

    if let Some((callback, envelope)) = invocation {
        callback(&envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{MockRuntime, StaticAuthProvider};

    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen_test::wasm_bindgen_test;

    #[test]
    fn it_rejects_a_malformed_container_at_construction() {
        let result = ChatEmbed::new(
            MockRuntime::default(),
            StaticAuthProvider::new("contoso.sharepoint.com", "token"),
            HostOptions::default().with_container_id("not-valid"),
            HostCallbacks::default(),
        );

        assert!(matches!(result, Err(EmbedError::InvalidContainerId(_))));
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_does_not_keep_itself_alive_through_its_listeners() -> anyhow::Result<()> {
        let runtime = MockRuntime::default();
        let embed = ChatEmbed::new(
            runtime.clone(),
            StaticAuthProvider::new("contoso.sharepoint.com", "token"),
            HostOptions::default(),
            HostCallbacks::default(),
        )?;

        embed.open_chat(None).await?;
        assert_eq!(runtime.live_subscriptions(), 2);

        let weak = embed.downgrade();
        drop(embed);

        assert!(weak.upgrade().is_none());
        assert_eq!(runtime.live_subscriptions(), 0);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_refuses_to_launch_after_teardown() -> anyhow::Result<()> {
        let embed = ChatEmbed::new(
            MockRuntime::default(),
            StaticAuthProvider::new("contoso.sharepoint.com", "token"),
            HostOptions::default(),
            HostCallbacks::default(),
        )?;

        embed.teardown();

        assert!(matches!(embed.open_chat(None).await, Err(EmbedError::TornDown)));
        assert_eq!(embed.phase(), SessionPhase::TornDown);
        Ok(())
    }
}
