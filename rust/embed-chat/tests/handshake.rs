use std::time::Duration;

use anyhow::Result;
use embed_chat::{
    ChatEmbed, EmbedError, HostCallbacks, HostOptions, MockPort, MockRuntime, SessionPhase,
    StaticAuthProvider,
    protocol::{ChannelId, HostMessage},
    session::{Acquisition, ChannelSession},
    transport::WindowMessage,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::wasm_bindgen_test;
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_dedicated_worker);

const HOSTNAME: &str = "contoso.sharepoint.com";
const GUEST_ORIGIN: &str = "https://contoso.sharepoint.com";

fn embed(runtime: &MockRuntime, options: HostOptions) -> Result<ChatEmbed<MockRuntime>> {
    Ok(ChatEmbed::new(
        runtime.clone(),
        StaticAuthProvider::new(HOSTNAME, "token-1"),
        options,
        HostCallbacks::default(),
    )?)
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_pings_the_guest_until_it_announces_itself() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(&runtime, HostOptions::default())?;

    embed.open_chat(None).await?;
    assert_eq!(embed.phase(), SessionPhase::Handshaking);
    assert_eq!(runtime.interval_periods(), vec![Duration::from_millis(100)]);

    runtime.tick();
    runtime.tick();
    runtime.tick();

    let channel = embed.channel_id().unwrap();
    let posts = runtime.guest_posts();
    assert_eq!(posts.len(), 3);
    for (message, target_origin) in posts {
        assert_eq!(
            message,
            json!({ "type": "identify-parent", "channelId": channel.as_str() })
        );
        assert_eq!(target_origin, "*");
    }
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_activates_the_announced_port_and_stops_heartbeating() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(&runtime, HostOptions::default())?;
    embed.open_chat(None).await?;

    runtime.tick();
    runtime.tick();
    assert_eq!(runtime.identify_count(), 2);

    let port = runtime.announce(&embed.channel_id().unwrap(), GUEST_ORIGIN);

    assert!(port.is_started());
    assert_eq!(port.sent_types(), vec!["activate", "command"]);
    assert_eq!(port.sent()[0], json!({ "type": "activate" }));
    assert_eq!(port.sent_commands(), vec!["configure"]);
    assert_eq!(embed.phase(), SessionPhase::Connected);
    embed.connected().await?;

    for _ in 0..5 {
        runtime.tick();
    }
    assert_eq!(runtime.identify_count(), 2);
    assert_eq!(runtime.intervals(), 0);
    assert_eq!(runtime.window_listeners(), 0);
    // Only the port listener remains
    assert_eq!(runtime.live_subscriptions(), 1);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_never_accepts_another_sessions_channel() -> Result<()> {
    let runtime = MockRuntime::default();
    let first = embed(&runtime, HostOptions::default())?;
    let second = embed(&runtime, HostOptions::default())?;
    first.open_chat(None).await?;
    second.open_chat(None).await?;

    let first_channel = first.channel_id().unwrap();
    let second_channel = second.channel_id().unwrap();
    assert_ne!(first_channel, second_channel);

    let port = runtime.announce(&second_channel, GUEST_ORIGIN);

    assert_eq!(first.phase(), SessionPhase::Handshaking);
    assert_eq!(second.phase(), SessionPhase::Connected);
    assert_eq!(port.sent_types(), vec!["activate", "command"]);

    let unrelated = runtime.announce(&ChannelId::from("someone-else"), GUEST_ORIGIN);
    assert!(unrelated.sent().is_empty());
    assert!(!unrelated.is_started());
    assert_eq!(first.phase(), SessionPhase::Handshaking);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_keeps_waiting_when_the_announcement_has_no_port() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(&runtime, HostOptions::default())?;
    embed.open_chat(None).await?;
    let channel = embed.channel_id().unwrap();

    runtime.deliver_window(WindowMessage {
        origin: Some(GUEST_ORIGIN.into()),
        data: json!({ "type": "initialize", "channelId": channel.as_str() }),
        reply_to: None,
    });
    runtime.deliver_window(WindowMessage {
        origin: Some(GUEST_ORIGIN.into()),
        data: json!("not even an object"),
        reply_to: Some(MockPort::default()),
    });

    assert_eq!(embed.phase(), SessionPhase::Handshaking);
    runtime.tick();
    assert_eq!(runtime.identify_count(), 1);

    runtime.announce(&channel, GUEST_ORIGIN);
    assert_eq!(embed.phase(), SessionPhase::Connected);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_only_talks_to_the_expected_origin_when_pinned() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(
        &runtime,
        HostOptions::default().with_expected_origin(GUEST_ORIGIN),
    )?;
    embed.open_chat(None).await?;
    let channel = embed.channel_id().unwrap();

    runtime.tick();
    assert_eq!(runtime.guest_posts()[0].1, GUEST_ORIGIN);

    let impostor = runtime.announce(&channel, "https://evil.example");
    assert!(!impostor.is_started());
    assert_eq!(embed.phase(), SessionPhase::Handshaking);

    runtime.announce(&channel, GUEST_ORIGIN);
    assert_eq!(embed.phase(), SessionPhase::Connected);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_abandons_the_handshake_when_the_timeout_elapses() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(
        &runtime,
        HostOptions::default().with_init_timeout(Duration::from_secs(30)),
    )?;
    embed.open_chat(None).await?;
    let channel = embed.channel_id().unwrap();
    assert_eq!(runtime.pending_timeouts(), vec![Duration::from_secs(30)]);

    runtime.fire_timeouts();

    assert_eq!(embed.phase(), SessionPhase::TimedOut);
    assert_eq!(runtime.live_subscriptions(), 0);
    assert!(matches!(
        embed.connected().await,
        Err(EmbedError::HandshakeTimeout(timeout)) if timeout == Duration::from_secs(30)
    ));

    runtime.tick();
    assert_eq!(runtime.identify_count(), 0);

    let late = runtime.announce(&channel, GUEST_ORIGIN);
    assert!(!late.is_started());
    assert_eq!(embed.phase(), SessionPhase::TimedOut);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_cancels_the_timeout_once_connected() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(
        &runtime,
        HostOptions::default().with_init_timeout(Duration::from_secs(30)),
    )?;
    embed.open_chat(None).await?;

    runtime.announce(&embed.channel_id().unwrap(), GUEST_ORIGIN);
    assert!(runtime.pending_timeouts().is_empty());

    runtime.fire_timeouts();
    assert_eq!(embed.phase(), SessionPhase::Connected);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_releases_everything_on_teardown_and_tolerates_repeats() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(&runtime, HostOptions::default())?;
    embed.open_chat(None).await?;
    let port = runtime.announce(&embed.channel_id().unwrap(), GUEST_ORIGIN);

    embed.teardown();
    embed.teardown();

    assert_eq!(embed.phase(), SessionPhase::TornDown);
    assert!(port.is_closed());
    assert_eq!(runtime.live_subscriptions(), 0);
    assert!(matches!(embed.connected().await, Err(EmbedError::TornDown)));

    // Setters still update local state but never touch the closed port
    embed.set_prompt("hello");
    assert_eq!(port.sent().len(), 2);
    assert_eq!(embed.config().prompt.as_deref(), Some("hello"));
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_stops_heartbeating_when_torn_down_mid_handshake() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(&runtime, HostOptions::default())?;
    embed.open_chat(None).await?;
    let channel = embed.channel_id().unwrap();

    runtime.tick();
    embed.teardown();
    runtime.tick();

    assert_eq!(runtime.identify_count(), 1);
    assert_eq!(runtime.live_subscriptions(), 0);
    assert!(!runtime.announce(&channel, GUEST_ORIGIN).is_started());
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_stops_listening_for_announcements_once_connected() -> Result<()> {
    let runtime = MockRuntime::default();
    let embed = embed(&runtime, HostOptions::default())?;
    embed.open_chat(None).await?;
    let channel = embed.channel_id().unwrap();

    let first = runtime.announce(&channel, GUEST_ORIGIN);
    let second = runtime.announce(&channel, GUEST_ORIGIN);

    assert!(!second.is_started());
    assert!(second.sent().is_empty());
    assert!(!first.is_closed());
    assert_eq!(embed.phase(), SessionPhase::Connected);

    embed.set_prompt("still here");
    assert_eq!(first.sent_commands(), vec!["configure", "setPrompt"]);
    Ok(())
}

#[test]
fn it_rejects_a_second_handshake_and_keeps_the_first_port() {
    let channel = ChannelId::from("c-1");
    let mut session = ChannelSession::<MockRuntime>::new(channel.clone());
    let announce = |port: &MockPort| WindowMessage {
        origin: Some(GUEST_ORIGIN.to_owned()),
        data: json!({ "type": "initialize", "channelId": "c-1" }),
        reply_to: Some(port.clone()),
    };

    let first = MockPort::default();
    let second = MockPort::default();

    assert_eq!(session.acquire(announce(&first), None), Acquisition::Adopted);
    assert_eq!(session.acquire(announce(&second), None), Acquisition::Duplicate);

    assert!(second.is_closed());
    assert!(!first.is_closed());

    session.post(&HostMessage::Activate).unwrap();
    assert_eq!(first.sent(), vec![json!({ "type": "activate" })]);
    assert!(second.sent().is_empty());

    session.teardown();
    assert!(first.is_closed());
    assert_eq!(session.acquire(announce(&MockPort::default()), None), Acquisition::Ignored);
}

#[test]
fn it_refuses_to_post_before_a_port_is_adopted() {
    let session = ChannelSession::<MockRuntime>::new(ChannelId::from("c-1"));
    assert!(matches!(
        session.post(&HostMessage::Activate),
        Err(EmbedError::NotConnected)
    ));
}
