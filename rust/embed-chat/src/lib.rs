#![warn(missing_docs)]

//! Host side of the embedded chat protocol.
//!
//! A [`ChatEmbed`] drives one chat iframe: it navigates the iframe to the
//! chat surface with a POST form, pings it until it announces a dedicated
//! message port, then keeps the chat's configuration in sync over that
//! port and answers the chat's requests.
//!
//! ```ignore
//! let embed = ChatEmbed::new(
//!     runtime,
//!     auth_provider,
//!     HostOptions::default().with_init_timeout(Duration::from_secs(30)),
//!     HostCallbacks::default().on_chat_close(|_| hide_panel()),
//! )?;
//!
//! embed.open_chat(None).await?;
//! embed.connected().await?;
//! embed.set_prompt("Summarize this folder");
//! ```
//!
//! The platform is abstracted behind [`transport::Runtime`]. In the browser
//! the `web` module binds it to `web-sys` and exports the whole thing to
//! JavaScript as `ChatEmbedded`.

mod auth;
pub use auth::*;

mod error;
pub use error::*;

mod host;
pub use host::*;

mod launch;
pub use launch::*;

mod options;
pub use options::*;

mod pending;
pub use pending::*;

mod pusher;
pub use pusher::*;

pub mod router;
pub mod session;
pub mod transport;

pub use embed_chat_protocol as protocol;

#[cfg(any(test, feature = "helpers"))]
mod helpers;
#[cfg(any(test, feature = "helpers"))]
pub use helpers::*;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub mod web;
