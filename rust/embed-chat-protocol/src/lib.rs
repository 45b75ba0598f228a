#![warn(missing_docs)]

//! Wire vocabulary for the embedded chat protocol.
//!
//! A *Host* page embeds a *Guest* chat surface in an iframe it does not
//! control. The two sides talk over structured-clone messages:
//!
//! ```text
//! Host                                           Guest
//!  │ ── {type:'identify-parent', channelId} ──▸   │   (window, repeated)
//!  │ ◂── {type:'initialize', channelId, replyTo}  │   (window, once)
//!  │ ══ {type:'activate'} ═════════════════════▸  │   (dedicated port)
//!  │ ══ {type:'command', id, data:{command..}} ═▸ │
//!  │ ◂═ {type:'acknowledge', id} ════════════════ │
//!  │ ◂═ {type:'command', id, data:{command..}} ══ │
//!  │ ══ {type:'acknowledge', id} ══════════════▸  │
//!  │ ══ {type:'result', id, result, data} ═════▸  │
//! ```
//!
//! This crate only describes the messages. It has no notion of windows,
//! ports or timers; see the `embed-chat` crate for the host that drives
//! them.
//!
//! - [`HostMessage`] / [`HostCommand`]: everything the Host sends.
//! - [`GuestMessage`] / [`GuestCommand`]: everything the Host understands
//!   from the Guest, parsed from untrusted JSON.
//! - [`ChatConfigState`]: the chat configuration the Host keeps in sync
//!   with the Guest.

mod config;
pub use config::*;

mod data_source;
pub use data_source::*;

mod envelope;
pub use envelope::*;

mod error;
pub use error::*;

mod id;
pub use id::*;

mod theme;
pub use theme::*;

pub mod time;
