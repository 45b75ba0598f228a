//! Browser bindings for the `embed-chat` crate.
//!
//! Example usage in JavaScript:
//!
//! ```ignore
//! // This is JavaScript code that uses the WASM bindings, not a Rust doctest
//! import { ChatEmbedded } from "embed-chat";
//!
//! const chat = new ChatEmbedded({
//!   contentWindow: document.querySelector("iframe").contentWindow,
//!   authProvider: {
//!     hostname: "contoso.sharepoint.com",
//!     getToken: () => acquireToken(),
//!   },
//!   onChatClose: () => panel.hide(),
//! });
//!
//! await chat.openChat({ header: "Contoso", locale: "en-US" });
//! await chat.connected();
//! chat.setPrompt("Summarize this folder");
//! ```

mod binding;
pub use binding::*;

mod runtime;
pub use runtime::*;

use serde_json::Value;
use wasm_bindgen::JsValue;

use crate::EmbedError;

/// Structured clone → JSON. Functions, ports and other non-JSON members
/// are dropped. `None` if the value has no JSON form at all.
pub(crate) fn js_to_json(value: &JsValue) -> Option<Value> {
    let text = js_sys::JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&text).ok()
}

pub(crate) fn json_to_js(value: &Value) -> Result<JsValue, EmbedError> {
    js_sys::JSON::parse(&serde_json::to_string(value)?).map_err(transport_error)
}

pub(crate) fn transport_error(value: JsValue) -> EmbedError {
    EmbedError::Transport(format!("{value:?}"))
}
