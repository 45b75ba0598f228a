use std::time::Duration;

use async_trait::async_trait;
use embed_chat_protocol::{ChatTheme, DataSource, ZeroQueryPrompts};
use serde::de::DeserializeOwned;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{
    JsFuture,
    js_sys::{Function, Promise, Reflect},
};
use web_sys::Window;

use super::{WebRuntime, js_to_json, json_to_js};
use crate::{AuthProvider, ChatEmbed, EmbedError, HostCallbacks, HostOptions, LaunchConfig};

#[wasm_bindgen(typescript_custom_section)]
const CHAT_EMBEDDED_INTERFACE: &'static str = r#"
/**
 * Supplies the site hosting the chat and the token it is opened with.
 */
interface ChatEmbeddedAuthProvider {
  hostname: string,
  getToken(): Promise<string>|string
}

/**
 * Everything `new ChatEmbedded` accepts. Only `contentWindow` and
 * `authProvider` are required.
 */
interface ChatEmbeddedOptions {
  contentWindow: Window,
  authProvider: ChatEmbeddedAuthProvider,
  onNotification?: (envelope: object) => void,
  onChatClose?: (envelope: object) => void,
  themeV8?: object,
  containerId?: string,
  initTimeout?: number,
  heartbeatInterval?: number,
  expectedOrigin?: string
}

interface ChatTheme {
  useDarkMode?: boolean,
  customTheme?: Record<string, string|boolean>
}

interface ZeroQueryPrompts {
  headerText?: string,
  promptSuggestionList?: { suggestionText: string }[]
}

/**
 * A source the chat is grounded on, e.g.
 * `{ type: "Folder", value: { name: "Reports", url: "https://..." } }`
 */
interface DataSource {
  type: "File"|"Folder"|"DocumentLibrary"|"Site"|"WorkingSet"|"Meeting",
  value: object
}

/**
 * Configuration applied when the chat is opened.
 */
interface LaunchConfig {
  header?: string,
  theme?: ChatTheme,
  instruction?: string,
  locale?: string,
  chatInputPlaceholder?: string,
  zeroQueryPrompts?: ZeroQueryPrompts,
  suggestedPrompts?: string[],
  dataSources?: DataSource[]
}
"#;

#[wasm_bindgen]
extern "C" {
    #[allow(missing_docs)]
    #[wasm_bindgen(typescript_type = "ChatEmbeddedOptions")]
    pub type ChatEmbeddedOptionsDuckType;

    #[allow(missing_docs)]
    #[wasm_bindgen(typescript_type = "LaunchConfig")]
    pub type LaunchConfigDuckType;
}

/// An embedded chat running in an iframe.
#[wasm_bindgen(js_name = "ChatEmbedded")]
pub struct ChatEmbeddedBinding {
    embed: ChatEmbed<WebRuntime>,
}

#[wasm_bindgen(js_class = "ChatEmbedded")]
impl ChatEmbeddedBinding {
    /// Prepare a chat for the iframe behind `options.contentWindow`.
    /// Throws if `containerId` is malformed.
    #[wasm_bindgen(constructor)]
    pub fn new(options: ChatEmbeddedOptionsDuckType) -> Result<ChatEmbeddedBinding, JsError> {
        console_error_panic_hook::set_once();

        let options = JsValue::from(options);

        let content_window: Window = required(&options, "contentWindow")?
            .dyn_into()
            .map_err(|_| JsError::new("`contentWindow` must be a Window"))?;
        let auth = JsAuthProvider::try_from(required(&options, "authProvider")?)?;

        let mut host_options = HostOptions::default();
        if let Some(container_id) = optional(&options, "containerId")?.and_then(|v| v.as_string())
        {
            host_options = host_options.with_container_id(container_id);
        }
        if let Some(theme) = optional(&options, "themeV8")?.and_then(|v| js_to_json(&v)) {
            host_options = host_options.with_theme_v8(theme);
        }
        if let Some(timeout) = optional(&options, "initTimeout")?.and_then(|v| millis(&v)) {
            host_options = host_options.with_init_timeout(timeout);
        }
        if let Some(interval) = optional(&options, "heartbeatInterval")?.and_then(|v| millis(&v)) {
            host_options = host_options.with_heartbeat_interval(interval);
        }
        if let Some(origin) = optional(&options, "expectedOrigin")?.and_then(|v| v.as_string()) {
            host_options = host_options.with_expected_origin(origin);
        }

        let mut callbacks = HostCallbacks::default();
        if let Some(function) = optional_function(&options, "onNotification")? {
            callbacks = callbacks.on_notification(move |envelope| invoke(&function, envelope));
        }
        if let Some(function) = optional_function(&options, "onChatClose")? {
            callbacks = callbacks.on_chat_close(move |envelope| invoke(&function, envelope));
        }

        let embed = ChatEmbed::new(
            WebRuntime::new(content_window)?,
            auth,
            host_options,
            callbacks,
        )?;

        Ok(Self { embed })
    }

    /// Navigate the iframe to the chat. Resolves once the chat has been
    /// launched; the handshake completes in the background.
    #[wasm_bindgen(js_name = "openChat")]
    pub async fn open_chat(
        &self,
        launch_config: Option<LaunchConfigDuckType>,
    ) -> Result<(), JsError> {
        let launch = match launch_config {
            Some(config) => from_js::<Option<LaunchConfig>>(&config.into())?,
            None => None,
        };

        let embed = self.embed.clone();
        embed.open_chat(launch).await?;
        Ok(())
    }

    /// Resolves once the chat is connected; rejects if the handshake
    /// times out or the chat is torn down
    #[wasm_bindgen]
    pub async fn connected(&self) -> Result<(), JsError> {
        let embed = self.embed.clone();
        embed.connected().await?;
        Ok(())
    }

    /// Replace the instruction given to the assistant
    #[wasm_bindgen(js_name = "setInstruction")]
    pub fn set_instruction(&self, instruction: String) {
        self.embed.set_instruction(instruction);
    }

    /// Pre-fill the chat input
    #[wasm_bindgen(js_name = "setPrompt")]
    pub fn set_prompt(&self, prompt: String) {
        self.embed.set_prompt(prompt);
    }

    /// Ground the chat on a list of data sources; `null` clears them
    #[wasm_bindgen(js_name = "setDataSources")]
    pub fn set_data_sources(
        &self,
        #[wasm_bindgen(unchecked_param_type = "DataSource[]|null")] data_sources: JsValue,
    ) -> Result<(), JsError> {
        self.embed
            .set_data_sources(from_js::<Option<Vec<DataSource>>>(&data_sources)?);
        Ok(())
    }

    /// Suggestions shown before the first query; `null` clears them
    #[wasm_bindgen(js_name = "setZeroQueryPrompts")]
    pub fn set_zero_query_prompts(
        &self,
        #[wasm_bindgen(unchecked_param_type = "ZeroQueryPrompts|null")] prompts: JsValue,
    ) -> Result<(), JsError> {
        self.embed
            .set_zero_query_prompts(from_js::<Option<ZeroQueryPrompts>>(&prompts)?);
        Ok(())
    }

    /// Suggestions shown alongside the conversation; `null` clears them
    #[wasm_bindgen(js_name = "setSuggestedPrompts")]
    pub fn set_suggested_prompts(
        &self,
        #[wasm_bindgen(unchecked_param_type = "string[]|null")] prompts: JsValue,
    ) -> Result<(), JsError> {
        self.embed
            .set_suggested_prompts(from_js::<Option<Vec<String>>>(&prompts)?);
        Ok(())
    }

    /// Replace the chat theme
    #[wasm_bindgen(js_name = "setTheme")]
    pub fn set_theme(
        &self,
        #[wasm_bindgen(unchecked_param_type = "ChatTheme")] theme: JsValue,
    ) -> Result<(), JsError> {
        self.embed
            .set_theme(from_js::<Option<ChatTheme>>(&theme)?.unwrap_or_default());
        Ok(())
    }

    /// Stop listening, cancel timers and close the port
    #[wasm_bindgen]
    pub fn teardown(&self) {
        self.embed.teardown();
    }

    /// Lifecycle phase, e.g. `"Handshaking"` or `"Connected"`
    #[wasm_bindgen(getter)]
    pub fn phase(&self) -> String {
        format!("{:?}", self.embed.phase())
    }

    /// Channel id of the launched session
    #[wasm_bindgen(getter, js_name = "channelId")]
    pub fn channel_id(&self) -> Option<String> {
        self.embed.channel_id().map(|id| id.to_string())
    }
}

/// An `authProvider` object handed in from JavaScript.
struct JsAuthProvider {
    hostname: String,
    provider: JsValue,
    get_token: Function,
}

impl TryFrom<JsValue> for JsAuthProvider {
    type Error = JsError;

    fn try_from(provider: JsValue) -> Result<Self, Self::Error> {
        let hostname = required(&provider, "hostname")?
            .as_string()
            .ok_or_else(|| JsError::new("`authProvider.hostname` must be a string"))?;
        let get_token = required(&provider, "getToken")?
            .dyn_into::<Function>()
            .map_err(|_| JsError::new("`authProvider.getToken` must be a function"))?;

        Ok(Self {
            hostname,
            provider,
            get_token,
        })
    }
}

#[async_trait(?Send)]
impl AuthProvider for JsAuthProvider {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn get_token(&self) -> Result<String, EmbedError> {
        let returned = self
            .get_token
            .call0(&self.provider)
            .map_err(|error| EmbedError::Token(format!("{error:?}")))?;
        let token = JsFuture::from(Promise::resolve(&returned))
            .await
            .map_err(|error| EmbedError::Token(format!("{error:?}")))?;

        token
            .as_string()
            .ok_or_else(|| EmbedError::Token("`getToken` did not produce a string".into()))
    }
}

fn invoke(function: &Function, envelope: &Value) {
    let result = json_to_js(envelope)
        .map_err(|error| format!("{error}"))
        .and_then(|envelope| {
            function
                .call1(&JsValue::NULL, &envelope)
                .map_err(|error| format!("{error:?}"))
        });

    if let Err(error) = result {
        tracing::warn!(%error, "Host callback failed");
    }
}

fn optional(object: &JsValue, name: &str) -> Result<Option<JsValue>, JsError> {
    let value = Reflect::get(object, &name.into()).map_err(js_value_to_error)?;
    if value.is_undefined() || value.is_null() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

fn required(object: &JsValue, name: &str) -> Result<JsValue, JsError> {
    optional(object, name)?.ok_or_else(|| JsError::new(&format!("`{name}` is required")))
}

fn optional_function(object: &JsValue, name: &str) -> Result<Option<Function>, JsError> {
    optional(object, name)?
        .map(|value| {
            value
                .dyn_into::<Function>()
                .map_err(|_| JsError::new(&format!("`{name}` must be a function")))
        })
        .transpose()
}

fn millis(value: &JsValue) -> Option<Duration> {
    value
        .as_f64()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| Duration::from_millis(ms as u64))
}

fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, JsError> {
    let json = js_to_json(value).unwrap_or(Value::Null);
    Ok(serde_json::from_value(json).map_err(EmbedError::from)?)
}

fn js_value_to_error(value: JsValue) -> JsError {
    JsError::new(&format!("{:?}", value))
}
