//! Message envelopes in both directions.
//!
//! Outbound messages ([`HostMessage`]) are plain serde types. Inbound
//! messages arrive as untrusted JSON and are classified into
//! [`GuestMessage`] by hand so that an unknown `type` or `command` maps to
//! an explicit variant instead of a deserialization failure.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{ChannelId, CommandId, ConfigureOptions, CustomTheme, DataSource, ProtocolError, ZeroQueryPrompts};

/// Token type the Guest asks for when it wants the platform's own
/// embedded-auth bearer token.
pub const EMBEDDED_TOKEN_TYPE: &str = "SharePoint";

/// Everything the Host sends to the Guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    /// Pre-handshake ping posted to the Guest window: "your parent is here,
    /// on this channel"
    IdentifyParent {
        /// The session's channel
        #[serde(rename = "channelId")]
        channel_id: ChannelId,
    },
    /// First message on a freshly adopted port
    Activate,
    /// A Host-issued command
    Command {
        /// Correlation id
        id: CommandId,
        /// The command and its parameters
        data: HostCommand,
    },
    /// Receipt for a Guest-issued command
    Acknowledge {
        /// Id of the command being acknowledged
        id: CommandId,
    },
    /// Answer to a Guest-issued command
    Result {
        /// Id of the command being answered
        id: CommandId,
        /// Outcome
        result: ResultStatus,
        /// Command-specific answer
        data: ReplyData,
    },
}

/// Commands the Host issues to the Guest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
#[allow(missing_docs)]
pub enum HostCommand {
    /// Full configuration push, sent once at handshake
    Configure { options: ConfigureOptions },
    SetPrompt { prompt: String },
    UpdateInstruction { instruction: Option<String> },
    UpdateDataSources { data_sources: Option<Vec<DataSource>> },
    SetZeroQueryPrompts { zero_query_prompts: Option<ZeroQueryPrompts> },
    SetSuggestedPrompts { suggested_prompts: Option<Vec<String>> },
    SetTheme { theme: CustomTheme },
}

impl HostCommand {
    /// The wire name, as found in `data.command`
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::Configure { .. } => "configure",
            HostCommand::SetPrompt { .. } => "setPrompt",
            HostCommand::UpdateInstruction { .. } => "updateInstruction",
            HostCommand::UpdateDataSources { .. } => "updateDataSources",
            HostCommand::SetZeroQueryPrompts { .. } => "setZeroQueryPrompts",
            HostCommand::SetSuggestedPrompts { .. } => "setSuggestedPrompts",
            HostCommand::SetTheme { .. } => "setTheme",
        }
    }
}

/// Outcome field of a `result` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// The command was handled
    Success,
}

/// `data` of a Host `result`, one shape per answered Guest command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyData {
    /// Answer to `fetchAuthToken`
    AuthToken {
        /// Bearer token
        token: String,
    },
    /// Answer to `preProcessQuery`
    PreProcessedQuery {
        /// The (possibly rewritten) query
        #[serde(rename = "preProcessedQuery")]
        pre_processed_query: String,
    },
    /// Answer to `generateQueryContext`
    QueryContext {
        /// Extra context to ground the query on
        #[serde(rename = "queryContext")]
        query_context: String,
    },
}

/// The Guest's pre-handshake announcement, minus its port.
///
/// The `replyTo` port cannot be represented as JSON; the transport extracts
/// it separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initialize {
    /// Channel the Guest claims to answer
    pub channel_id: ChannelId,
}

impl Initialize {
    /// Returns `Some` only for `{type: 'initialize', channelId: <string>}`.
    pub fn parse(envelope: &Value) -> Option<Self> {
        if envelope.get("type").and_then(Value::as_str) != Some("initialize") {
            return None;
        }

        let channel_id = envelope.get("channelId").and_then(Value::as_str)?;
        Some(Self {
            channel_id: ChannelId::from(channel_id),
        })
    }
}

/// A message received on the dedicated port, classified by `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestMessage {
    /// `type: 'notification'`
    Notification(GuestNotification),
    /// `type: 'command'`
    Command(GuestRequest),
    /// `type: 'acknowledge'`
    Acknowledge(CommandId),
    /// `type: 'result'`
    Result(GuestResult),
    /// Any other `type`
    Unrecognized(String),
}

/// A Guest notification together with the envelope it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestNotification {
    /// `data.notification`
    pub kind: NotificationKind,
    /// The whole envelope, as handed to Host callbacks
    pub envelope: Value,
}

/// Known values of `data.notification`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    /// The chat surface finished opening
    OpenSuccessful,
    /// Received but not acted upon
    Other(String),
}

impl From<&str> for NotificationKind {
    fn from(value: &str) -> Self {
        match value {
            "open-successful" => NotificationKind::OpenSuccessful,
            other => NotificationKind::Other(other.to_owned()),
        }
    }
}

/// A Guest-issued command.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestRequest {
    /// Correlation id to echo in `acknowledge` and `result`
    pub id: CommandId,
    /// What the Guest asks for
    pub command: GuestCommand,
    /// The whole envelope, as handed to Host callbacks
    pub envelope: Value,
}

/// Commands the Guest issues to the Host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestCommand {
    /// `fetchAuthToken`: hand over a bearer token
    FetchAuthToken {
        /// Which token the Guest wants
        token_type: TokenType,
    },
    /// `preProcessQuery`: optionally rewrite a query before it is run
    PreProcessQuery {
        /// The user's query
        query: String,
    },
    /// `generateQueryContext`: supply extra grounding for a query
    GenerateQueryContext {
        /// The user's query, when the Guest sends it
        query: Option<String>,
    },
    /// `close`: the user closed the chat
    Close,
    /// A known command whose parameters did not match its shape. It is
    /// still acknowledged, but never answered.
    Malformed {
        /// The command name taken from `data.command`
        name: String,
        /// What failed to parse
        reason: String,
    },
    /// Any other command name
    Unknown(String),
}

/// Token types the Guest may ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenType {
    /// [`EMBEDDED_TOKEN_TYPE`]
    Embedded,
    /// Anything else
    Other(String),
}

impl From<String> for TokenType {
    fn from(value: String) -> Self {
        if value == EMBEDDED_TOKEN_TYPE {
            TokenType::Embedded
        } else {
            TokenType::Other(value)
        }
    }
}

/// A Guest `result` for a Host-issued command.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestResult {
    /// Id of the Host command being answered
    pub id: CommandId,
    /// The `result` field, if the Guest sent one
    pub status: Option<String>,
    /// The `data` field, or `null`
    pub data: Value,
    /// The whole envelope
    pub envelope: Value,
}

impl GuestMessage {
    /// Classify an inbound port message.
    pub fn parse(envelope: Value) -> Result<Self, ProtocolError> {
        let Value::Object(object) = &envelope else {
            return Err(ProtocolError::NotAnObject(json_kind(&envelope)));
        };

        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField("type"))?;

        match kind {
            "notification" => {
                let notification = object
                    .get("data")
                    .ok_or(ProtocolError::MissingField("data"))?
                    .get("notification")
                    .and_then(Value::as_str)
                    .ok_or(ProtocolError::MissingField("data.notification"))?;
                let kind = NotificationKind::from(notification);

                Ok(GuestMessage::Notification(GuestNotification { kind, envelope }))
            }
            "command" => {
                let id = command_id(object)?;
                let data = object.get("data").ok_or(ProtocolError::MissingField("data"))?;
                let command = GuestCommand::from_data(data)?;

                Ok(GuestMessage::Command(GuestRequest {
                    id,
                    command,
                    envelope,
                }))
            }
            "acknowledge" => Ok(GuestMessage::Acknowledge(command_id(object)?)),
            "result" => {
                let id = command_id(object)?;
                let status = object
                    .get("result")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let data = object.get("data").cloned().unwrap_or(Value::Null);

                Ok(GuestMessage::Result(GuestResult {
                    id,
                    status,
                    data,
                    envelope,
                }))
            }
            other => Ok(GuestMessage::Unrecognized(other.to_owned())),
        }
    }
}

#[derive(Deserialize)]
struct FetchAuthTokenParams {
    #[serde(rename = "tokenType")]
    token_type: String,
}

#[derive(Deserialize)]
struct QueryParams {
    query: String,
}

#[derive(Deserialize)]
struct OptionalQueryParams {
    #[serde(default)]
    query: Option<String>,
}

impl GuestCommand {
    fn from_data(data: &Value) -> Result<Self, ProtocolError> {
        let name = data
            .get("command")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField("data.command"))?;

        let command = match name {
            "fetchAuthToken" => params::<FetchAuthTokenParams>(data).map(|params| {
                GuestCommand::FetchAuthToken {
                    token_type: TokenType::from(params.token_type),
                }
            }),
            "preProcessQuery" => params::<QueryParams>(data)
                .map(|params| GuestCommand::PreProcessQuery {
                    query: params.query,
                }),
            "generateQueryContext" => params::<OptionalQueryParams>(data)
                .map(|params| GuestCommand::GenerateQueryContext {
                    query: params.query,
                }),
            "close" => Ok(GuestCommand::Close),
            other => Ok(GuestCommand::Unknown(other.to_owned())),
        };

        Ok(command.unwrap_or_else(|error| GuestCommand::Malformed {
            name: name.to_owned(),
            reason: error.to_string(),
        }))
    }
}

fn params<T: DeserializeOwned>(data: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(data)
}

fn command_id(object: &serde_json::Map<String, Value>) -> Result<CommandId, ProtocolError> {
    object
        .get("id")
        .and_then(Value::as_u64)
        .map(CommandId::new)
        .ok_or(ProtocolError::MissingField("id"))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
