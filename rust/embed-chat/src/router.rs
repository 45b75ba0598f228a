//! Command/response routing for messages arriving on the adopted port.
//!
//! [`route`] is pure: it decides which replies to send and what the Host
//! should do next, and the caller carries it out. Replies are ordered; for
//! a Guest command the `acknowledge` always comes first.

use embed_chat_protocol::{
    CommandId, GuestCommand, GuestMessage, GuestRequest, GuestResult, HostMessage,
    NotificationKind, ReplyData, ResultStatus, TokenType,
};
use serde_json::Value;
use tracing::{debug, trace, warn};

/// What the Host does after sending the replies.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// Nothing beyond the replies
    None,
    /// Invoke the notification callback with this envelope
    Notify(Value),
    /// Invoke the chat-close callback with this envelope
    CloseChat(Value),
    /// The Guest acknowledged a Host command
    Acknowledged(CommandId),
    /// The Guest answered a Host command
    Completed(GuestResult),
}

/// The outcome of routing one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    /// Messages to post on the port, in order
    pub replies: Vec<HostMessage>,
    /// Follow-up for the Host
    pub reaction: Reaction,
}

impl Routed {
    fn quiet(reaction: Reaction) -> Self {
        Self {
            replies: Vec::new(),
            reaction,
        }
    }
}

/// Route one classified port message. `auth_token` is the token cached at
/// launch, used to answer `fetchAuthToken`.
pub fn route(message: GuestMessage, auth_token: Option<&str>) -> Routed {
    match message {
        GuestMessage::Notification(notification) => match notification.kind {
            NotificationKind::OpenSuccessful => {
                Routed::quiet(Reaction::Notify(notification.envelope))
            }
            NotificationKind::Other(kind) => {
                trace!(%kind, "Ignoring notification");
                Routed::quiet(Reaction::None)
            }
        },
        GuestMessage::Command(request) => route_command(request, auth_token),
        GuestMessage::Acknowledge(id) => {
            trace!(%id, "Guest acknowledged command");
            Routed::quiet(Reaction::Acknowledged(id))
        }
        GuestMessage::Result(result) => {
            trace!(id = %result.id, status = ?result.status, "Guest returned a result");
            Routed::quiet(Reaction::Completed(result))
        }
        GuestMessage::Unrecognized(kind) => {
            debug!(%kind, "Ignoring message of unrecognized type");
            Routed::quiet(Reaction::None)
        }
    }
}

fn route_command(request: GuestRequest, auth_token: Option<&str>) -> Routed {
    let GuestRequest {
        id,
        command,
        envelope,
    } = request;
    let mut replies = vec![HostMessage::Acknowledge { id }];
    let mut reaction = Reaction::None;

    let answer = |data| HostMessage::Result {
        id,
        result: ResultStatus::Success,
        data,
    };

    match command {
        GuestCommand::FetchAuthToken {
            token_type: TokenType::Embedded,
        } => match auth_token {
            Some(token) => replies.push(answer(ReplyData::AuthToken {
                token: token.to_owned(),
            })),
            None => warn!(%id, "Guest asked for a token before one was acquired"),
        },
        GuestCommand::FetchAuthToken {
            token_type: TokenType::Other(token_type),
        } => {
            warn!(%id, %token_type, "Unsupported token type requested");
        }
        GuestCommand::PreProcessQuery { query } => {
            replies.push(answer(ReplyData::PreProcessedQuery {
                pre_processed_query: query,
            }));
        }
        GuestCommand::GenerateQueryContext { .. } => {
            replies.push(answer(ReplyData::QueryContext {
                query_context: String::new(),
            }));
        }
        GuestCommand::Close => reaction = Reaction::CloseChat(envelope),
        GuestCommand::Malformed { name, reason } => {
            debug!(%id, command = %name, %reason, "Not answering command with bad parameters")
        }
        GuestCommand::Unknown(name) => debug!(%id, command = %name, "Ignoring unknown command"),
    }

    Routed { replies, reaction }
}
