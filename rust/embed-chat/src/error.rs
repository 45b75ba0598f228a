use thiserror::Error;

/// Failures surfaced to the embedding application.
///
/// Protocol framing problems (malformed envelopes, foreign channel ids)
/// never show up here: the session drops those messages and carries on.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The container identifier given at construction is not of the form
    /// `b!<id>`
    #[error("Invalid container id {0:?}: expected `b!` followed by URL-safe characters")]
    InvalidContainerId(String),

    /// The auth provider failed to produce a token
    #[error("Unable to acquire an access token: {0}")]
    Token(String),

    /// The container's site URL could not be resolved
    #[error("Unable to resolve the site URL for container {container}: {reason}")]
    SiteResolution {
        /// The container that was being resolved
        container: String,
        /// What went wrong
        reason: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A launch URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A message could not be serialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The platform refused to post a message, register a listener or
    /// submit the launch form
    #[error("Transport error: {0}")]
    Transport(String),

    /// `open_chat` was called on a session that already launched
    #[error("The chat has already been launched")]
    AlreadyLaunched,

    /// The operation needs a live port and the handshake has not completed
    #[error("The guest has not completed the handshake")]
    NotConnected,

    /// The Guest did not announce itself within the configured timeout
    #[error("The guest did not complete the handshake within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// The session was torn down while the operation was outstanding
    #[error("The session was torn down")]
    TornDown,
}
