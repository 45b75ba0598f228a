use thiserror::Error;

/// Reasons an inbound message could not be understood.
///
/// These never cross the router boundary: the host drops the message and
/// logs the reason.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The message was not a JSON object
    #[error("Expected an object envelope, got {0}")]
    NotAnObject(&'static str),

    /// A field the envelope kind requires was absent or had the wrong shape
    #[error("Envelope is missing required field `{0}`")]
    MissingField(&'static str),
}
