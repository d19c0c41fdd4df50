//! Error types: runtime read/write status and definition-time misuse.

/// Status of a failed read or write. Success is `Ok(())`.
///
/// `NotEnoughData` is recoverable (feed more bytes and retry from a fresh field);
/// the others are reported to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("not enough data")]
    NotEnoughData,
    #[error("buffer overflow")]
    BufferOverflow,
    #[error("invalid message data: {0}")]
    InvalidMsgData(String),
    #[error("protocol error: {0}")]
    ProtocolError(String),
    #[error("unknown message id {0}")]
    InvalidMsgId(u64),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown name: {0}")]
    UnknownName(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl CodecError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        CodecError::InvalidMsgData(reason.into())
    }
}

/// Misuse of the definition API, detected when a definition is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("invalid length: {0}")]
    InvalidLength(String),
    #[error("invalid bitfield: {0}")]
    InvalidBitfield(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("unknown member: {0}")]
    UnknownMember(String),
    #[error("invalid link: {0}")]
    InvalidLink(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("invalid option: {0}")]
    InvalidOption(String),
    #[error("duplicate message id {0}")]
    DuplicateMessageId(u64),
}
