use thiserror::Error;

/// The four sentinel error kinds used throughout the workspace.
///
/// All other errors wrap one of these so that callers can dispatch on the
/// kind (HTTP status mapping, retry decisions) while the message stays
/// human-readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested aggregate does not exist.
    NotFound,
    /// A conditional write lost its condition (e.g. a conditional debit).
    Conflict,
    /// The request failed validation.
    Invalid,
    /// Any other repository, gateway, or encoding failure.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Error type carrying a sentinel kind, a message, and an optional source.
///
/// `Display` renders the message alone; the kind is reached through
/// [`CoreError::kind`] or the `is_*` predicates.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CoreError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CoreError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a `not_found` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a `conflict` error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Creates an `invalid` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    /// Creates an `internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attaches the underlying error that caused this one.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the sentinel kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }

    pub fn is_invalid(&self) -> bool {
        self.kind == ErrorKind::Invalid
    }

    pub fn is_internal(&self) -> bool {
        self.kind == ErrorKind::Internal
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_message_only() {
        let err = CoreError::conflict("insufficient funds");
        assert_eq!(err.to_string(), "insufficient funds");
    }

    #[test]
    fn kind_predicates() {
        assert!(CoreError::not_found("x").is_not_found());
        assert!(CoreError::conflict("x").is_conflict());
        assert!(CoreError::invalid("x").is_invalid());
        assert!(CoreError::internal("x").is_internal());
        assert!(!CoreError::internal("x").is_conflict());
    }

    #[test]
    fn source_is_preserved() {
        let io = std::io::Error::other("disk gone");
        let err = CoreError::internal("persist failed").with_source(io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "persist failed");
    }

    #[test]
    fn kind_display_names() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ErrorKind::Conflict.to_string(), "conflict");
        assert_eq!(ErrorKind::Invalid.to_string(), "invalid");
        assert_eq!(ErrorKind::Internal.to_string(), "internal");
    }
}
