//! Error types for the embed loader

use crate::host::ScriptError;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Loader error types
///
/// Every failure is scoped to a single `load` call. Validation variants are
/// raised before the document is touched; download and initialization
/// variants happen after the embed has been inserted, and that markup is left
/// in place.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors
    #[error("accountId is required")]
    AccountIdRequired,

    #[error("refNode is required")]
    RefNodeRequired,

    #[error("if refNode is not a string, it must be a DOM node with a parent")]
    RefNodeDetached,

    #[error("refNode selector \"{0}\" did not match an element with a parent")]
    RefNodeNotFound(String),

    #[error("embedType is missing or invalid")]
    InvalidEmbedType,

    #[error("cannot use options with an iframe embed")]
    OptionsWithIframe,

    #[error("embedOptions.tagName is invalid (value: \"{0}\")")]
    InvalidTagName(String),

    #[error("embedOptions.responsive.aspectRatio must be in the \"n:n\" format (value: \"{0}\")")]
    InvalidAspectRatio(String),

    #[error("refNodeInsert is missing or invalid")]
    InvalidRefNodeInsert,

    // Network errors
    #[error("player script could not be downloaded")]
    ScriptDownload {
        url: String,
        #[source]
        source: ScriptError,
    },

    // Initialization errors
    #[error("missing player function for {player_id}")]
    MissingPlayerFunction { player_id: String },

    #[error("{message}")]
    PlayerInit { message: String, cause: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if this error was raised by parameter validation, in
    /// which case no DOM mutation happened.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::AccountIdRequired
                | Error::RefNodeRequired
                | Error::RefNodeDetached
                | Error::RefNodeNotFound(_)
                | Error::InvalidEmbedType
                | Error::OptionsWithIframe
                | Error::InvalidTagName(_)
                | Error::InvalidAspectRatio(_)
                | Error::InvalidRefNodeInsert
        )
    }

    /// Returns true if calling `load` again could succeed without changing
    /// the parameters.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ScriptDownload { .. })
    }

    /// Returns the error code for logs and CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::AccountIdRequired => "ACCOUNT_ID_REQUIRED",
            Error::RefNodeRequired => "REF_NODE_REQUIRED",
            Error::RefNodeDetached => "REF_NODE_DETACHED",
            Error::RefNodeNotFound(_) => "REF_NODE_NOT_FOUND",
            Error::InvalidEmbedType => "INVALID_EMBED_TYPE",
            Error::OptionsWithIframe => "OPTIONS_WITH_IFRAME",
            Error::InvalidTagName(_) => "INVALID_TAG_NAME",
            Error::InvalidAspectRatio(_) => "INVALID_ASPECT_RATIO",
            Error::InvalidRefNodeInsert => "INVALID_REF_NODE_INSERT",
            Error::ScriptDownload { .. } => "SCRIPT_DOWNLOAD",
            Error::MissingPlayerFunction { .. } => "MISSING_PLAYER_FUNCTION",
            Error::PlayerInit { .. } => "PLAYER_INIT",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(Error::AccountIdRequired.is_validation());
        assert!(Error::InvalidTagName("audio".into()).is_validation());
        assert!(!Error::MissingPlayerFunction { player_id: "p".into() }.is_validation());
    }

    #[test]
    fn test_messages() {
        assert_eq!(Error::AccountIdRequired.to_string(), "accountId is required");
        assert_eq!(
            Error::InvalidAspectRatio("4x3".into()).to_string(),
            "embedOptions.responsive.aspectRatio must be in the \"n:n\" format (value: \"4x3\")"
        );

        let err = Error::ScriptDownload {
            url: "https://cdn.example/x.js".into(),
            source: ScriptError::Unavailable("offline".into()),
        };
        assert_eq!(err.to_string(), "player script could not be downloaded");
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "SCRIPT_DOWNLOAD");
    }
}
