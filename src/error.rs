//! Custom error types for typeassist.
//!
//! Run-time typing failures never surface through these as return values of
//! the control operations; they are reported through the status channel. The
//! only synchronous failure of `Controller::start` is [`TypeAssistError::EmptyInput`].

use std::io;
use thiserror::Error;

/// Main error type for typeassist operations.
#[derive(Error, Debug)]
pub enum TypeAssistError {
    /// Start was requested with no effective text.
    #[error("no text to type: please paste or type text first")]
    EmptyInput,

    /// The injection primitive failed for a character.
    #[error("failed to type {ch:?}: {reason}")]
    Injection { ch: char, reason: String },

    /// The platform input layer could not be initialised.
    #[error("failed to initialise keyboard input: {0}")]
    InjectorInit(String),

    /// Configuration validation error.
    #[error("configuration error: {0}")]
    ConfigValidation(String),

    /// Error reading or parsing configuration file.
    #[error("failed to load config from '{path}': {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Error writing configuration file.
    #[error("failed to save config to '{path}': {reason}")]
    ConfigSave { path: String, reason: String },

    /// Error parsing duration string.
    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// Error parsing or registering a hotkey.
    #[error("hotkey error: {0}")]
    Hotkey(String),

    /// The release feed answered with something other than a release.
    #[error("update check failed: {0}")]
    UpdateCheck(String),

    /// The release has no asset that can be downloaded.
    #[error("release {tag} has no downloadable asset")]
    NoDownloadableAsset { tag: String },

    /// The clipboard could not be read or held no text.
    #[error("clipboard error: {0}")]
    Clipboard(String),

    /// No tokio runtime was available to schedule runs on.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for typeassist operations.
pub type Result<T> = std::result::Result<T, TypeAssistError>;

impl TypeAssistError {
    /// Create a new Injection error.
    pub fn injection(ch: char, reason: impl Into<String>) -> Self {
        Self::Injection {
            ch,
            reason: reason.into(),
        }
    }

    /// Create a new InjectorInit error.
    pub fn injector_init(message: impl Into<String>) -> Self {
        Self::InjectorInit(message.into())
    }

    /// Create a new ConfigValidation error.
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation(message.into())
    }

    /// Create a new ConfigLoad error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new ConfigSave error.
    pub fn config_save(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigSave {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new InvalidDuration error.
    pub fn invalid_duration(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a new Hotkey error.
    pub fn hotkey(message: impl Into<String>) -> Self {
        Self::Hotkey(message.into())
    }

    /// Create a new UpdateCheck error.
    pub fn update_check(message: impl Into<String>) -> Self {
        Self::UpdateCheck(message.into())
    }

    /// Create a new Clipboard error.
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard(message.into())
    }

    /// Create a new NoDownloadableAsset error.
    pub fn no_downloadable_asset(tag: impl Into<String>) -> Self {
        Self::NoDownloadableAsset { tag: tag.into() }
    }

    /// Create a new Runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypeAssistError::injection('x', "display closed");
        assert_eq!(err.to_string(), "failed to type 'x': display closed");

        let err = TypeAssistError::config_validation("speed must be between 1 and 100");
        assert_eq!(
            err.to_string(),
            "configuration error: speed must be between 1 and 100"
        );

        let err = TypeAssistError::no_downloadable_asset("1.2.0");
        assert_eq!(err.to_string(), "release 1.2.0 has no downloadable asset");
    }

    #[test]
    fn test_empty_input_message() {
        assert!(TypeAssistError::EmptyInput
            .to_string()
            .contains("please paste or type text first"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: TypeAssistError = io_err.into();
        assert!(matches!(err, TypeAssistError::Io(_)));
    }
}
