//! Loading and validation failures.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be produced.
///
/// Parse failures from either file format collapse into [`ConfigError::Parse`]
/// so callers only match on where the problem came from.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("no config file at {}", path.display())]
    MissingFile {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read config file {}", path.display())]
    Unreadable {
        /// Path that failed.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// TOML or JSON content did not match the schema.
    #[error("malformed {format} config: {message}")]
    Parse {
        /// `toml` or `json`.
        format: &'static str,
        /// Parser message, including the offending key when known.
        message: String,
    },

    /// The format could not be told from the file extension or argument.
    #[error("unsupported config format {0:?}")]
    UnsupportedFormat(String),

    /// A value parsed but is not acceptable.
    #[error("{field}: {reason}")]
    Invalid {
        /// Dotted field path, e.g. `server.http_addr`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A value this environment cannot run without.
    #[error("{field} must be set")]
    Required {
        /// Dotted field path.
        field: String,
    },

    /// A `UTILISYNC__*` override could not be applied.
    #[error("override {var} rejected: {reason}")]
    Override {
        /// Environment variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A `.env` file exists but is malformed.
    #[error(".env: {0}")]
    Dotenv(String),
}

impl ConfigError {
    pub(crate) fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingFile { path: path.into() }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn rejected(var: &str, reason: impl Into<String>) -> Self {
        Self::Override {
            var: var.to_string(),
            reason: reason.into(),
        }
    }

    /// Dotted path of the offending field, for validation failures.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } | Self::Required { field } => Some(field),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse {
            format: "toml",
            message: err.message().to_string(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            format: "json",
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_carry_field() {
        let err = ConfigError::invalid("server.http_addr", "invalid socket address: nope");
        assert_eq!(err.to_string(), "server.http_addr: invalid socket address: nope");
        assert_eq!(err.field(), Some("server.http_addr"));

        let err = ConfigError::required("auth.signing_key");
        assert_eq!(err.to_string(), "auth.signing_key must be set");
        assert_eq!(err.field(), Some("auth.signing_key"));
    }

    #[test]
    fn test_override_message_names_variable() {
        let err = ConfigError::rejected("UTILISYNC__SERVER__HTTPS_ONLY", "expected boolean");
        assert_eq!(
            err.to_string(),
            "override UTILISYNC__SERVER__HTTPS_ONLY rejected: expected boolean"
        );
        assert!(err.field().is_none());
    }

    #[test]
    fn test_parse_errors_from_both_formats() {
        let toml_err = toml::from_str::<toml::Value>("a = ").expect_err("bad toml");
        let err = ConfigError::from(toml_err);
        assert!(matches!(err, ConfigError::Parse { format: "toml", .. }));

        let json_err = serde_json::from_str::<serde_json::Value>("{").expect_err("bad json");
        let err = ConfigError::from(json_err);
        assert!(err.to_string().starts_with("malformed json config"));
    }
}
