use crate::field_type::FieldTypeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument. {0}")]
    Validation(String),

    #[error("Cannot convert {found} into a value for a {expected} field")]
    TypeConversion {
        expected: FieldTypeId,
        found: &'static str,
    },

    #[error("Cannot modify {0}: it is frozen")]
    Frozen(&'static str),

    #[error("Cannot create {what}. {reason}")]
    Creation { what: &'static str, reason: String },

    #[error("No {what} named '{key}'")]
    NotFound { what: &'static str, key: String },

    #[error("Default clock snapshot mismatch for {message} message. {reason}")]
    Consistency {
        message: &'static str,
        reason: &'static str,
    },

    #[error("Operation not supported: {0}")]
    NotImplemented(&'static str),

    #[error("Unexpected message sequence. {0}")]
    Sequence(String),

    #[error("Encountered an IO error while reading the configuration. {0}")]
    Io(#[from] std::io::Error),

    #[error("Encountered an error parsing the configuration. {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration. {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn not_found<K: ToString>(what: &'static str, key: K) -> Self {
        Error::NotFound {
            what,
            key: key.to_string(),
        }
    }

    pub(crate) fn creation<S: Into<String>>(what: &'static str, reason: S) -> Self {
        Error::Creation {
            what,
            reason: reason.into(),
        }
    }
}
