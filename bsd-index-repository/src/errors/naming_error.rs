//! Errors of the physical index naming grammar.

use thiserror::Error;

/// A name component or a physical index name that breaks the naming grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("Index {component} must not be empty")]
    EmptyComponent { component: &'static str },

    #[error("Index {component} '{value}' contains the reserved separator '{separator}'")]
    ReservedSeparator {
        component: &'static str,
        value: String,
        separator: &'static str,
    },

    #[error("Index {component} '{value}' must be lower-case")]
    NotLowercase { component: &'static str, value: String },

    #[error("Invalid physical index name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}
