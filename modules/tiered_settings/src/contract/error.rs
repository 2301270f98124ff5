//! Contract error types for tiered settings
//!
//! These errors are transport-agnostic; the REST layer maps them onto status codes
//! through [`SettingsError::class`].

use thiserror::Error;

/// A settings tree whose declaration is broken. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// A group contains itself, directly or through its descendants
    #[error("settings group `{type_name}` at `{path}` contains itself")]
    CyclicGroup {
        path: String,
        type_name: &'static str,
    },
    /// Two members of one group share a name
    #[error("member `{member}` is declared more than once in group `{group}`")]
    DuplicateMember { group: String, member: String },
    /// Two leaves resolve to the same dotted name
    #[error("setting `{name}` is declared more than once")]
    DuplicateSetting { name: String },
    /// Two default rules target the same coordinate
    #[error("setting `{name}` declares more than one default for {coordinate}")]
    DuplicateRule { name: String, coordinate: String },
    /// A default (global or tiered) does not parse or violates the constraint
    #[error("default `{value}` of setting `{name}` is invalid: {reason}")]
    InvalidDefault {
        name: String,
        value: String,
        reason: String,
    },
    /// The declared constraint is not a usable JSON Schema
    #[error("constraint of setting `{name}` is invalid: {reason}")]
    InvalidConstraint { name: String, reason: String },
}

/// Tiered settings errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("invalid setting name specified")]
    MissingSettingName,

    #[error("unknown setting `{name}`")]
    UnknownSetting { name: String },

    #[error("invalid data center specified: `{value}`")]
    UnknownDataCenter { value: String },

    #[error("setting `{name}` does not allow overrides on tier {tier} in {data_center}")]
    OverrideNotAllowed {
        name: String,
        tier: String,
        data_center: String,
    },

    #[error("\"{value}\" is an invalid value for setting `{name}`: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("settings store failure: {message}")]
    Store { message: String },

    #[error("settings store timed out during {operation}")]
    StoreTimeout { operation: &'static str },

    #[error("no settings registered for `{settings_type}`")]
    NotRegistered { settings_type: &'static str },

    #[error("settings group `{type_name}` is not part of the settings tree")]
    UnknownGroup { type_name: &'static str },

    #[error("settings group `{type_name}` is not located at `{path}`")]
    UnknownGroupPath {
        type_name: &'static str,
        path: String,
    },

    #[error("settings group `{type_name}` appears at several paths: {paths}")]
    AmbiguousGroup {
        type_name: &'static str,
        paths: String,
    },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Coarse error classification used by callers and the HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Definition,
    Validation,
    Permission,
    Format,
    Store,
    Lookup,
    Internal,
}

impl SettingsError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingSettingName | Self::UnknownSetting { .. } | Self::UnknownDataCenter { .. } => {
                ErrorClass::Validation
            }
            Self::OverrideNotAllowed { .. } => ErrorClass::Permission,
            Self::InvalidValue { .. } => ErrorClass::Format,
            Self::Store { .. } | Self::StoreTimeout { .. } => ErrorClass::Store,
            Self::NotRegistered { .. }
            | Self::UnknownGroup { .. }
            | Self::UnknownGroupPath { .. }
            | Self::AmbiguousGroup { .. } => ErrorClass::Lookup,
            Self::Definition(_) | Self::Config { .. } => ErrorClass::Definition,
            Self::Internal { .. } => ErrorClass::Internal,
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
