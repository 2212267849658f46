use std::fmt;

use shared::domain::ValidationError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a single store operation. None of these are fatal to the
/// session; the cache is left as it was before the operation started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("inventory service unreachable: {0}")]
    Transport(String),
    #[error("inventory service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("invalid input: {0}")]
    Validation(String),
}

impl StoreError {
    pub fn unknown_item(name: &str) -> Self {
        Self::Validation(format!("item '{name}' is not in the inventory"))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Store operation named in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Add,
    Remove,
    SetQuantity,
    SuggestRecipes,
    Recipe,
    Simulate,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::SetQuantity => "set_quantity",
            Self::SuggestRecipes => "suggest_recipes",
            Self::Recipe => "recipe",
            Self::Simulate => "simulate",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
