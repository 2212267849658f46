use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest quantity the inventory service accepts for an item.
pub const MIN_QUANTITY: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(rename = "item_name")]
    pub name: String,
    pub quantity: i64,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, quantity: i64) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("item name must not be empty")]
    EmptyName,
    #[error("quantity must be at least {MIN_QUANTITY}, got {0}")]
    QuantityTooLow(i64),
}

/// Returns the name with surrounding whitespace removed, rejecting blank names.
pub fn validate_name(name: &str) -> Result<&str, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name)
}

pub fn validate_quantity(quantity: i64) -> Result<i64, ValidationError> {
    if quantity < MIN_QUANTITY {
        return Err(ValidationError::QuantityTooLow(quantity));
    }
    Ok(quantity)
}
