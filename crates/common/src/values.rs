//! Validated value objects for order input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a value object refuses its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(i64),

    #[error("quantity {0} is too large")]
    QuantityOutOfRange(i64),

    #[error("shipping address must not be empty")]
    EmptyShippingAddress,
}

/// Number of units ordered. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct Quantity(i32);

impl Quantity {
    /// Validates and wraps a quantity.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value <= 0 {
            return Err(ValidationError::NonPositiveQuantity(value));
        }
        let value = i32::try_from(value).map_err(|_| ValidationError::QuantityOutOfRange(value))?;
        Ok(Self(value))
    }

    /// Returns the quantity as stored.
    pub fn get(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination address for an order. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShippingAddress(String);

impl ShippingAddress {
    /// Validates and wraps an address.
    pub fn new(address: impl Into<String>) -> Result<Self, ValidationError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(ValidationError::EmptyShippingAddress);
        }
        Ok(Self(address))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShippingAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShippingAddress> for String {
    fn from(address: ShippingAddress) -> Self {
        address.0
    }
}

impl AsRef<str> for ShippingAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
