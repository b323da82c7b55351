//! Hex quantity encoding used by the EVM RPC surface.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("expected a hex string, got {0}")]
    NotAString(String),

    #[error("missing 0x prefix in {0:?}")]
    MissingPrefix(String),

    #[error("invalid hex quantity {0:?}")]
    InvalidDigits(String),

    #[error("quantity {0:?} does not fit in {1} bits")]
    Overflow(String, u32),
}

pub fn to_quantity(value: u128) -> String {
    format!("{value:#x}")
}

pub fn parse_u128(value: &Value) -> Result<u128, QuantityError> {
    let text = value
        .as_str()
        .ok_or_else(|| QuantityError::NotAString(value.to_string()))?;
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(|| QuantityError::MissingPrefix(text.to_string()))?;
    if digits.is_empty() {
        return Err(QuantityError::InvalidDigits(text.to_string()));
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 32 {
        return Err(QuantityError::Overflow(text.to_string(), 128));
    }
    if significant.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(significant, 16).map_err(|_| QuantityError::InvalidDigits(text.to_string()))
}

pub fn parse_u64(value: &Value) -> Result<u64, QuantityError> {
    let wide = parse_u128(value)?;
    u64::try_from(wide).map_err(|_| QuantityError::Overflow(value.to_string(), 64))
}
