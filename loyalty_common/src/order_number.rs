use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------     OrderNumber     ---------------------------------------------------------
/// An order (or withdrawal) identifier: a non-empty string of decimal digits that passes the Luhn checksum.
///
/// The only way to build one from untrusted input is via [`FromStr`] (or deserialization), both of which validate.
/// Values loaded from the database are trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderNumberError {
    #[error("Order number is empty")]
    Empty,
    #[error("Order number contains a non-digit character: {0:?}")]
    NonDigit(char),
    #[error("Order number {0} fails the Luhn checksum")]
    Checksum(String),
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl FromStr for OrderNumber {
    type Err = OrderNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(OrderNumberError::Empty);
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_digit()) {
            return Err(OrderNumberError::NonDigit(c));
        }
        if !luhn_checksum_valid(s) {
            return Err(OrderNumberError::Checksum(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl<'de> Deserialize<'de> for OrderNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mod-10 (Luhn) check over a string of ASCII digits. Returns false for empty input or any non-digit.
pub fn luhn_checksum_valid(digits: &str) -> bool {
    if digits.is_empty() {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in digits.bytes().rev().enumerate() {
        if !c.is_ascii_digit() {
            return false;
        }
        let mut d = u32::from(c - b'0');
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}
