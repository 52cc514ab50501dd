//! Option-set and money attribute wrappers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer-backed choice value as stored by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSetValue(pub i32);

impl OptionSetValue {
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for OptionSetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub f64);

impl Money {
    #[must_use]
    pub const fn new(amount: f64) -> Self {
        Self(amount)
    }

    #[must_use]
    pub const fn amount(&self) -> f64 {
        self.0
    }
}

/// Implemented by strongly typed enums that mirror a platform option set.
///
/// Such values are normalized to [`OptionSetValue`] before they are compared
/// with stored attributes.
pub trait OptionSetEnum: Copy {
    /// The integer option value of this variant.
    fn option_value(self) -> i32;

    /// Wraps the variant in an [`OptionSetValue`].
    fn to_option_set(self) -> OptionSetValue {
        OptionSetValue(self.option_value())
    }
}
