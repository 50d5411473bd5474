//! Exchange-rate rows, provider quotes and conversion messages.

use crate::errors::RateError;
use chrono::{DateTime, Utc};
use common::types::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One time-windowed rate for a currency pair.
///
/// `rate` is the number of `target_currency` units per one `base_currency`
/// unit. The window is `[valid_from, valid_to)`; `valid_to = None` means
/// open-ended. `actual` marks the row used as the current-rate fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base_currency: CurrencyCode,
    pub target_currency: CurrencyCode,
    pub rate: Decimal,
    pub valid_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual: bool,
}

impl ExchangeRate {
    /// Build a validated row.
    ///
    /// # Errors
    ///
    /// Returns `RateError::InvalidRate` if the currencies are equal, the rate
    /// is not positive, or `valid_to` does not come after `valid_from`.
    pub fn new(
        base_currency: CurrencyCode,
        target_currency: CurrencyCode,
        rate: Decimal,
        valid_from: DateTime<Utc>,
        valid_to: Option<DateTime<Utc>>,
        actual: bool,
    ) -> Result<Self, RateError> {
        let row = Self {
            base_currency,
            target_currency,
            rate,
            valid_from,
            valid_to,
            actual,
        };
        row.validate()?;
        Ok(row)
    }

    /// Check the row invariants.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn validate(&self) -> Result<(), RateError> {
        if self.base_currency == self.target_currency {
            return Err(RateError::InvalidRate(format!(
                "base and target are both {}",
                self.base_currency
            )));
        }
        if self.rate <= Decimal::ZERO {
            return Err(RateError::InvalidRate(format!(
                "{}/{} rate must be positive, got {}",
                self.base_currency, self.target_currency, self.rate
            )));
        }
        if let Some(valid_to) = self.valid_to {
            if valid_to <= self.valid_from {
                return Err(RateError::InvalidRate(format!(
                    "{}/{} window ends before it starts",
                    self.base_currency, self.target_currency
                )));
            }
        }
        Ok(())
    }

    /// Whether `date` falls inside `[valid_from, valid_to)`.
    #[must_use]
    pub fn covers(&self, date: DateTime<Utc>) -> bool {
        self.valid_from <= date && self.valid_to.map_or(true, |end| end > date)
    }

    #[must_use]
    pub fn pair(&self) -> (CurrencyCode, CurrencyCode) {
        (self.base_currency, self.target_currency)
    }
}

/// A current rate as reported by the upstream provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub base: CurrencyCode,
    pub target: CurrencyCode,
    pub rate: Decimal,
}

/// An amount to convert, as received from the message source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub id: String,
    pub amount: Decimal,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    /// Transaction date; selects the historical rate.
    pub date: DateTime<Utc>,
}

/// Result of handling one [`ConversionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Converted { id: String, amount: Decimal },
    Failed { id: String, reason: String },
}

impl ConversionOutcome {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            ConversionOutcome::Converted { id, .. } | ConversionOutcome::Failed { id, .. } => id,
        }
    }
}
