//! Currency, date and rate-history fixtures.

use chrono::{DateTime, TimeZone, Utc};
use common::types::CurrencyCode;
use rate_service::{ConversionRequest, ExchangeRate, RateQuote};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Currency code from a literal.
pub fn code(s: &str) -> CurrencyCode {
    CurrencyCode::new(s).unwrap()
}

/// Decimal from a literal.
pub fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Midnight UTC on the given day.
pub fn utc_date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// EUR/USD history: 1.10 for Jan 1-10 2024, then 1.12 open-ended (actual).
pub fn eur_usd_history() -> Vec<ExchangeRate> {
    vec![
        ExchangeRate::new(
            code("EUR"),
            code("USD"),
            decimal("1.10"),
            utc_date(2024, 1, 1),
            Some(utc_date(2024, 1, 10)),
            false,
        )
        .unwrap(),
        ExchangeRate::new(
            code("EUR"),
            code("USD"),
            decimal("1.12"),
            utc_date(2024, 1, 10),
            None,
            true,
        )
        .unwrap(),
    ]
}

pub fn quote(base: &str, target: &str, rate: &str) -> RateQuote {
    RateQuote {
        base: code(base),
        target: code(target),
        rate: decimal(rate),
    }
}

pub fn conversion_request(
    id: &str,
    amount: &str,
    from: &str,
    to: &str,
    date: DateTime<Utc>,
) -> ConversionRequest {
    ConversionRequest {
        id: id.to_string(),
        amount: decimal(amount),
        from: code(from),
        to: code(to),
        date,
    }
}
