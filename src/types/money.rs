//! Money and currency types for the group ledger engine
//!
//! All ledger arithmetic operates on integer minor units (e.g. pence) so that
//! balance updates commute and never lose precision. Conversion to and from
//! display form happens only at the boundary, via [`rust_decimal`], and is the
//! single place where rounding occurs.

use crate::types::error::LedgerError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Signed amount in minor units of the group's currency
///
/// Positive balances mean the rest of the group owes this member money,
/// negative balances mean this member owes the group.
pub type Amount = i64;

/// Currencies supported by the ledger
///
/// A group's currency is fixed at creation. The serialized form is the
/// lowercase ISO-ish code used as the stored field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// Pound Sterling
    Gbp,
    /// US Dollar
    Usd,
    /// Euro
    Eur,
}

/// Static per-currency display style
///
/// Extensible table entry: adding a currency means adding one constant here
/// and one match arm in [`Currency::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyInfo {
    /// Human-readable currency name
    pub name: &'static str,
    /// Symbol placed before the formatted amount
    pub symbol: &'static str,
    /// Number of minor-unit decimal places
    pub decimals: u32,
}

const GBP_INFO: CurrencyInfo = CurrencyInfo {
    name: "Pound Sterling",
    symbol: "\u{a3}",
    decimals: 2,
};

const USD_INFO: CurrencyInfo = CurrencyInfo {
    name: "US Dollar",
    symbol: "$",
    decimals: 2,
};

const EUR_INFO: CurrencyInfo = CurrencyInfo {
    name: "Euro",
    symbol: "\u{20ac}",
    decimals: 2,
};

impl Currency {
    /// Look up the static display style for this currency
    pub fn info(self) -> &'static CurrencyInfo {
        match self {
            Currency::Gbp => &GBP_INFO,
            Currency::Usd => &USD_INFO,
            Currency::Eur => &EUR_INFO,
        }
    }

    /// Number of minor-unit decimal places for this currency
    pub fn decimals(self) -> u32 {
        self.info().decimals
    }

    /// The stored lowercase code for this currency
    pub fn code(self) -> &'static str {
        match self {
            Currency::Gbp => "gbp",
            Currency::Usd => "usd",
            Currency::Eur => "eur",
        }
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gbp" => Ok(Currency::Gbp),
            "usd" => Ok(Currency::Usd),
            "eur" => Ok(Currency::Eur),
            other => Err(LedgerError::ParseError {
                line: None,
                message: format!("unknown currency '{other}'"),
            }),
        }
    }
}

/// Convert a display amount to integer minor units
///
/// Multiplies by `10^decimals` and rounds to the nearest integer (midpoints
/// away from zero). Rounding to nearest rather than truncating avoids a
/// systematic downward bias when users type amounts with more precision than
/// the currency carries.
///
/// # Arguments
///
/// * `display` - The amount in major units, e.g. `12.34`
/// * `currency` - Currency whose precision to scale by
///
/// # Errors
///
/// Returns [`LedgerError::InvalidAmount`] if the scaled value does not fit in
/// an [`Amount`].
pub fn to_minor_units(display: Decimal, currency: Currency) -> Result<Amount, LedgerError> {
    let scale = Decimal::from(10_i64.pow(currency.decimals()));

    let scaled = display
        .checked_mul(scale)
        .ok_or_else(|| LedgerError::invalid_amount(&display.to_string()))?;

    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| LedgerError::invalid_amount(&display.to_string()))
}

/// Format integer minor units for display
///
/// Produces a sign prefix for negative values, the currency symbol, then the
/// amount with exactly `decimals` places. An amount of exactly zero carries
/// no sign.
pub fn to_display(minor: Amount, currency: Currency) -> String {
    let info = currency.info();
    let sign = if minor < 0 { "-" } else { "" };
    let magnitude = Decimal::from_i128_with_scale(minor.unsigned_abs() as i128, info.decimals);
    format!("{}{}{}", sign, info.symbol, magnitude)
}

/// Parse a display string into integer minor units
///
/// Accepts an optional leading sign, an optional currency symbol, and a
/// decimal literal: `"12.34"`, `"-£3.50"`, `"+0.05"`.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidAmount`] if the remainder is not a valid
/// decimal number or overflows an [`Amount`].
pub fn parse_amount(s: &str, currency: Currency) -> Result<Amount, LedgerError> {
    let trimmed = s.trim();

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let bare = unsigned
        .strip_prefix(currency.info().symbol)
        .unwrap_or(unsigned);

    // The sign was consumed above; a second one ("--1", "£-1") is malformed.
    if bare.starts_with(['+', '-']) {
        return Err(LedgerError::invalid_amount(s));
    }

    let mut value = Decimal::from_str(bare).map_err(|_| LedgerError::invalid_amount(s))?;
    if negative {
        value = -value;
    }

    to_minor_units(value, currency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::whole("12", Currency::Gbp, 1200)]
    #[case::two_places("12.34", Currency::Usd, 1234)]
    #[case::rounds_up("0.005", Currency::Gbp, 1)]
    #[case::rounds_down("0.004", Currency::Gbp, 0)]
    #[case::rounds_negative_away("-0.005", Currency::Eur, -1)]
    #[case::excess_precision("1.999", Currency::Gbp, 200)]
    fn test_to_minor_units_rounds_to_nearest(
        #[case] display: &str,
        #[case] currency: Currency,
        #[case] expected: Amount,
    ) {
        let value = Decimal::from_str(display).unwrap();
        assert_eq!(to_minor_units(value, currency).unwrap(), expected);
    }

    #[rstest]
    #[case::positive(150, Currency::Gbp, "\u{a3}1.50")]
    #[case::negative(-150, Currency::Gbp, "-\u{a3}1.50")]
    #[case::zero_has_no_sign(0, Currency::Usd, "$0.00")]
    #[case::sub_unit(5, Currency::Eur, "\u{20ac}0.05")]
    #[case::large(1234567, Currency::Usd, "$12345.67")]
    fn test_to_display(#[case] minor: Amount, #[case] currency: Currency, #[case] expected: &str) {
        assert_eq!(to_display(minor, currency), expected);
    }

    #[rstest]
    #[case::plain("12.34", 1234)]
    #[case::symbol("\u{a3}12.34", 1234)]
    #[case::negative_symbol("-\u{a3}3.50", -350)]
    #[case::positive_sign("+0.05", 5)]
    #[case::whitespace("  2.00  ", 200)]
    fn test_parse_amount(#[case] input: &str, #[case] expected: Amount) {
        assert_eq!(parse_amount(input, Currency::Gbp).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::letters("abc")]
    #[case::double_sign("--1.0")]
    #[case::wrong_symbol_position("1\u{a3}2")]
    fn test_parse_amount_rejects_invalid(#[case] input: &str) {
        let result = parse_amount(input, Currency::Gbp);
        assert!(matches!(result, Err(LedgerError::InvalidAmount { .. })));
    }

    #[test]
    fn test_round_trip_preserves_minor_units() {
        for minor in [-12345, -1, 0, 1, 99, 100, 123456] {
            let displayed = to_display(minor, Currency::Gbp);
            assert_eq!(parse_amount(&displayed, Currency::Gbp).unwrap(), minor);
        }
    }

    #[test]
    fn test_currency_codes_match_info_table() {
        for currency in [Currency::Gbp, Currency::Usd, Currency::Eur] {
            assert_eq!(currency.code().parse::<Currency>().unwrap(), currency);
            assert_eq!(currency.decimals(), 2);
        }
    }
}
