//! # Money Module
//!
//! Currency-aware conversion, rounding, and the `Money` type.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In many billing systems:                                               │
//! │    $994.00 × 5% computed in display units drifts a cent per rate,      │
//! │    and a ten-rate invoice drifts a dime.                                │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    Every rate application happens on i64 minor units with one          │
//! │    explicit rounding rule; decimal display values exist only at        │
//! │    the input/output boundary.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Rules
//! - Percent rates round **half-up** (825 bps on $10.00 → $0.83)
//! - Inclusive taxes round **up** (ceiling, in favor of the tax authority)
//! - Normalization of decimal display amounts rounds half-up to the
//!   currency's minor unit
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Currency, Money};
//!
//! let usd = Currency::from_code("USD").unwrap();
//! let price = Money::from_minor(usd.normalize(10.99).unwrap());
//! assert_eq!(price.minor(), 1099);
//!
//! // NEVER do this:
//! // let bad = price.minor() as f64 * 0.0825; // float math is forbidden!
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::BPS_SCALE;

// =============================================================================
// Currency Table
// =============================================================================

/// Minor-unit exponents per ISO 4217 code.
///
/// The exponent is configuration, not code: 0-decimal (JPY), 2-decimal
/// (USD) and 3-decimal (BHD) currencies all flow through the same
/// rounding rules, scaled by this table.
const CURRENCY_TABLE: &[(&str, u32)] = &[
    // 0-decimal currencies
    ("CLP", 0),
    ("ISK", 0),
    ("JPY", 0),
    ("KRW", 0),
    ("VND", 0),
    // 3-decimal currencies
    ("BHD", 3),
    ("IQD", 3),
    ("JOD", 3),
    ("KWD", 3),
    ("LYD", 3),
    ("OMR", 3),
    ("TND", 3),
    // 2-decimal currencies
    ("AED", 2),
    ("AUD", 2),
    ("BRL", 2),
    ("CAD", 2),
    ("CHF", 2),
    ("CNY", 2),
    ("CZK", 2),
    ("DKK", 2),
    ("EUR", 2),
    ("GBP", 2),
    ("HKD", 2),
    ("HUF", 2),
    ("ILS", 2),
    ("INR", 2),
    ("MXN", 2),
    ("NOK", 2),
    ("NZD", 2),
    ("PLN", 2),
    ("SAR", 2),
    ("SEK", 2),
    ("SGD", 2),
    ("TRY", 2),
    ("USD", 2),
    ("ZAR", 2),
];

// =============================================================================
// Currency
// =============================================================================

/// A currency with its minor-unit exponent, resolved from the table.
///
/// ## Design Decisions
/// - **Copy**: two machine words, passed by value everywhere
/// - **No public constructor from parts**: the only way in is
///   [`Currency::from_code`], so an unknown code can never be smuggled
///   past the boundary with a guessed exponent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    code: &'static str,
    exponent: u32,
}

impl Currency {
    /// Resolves a currency from its ISO code (case-insensitive).
    ///
    /// ## Failure
    /// Unknown codes are a fatal input error. The engines refuse to
    /// guess an exponent: a wrong guess silently mis-scales every
    /// amount on a document.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Currency;
    ///
    /// assert!(Currency::from_code("usd").is_ok());
    /// assert!(Currency::from_code("DOGE").is_err());
    /// ```
    pub fn from_code(code: &str) -> CoreResult<Self> {
        let upper = code.trim().to_ascii_uppercase();
        CURRENCY_TABLE
            .iter()
            .find(|(c, _)| *c == upper)
            .map(|(c, exponent)| Currency {
                code: c,
                exponent: *exponent,
            })
            .ok_or_else(|| CoreError::UnknownCurrency(code.to_string()))
    }

    /// The ISO 4217 code.
    #[inline]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// The minor-unit exponent (2 for USD, 0 for JPY, 3 for BHD).
    #[inline]
    pub const fn exponent(&self) -> u32 {
        self.exponent
    }

    /// Minor units per major unit (100 for USD, 1 for JPY).
    #[inline]
    pub const fn unit_scale(&self) -> i64 {
        10i64.pow(self.exponent)
    }

    /// Converts a decimal display amount into minor units, half-up.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Currency;
    ///
    /// let usd = Currency::from_code("USD").unwrap();
    /// assert_eq!(usd.normalize(10.99).unwrap(), 1099);
    /// assert_eq!(usd.normalize(1.005).unwrap(), 101);
    ///
    /// let jpy = Currency::from_code("JPY").unwrap();
    /// assert_eq!(jpy.normalize(10.99).unwrap(), 11);
    /// ```
    pub fn normalize(&self, amount: f64) -> CoreResult<i64> {
        if !amount.is_finite() {
            return Err(CoreError::NonFiniteAmount {
                field: "amount".to_string(),
            });
        }
        let scaled = amount * self.unit_scale() as f64;
        if scaled.abs() >= i64::MAX as f64 / 2.0 {
            return Err(CoreError::AmountOverflow {
                context: format!("normalize {amount} {}", self.code),
            });
        }
        // Half-up on the absolute value; the 1e-9 nudge keeps values
        // whose binary representation sits a hair below the .5
        // boundary (e.g. 1.005 * 100 = 100.49999...) on the up side.
        let minor = (scaled.abs() + 0.5 + 1e-9).floor() as i64;
        Ok(if amount.is_sign_negative() { -minor } else { minor })
    }

    /// Converts minor units back to a decimal display amount.
    ///
    /// Inverse of [`Currency::normalize`] up to one minor unit of
    /// rounding error.
    #[inline]
    pub fn denormalize(&self, minor: i64) -> f64 {
        minor as f64 / self.unit_scale() as f64
    }

    /// Rounds a decimal display amount to this currency's granularity.
    ///
    /// Used by callers after display-unit math to stop fractional
    /// cents compounding; the engines themselves never need it because
    /// they stay in minor units.
    pub fn round(&self, amount: f64) -> CoreResult<f64> {
        Ok(self.denormalize(self.normalize(amount)?))
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor currency units (cents for USD).
///
/// ## Design Decisions
/// - **i64 (signed)**: credit notes and discounts go negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Currency-blind**: the currency travels separately (on the
///   document or session); mixing currencies is prevented at the
///   session boundary, not per-addition
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps the value to `[-cap, cap]`.
    #[inline]
    pub fn clamp_abs(&self, cap: i64) -> Self {
        Money(self.0.clamp(-cap, cap))
    }

    /// Applies a basis-point rate, rounding half-up.
    ///
    /// ## Implementation
    /// Integer math in i128 to prevent overflow on large amounts:
    /// `(minor * bps + 5000) / 10000`. The +5000 provides the half-up
    /// rounding (5000/10000 = 0.5).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// // $994.00 × 2% = $19.88
    /// assert_eq!(Money::from_minor(99_400).apply_bps(200).minor(), 1_988);
    /// // $924.30 × 5% = $46.215 → $46.22
    /// assert_eq!(Money::from_minor(92_430).apply_bps(500).minor(), 4_622);
    /// ```
    pub fn apply_bps(&self, bps: i64) -> Money {
        let raw = (self.0 as i128 * bps as i128 + 5000) / (BPS_SCALE as i128);
        Money(raw as i64)
    }

    /// Back-solves an inclusive tax from a tax-inclusive base.
    ///
    /// For a base `b` carrying a percent rate `r` inside the price,
    /// the tax portion is `ceil(b·r/(1+r))` - rounded up, in favor of
    /// the tax authority. The invariant `tax + ex_tax == b` holds by
    /// construction.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// // $100.00 inclusive of 10%: tax $9.10, ex-tax $90.90
    /// let tax = Money::from_minor(10_000).inclusive_tax_bps(1_000);
    /// assert_eq!(tax.minor(), 910);
    /// ```
    pub fn inclusive_tax_bps(&self, bps: i64) -> Money {
        if self.0 <= 0 || bps <= 0 {
            return Money::zero();
        }
        let num = self.0 as i128 * bps as i128;
        let den = (BPS_SCALE + bps) as i128;
        Money(((num + den - 1) / den) as i64)
    }

    /// Formats the amount per the currency's exponent, for logs and
    /// debugging. UI formatting (symbols, locales) is the frontend's job.
    pub fn format(&self, currency: Currency) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = currency.unit_scale() as u64;
        if scale == 1 {
            return format!("{sign}{abs} {}", currency.code());
        }
        let major = abs / scale;
        let minor = abs % scale;
        format!(
            "{sign}{major}.{minor:0width$} {}",
            currency.code(),
            width = currency.exponent() as usize
        )
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

// =============================================================================
// Locale-Aware Number Parsing
// =============================================================================

/// Decimal/thousands separator configuration for parsing user-typed
/// quantities and unit costs.
///
/// The billing frontend renders numbers per the tenant's locale
/// ("1.234,56" in much of Europe); the calculator receives those
/// strings verbatim and must parse them with the same separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NumberFormat {
    /// Separator between integer and fractional digits.
    pub decimal_separator: char,
    /// Grouping separator, stripped before parsing.
    pub thousands_separator: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat {
            decimal_separator: '.',
            thousands_separator: ',',
        }
    }
}

impl NumberFormat {
    /// Parses a locale-formatted decimal string into a fixed-point
    /// integer with `scale` fractional digits, rounding half-up on the
    /// first dropped digit.
    ///
    /// Returns `None` for anything unparseable; the calculator treats
    /// that as zero (a half-typed line contributes nothing rather than
    /// aborting the whole document).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::NumberFormat;
    ///
    /// let us = NumberFormat::default();
    /// assert_eq!(us.parse_scaled("1,234.56", 2), Some(123_456));
    /// assert_eq!(us.parse_scaled("2.5", 6), Some(2_500_000));
    /// assert_eq!(us.parse_scaled("0.005", 2), Some(1));
    /// assert_eq!(us.parse_scaled("abc", 2), None);
    /// ```
    pub fn parse_scaled(&self, input: &str, scale: u32) -> Option<i64> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let cleaned: String = rest
            .chars()
            .filter(|&c| c != self.thousands_separator && c != ' ')
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        let mut parts = cleaned.split(self.decimal_separator);
        let int_str = parts.next()?;
        let frac_str = parts.next().unwrap_or("");
        if parts.next().is_some() {
            return None;
        }
        if int_str.is_empty() && frac_str.is_empty() {
            return None;
        }
        if !int_str.chars().all(|c| c.is_ascii_digit())
            || !frac_str.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let int_part: i64 = if int_str.is_empty() {
            0
        } else {
            int_str.parse().ok()?
        };

        let digits: Vec<u32> = frac_str.chars().filter_map(|c| c.to_digit(10)).collect();
        let mut frac: i64 = 0;
        for i in 0..scale as usize {
            frac = frac * 10 + digits.get(i).copied().unwrap_or(0) as i64;
        }
        if digits.get(scale as usize).is_some_and(|&d| d >= 5) {
            frac += 1;
        }

        let pow = 10i64.checked_pow(scale)?;
        let total = int_part.checked_mul(pow)?.checked_add(frac)?;
        Some(if negative { -total } else { total })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
