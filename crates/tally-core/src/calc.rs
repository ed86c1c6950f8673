//! # Invoice Calculation Engine
//!
//! Computes subtotal, discounts, taxes, shipping, total and balance
//! for one document, plus the ordered aggregate-rate breakdown.
//!
//! ## Calculation Waterfall
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Calculation Order (fixed)                           │
//! │                                                                         │
//! │  1. Prepare      parse locale strings, expand bare rate refs, cap      │
//! │  2. Per line     amount → discounts (running base) → taxes (fixed      │
//! │                  post-discount base; inclusive backs out of the price) │
//! │  3. Document     discounts (running base, minus excluded lines)        │
//! │                  → taxes (fixed discounted base, minus non-taxable)    │
//! │                  → shipping (additive, always last)                     │
//! │  4. Aggregate    bucket by rate identity, item-scope entries first     │
//! │  5. Balance      total − normalized amount_paid                         │
//! │  6. Denormalize  minor units → decimal display, output only            │
//! │                                                                         │
//! │  The order is not a style choice: discounts must shrink every          │
//! │  later tax base, and each step rounds once in minor units.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is a pure function over a snapshot. There is no reactive
//! graph: the caller re-invokes [`compute`] after any mutation.

use chrono::{DateTime, Utc};

use crate::document::{ComputedDocument, ComputedLineItem, Document};
use crate::error::CoreResult;
use crate::money::{Currency, Money, NumberFormat};
use crate::rates::{AggregateRate, AppliedRate, ComputedRate, RateKind};
use crate::validation;
use crate::{MAX_LINE_AMOUNT_MINOR, QUANTITY_PRECISION};

// =============================================================================
// Options
// =============================================================================

/// Snapshot context for one calculation pass.
#[derive(Debug, Clone, Copy)]
pub struct CalcOptions {
    /// Locale separators for parsing quantity/unit-cost strings.
    pub number_format: NumberFormat,
    /// Instant used to evaluate discount expiry.
    pub as_of: DateTime<Utc>,
}

impl CalcOptions {
    /// Builds options, rejecting a separator configuration that cannot
    /// be parsed unambiguously.
    pub fn new(number_format: NumberFormat, as_of: DateTime<Utc>) -> CoreResult<Self> {
        validation::validate_number_format(&number_format)?;
        Ok(CalcOptions {
            number_format,
            as_of,
        })
    }
}

impl Default for CalcOptions {
    fn default() -> Self {
        CalcOptions {
            number_format: NumberFormat::default(),
            as_of: Utc::now(),
        }
    }
}

// =============================================================================
// Aggregate bucketing
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Item,
    Subtotal,
}

/// Accumulates applied-rate amounts into per-rate buckets, preserving
/// first-seen insertion order for the display sort.
#[derive(Default)]
struct Aggregator {
    entries: Vec<BucketEntry>,
}

struct BucketEntry {
    kind: RateKind,
    rate_id: Option<i64>,
    name: String,
    total: Money,
    in_items: bool,
    in_subtotal: bool,
    order: usize,
}

impl Aggregator {
    fn add(&mut self, kind: RateKind, applied: &AppliedRate, amount: Money, scope: Scope) {
        let rate_id = applied.rate.as_ref().map(|r| r.id);
        let index = match self
            .entries
            .iter()
            .position(|e| e.kind == kind && e.rate_id == rate_id)
        {
            Some(existing) => existing,
            None => {
                let order = self.entries.len();
                self.entries.push(BucketEntry {
                    kind,
                    rate_id,
                    name: applied
                        .rate
                        .as_ref()
                        .map(|r| r.name.clone())
                        .unwrap_or_default(),
                    total: Money::zero(),
                    in_items: false,
                    in_subtotal: false,
                    order,
                });
                order
            }
        };
        let entry = &mut self.entries[index];
        entry.total += amount;
        match scope {
            Scope::Item => entry.in_items = true,
            Scope::Subtotal => entry.in_subtotal = true,
        }
    }

    /// Drains one kind's buckets in display order: item-only entries
    /// before subtotal-or-mixed entries, insertion order as tie-break.
    fn finish(&self, kind: RateKind, currency: Currency) -> Vec<AggregateRate> {
        let mut rates: Vec<(&BucketEntry, AggregateRate)> = self
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| {
                (
                    e,
                    AggregateRate {
                        rate_id: e.rate_id,
                        name: e.name.clone(),
                        kind,
                        total: currency.denormalize(e.total.minor()),
                        in_items: e.in_items,
                        in_subtotal: e.in_subtotal,
                    },
                )
            })
            .collect();
        rates.sort_by_key(|(e, agg)| (agg.scope_priority(), e.order));
        rates.into_iter().map(|(_, agg)| agg).collect()
    }
}

// =============================================================================
// Rate resolution
// =============================================================================

/// Resolves one applied rate against a base, in minor units.
///
/// Precedence: user-typed override → configured rule → custom amount.
/// Expired discount rules contribute zero; an explicit override or
/// custom amount is honored regardless (one-offs are not configuration
/// rules and do not lapse).
fn resolve(
    applied: &AppliedRate,
    base: Money,
    currency: Currency,
    as_of: DateTime<Utc>,
) -> CoreResult<(Money, bool)> {
    let inclusive = applied.is_inclusive();

    if let Some(override_amount) = applied.amount_override {
        return Ok((Money::from_minor(currency.normalize(override_amount)?), inclusive));
    }

    if let Some(rate) = &applied.rate {
        if rate.is_expired(as_of) {
            return Ok((Money::zero(), false));
        }
        if rate.is_percent {
            let amount = if inclusive {
                base.inclusive_tax_bps(rate.bps())
            } else {
                base.apply_bps(rate.bps())
            };
            return Ok((amount, inclusive));
        }
        return Ok((Money::from_minor(currency.normalize(rate.value)?), inclusive));
    }

    let custom = applied.amount.unwrap_or(0.0);
    Ok((Money::from_minor(currency.normalize(custom)?), false))
}

fn computed_rate(applied: &AppliedRate, amount: Money, inclusive: bool, currency: Currency) -> ComputedRate {
    ComputedRate {
        rate_id: applied.rate.as_ref().map(|r| r.id),
        name: applied
            .rate
            .as_ref()
            .map(|r| r.name.clone())
            .unwrap_or_default(),
        amount: currency.denormalize(amount.minor()),
        inclusive,
    }
}

/// `round(quantity × unit_cost)` with quantity in fixed-point micros
/// and cost in minor units; half-up, capped at the per-line maximum.
fn line_amount(quantity_micros: i64, cost_minor: i64) -> Money {
    let product = quantity_micros as i128 * cost_minor as i128;
    let scale: i128 = 10i128.pow(QUANTITY_PRECISION);
    let rounded = if product >= 0 {
        (product + scale / 2) / scale
    } else {
        (product - scale / 2) / scale
    };
    let capped = rounded.clamp(
        -(MAX_LINE_AMOUNT_MINOR as i128),
        MAX_LINE_AMOUNT_MINOR as i128,
    );
    Money::from_minor(capped as i64)
}

// =============================================================================
// The engine
// =============================================================================

/// Computes a document: every amount resolved in minor units, decimal
/// display values emitted at the end.
///
/// Never mutates its input. Returns `Err` only for malformed input
/// (unknown currency, broken rate records); half-typed lines and
/// unparseable numbers compute to zero.
pub fn compute(document: &Document, options: &CalcOptions) -> CoreResult<ComputedDocument> {
    validation::validate_currency_code(&document.currency)?;
    let currency = Currency::from_code(&document.currency)?;

    for applied in document
        .items
        .iter()
        .flat_map(|i| i.discounts.iter().chain(i.taxes.iter()))
        .chain(document.discounts.iter())
        .chain(document.taxes.iter())
        .chain(document.shipping.iter())
    {
        if let Some(rate) = &applied.rate {
            validation::validate_rate(rate)?;
        }
    }

    let format = options.number_format;
    let as_of = options.as_of;

    let mut subtotal = Money::zero();
    let mut total = Money::zero();
    let mut item_discount_total = Money::zero();
    let mut discount_excluded = Money::zero();
    let mut tax_excluded = Money::zero();
    let mut aggregates = Aggregator::default();
    let mut items_out = Vec::with_capacity(document.items.len());

    // ---- Per line item, in sequence order --------------------------------
    for item in &document.items {
        let quantity = format
            .parse_scaled(&item.quantity, QUANTITY_PRECISION)
            .unwrap_or(0);
        let cost = format
            .parse_scaled(&item.unit_cost, currency.exponent())
            .unwrap_or(0)
            .clamp(-MAX_LINE_AMOUNT_MINOR, MAX_LINE_AMOUNT_MINOR);
        let amount = line_amount(quantity, cost);

        if !item.discountable {
            discount_excluded += amount;
        }
        if !item.taxable {
            tax_excluded += amount;
        }

        // Item discounts: each percent application consumes the running
        // net, so successive discounts compound.
        let mut net = amount;
        let mut line_discount_total = Money::zero();
        let mut line_discounts = Vec::with_capacity(item.discounts.len());
        for applied in &item.discounts {
            let (discount, _) = resolve(applied, net, currency, as_of)?;
            line_discount_total += discount;
            net -= discount;
            aggregates.add(RateKind::Discount, applied, discount, Scope::Item);
            line_discounts.push(computed_rate(applied, discount, false, currency));
        }
        item_discount_total += line_discount_total;

        // Item taxes: one fixed post-discount base for every tax on
        // this line (taxes never compound on each other).
        let tax_base = Money::from_minor(net.minor().max(0));
        let mut line_tax_total = Money::zero();
        let mut line_inclusive_total = Money::zero();
        let mut line_taxes = Vec::with_capacity(item.taxes.len());
        for applied in &item.taxes {
            let (tax, inclusive) = resolve(applied, tax_base, currency, as_of)?;
            line_tax_total += tax;
            if inclusive {
                // Carried inside the price: comes out of the displayed
                // amount (and of the subtotal), never on top.
                line_inclusive_total += tax;
            } else {
                net += tax;
            }
            aggregates.add(RateKind::Tax, applied, tax, Scope::Item);
            line_taxes.push(computed_rate(applied, tax, inclusive, currency));
        }

        subtotal += amount - line_inclusive_total;
        total += net;

        items_out.push(ComputedLineItem {
            name: item.name.clone(),
            amount: currency.denormalize((amount - line_inclusive_total).minor()),
            discount_total: currency.denormalize(line_discount_total.minor()),
            tax_total: currency.denormalize(line_tax_total.minor()),
            discounts: line_discounts,
            taxes: line_taxes,
        });
    }

    // ---- Document-level discounts, running base --------------------------
    let mut running = subtotal - item_discount_total - discount_excluded;
    let mut doc_discounts = Vec::with_capacity(document.discounts.len());
    for applied in &document.discounts {
        let (discount, _) = resolve(applied, running, currency, as_of)?;
        running -= discount;
        total -= discount;
        aggregates.add(RateKind::Discount, applied, discount, Scope::Subtotal);
        doc_discounts.push(computed_rate(applied, discount, false, currency));
    }

    // ---- Document-level taxes, fixed discounted base ---------------------
    let doc_tax_base = Money::from_minor((running - tax_excluded).minor().max(0));
    let mut doc_taxes = Vec::with_capacity(document.taxes.len());
    for applied in &document.taxes {
        let (tax, inclusive) = resolve(applied, doc_tax_base, currency, as_of)?;
        if inclusive {
            subtotal -= tax;
            total -= tax;
        } else {
            total += tax;
        }
        aggregates.add(RateKind::Tax, applied, tax, Scope::Subtotal);
        doc_taxes.push(computed_rate(applied, tax, inclusive, currency));
    }

    // ---- Shipping, always last, purely additive --------------------------
    let shipping_base = Money::from_minor(running.minor().max(0));
    let mut doc_shipping = Vec::with_capacity(document.shipping.len());
    for applied in &document.shipping {
        let (charge, _) = resolve(applied, shipping_base, currency, as_of)?;
        total += charge;
        aggregates.add(RateKind::Shipping, applied, charge, Scope::Subtotal);
        doc_shipping.push(computed_rate(applied, charge, false, currency));
    }

    // ---- Balance ---------------------------------------------------------
    let amount_paid_minor = match document.amount_paid {
        Some(paid) => {
            let clamped = if paid.is_finite() { paid.max(0.0) } else { 0.0 };
            Some(currency.normalize(clamped)?)
        }
        None => None,
    };
    let balance_minor = amount_paid_minor.map(|paid| total.minor() - paid);

    // ---- Denormalize for output ------------------------------------------
    Ok(ComputedDocument {
        kind: document.kind,
        currency: currency.code().to_string(),
        subtotal: currency.denormalize(subtotal.minor()),
        total: currency.denormalize(total.minor()),
        amount_paid: amount_paid_minor.map(|m| currency.denormalize(m)),
        balance: balance_minor.map(|m| currency.denormalize(m)),
        items: items_out,
        discounts: doc_discounts,
        taxes: doc_taxes,
        shipping: doc_shipping,
        aggregate_discounts: aggregates.finish(RateKind::Discount, currency),
        aggregate_taxes: aggregates.finish(RateKind::Tax, currency),
        aggregate_shipping: aggregates.finish(RateKind::Shipping, currency),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentKind, LineItem};
    use crate::rates::Rate;
    use chrono::TimeZone;

    fn opts() -> CalcOptions {
        CalcOptions::new(
            NumberFormat::default(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn doc() -> Document {
        Document::empty(
            DocumentKind::Invoice,
            "USD",
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        )
    }

    fn line(quantity: &str, unit_cost: &str) -> LineItem {
        LineItem {
            name: "Widget".to_string(),
            quantity: quantity.to_string(),
            unit_cost: unit_cost.to_string(),
            ..LineItem::default()
        }
    }

    fn percent(id: i64, kind: RateKind, value: f64) -> Rate {
        Rate {
            id,
            name: format!("rate-{id}"),
            kind,
            is_percent: true,
            value,
            inclusive: false,
            expires: None,
        }
    }

    fn flat(id: i64, kind: RateKind, value: f64) -> Rate {
        Rate {
            is_percent: false,
            ..percent(id, kind, value)
        }
    }

    #[test]
    fn test_empty_document_is_all_zero() {
        let computed = compute(&doc(), &opts()).unwrap();
        assert_eq!(computed.subtotal, 0.0);
        assert_eq!(computed.total, 0.0);
        assert!(computed.balance.is_none());
        assert!(computed.aggregate_discounts.is_empty());
        assert!(computed.aggregate_taxes.is_empty());
        assert!(computed.aggregate_shipping.is_empty());
    }

    #[test]
    fn test_unknown_currency_is_fatal() {
        let mut document = doc();
        document.currency = "DOGE".to_string();
        assert!(compute(&document, &opts()).is_err());
    }

    #[test]
    fn test_line_amount_is_quantity_times_cost() {
        let mut document = doc();
        document.items.push(line("3", "2.99"));
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.subtotal, 8.97);
        assert_eq!(computed.total, 8.97);

        // Fractional quantity, half-up
        let mut document = doc();
        document.items.push(line("2.5", "0.99")); // 2.475 → 2.48
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.total, 2.48);
    }

    #[test]
    fn test_line_amount_is_capped() {
        let mut document = doc();
        document.items.push(line("1000000", "99999999"));
        let computed = compute(&document, &opts()).unwrap();
        // Coerced to the $10M per-line ceiling instead of overflowing
        assert_eq!(computed.total, 10_000_000.0);
    }

    #[test]
    fn test_unparseable_fields_compute_to_zero() {
        let mut document = doc();
        document.items.push(line("abc", "10.00"));
        document.items.push(line("2", "not a number"));
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.total, 0.0);
    }

    #[test]
    fn test_blank_trailing_line_contributes_nothing() {
        let mut document = doc();
        document.items.push(line("2", "50"));
        document.items.push(LineItem::default()); // the UI's placeholder row
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.subtotal, 100.0);
        assert_eq!(computed.items.len(), 2);
        assert_eq!(computed.items[1].amount, 0.0);
        assert!(computed.aggregate_discounts.is_empty());
    }

    #[test]
    fn test_discounts_apply_before_taxes() {
        // $100 line, $10 discount, 10% tax → tax on $90, not $100
        let mut item = line("1", "100");
        item.discounts.push(AppliedRate::custom(10.0));
        item.taxes
            .push(AppliedRate::from_rate(percent(1, RateKind::Tax, 10.0)));
        let mut document = doc();
        document.items.push(item);
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.items[0].tax_total, 9.0);
        assert_eq!(computed.total, 99.0); // 100 − 10 + 9

        // Growing the discount shrinks the tax base proportionally
        let mut item = line("1", "100");
        item.discounts.push(AppliedRate::custom(20.0));
        item.taxes
            .push(AppliedRate::from_rate(percent(1, RateKind::Tax, 10.0)));
        let mut document = doc();
        document.items.push(item);
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.items[0].tax_total, 8.0);
    }

    #[test]
    fn test_successive_discounts_consume_running_base() {
        // Two 10% discounts on $100: 10.00 then 9.00, not 10.00 twice
        let mut item = line("1", "100");
        item.discounts
            .push(AppliedRate::from_rate(percent(1, RateKind::Discount, 10.0)));
        item.discounts
            .push(AppliedRate::from_rate(percent(2, RateKind::Discount, 10.0)));
        let mut document = doc();
        document.items.push(item);
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.items[0].discount_total, 19.0);
        assert_eq!(computed.total, 81.0);
    }

    #[test]
    fn test_inclusive_tax_backs_out_of_the_price() {
        // $100 line carrying 10% inside the price
        let mut item = line("1", "100");
        let mut rate = percent(1, RateKind::Tax, 10.0);
        rate.inclusive = true;
        item.taxes.push(AppliedRate::from_rate(rate));
        let mut document = doc();
        document.items.push(item);
        let computed = compute(&document, &opts()).unwrap();

        // ceil(10000 × 1000 / 11000) = 910 minor units
        assert_eq!(computed.items[0].tax_total, 9.10);
        // Displayed amount and subtotal exclude the tax; total still $100
        assert_eq!(computed.items[0].amount, 90.90);
        assert_eq!(computed.subtotal, 90.90);
        assert_eq!(computed.total, 100.0);
        // tax + ex-tax reconstruct the inclusive base
        let reconstructed = computed.items[0].tax_total + computed.items[0].amount;
        assert!((reconstructed - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_discountable_line_excluded_from_document_discount_base() {
        let mut document = doc();
        document.items.push(line("1", "100"));
        let mut fixed = line("1", "50");
        fixed.discountable = false;
        document.items.push(fixed);
        document
            .discounts
            .push(AppliedRate::from_rate(percent(1, RateKind::Discount, 10.0)));
        let computed = compute(&document, &opts()).unwrap();
        // 10% of $100, not of $150
        assert_eq!(computed.discounts[0].amount, 10.0);
        assert_eq!(computed.total, 140.0);
    }

    #[test]
    fn test_non_taxable_line_excluded_from_document_tax_base() {
        let mut document = doc();
        document.items.push(line("1", "100"));
        let mut exempt = line("1", "50");
        exempt.taxable = false;
        document.items.push(exempt);
        document
            .taxes
            .push(AppliedRate::from_rate(percent(1, RateKind::Tax, 10.0)));
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.taxes[0].amount, 10.0);
        assert_eq!(computed.total, 160.0);
    }

    #[test]
    fn test_expired_discount_contributes_zero() {
        let mut rate = percent(1, RateKind::Discount, 10.0);
        rate.expires = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let mut item = line("1", "100");
        item.discounts.push(AppliedRate::from_rate(rate));
        let mut document = doc();
        document.items.push(item);
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.items[0].discount_total, 0.0);
        assert_eq!(computed.total, 100.0);
    }

    #[test]
    fn test_amount_override_wins_over_rule() {
        let mut item = line("1", "100");
        item.discounts.push(AppliedRate {
            rate: Some(percent(1, RateKind::Discount, 10.0)),
            amount: None,
            amount_override: Some(7.5),
        });
        let mut document = doc();
        document.items.push(item);
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.items[0].discount_total, 7.5);
    }

    #[test]
    fn test_aggregate_ordering_item_scope_first() {
        // Subtotal-scope discount configured, then an item-scope one;
        // the item-scope entry must still sort first.
        let subtotal_rate = percent(10, RateKind::Discount, 5.0);
        let item_rate = flat(20, RateKind::Discount, 2.0);

        let mut item = line("1", "100");
        item.discounts.push(AppliedRate::from_rate(item_rate));
        let mut document = doc();
        document.items.push(item);
        document
            .discounts
            .push(AppliedRate::from_rate(subtotal_rate));

        let computed = compute(&document, &opts()).unwrap();
        let aggs = &computed.aggregate_discounts;
        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].rate_id, Some(20));
        assert!(aggs[0].in_items && !aggs[0].in_subtotal);
        assert_eq!(aggs[1].rate_id, Some(10));
        assert!(!aggs[1].in_items && aggs[1].in_subtotal);
    }

    #[test]
    fn test_aggregate_merges_same_rate_across_scopes() {
        let shared = flat(7, RateKind::Discount, 5.0);
        let mut item = line("1", "100");
        item.discounts.push(AppliedRate::from_rate(shared.clone()));
        let mut document = doc();
        document.items.push(item);
        document.discounts.push(AppliedRate::from_rate(shared));

        let computed = compute(&document, &opts()).unwrap();
        let aggs = &computed.aggregate_discounts;
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].total, 10.0);
        assert!(aggs[0].in_items && aggs[0].in_subtotal);
    }

    #[test]
    fn test_custom_amounts_share_the_no_rate_bucket() {
        let mut document = doc();
        document.items.push(line("1", "100"));
        document.discounts.push(AppliedRate::custom(10.0));
        document.discounts.push(AppliedRate::custom(5.0));
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.aggregate_discounts.len(), 1);
        assert_eq!(computed.aggregate_discounts[0].rate_id, None);
        assert_eq!(computed.aggregate_discounts[0].total, 15.0);
    }

    #[test]
    fn test_negative_amount_paid_normalizes_to_zero() {
        let mut document = doc();
        document.items.push(line("1", "100"));
        document.amount_paid = Some(-25.0);
        let computed = compute(&document, &opts()).unwrap();
        assert_eq!(computed.amount_paid, Some(0.0));
        assert_eq!(computed.balance, Some(100.0));
    }

    #[test]
    fn test_european_separators() {
        let format = NumberFormat {
            decimal_separator: ',',
            thousands_separator: '.',
        };
        let options = CalcOptions::new(
            format,
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let mut document = doc();
        document.items.push(line("2", "1.234,56"));
        let computed = compute(&document, &options).unwrap();
        assert_eq!(computed.total, 2469.12);
    }

    /// The full worked scenario: one $1000 line with a flat item
    /// discount and two item taxes, three document discounts, four
    /// document taxes, three shipping charges, and a $10 payment.
    /// Every intermediate figure is hand-derived from the waterfall.
    #[test]
    fn test_full_invoice_scenario() {
        let mut item = line("10", "100");
        item.discounts.push(AppliedRate::custom(6.0));
        item.taxes
            .push(AppliedRate::from_rate(percent(1, RateKind::Tax, 2.0)));
        item.taxes
            .push(AppliedRate::from_rate(percent(2, RateKind::Tax, 3.0)));

        let mut document = doc();
        document.items.push(item);
        document
            .discounts
            .push(AppliedRate::from_rate(percent(3, RateKind::Discount, 5.0)));
        document
            .discounts
            .push(AppliedRate::from_rate(flat(4, RateKind::Discount, 10.0)));
        document.discounts.push(AppliedRate::custom(10.0));
        document
            .taxes
            .push(AppliedRate::from_rate(percent(5, RateKind::Tax, 5.0)));
        document
            .taxes
            .push(AppliedRate::from_rate(percent(6, RateKind::Tax, 7.0)));
        document
            .taxes
            .push(AppliedRate::from_rate(flat(7, RateKind::Tax, 5.0)));
        document
            .taxes
            .push(AppliedRate::from_rate(flat(8, RateKind::Tax, 7.2)));
        document
            .shipping
            .push(AppliedRate::from_rate(flat(9, RateKind::Shipping, 5.29)));
        document
            .shipping
            .push(AppliedRate::from_rate(percent(10, RateKind::Shipping, 6.0)));
        document.shipping.push(AppliedRate::custom(10.0));
        document.amount_paid = Some(10.0);

        let computed = compute(&document, &opts()).unwrap();

        // Line: 10 × $100, $6 flat discount, taxes on the $994 base
        assert_eq!(computed.subtotal, 1000.0);
        assert_eq!(computed.items[0].discount_total, 6.0);
        assert_eq!(computed.items[0].taxes[0].amount, 19.88);
        assert_eq!(computed.items[0].taxes[1].amount, 29.82);

        // Document discounts walk the running base: 5% of 994, then flats
        assert_eq!(computed.discounts[0].amount, 49.70);
        assert_eq!(computed.discounts[1].amount, 10.0);
        assert_eq!(computed.discounts[2].amount, 10.0);

        // Document taxes on the fixed discounted base of 924.30
        assert_eq!(computed.taxes[0].amount, 46.22);
        assert_eq!(computed.taxes[1].amount, 64.70);
        assert_eq!(computed.taxes[2].amount, 5.0);
        assert_eq!(computed.taxes[3].amount, 7.2);

        // Shipping on the same base, purely additive
        assert_eq!(computed.shipping[0].amount, 5.29);
        assert_eq!(computed.shipping[1].amount, 55.46);
        assert_eq!(computed.shipping[2].amount, 10.0);

        // 1000 − 6 + 49.70 − 69.70 + 123.12 + 70.75 = 1167.87
        assert_eq!(computed.total, 1167.87);
        assert_eq!(computed.balance, Some(1157.87));

        // Aggregates: three distinct discount buckets (custom bucket merged),
        // six tax buckets, three shipping buckets
        assert_eq!(computed.aggregate_discounts.len(), 3);
        assert_eq!(computed.aggregate_taxes.len(), 6);
        assert_eq!(computed.aggregate_shipping.len(), 3);
    }
}
