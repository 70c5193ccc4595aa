//! Accrual computation
//!
//! Pure functions from an order's items and a mechanic snapshot to a points
//! delta. No locking, no I/O: identical inputs always give identical output.
//!
//! Rules:
//! - `pt` mechanics grant their flat reward once per matching order line,
//!   regardless of the line's count
//! - `%` mechanics grant `floor(order_value * reward / 100)` once per order
//!   when at least one line matches, where `order_value` is the sum of
//!   `price * count` over every line
//! - contributions add up; the total is truncated to a non-negative integer

use std::collections::{HashMap, HashSet};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::{Item, Mechanic, Points, RewardType};

/// Sum of `price * count` over all items, or `None` on overflow
pub fn order_value(items: &[Item]) -> Option<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        Decimal::from(item.price)
            .checked_mul(Decimal::from(item.count))?
            .checked_add(acc)
    })
}

/// Compute the accrual for an order
///
/// # Arguments
///
/// * `items` - Order lines, already validated
/// * `mechanics` - Snapshot of the registered mechanics, keyed by match key
///
/// # Returns
///
/// The non-negative accrual, or `None` when the arithmetic overflows. That
/// cannot happen for realistic orders and rewards.
///
/// # Examples
///
/// ```
/// use loyalty_engine::core::{compute_accrual, MechanicRegistry};
/// use loyalty_engine::types::{Item, MechanicRequest};
/// use rust_decimal::Decimal;
///
/// let registry = MechanicRegistry::new();
/// registry.register(MechanicRequest::new("sku1", "pt", Decimal::TEN)).unwrap();
/// registry.register(MechanicRequest::new("sku2", "%", Decimal::new(5, 0))).unwrap();
///
/// // 10 points for the sku1 line, plus 5% of the 1000 order value
/// let items = vec![Item::new("sku1", 300, 2), Item::new("sku2", 400, 1)];
/// assert_eq!(compute_accrual(&items, &registry.snapshot()), Some(60));
/// ```
pub fn compute_accrual(items: &[Item], mechanics: &HashMap<String, Mechanic>) -> Option<Points> {
    let value = order_value(items)?;

    let mut total = Decimal::ZERO;
    let mut percent_applied: HashSet<&str> = HashSet::new();

    for item in items {
        let Some(mechanic) = mechanics.get(&item.id) else {
            continue;
        };

        let contribution = match mechanic.reward_type {
            RewardType::Points => mechanic.reward,
            RewardType::Percent => {
                if !percent_applied.insert(mechanic.match_key.as_str()) {
                    continue;
                }
                value
                    .checked_mul(mechanic.reward)?
                    .checked_div(Decimal::ONE_HUNDRED)?
                    .floor()
            }
        };
        total = total.checked_add(contribution)?;
    }

    total.trunc().max(Decimal::ZERO).to_i64()
}
