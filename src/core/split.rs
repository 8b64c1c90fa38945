//! Split calculators
//!
//! Integer division of an amount across participants with no rounding loss:
//! every calculator returns shares that sum to the input amount exactly, or
//! rejects the input before any write can be attempted.

use crate::types::error::LedgerError;
use crate::types::group::UserId;
use crate::types::money::Amount;
use std::collections::BTreeMap;

/// Split an amount evenly across participants
///
/// Each participant receives the truncated per-head share; the `amount % n`
/// leftover minor units go one each to the first participants in slice
/// order. No floating point is involved and the shares always sum to
/// `amount` exactly.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidSplit`] when `participants` is empty,
/// contains duplicates, or `amount` is negative.
pub fn split_even(
    amount: Amount,
    participants: &[UserId],
) -> Result<BTreeMap<UserId, Amount>, LedgerError> {
    if participants.is_empty() {
        return Err(LedgerError::invalid_split("no participants"));
    }
    if amount < 0 {
        return Err(LedgerError::invalid_split("negative amount"));
    }

    let count = participants.len() as Amount;
    let per_head = amount / count;
    let extra = amount % count;

    let shares: BTreeMap<UserId, Amount> = participants
        .iter()
        .enumerate()
        .map(|(index, user)| {
            let bonus = if (index as Amount) < extra { 1 } else { 0 };
            (user.clone(), per_head + bonus)
        })
        .collect();

    if shares.len() != participants.len() {
        return Err(LedgerError::invalid_split("duplicate participant"));
    }

    Ok(shares)
}

/// Split an amount across participants in proportion to integer weights
///
/// Each participant's base share is `floor(amount * weight / total_weight)`.
/// The leftover minor units are then assigned one each by largest fractional
/// remainder, with ties broken by the map's iteration order. The shares
/// always sum to `amount` exactly, and a zero-weight participant never
/// receives a leftover unit.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidSplit`] when `weights` is empty, the total
/// weight is zero, or `amount` is negative.
pub fn split_by_ratio(
    amount: Amount,
    weights: &BTreeMap<UserId, u64>,
) -> Result<BTreeMap<UserId, Amount>, LedgerError> {
    if weights.is_empty() {
        return Err(LedgerError::invalid_split("no participants"));
    }
    if amount < 0 {
        return Err(LedgerError::invalid_split("negative amount"));
    }

    let total: u128 = weights.values().map(|weight| *weight as u128).sum();
    if total == 0 {
        return Err(LedgerError::invalid_split("zero total weight"));
    }

    // Widened arithmetic: amount * weight can exceed i64 long before the
    // final share does.
    let mut floors: Vec<(UserId, Amount, u128)> = Vec::with_capacity(weights.len());
    let mut floor_sum: Amount = 0;
    for (user, weight) in weights {
        let scaled = amount as u128 * *weight as u128;
        let share = (scaled / total) as Amount;
        let fraction = scaled % total;
        floor_sum += share;
        floors.push((user.clone(), share, fraction));
    }

    let mut leftover = amount - floor_sum;

    // Hand the leftover units to the largest fractional remainders first.
    // The sort is stable, so equal remainders keep map iteration order.
    let mut order: Vec<usize> = (0..floors.len()).collect();
    order.sort_by(|a, b| floors[*b].2.cmp(&floors[*a].2));

    let mut shares: BTreeMap<UserId, Amount> = BTreeMap::new();
    for index in order {
        let (user, share, _) = &mut floors[index];
        if leftover > 0 {
            *share += 1;
            leftover -= 1;
        }
        shares.insert(user.clone(), *share);
    }

    Ok(shares)
}
