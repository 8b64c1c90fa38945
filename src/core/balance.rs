//! Balance ledger arithmetic
//!
//! This module owns the arithmetic that turns a transaction into per-member
//! balance deltas, and the membership status rules for departed members.
//!
//! The ledger is zero-sum: a transaction credits its payer with exactly what
//! it debits the beneficiaries, so the sum of all member balances in a group
//! is zero after every application, reversal, or any sequence of the two.
//! Applying a transaction with every amount negated exactly reverses a prior
//! application; that negation is the whole mechanism behind transaction
//! update (reverse old, apply new) and delete (reverse only).

use crate::types::error::LedgerError;
use crate::types::group::{GroupMember, MemberStatus, UserId};
use crate::types::money::Amount;
use std::collections::BTreeMap;

/// Per-member balance deltas for applying a transaction
///
/// The payer is credited with the sum of every entry not keyed by the payer
/// itself, and each of those beneficiaries is debited by its entry.
/// Self-entries (`to[payer]`) contribute nothing. The payer delta comes
/// first, then beneficiaries in map order.
///
/// # Arguments
///
/// * `from` - The paying member
/// * `to` - Amount owed to the payer per beneficiary, in minor units
///
/// # Errors
///
/// Returns [`LedgerError::ArithmeticOverflow`] if the payer credit does not
/// fit in an [`Amount`].
pub fn transaction_deltas(
    from: &UserId,
    to: &BTreeMap<UserId, Amount>,
) -> Result<Vec<(UserId, Amount)>, LedgerError> {
    let mut credit: Amount = 0;
    let mut deltas: Vec<(UserId, Amount)> = Vec::with_capacity(to.len() + 1);

    for (user, amount) in to {
        if user == from {
            continue;
        }
        credit = credit
            .checked_add(*amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("balance credit", from))?;
        deltas.push((user.clone(), -*amount));
    }

    deltas.insert(0, (from.clone(), credit));
    Ok(deltas)
}

/// Per-member balance deltas for reversing a transaction
///
/// Equivalent to [`transaction_deltas`] with every amount negated. Applying
/// these deltas immediately after the forward deltas restores every touched
/// balance to its prior value.
pub fn inverse_deltas(
    from: &UserId,
    to: &BTreeMap<UserId, Amount>,
) -> Result<Vec<(UserId, Amount)>, LedgerError> {
    transaction_deltas(from, to)?
        .into_iter()
        .map(|(user, delta)| {
            let negated = delta
                .checked_neg()
                .ok_or_else(|| LedgerError::arithmetic_overflow("balance reversal", &user))?;
            Ok((user, negated))
        })
        .collect()
}

/// Status a departed member should hold, if it differs from the current one
///
/// A member who is `active` keeps their status unless `force_left` is set
/// (an explicit departure). Otherwise the correct status is `history` when
/// the balance is zero and `left` when it is not; `None` means the stored
/// status is already right and no write is needed.
pub fn left_status(member: &GroupMember, force_left: bool) -> Option<MemberStatus> {
    if !force_left && member.status == MemberStatus::Active {
        return None;
    }

    let target = if member.balance == 0 {
        MemberStatus::History
    } else {
        MemberStatus::Left
    };

    (member.status != target).then_some(target)
}

/// Net balance per member, in stable user-id order
///
/// The result feeds [`resolve_group_debts`](crate::core::netting::resolve_group_debts)
/// directly.
pub fn net_balances<'a>(
    members: impl IntoIterator<Item = &'a GroupMember>,
) -> BTreeMap<UserId, Amount> {
    members
        .into_iter()
        .map(|member| (member.user_id.clone(), member.balance))
        .collect()
}
