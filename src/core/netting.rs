//! Debt netting engine
//!
//! Reduces a zero-sum map of net balances to a short list of settling
//! payments using the classic greedy cash-flow heuristic: walk the creditor
//! and debtor lists in parallel, always settling the smaller of the two
//! outstanding magnitudes. True minimum-transaction netting is NP-hard; the
//! greedy pass is a deterministic approximation that never needs more than
//! `n - 1` payments for `n` members with non-zero balances.

use crate::types::group::UserId;
use crate::types::money::Amount;
use std::collections::BTreeMap;

/// One settling payment: `from` pays `to` the given amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// The debtor making the payment
    pub from: UserId,
    /// The creditor receiving it
    pub to: UserId,
    /// Payment size in minor units, always positive
    pub amount: Amount,
}

/// Compute settling payments for a zero-sum balance map
///
/// Members with a balance of exactly zero take no part and receive no
/// payments. The creditor and debtor worklists are built in the map's
/// iteration order, so two calls with the same input produce identical
/// output. Applying the returned payments (debtor loses, creditor gains)
/// drives every balance to exactly zero.
///
/// The input must be zero-sum; that invariant is what guarantees both
/// worklists run out simultaneously.
pub fn resolve_group_debts(balances: &BTreeMap<UserId, Amount>) -> Vec<Settlement> {
    let mut creditors: Vec<(UserId, Amount)> = Vec::new();
    let mut debtors: Vec<(UserId, Amount)> = Vec::new();

    for (user, balance) in balances {
        if *balance > 0 {
            creditors.push((user.clone(), *balance));
        } else if *balance < 0 {
            debtors.push((user.clone(), *balance));
        }
    }

    let mut settlements = Vec::new();
    let mut creditor_idx = 0;
    let mut debtor_idx = 0;

    while creditor_idx < creditors.len() && debtor_idx < debtors.len() {
        // The smaller of the two outstanding magnitudes settles in full.
        let amount = creditors[creditor_idx].1.min(debtors[debtor_idx].1.abs());
        settlements.push(Settlement {
            from: debtors[debtor_idx].0.clone(),
            to: creditors[creditor_idx].0.clone(),
            amount,
        });

        creditors[creditor_idx].1 -= amount;
        debtors[debtor_idx].1 += amount;

        if creditors[creditor_idx].1 == 0 {
            creditor_idx += 1;
        }
        if debtors[debtor_idx].1 == 0 {
            debtor_idx += 1;
        }
    }

    // Zero-sum input exhausts both lists together.
    debug_assert!(creditor_idx == creditors.len() && debtor_idx == debtors.len());

    settlements
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn balances(entries: &[(&str, Amount)]) -> BTreeMap<UserId, Amount> {
        entries
            .iter()
            .map(|(user, amount)| (user.to_string(), *amount))
            .collect()
    }

    fn settlement(from: &str, to: &str, amount: Amount) -> Settlement {
        Settlement {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }

    /// Apply settlements back onto the balances and return the result
    fn apply(
        mut balances: BTreeMap<UserId, Amount>,
        settlements: &[Settlement],
    ) -> BTreeMap<UserId, Amount> {
        for s in settlements {
            *balances.get_mut(&s.from).unwrap() += s.amount;
            *balances.get_mut(&s.to).unwrap() -= s.amount;
        }
        balances
    }

    #[test]
    fn test_one_creditor_two_debtors() {
        let input = balances(&[("a", 500), ("b", -200), ("c", -300)]);
        let settlements = resolve_group_debts(&input);

        assert_eq!(
            settlements,
            vec![settlement("b", "a", 200), settlement("c", "a", 300)]
        );
    }

    #[test]
    fn test_single_pair_settles_in_one_payment() {
        let input = balances(&[("a", 750), ("b", -750)]);
        let settlements = resolve_group_debts(&input);
        assert_eq!(settlements, vec![settlement("b", "a", 750)]);
    }

    #[test]
    fn test_empty_input_yields_no_settlements() {
        assert!(resolve_group_debts(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_zero_balances_are_excluded() {
        let input = balances(&[("a", 500), ("b", 0), ("c", -500), ("d", 0)]);
        let settlements = resolve_group_debts(&input);

        assert_eq!(settlements, vec![settlement("c", "a", 500)]);
        for s in &settlements {
            assert_ne!(s.from, "b");
            assert_ne!(s.to, "b");
            assert_ne!(s.from, "d");
            assert_ne!(s.to, "d");
        }
    }

    #[rstest]
    #[case::simple(&[("a", 500), ("b", -200), ("c", -300)])]
    #[case::two_sided(&[("a", 100), ("b", 200), ("c", -150), ("d", -150)])]
    #[case::interleaved(&[("a", -50), ("b", 120), ("c", -90), ("d", 20)])]
    #[case::large_fanout(&[
        ("a", 1000),
        ("b", -100),
        ("c", -200),
        ("d", -300),
        ("e", -400)
    ])]
    fn test_settlements_zero_every_balance(#[case] entries: &[(&str, Amount)]) {
        let input = balances(entries);
        let settlements = resolve_group_debts(&input);

        let after = apply(input, &settlements);
        assert!(
            after.values().all(|balance| *balance == 0),
            "residual balances: {after:?}"
        );
    }

    #[rstest]
    #[case::simple(&[("a", 500), ("b", -200), ("c", -300)])]
    #[case::two_sided(&[("a", 100), ("b", 200), ("c", -150), ("d", -150)])]
    #[case::with_zeroes(&[("a", 500), ("b", 0), ("c", -500)])]
    fn test_at_most_n_minus_one_payments(#[case] entries: &[(&str, Amount)]) {
        let input = balances(entries);
        let non_zero = input.values().filter(|balance| **balance != 0).count();
        let settlements = resolve_group_debts(&input);
        assert!(settlements.len() <= non_zero.saturating_sub(1));
    }

    #[test]
    fn test_same_input_same_output() {
        let input = balances(&[("a", 100), ("b", 200), ("c", -150), ("d", -150)]);
        assert_eq!(resolve_group_debts(&input), resolve_group_debts(&input));
    }

    #[test]
    fn test_all_amounts_positive() {
        let input = balances(&[("a", -50), ("b", 120), ("c", -90), ("d", 20)]);
        for s in resolve_group_debts(&input) {
            assert!(s.amount > 0, "zero or negative payment: {s:?}");
        }
    }
}
