//! Bill-splitting settlement.
//!
//! # Responsibility
//! - Reduce item costs and payers to per-person balances.
//! - Propose a short list of transfers that settles every balance.
//!
//! # Invariants
//! - Pure: no I/O, no clock, no storage access.
//! - Never divides by zero; an empty roster yields `NoParticipants`.
//! - When every costed item has a payer, balances sum to zero within
//!   [`SETTLEMENT_EPSILON`].

pub mod collation;

use crate::model::item::Item;
use crate::model::room::normalize_participants;
use collation::compare_names;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Amounts at or below this magnitude count as settled.
pub const SETTLEMENT_EPSILON: f64 = 0.01;

/// Result of [`settle`].
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// Nobody to split with; `total` is still reported.
    NoParticipants { total: f64 },
    Settled(Settlement),
}

impl SettlementOutcome {
    pub fn total(&self) -> f64 {
        match self {
            Self::NoParticipants { total } => *total,
            Self::Settled(settlement) => settlement.total,
        }
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        match self {
            Self::NoParticipants { .. } => None,
            Self::Settled(settlement) => Some(settlement),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub total: f64,
    pub fair_share: f64,
    /// Cost carried by items without a payer.
    pub unassigned: f64,
    /// One row per roster member, in collation order.
    pub balances: Vec<BalanceRow>,
    pub transfers: Vec<Transfer>,
}

impl Settlement {
    /// `name -> balance` for every roster member.
    pub fn per_person_balance(&self) -> BTreeMap<String, f64> {
        self.balances
            .iter()
            .map(|row| (row.name.clone(), row.balance))
            .collect()
    }

    pub fn balance_of(&self, name: &str) -> Option<&BalanceRow> {
        self.balances.iter().find(|row| row.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRow {
    pub name: String,
    pub paid: f64,
    /// `paid - fair_share`; positive receives, negative pays.
    pub balance: f64,
}

impl BalanceRow {
    pub fn standing(&self) -> Standing {
        if self.balance > SETTLEMENT_EPSILON {
            Standing::Receives
        } else if self.balance < -SETTLEMENT_EPSILON {
            Standing::Pays
        } else {
            Standing::Even
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Receives,
    Pays,
    Even,
}

/// `from` pays `amount` to `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

/// Computes balances and transfers over `items` for `participants`.
///
/// Payers missing from `participants` are appended to the roster before the
/// fair share is computed.
pub fn settle<'a, I>(items: I, participants: &[String]) -> SettlementOutcome
where
    I: IntoIterator<Item = &'a Item>,
{
    let items: Vec<&Item> = items.into_iter().collect();
    let total: f64 = items.iter().map(|item| item.cost).sum();

    let costed_payers = items
        .iter()
        .filter(|item| item.cost > 0.0)
        .filter_map(|item| item.payer());
    let roster = normalize_participants(
        participants
            .iter()
            .map(String::as_str)
            .chain(costed_payers)
            .collect::<Vec<_>>(),
    );
    if roster.is_empty() {
        return SettlementOutcome::NoParticipants { total };
    }

    let fair_share = total / roster.len() as f64;
    let mut paid: BTreeMap<&str, f64> = roster.iter().map(|name| (name.as_str(), 0.0)).collect();
    let mut unassigned = 0.0;
    for item in &items {
        match item.payer() {
            Some(payer) => {
                if let Some(sum) = paid.get_mut(payer) {
                    *sum += item.cost;
                }
            }
            None => unassigned += item.cost,
        }
    }

    let mut balances: Vec<BalanceRow> = roster
        .iter()
        .map(|name| {
            let paid = paid.get(name.as_str()).copied().unwrap_or(0.0);
            BalanceRow {
                name: name.clone(),
                paid,
                balance: paid - fair_share,
            }
        })
        .collect();
    balances.sort_by(|left, right| compare_names(&left.name, &right.name));

    let transfers = reduce_transfers(&balances);
    SettlementOutcome::Settled(Settlement {
        total,
        fair_share,
        unassigned,
        balances,
        transfers,
    })
}

/// Greedy largest-debtor to largest-creditor matching.
///
/// Not globally minimal for every distribution.
///
/// Parties within epsilon of even are never matched, so each of them may keep
/// up to epsilon of residue. Summed over the roster the unsettled amount can
/// reach `epsilon * n`, and a creditor may be left above epsilon when only
/// such parties owe it.
fn reduce_transfers(balances: &[BalanceRow]) -> Vec<Transfer> {
    let mut creditors: Vec<(&str, f64)> = balances
        .iter()
        .filter(|row| row.balance > SETTLEMENT_EPSILON)
        .map(|row| (row.name.as_str(), row.balance))
        .collect();
    let mut debtors: Vec<(&str, f64)> = balances
        .iter()
        .filter(|row| row.balance < -SETTLEMENT_EPSILON)
        .map(|row| (row.name.as_str(), -row.balance))
        .collect();
    creditors.sort_by(by_magnitude_then_name);
    debtors.sort_by(by_magnitude_then_name);

    let mut transfers = Vec::new();
    let (mut debtor_idx, mut creditor_idx) = (0, 0);
    while debtor_idx < debtors.len() && creditor_idx < creditors.len() {
        let (debtor, debt) = debtors[debtor_idx];
        let (creditor, credit) = creditors[creditor_idx];
        let amount = debt.min(credit);
        transfers.push(Transfer {
            from: debtor.to_string(),
            to: creditor.to_string(),
            amount,
        });

        debtors[debtor_idx].1 -= amount;
        creditors[creditor_idx].1 -= amount;
        if debtors[debtor_idx].1 <= SETTLEMENT_EPSILON {
            debtor_idx += 1;
        }
        if creditors[creditor_idx].1 <= SETTLEMENT_EPSILON {
            creditor_idx += 1;
        }
    }
    transfers
}

fn by_magnitude_then_name(left: &(&str, f64), right: &(&str, f64)) -> Ordering {
    right
        .1
        .total_cmp(&left.1)
        .then_with(|| compare_names(left.0, right.0))
}
