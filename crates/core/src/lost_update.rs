//! Direct detection of the classical lost-update pattern.
//!
//! Two committed transactions that both externally read the same value of
//! a key and then wrote that key cannot both have run under snapshot
//! isolation or stronger, whatever the version order turned out to be.
//! The cycle search can miss these when version-order inference dropped a
//! write-write edge, so they are reported from the history directly.

use std::hash::Hash;

use hashbrown::{HashMap, HashSet};

use crate::history::{Mop, Txn, TxnId};

/// Two or more committed transactions that each read `key = value` as
/// their first access to `key`, then wrote `key`.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostUpdateCase<K, V> {
    pub key: K,
    pub value: V,
    pub txns: Vec<TxnId>,
}

/// Scans committed transactions for lost-update groups.
///
/// A transaction participates for key `k` when its first access to `k` is
/// a read that resolved to a value, and a later micro-op writes `k`.
/// Participants are grouped by `(key, read value)`; every group of at
/// least two is a finding.
///
/// Output is deterministic: cases are sorted by key and then by first
/// participant, participants by history order.
#[must_use]
pub fn lost_update_cases<K, V>(history: &[Txn<K, V>]) -> Vec<LostUpdateCase<K, V>>
where
    K: Eq + Hash + Clone + Ord,
    V: Eq + Hash + Clone,
{
    let mut index: HashMap<K, HashMap<V, Vec<TxnId>>> = HashMap::new();

    for txn in history.iter().filter(|txn| txn.is_committed()) {
        for (key, value) in read_then_written(txn) {
            index
                .entry(key)
                .or_default()
                .entry(value)
                .or_default()
                .push(txn.id);
        }
    }

    let mut cases: Vec<LostUpdateCase<K, V>> = index
        .into_iter()
        .flat_map(|(key, by_value)| {
            by_value
                .into_iter()
                .filter(|(_, txns)| txns.len() >= 2)
                .map(move |(value, txns)| LostUpdateCase {
                    key: key.clone(),
                    value,
                    txns,
                })
        })
        .collect();
    cases.sort_by(|a, b| (&a.key, a.txns.first()).cmp(&(&b.key, b.txns.first())));

    tracing::debug!(cases = cases.len(), "lost-update scan finished");
    cases
}

/// Keys whose first access in `txn` was a resolved external read and
/// which `txn` subsequently wrote, with the value read.
fn read_then_written<K, V>(txn: &Txn<K, V>) -> Vec<(K, V)>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    let mut seen: HashSet<K> = HashSet::new();
    let mut first_read: HashMap<K, V> = HashMap::new();
    let mut reported: HashSet<K> = HashSet::new();
    let mut out = Vec::new();

    for mop in &txn.mops {
        match mop {
            Mop::Read { key, value } => {
                if seen.insert(key.clone()) {
                    if let Some(value) = value {
                        first_read.insert(key.clone(), value.clone());
                    }
                }
            }
            Mop::Write { key, .. } => {
                if seen.insert(key.clone()) {
                    // first access is a write: no external read to lose
                } else if let Some(value) = first_read.get(key) {
                    if reported.insert(key.clone()) {
                        out.push((key.clone(), value.clone()));
                    }
                }
            }
        }
    }
    out
}
