//! Transactions as the checker sees them: an index into the recorded
//! history, an outcome, and an ordered list of read/write micro-operations.
//!
//! Keys and values are generic. A history has exactly one key type and one
//! value type; picking `K` and `V` at the call site is what enforces the
//! single-type rule.

use std::fmt::{self, Debug, Display, Formatter};

/// Identifies a transaction by its position in the recorded history.
///
/// Dependency graphs, cycles, and explanations all refer to transactions
/// through this index; the history slice is the arena it points into.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl Display for TxnId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// How a transaction ended.
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnOutcome {
    /// Committed.
    Ok,
    /// Definitely aborted.
    Fail,
    /// Outcome unknown (e.g. the client timed out).
    Info,
}

/// A single micro-operation within a transaction.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Mop<K, V> {
    Read {
        key: K,
        // None represents a read whose value was never resolved
        value: Option<V>,
    },
    Write {
        key: K,
        value: V,
    },
}

impl<K, V> Mop<K, V> {
    pub const fn read(key: K, value: V) -> Self {
        Self::Read {
            key,
            value: Some(value),
        }
    }

    pub const fn read_empty(key: K) -> Self {
        Self::Read { key, value: None }
    }

    pub const fn write(key: K, value: V) -> Self {
        Self::Write { key, value }
    }

    pub const fn key(&self) -> &K {
        match self {
            Self::Read { key, .. } | Self::Write { key, .. } => key,
        }
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

impl<K, V> Debug for Mop<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Read { key, value } => {
                write!(f, "{key:?}=>")?;
                if let Some(value) = value {
                    write!(f, "{value:?}")
                } else {
                    write!(f, "?")
                }
            }
            Self::Write { key, value } => write!(f, "{key:?}<={value:?}"),
        }
    }
}

/// A recorded transaction.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Clone, PartialEq, Eq)]
pub struct Txn<K, V> {
    pub id: TxnId,
    pub outcome: TxnOutcome,
    pub mops: Vec<Mop<K, V>>,
}

impl<K, V> Txn<K, V> {
    #[must_use]
    pub const fn committed(id: TxnId, mops: Vec<Mop<K, V>>) -> Self {
        Self {
            id,
            outcome: TxnOutcome::Ok,
            mops,
        }
    }

    #[must_use]
    pub const fn aborted(id: TxnId, mops: Vec<Mop<K, V>>) -> Self {
        Self {
            id,
            outcome: TxnOutcome::Fail,
            mops,
        }
    }

    #[must_use]
    pub const fn indeterminate(id: TxnId, mops: Vec<Mop<K, V>>) -> Self {
        Self {
            id,
            outcome: TxnOutcome::Info,
            mops,
        }
    }

    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self.outcome, TxnOutcome::Ok)
    }
}

impl<K, V> Debug for Txn<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {:?}", self.id, self.mops)?;
        match self.outcome {
            TxnOutcome::Ok => Ok(()),
            TxnOutcome::Fail => write!(f, "!"),
            TxnOutcome::Info => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mop_constructors() {
        let mop: Mop<&str, u64> = Mop::read("x", 1);
        assert_eq!(
            mop,
            Mop::Read {
                key: "x",
                value: Some(1)
            }
        );
        assert!(!mop.is_write());
        assert_eq!(*mop.key(), "x");

        let mop: Mop<&str, u64> = Mop::write("y", 2);
        assert!(mop.is_write());
    }

    #[test]
    fn txn_debug() {
        let txn = Txn::committed(TxnId(3), vec![Mop::read_empty("x"), Mop::write("x", 2)]);
        assert_eq!(format!("{txn:?}"), "T3 [\"x\"=>?, \"x\"<=2]");

        let txn = Txn::aborted(TxnId(4), vec![Mop::<&str, u64>::write("y", 1)]);
        assert_eq!(format!("{txn:?}"), "T4 [\"y\"<=1]!");
    }

    #[test]
    fn outcome_predicates() {
        assert!(Txn::<&str, u64>::committed(TxnId(0), vec![]).is_committed());
        assert!(!Txn::<&str, u64>::indeterminate(TxnId(0), vec![]).is_committed());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn txn_serde_roundtrip() {
        let txn = Txn::committed(TxnId(7), vec![Mop::read("x", 1u64), Mop::write("x", 2)]);
        let json = serde_json::to_string(&txn).unwrap();
        let back: Txn<String, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, TxnId(7));
        assert_eq!(back.mops.len(), 2);
    }
}
