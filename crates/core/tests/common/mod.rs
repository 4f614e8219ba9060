//! DSL macros for building test graphs.
//!
//! ```ignore
//! let g = graph! {
//!     1 => 2 [ww],
//!     2 => 3 [wr, realtime],
//!     3 => 1 [rw],
//! };
//! ```
//!
//! - `rel!(ww)` → `Rel::Ww`
//! - `rels![ww, realtime]` → a `RelSet`
//! - `graph! { a => b [rels], ... }` → a `DepGraph`

/// Build a single relation from its lowercase name.
#[macro_export]
macro_rules! rel {
    (ww) => {
        adya_core::rels::Rel::Ww
    };
    (wr) => {
        adya_core::rels::Rel::Wr
    };
    (rw) => {
        adya_core::rels::Rel::Rw
    };
    (process) => {
        adya_core::rels::Rel::Process
    };
    (realtime) => {
        adya_core::rels::Rel::Realtime
    };
}

/// Build a `RelSet` from relation names.
#[macro_export]
macro_rules! rels {
    ( $($r:ident),+ ) => {
        adya_core::rels::RelSet::of(&[ $( $crate::rel!($r) ),+ ])
    };
}

/// Build a labeled `DepGraph` from an edge list.
#[macro_export]
macro_rules! graph {
    ( $( $a:literal => $b:literal [ $($r:ident),+ ] ),* $(,)? ) => {{
        let mut g = adya_core::graph::DepGraph::default();
        $(
            g.add_edge(
                adya_core::history::TxnId($a),
                adya_core::history::TxnId($b),
                $crate::rels!($($r),+),
            );
        )*
        g
    }};
}

/// Parse an anomaly kind by its report name.
#[allow(dead_code)]
pub fn kind(name: &str) -> adya_core::AnomalyKind {
    name.parse().expect("well-formed anomaly name")
}

/// Parse a cycle anomaly type by its report name.
#[allow(dead_code)]
pub fn ty(name: &str) -> adya_core::AnomalyType {
    name.parse().expect("well-formed anomaly type")
}
