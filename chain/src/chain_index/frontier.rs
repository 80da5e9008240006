//! Frontier and FrontierDiff: the compact summaries gossip exchanges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Dot, Ranges, SeqNum, ShortHash};
use crate::wire::{self, WireError};

/// Compact summary of a chain's state: `{ terminal, holes, inconsistencies }`.
///
/// Canonically comparable under [`Frontier::is_newer_than`]: legal
/// updates only ever move a frontier "forward" in this partial order.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Frontier {
    pub terminal: Vec<Dot>,
    pub holes: Ranges,
    pub inconsistencies: Vec<Dot>,
}

impl Frontier {
    pub fn to_bytes(&self) -> Vec<u8> {
        wire::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        wire::decode(bytes)
    }

    fn max_terminal_seq(&self) -> SeqNum {
        self.terminal.iter().map(|d| d.seq_num).max().unwrap_or(0)
    }

    /// `self > other`: true when the maximum terminal sequence number
    /// grows, the hole count shrinks, the inconsistency count shrinks, or
    /// the number of terminal heads grows — any one of these is
    /// sufficient, they are not required to hold jointly. This matches
    /// the source's literal comparison, including the edge case where
    /// none of the "shrinks" criteria hold but the numeric max terminal
    /// alone increased.
    pub fn is_newer_than(&self, other: &Frontier) -> bool {
        self.max_terminal_seq() > other.max_terminal_seq()
            || self.holes.count() < other.holes.count()
            || self.inconsistencies.len() < other.inconsistencies.len()
            || self.terminal.len() > other.terminal.len()
    }
}

/// Instructions to converge two peers' views of one chain: missing
/// sequence-number ranges, plus per-conflict extra-dot probes.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct FrontierDiff {
    pub missing: Ranges,
    pub conflicts: BTreeMap<Dot, BTreeMap<SeqNum, Vec<ShortHash>>>,
}

impl FrontierDiff {
    pub fn to_bytes(&self) -> Vec<u8> {
        wire::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        wire::decode(bytes)
    }

    /// Whether this diff carries no instructions at all: the signal that
    /// two peers have converged.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.conflicts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShortHash as Sh;

    fn dot(seq: u32, b: u8) -> Dot {
        Dot::new(seq, Sh([b, b, b, b]))
    }

    #[test]
    fn frontier_round_trips_through_bytes() {
        let f = Frontier {
            terminal: vec![dot(5, 1)],
            holes: Ranges::encode([2, 3]),
            inconsistencies: vec![dot(1, 9)],
        };
        let bytes = f.to_bytes();
        let decoded = Frontier::from_bytes(&bytes).unwrap();
        assert_eq!(f, decoded);
    }

    #[test]
    fn frontier_diff_round_trips_through_bytes() {
        let mut conflicts = BTreeMap::new();
        conflicts.insert(dot(10, 1), BTreeMap::from([(3u32, vec![Sh([0, 0, 0, 1])])]));
        let d = FrontierDiff {
            missing: Ranges::encode([1, 2, 3]),
            conflicts,
        };
        let bytes = d.to_bytes();
        let decoded = FrontierDiff::from_bytes(&bytes).unwrap();
        assert_eq!(d, decoded);
    }

    #[test]
    fn newer_when_max_terminal_seq_grows() {
        let older = Frontier {
            terminal: vec![dot(5, 1)],
            ..Default::default()
        };
        let newer = Frontier {
            terminal: vec![dot(6, 1)],
            ..Default::default()
        };
        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
    }

    #[test]
    fn newer_when_holes_shrink_even_if_terminal_seq_same() {
        let with_hole = Frontier {
            terminal: vec![dot(5, 1)],
            holes: Ranges::encode([3]),
            ..Default::default()
        };
        let without_hole = Frontier {
            terminal: vec![dot(5, 1)],
            holes: Ranges::empty(),
            ..Default::default()
        };
        assert!(without_hole.is_newer_than(&with_hole));
    }

    #[test]
    fn empty_diff_reports_empty() {
        assert!(FrontierDiff::default().is_empty());
    }
}
