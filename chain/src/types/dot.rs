//! Sequence numbers and dots.
//!
//! A [`Dot`] names one version of a block on one chain: the sequence
//! number it occupies, and the short hash that disambiguates it from any
//! sibling occupying the same sequence number (a fork). Sequence number
//! `0` is reserved for the genesis sentinel and is never assigned to a
//! real block.

use serde::{Deserialize, Serialize};

use super::hash::ShortHash;

/// Position of a block within a chain. `0` is reserved for genesis.
pub type SeqNum = u32;

/// `(sequence_number, short_hash)` pair identifying one version of a block.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Dot {
    pub seq_num: SeqNum,
    pub short_hash: ShortHash,
}

impl Dot {
    /// Sentinel dot preceding the first real block of any chain.
    pub const GENESIS: Dot = Dot {
        seq_num: 0,
        short_hash: ShortHash::ZERO,
    };

    pub fn new(seq_num: SeqNum, short_hash: ShortHash) -> Self {
        Self {
            seq_num,
            short_hash,
        }
    }

    /// Whether this dot is the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        *self == Dot::GENESIS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_dot_has_zero_seq_and_short_hash() {
        assert_eq!(Dot::GENESIS.seq_num, 0);
        assert_eq!(Dot::GENESIS.short_hash, ShortHash::ZERO);
        assert!(Dot::GENESIS.is_genesis());
    }

    #[test]
    fn dots_order_by_seq_num_then_short_hash() {
        let a = Dot::new(1, ShortHash([0, 0, 0, 1]));
        let b = Dot::new(1, ShortHash([0, 0, 0, 2]));
        let c = Dot::new(2, ShortHash([0, 0, 0, 0]));
        assert!(a < b);
        assert!(b < c);
    }
}
