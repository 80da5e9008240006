//! Compact, canonical encoding of a set of sequence numbers as sorted,
//! non-overlapping, non-adjacent `[start, end]` runs.
//!
//! Frontiers describe "holes" and gossip describes "missing" sequence
//! numbers as [`Ranges`] rather than as raw `Vec<SeqNum>`, since both are
//! usually long runs of consecutive numbers. Construction always produces
//! the canonical run-length form so that two `Ranges` built from the same
//! logical set compare and serialize identically.

use serde::{Deserialize, Serialize};

use super::dot::SeqNum;

/// Canonical run-length encoding of a set of sequence numbers, as sorted,
/// merged, inclusive `(start, end)` pairs.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Ranges(Vec<(SeqNum, SeqNum)>);

impl Ranges {
    /// Builds the canonical [`Ranges`] covering exactly the given sequence
    /// numbers.
    pub fn encode(seq_nums: impl IntoIterator<Item = SeqNum>) -> Self {
        let mut sorted: Vec<SeqNum> = seq_nums.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut runs = Vec::new();
        let mut iter = sorted.into_iter();
        if let Some(first) = iter.next() {
            let mut start = first;
            let mut end = first;
            for n in iter {
                if n == end + 1 {
                    end = n;
                } else {
                    runs.push((start, end));
                    start = n;
                    end = n;
                }
            }
            runs.push((start, end));
        }
        Ranges(runs)
    }

    pub fn empty() -> Self {
        Ranges(Vec::new())
    }

    /// Expands this range set back into an ordered `Vec<SeqNum>`.
    pub fn expand(&self) -> Vec<SeqNum> {
        self.0
            .iter()
            .flat_map(|&(start, end)| start..=end)
            .collect()
    }

    pub fn contains(&self, n: SeqNum) -> bool {
        self.0
            .binary_search_by(|&(start, end)| {
                if n < start {
                    std::cmp::Ordering::Greater
                } else if n > end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn runs(&self) -> &[(SeqNum, SeqNum)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total count of sequence numbers covered by this range set.
    pub fn count(&self) -> u64 {
        self.0
            .iter()
            .map(|&(start, end)| u64::from(end - start) + 1)
            .sum()
    }
}
