//! Peer selection strategies for gossip rounds.

use std::collections::HashMap;

use rand::seq::SliceRandom;

use crate::chain_index::Frontier;
use crate::db::PeerId;

/// Picks which peers to contact in a gossip round.
pub trait PeerSelectionStrategy: Send + Sync + 'static {
    /// Selects up to `fanout` peers from `candidates`, excluding `exclude`
    /// (the peer a message originated from, when relaying). `known` holds
    /// each candidate's last-observed frontier, when we have one; a
    /// candidate absent from `known` is of unknown staleness.
    fn select(
        &self,
        candidates: &[PeerId],
        known: &HashMap<PeerId, Frontier>,
        exclude: Option<&PeerId>,
        fanout: usize,
        our_frontier: &Frontier,
    ) -> Vec<PeerId>;
}

/// Prefers peers whose last-observed frontier looks strictly behind ours,
/// on the theory that contacting them first converges the network fastest.
/// Peers of unknown staleness are tried before peers we believe are
/// already caught up.
pub struct Smart;

impl PeerSelectionStrategy for Smart {
    fn select(
        &self,
        candidates: &[PeerId],
        known: &HashMap<PeerId, Frontier>,
        exclude: Option<&PeerId>,
        fanout: usize,
        our_frontier: &Frontier,
    ) -> Vec<PeerId> {
        let mut scored: Vec<(u8, &PeerId)> = candidates
            .iter()
            .filter(|p| exclude != Some(*p))
            .map(|p| {
                let rank = match known.get(p) {
                    None => 0,
                    Some(their_frontier) => {
                        if our_frontier.is_newer_than(their_frontier) {
                            1
                        } else {
                            2
                        }
                    }
                };
                (rank, p)
            })
            .collect();
        scored.sort_by_key(|(rank, _)| *rank);
        scored.into_iter().take(fanout).map(|(_, p)| p.clone()).collect()
    }
}

/// Picks a uniformly random subset of peers, ignoring staleness.
pub struct Random;

impl PeerSelectionStrategy for Random {
    fn select(
        &self,
        candidates: &[PeerId],
        _known: &HashMap<PeerId, Frontier>,
        exclude: Option<&PeerId>,
        fanout: usize,
        _our_frontier: &Frontier,
    ) -> Vec<PeerId> {
        let mut pool: Vec<PeerId> = candidates
            .iter()
            .filter(|p| exclude != Some(*p))
            .cloned()
            .collect();
        pool.shuffle(&mut rand::thread_rng());
        pool.into_iter().take(fanout).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dot, Ranges, ShortHash};

    fn frontier_at(seq: u32) -> Frontier {
        Frontier {
            terminal: vec![Dot::new(seq, ShortHash([1, 1, 1, 1]))],
            holes: Ranges::empty(),
            inconsistencies: Vec::new(),
        }
    }

    #[test]
    fn smart_selection_prefers_unknown_then_stale_peers() {
        let peers = vec![b"stale".to_vec(), b"unknown".to_vec(), b"caught-up".to_vec()];
        let mut known = HashMap::new();
        known.insert(b"stale".to_vec(), frontier_at(1));
        known.insert(b"caught-up".to_vec(), frontier_at(10));

        let our_frontier = frontier_at(10);
        let selected = Smart.select(&peers, &known, None, 2, &our_frontier);

        assert_eq!(selected.len(), 2);
        assert!(selected.contains(&b"unknown".to_vec()));
        assert!(selected.contains(&b"stale".to_vec()));
    }

    #[test]
    fn selection_excludes_the_given_peer() {
        let peers = vec![b"a".to_vec(), b"b".to_vec()];
        let known = HashMap::new();
        let our_frontier = frontier_at(1);
        let excluded = b"a".to_vec();

        let selected = Random.select(&peers, &known, Some(&excluded), 5, &our_frontier);
        assert!(!selected.contains(&excluded));
    }
}
