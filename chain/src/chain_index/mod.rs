//! Chain index (C3): the in-memory per-chain DAG.
//!
//! Maintains forward/back pointers, holes, inconsistencies and the
//! (consistent) terminal set for one chain, and exposes the two
//! operations everything else is built on: [`ChainIndex::frontier`] and
//! [`ChainIndex::reconcile`]. Callers are expected to hold one
//! `ChainIndex` behind a per-chain mutex (see [`crate::db::DatabaseManager`]);
//! nothing in here is internally synchronized.

mod frontier;

pub use frontier::{Frontier, FrontierDiff};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use lru::LruCache;

use crate::types::{Dot, Hash, Links, Ranges, SeqNum, ShortHash};

/// Default capacity of the bounded forward-closure cache, per §5.
pub const DEFAULT_CLOSURE_CACHE_CAPACITY: usize = 10_000;

/// Default cap on intermediate dots attached per conflict in a reconcile
/// response, per §5.
pub const DEFAULT_MAX_EXTRA_DOTS: u32 = 5;

/// Per-chain DAG index.
pub struct ChainIndex {
    versions: HashMap<SeqNum, BTreeSet<ShortHash>>,
    forward_pointers: HashMap<Dot, BTreeSet<Dot>>,
    back_pointers: HashMap<Dot, Links>,
    holes: BTreeSet<SeqNum>,
    max_known_seq_num: SeqNum,
    inconsistencies: BTreeSet<Dot>,
    inconsistent_blocks: BTreeSet<Dot>,
    terminal: BTreeSet<Dot>,
    consistent_terminal: BTreeSet<Dot>,
    closure_cache: LruCache<Dot, Vec<Dot>>,
}

impl Default for ChainIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CLOSURE_CACHE_CAPACITY)
    }
}

impl ChainIndex {
    pub fn new(closure_cache_capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(closure_cache_capacity.max(1)).unwrap();
        Self {
            versions: HashMap::new(),
            forward_pointers: HashMap::new(),
            back_pointers: HashMap::new(),
            holes: BTreeSet::new(),
            max_known_seq_num: 0,
            inconsistencies: BTreeSet::new(),
            inconsistent_blocks: BTreeSet::new(),
            terminal: BTreeSet::from([Dot::GENESIS]),
            consistent_terminal: BTreeSet::from([Dot::GENESIS]),
            closure_cache: LruCache::new(capacity),
        }
    }

    fn is_known_consistent(&self, d: &Dot) -> bool {
        d.is_genesis()
            || (self.back_pointers.contains_key(d) && !self.inconsistent_blocks.contains(d))
    }

    /// Ingests one block's chain-local position and back-links.
    ///
    /// Returns the newly-consistent dots in canonical (topological)
    /// order, ready for ordered delivery to observers.
    pub fn add_block(&mut self, block_links: Links, seq: SeqNum, hash: Hash) -> Vec<Dot> {
        let dot = Dot::new(seq, hash.short());
        if self.back_pointers.contains_key(&dot) {
            // Already ingested: ingestion is idempotent, report nothing new.
            return Vec::new();
        }

        // 1. versions
        self.versions.entry(seq).or_default().insert(hash.short());

        // 2. forward/back pointers
        self.back_pointers.insert(dot, block_links.clone());
        for b in block_links.iter() {
            self.forward_pointers.entry(*b).or_default().insert(dot);
        }

        // 3. holes
        self.holes.remove(&seq);
        for s in (self.max_known_seq_num + 1)..seq {
            self.holes.insert(s);
        }
        self.max_known_seq_num = self.max_known_seq_num.max(seq);

        // 4. inconsistency introduction
        let mut block_consistent = true;
        for b in block_links.iter() {
            if !b.is_genesis() && !self.back_pointers.contains_key(b) {
                self.inconsistencies.insert(*b);
                block_consistent = false;
            }
            if self.inconsistent_blocks.contains(b) {
                block_consistent = false;
            }
        }
        if !block_consistent {
            self.inconsistent_blocks.insert(dot);
        }

        // 5. inconsistency repair
        let mut newly_consistent = Vec::new();
        if block_consistent {
            newly_consistent.push(dot);
        }
        if self.inconsistencies.remove(&dot) && block_consistent {
            newly_consistent.extend(self.repair_descendants(dot));
        }

        // 6. terminal recomputation
        self.recompute_terminal(dot);

        self.closure_cache.clear();

        newly_consistent
    }

    /// Forward BFS from `start`'s successors, clearing any descendant
    /// whose back-links are now all known and consistent, cascading
    /// through its own forward pointers in turn.
    fn repair_descendants(&mut self, start: Dot) -> Vec<Dot> {
        let mut newly_consistent = Vec::new();
        let mut queue: VecDeque<Dot> = self
            .forward_pointers
            .get(&start)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        let mut visited: HashSet<Dot> = HashSet::new();

        while let Some(e) = queue.pop_front() {
            if !visited.insert(e) {
                continue;
            }
            let links_now_consistent = self
                .back_pointers
                .get(&e)
                .map(|links| links.iter().all(|b| self.is_known_consistent(b)))
                .unwrap_or(false);
            if !links_now_consistent {
                continue;
            }
            if self.inconsistent_blocks.remove(&e) {
                newly_consistent.push(e);
            }
            if let Some(successors) = self.forward_pointers.get(&e) {
                for s in successors {
                    queue.push_back(*s);
                }
            }
        }
        newly_consistent
    }

    fn collect_sinks(&self, start: Dot, out: &mut BTreeSet<Dot>, visited: &mut HashSet<Dot>) {
        if !visited.insert(start) {
            return;
        }
        match self.forward_pointers.get(&start) {
            None => {
                out.insert(start);
            }
            Some(succs) if succs.is_empty() => {
                out.insert(start);
            }
            Some(succs) => {
                for s in succs.clone() {
                    self.collect_sinks(s, out, visited);
                }
            }
        }
    }

    fn collect_consistent_sinks(
        &self,
        start: Dot,
        out: &mut BTreeSet<Dot>,
        visited: &mut HashSet<Dot>,
    ) {
        if !visited.insert(start) {
            return;
        }
        if !self.is_known_consistent(&start) {
            return;
        }
        let consistent_succs: Vec<Dot> = self
            .forward_pointers
            .get(&start)
            .map(|succs| {
                succs
                    .iter()
                    .filter(|s| self.is_known_consistent(s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if consistent_succs.is_empty() {
            out.insert(start);
        } else {
            for s in consistent_succs {
                self.collect_consistent_sinks(s, out, visited);
            }
        }
    }

    fn recompute_terminal(&mut self, new_dot: Dot) {
        let seeds: Vec<Dot> = self
            .terminal
            .iter()
            .cloned()
            .chain(std::iter::once(new_dot))
            .collect();

        let mut terminal = BTreeSet::new();
        let mut visited = HashSet::new();
        for seed in &seeds {
            self.collect_sinks(*seed, &mut terminal, &mut visited);
        }

        let mut consistent_terminal = BTreeSet::new();
        let mut visited_consistent = HashSet::new();
        for seed in &seeds {
            self.collect_consistent_sinks(*seed, &mut consistent_terminal, &mut visited_consistent);
        }

        self.terminal = terminal;
        self.consistent_terminal = consistent_terminal;
    }

    /// Forward closure of terminal dots reachable from `start`, cached
    /// by start dot; invalidated in full on every [`ChainIndex::add_block`].
    fn forward_closure_terminals(&mut self, start: Dot) -> Vec<Dot> {
        if let Some(cached) = self.closure_cache.get(&start) {
            return cached.clone();
        }
        let mut out = BTreeSet::new();
        let mut visited = HashSet::new();
        self.collect_sinks(start, &mut out, &mut visited);
        let result: Vec<Dot> = out.into_iter().collect();
        self.closure_cache.put(start, result.clone());
        result
    }

    /// `{ terminal, holes_as_ranges, sorted(inconsistencies) }`.
    pub fn frontier(&self) -> Frontier {
        Frontier {
            terminal: self.terminal.iter().cloned().collect(),
            holes: Ranges::encode(self.holes.iter().cloned()),
            inconsistencies: self.inconsistencies.iter().cloned().collect(),
        }
    }

    /// Computes the [`FrontierDiff`] that would bring `other` (a peer's
    /// frontier) and this chain into agreement, using `last_point` as the
    /// low-water mark for extra-dot sampling and `max_extra_dots` as the
    /// cap on samples per conflict.
    pub fn reconcile(
        &mut self,
        other: &Frontier,
        last_point: SeqNum,
        max_extra_dots: u32,
    ) -> FrontierDiff {
        let other_max = other.terminal.iter().map(|d| d.seq_num).max().unwrap_or(0);

        let front_known: BTreeSet<SeqNum> = (1..=other_max)
            .filter(|s| !other.holes.contains(*s))
            .collect();
        let peer_known: BTreeSet<SeqNum> = (1..=self.max_known_seq_num)
            .filter(|s| !self.holes.contains(s))
            .collect();

        let missing: Vec<SeqNum> = front_known.difference(&peer_known).cloned().collect();
        let missing = Ranges::encode(missing);

        let mut conflicts: BTreeMap<Dot, BTreeMap<SeqNum, Vec<ShortHash>>> = BTreeMap::new();

        for d in &other.terminal {
            if let Some(versions_at_seq) = self.versions.get(&d.seq_num) {
                if !versions_at_seq.contains(&d.short_hash) {
                    conflicts.entry(*d).or_default();
                }
            }
        }

        let probe_candidates: Vec<Dot> = self.inconsistencies.iter().cloned().collect();
        for i in probe_candidates {
            let closure = self.forward_closure_terminals(i);
            let progressed = !closure.is_empty()
                && closure.iter().all(|t| {
                    other.terminal.contains(t)
                        && !other.inconsistencies.contains(t)
                        && !other.holes.contains(t.seq_num)
                });
            if progressed {
                conflicts.entry(i).or_default();
            }
        }

        for (c, extra_map) in conflicts.iter_mut() {
            if max_extra_dots == 0 || c.seq_num <= last_point {
                continue;
            }
            let span = c.seq_num - last_point;
            let spacing = span.div_ceil(max_extra_dots).max(1);
            let mut k = last_point + spacing;
            while k < c.seq_num {
                if let Some(versions_at_k) = self.versions.get(&k) {
                    extra_map.insert(k, versions_at_k.iter().cloned().collect());
                }
                k += spacing;
            }
        }

        FrontierDiff { missing, conflicts }
    }

    pub fn get_next_links(&self, dot: &Dot) -> Option<Links> {
        self.forward_pointers
            .get(dot)
            .map(|s| Links::new(s.iter().cloned()))
    }

    pub fn get_prev_links(&self, dot: &Dot) -> Option<Links> {
        self.back_pointers.get(dot).cloned()
    }

    pub fn get_dots_by_seq_num(&self, seq: SeqNum) -> Vec<Dot> {
        self.versions
            .get(&seq)
            .map(|shs| shs.iter().map(|sh| Dot::new(seq, *sh)).collect())
            .unwrap_or_default()
    }

    pub fn get_all_short_hash_by_seq_num(&self, seq: SeqNum) -> Option<BTreeSet<ShortHash>> {
        self.versions.get(&seq).cloned()
    }

    pub fn terminal(&self) -> &BTreeSet<Dot> {
        &self.terminal
    }

    pub fn consistent_terminal(&self) -> &BTreeSet<Dot> {
        &self.consistent_terminal
    }

    pub fn holes(&self) -> &BTreeSet<SeqNum> {
        &self.holes
    }

    pub fn inconsistencies(&self) -> &BTreeSet<Dot> {
        &self.inconsistencies
    }

    pub fn inconsistent_blocks(&self) -> &BTreeSet<Dot> {
        &self.inconsistent_blocks
    }

    pub fn max_known_seq_num(&self) -> SeqNum {
        self.max_known_seq_num
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShortHash as Sh;

    fn sh(b: u8) -> Sh {
        Sh([b, b, b, b])
    }

    fn hash_for(b: u8) -> Hash {
        // Build a Hash whose short() equals sh(b) by construction.
        let mut bytes = [0u8; crate::types::HASH_LEN];
        bytes[0] = b;
        bytes[1] = b;
        bytes[2] = b;
        bytes[3] = b;
        Hash(bytes)
    }

    #[test]
    fn ingesting_same_block_twice_is_idempotent() {
        let mut idx = ChainIndex::default();
        let h1 = hash_for(1);
        idx.add_block(Links::new(vec![Dot::GENESIS]), 1, h1);
        let frontier_before = idx.frontier();
        idx.add_block(Links::new(vec![Dot::GENESIS]), 1, h1);
        let frontier_after = idx.frontier();
        assert_eq!(frontier_before, frontier_after);
    }

    #[test]
    fn fresh_consistent_append_is_reported_newly_consistent() {
        let mut idx = ChainIndex::default();
        let h1 = hash_for(1);
        let newly = idx.add_block(Links::new(vec![Dot::GENESIS]), 1, h1);
        assert_eq!(newly, vec![Dot::new(1, h1.short())]);
        assert!(idx.holes().is_empty());
        assert!(idx.inconsistencies().is_empty());
    }

    #[test]
    fn scenario_fill_a_hole() {
        let mut idx = ChainIndex::default();
        let dot6 = Dot::new(6, hash_for(6).short());
        let mut prev = Dot::GENESIS;
        let mut five_dot = Dot::GENESIS;

        for seq in [1u32, 2, 3, 4, 5, 7, 8, 9, 10] {
            let h = hash_for(seq as u8);
            let links = if seq == 7 { dot6 } else { prev };
            idx.add_block(Links::new(vec![links]), seq, h);
            prev = Dot::new(seq, h.short());
            if seq == 5 {
                five_dot = prev;
            }
        }
        assert!(idx.holes().contains(&6));
        assert!(idx.inconsistencies().contains(&dot6));

        idx.add_block(Links::new(vec![five_dot]), 6, hash_for(6));

        assert!(idx.holes().is_empty());
        assert!(idx.inconsistencies().is_empty());
        assert_eq!(
            idx.consistent_terminal().iter().next().copied(),
            Some(Dot::new(10, hash_for(10).short()))
        );
    }

    #[test]
    fn scenario_inconsistency_repair_cascade() {
        let mut idx = ChainIndex::default();
        let h1 = hash_for(1);
        let h2 = hash_for(2);
        let h3 = hash_for(3);
        let h4 = hash_for(4);
        let h5 = hash_for(5);
        let d1 = Dot::new(1, h1.short());
        let d2 = Dot::new(2, h2.short());
        let d3 = Dot::new(3, h3.short());
        let d4 = Dot::new(4, h4.short());

        assert_eq!(idx.add_block(Links::new(vec![d2]), 3, h3), Vec::new());
        assert_eq!(idx.add_block(Links::new(vec![d4]), 5, h5), Vec::new());
        assert_eq!(idx.add_block(Links::new(vec![d3]), 4, h4), Vec::new());
        assert_eq!(idx.add_block(Links::new(vec![d1]), 2, h2), Vec::new());

        let newly = idx.add_block(Links::new(vec![Dot::GENESIS]), 1, h1);
        assert_eq!(
            newly,
            vec![
                d1,
                d2,
                d3,
                d4,
                Dot::new(5, h5.short()),
            ]
        );
        assert!(idx.inconsistent_blocks().is_empty());
        assert!(idx.inconsistencies().is_empty());
    }

    #[test]
    fn scenario_resolve_a_conflict_surfaces_both_heads() {
        let mut a = ChainIndex::default();
        let mut b = ChainIndex::default();
        let mut prev = Dot::GENESIS;
        for seq in 1u32..=9 {
            let h = hash_for(seq as u8);
            a.add_block(Links::new(vec![prev]), seq, h);
            b.add_block(Links::new(vec![prev]), seq, h);
            prev = Dot::new(seq, h.short());
        }
        let hx = hash_for(200);
        let hy = hash_for(201);
        a.add_block(Links::new(vec![prev]), 10, hx);
        b.add_block(Links::new(vec![prev]), 10, hy);

        let diff = a.reconcile(&b.frontier(), 0, DEFAULT_MAX_EXTRA_DOTS);
        assert!(diff.conflicts.contains_key(&Dot::new(10, hy.short())));
    }

    #[test]
    fn reconcile_is_idempotent_on_converged_peers() {
        let mut a = ChainIndex::default();
        let mut prev = Dot::GENESIS;
        for seq in 1u32..=5 {
            let h = hash_for(seq as u8);
            a.add_block(Links::new(vec![prev]), seq, h);
            prev = Dot::new(seq, h.short());
        }
        let frontier = a.frontier();
        let diff1 = a.reconcile(&frontier, 0, DEFAULT_MAX_EXTRA_DOTS);
        assert!(diff1.is_empty());
        let diff2 = a.reconcile(&frontier, 5, DEFAULT_MAX_EXTRA_DOTS);
        assert!(diff2.is_empty());
    }
}
