//! Core domain types used by the chain index and gossip layers.
//!
//! This module defines the small set of strongly-typed identifiers that
//! everything else is built on: content hashes, sequence numbers, dots
//! (sequence number + short hash), link sets, chain identifiers, and
//! compact sequence-number ranges. The goal, as elsewhere in this crate,
//! is to avoid "naked" byte buffers and `u32`s in public APIs.

mod chain_id;
mod dot;
mod hash;
mod links;
mod ranges;

pub use chain_id::ChainId;
pub use dot::{Dot, SeqNum};
pub use hash::{HASH_LEN, Hash, SHORT_HASH_LEN, ShortHash};
pub use links::Links;
pub use ranges::Ranges;
