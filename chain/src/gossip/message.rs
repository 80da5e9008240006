//! Wire messages exchanged between gossiping peers.

use serde::{Deserialize, Serialize};

use crate::chain_index::{Frontier, FrontierDiff};
use crate::types::ChainId;
use crate::wire::{self, WireError};

/// One gossip protocol message, scoped to a single chain.
///
/// Every variant is a one-way push: nothing in this protocol is a
/// blocking request/response pair at the transport level, even where a
/// reply is expected (e.g. `Frontier { request_response: true }` expects
/// an eventual `FrontierResponse`, but the sender does not block waiting
/// for it).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GossipMessage {
    /// A peer's current view of a chain. `request_response` distinguishes
    /// a periodic broadcast (false) from a round that expects the
    /// receiver to answer back with its own frontier once it has
    /// reconciled (true).
    Frontier {
        chain_id: ChainId,
        frontier: Frontier,
        request_response: bool,
    },
    /// Answer to a `Frontier { request_response: true }`.
    FrontierResponse { chain_id: ChainId, frontier: Frontier },
    /// Ask the receiver for the blocks described by `diff`.
    BlocksRequest { chain_id: ChainId, diff: FrontierDiff },
    /// One block, either served in answer to a `BlocksRequest` or pushed
    /// unsolicited. `ttl` is the number of further hops this block may be
    /// relayed; `0` means "do not relay further".
    Block {
        chain_id: ChainId,
        blob: Vec<u8>,
        ttl: u8,
    },
}

impl GossipMessage {
    pub fn to_bytes(&self) -> Vec<u8> {
        wire::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        wire::decode(bytes)
    }
}

/// Errors a [`super::PeerTransport`] may report back to the engine.
#[derive(Debug)]
pub enum GossipError {
    Wire(WireError),
    Transport(String),
}

impl std::fmt::Display for GossipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GossipError::Wire(e) => write!(f, "gossip wire error: {e}"),
            GossipError::Transport(msg) => write!(f, "gossip transport error: {msg}"),
        }
    }
}

impl std::error::Error for GossipError {}

impl From<WireError> for GossipError {
    fn from(e: WireError) -> Self {
        GossipError::Wire(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dot, ShortHash};

    #[test]
    fn frontier_message_round_trips_through_bytes() {
        let msg = GossipMessage::Frontier {
            chain_id: ChainId::new(b"demo".to_vec()),
            frontier: Frontier {
                terminal: vec![Dot::new(1, ShortHash([1, 1, 1, 1]))],
                holes: Default::default(),
                inconsistencies: Vec::new(),
            },
            request_response: true,
        };
        let bytes = msg.to_bytes();
        let decoded = GossipMessage::from_bytes(&bytes).unwrap();
        match decoded {
            GossipMessage::Frontier { request_response, .. } => assert!(request_response),
            _ => panic!("expected a Frontier message"),
        }
    }
}
