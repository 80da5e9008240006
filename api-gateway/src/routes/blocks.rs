//! Block submission and frontier queries.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use chain::{Block, ChainId};

use crate::state::SharedState;

/// Request body for `POST /chains/:chain_id/blocks`: a hex-encoded,
/// canonically-wire-encoded [`Block`].
#[derive(Debug, Deserialize)]
pub struct SubmitBlockRequest {
    pub block_hex: String,
}

/// Response body for `POST /chains/:chain_id/blocks`.
#[derive(Debug, Serialize)]
pub struct SubmitBlockResponse {
    pub status: &'static str,
    pub hash_hex: String,
}

/// `POST /chains/:chain_id/blocks`
///
/// Decodes and ingests one block. `chain_id` in the path only scopes the
/// response logging; the block's own `public_key`/`com_id` fields
/// determine which chain(s) it is actually indexed under, since a block
/// lives on its author's personal chain and, optionally, a community
/// chain at once.
pub async fn submit_block(
    State(state): State<SharedState>,
    Path(_chain_id_hex): Path<String>,
    Json(body): Json<SubmitBlockRequest>,
) -> Result<(StatusCode, Json<SubmitBlockResponse>), (StatusCode, String)> {
    let blob = hex::decode(&body.block_hex).map_err(|_| bad_request("invalid hex encoding"))?;
    let block: Block = chain::wire::decode(&blob).map_err(|e| bad_request_owned(e.to_string()))?;

    if !block.structurally_valid() {
        return Err(bad_request("block failed structural validation"));
    }

    let hash = block.hash();
    state.db.add_block(&blob, &block);

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitBlockResponse {
            status: "ingested",
            hash_hex: hex::encode(hash.as_bytes()),
        }),
    ))
}

/// `GET /chains/:chain_id/frontier`
///
/// `chain_id` is the hex encoding of the raw chain id bytes (an author's
/// public key for a personal chain, or `com_prefix ‖ com_id` for a
/// community chain).
pub async fn get_frontier(
    State(state): State<SharedState>,
    Path(chain_id_hex): Path<String>,
) -> Result<Json<chain::Frontier>, (StatusCode, String)> {
    let raw = hex::decode(&chain_id_hex).map_err(|_| bad_request("invalid hex encoding"))?;
    let chain_id = ChainId::new(raw);

    match state.db.get_chain_frontier(&chain_id) {
        Some(frontier) => Ok(Json(frontier)),
        None => Err((StatusCode::NOT_FOUND, "unknown chain".to_string())),
    }
}

fn bad_request(msg: &'static str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.to_string())
}

fn bad_request_owned(msg: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg)
}
