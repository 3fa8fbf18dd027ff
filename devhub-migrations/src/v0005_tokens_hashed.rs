//! Replace plaintext tenant tokens with their SHA-256 digest
//!
//! Each token document is swapped for a hashed copy inside a per-page
//! transaction, so a crash never leaves a token both plaintext and hashed.
//! Hashed documents carry `token_format = "sha256"`, which keeps them out of
//! the swap filter when the step is resumed.

use async_trait::async_trait;
use devhub_migrate::{
    transforms::{swap_in_transaction, DecodePolicy, SwapSpec},
    Migration, MigrationContext, TransformOutcome, TransformResult,
};
use devhub_store::{Document, DocumentStore, Filter, ID_FIELD};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::collections::TOKENS;

pub const TOKEN_FORMAT_FIELD: &str = "token_format";
pub const HASHED_FORMAT: &str = "sha256";

#[derive(Debug, Deserialize)]
struct PlainToken {
    #[serde(rename = "_id")]
    id: Value,
    token: String,
    #[serde(flatten)]
    rest: Document,
}

/// Hex-encoded SHA-256 of a token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn rehash(plain: PlainToken) -> TransformResult<Document> {
    let mut doc = plain.rest;
    doc.insert(ID_FIELD.to_string(), plain.id);
    doc.insert("token".to_string(), Value::String(hash_token(&plain.token)));
    doc.insert(
        TOKEN_FORMAT_FIELD.to_string(),
        Value::String(HASHED_FORMAT.to_string()),
    );
    Ok(doc)
}

/// Swap over tokens not hashed yet; malformed tokens fail the step
pub fn swap_spec() -> SwapSpec {
    SwapSpec::new(TOKENS, Filter::ne(TOKEN_FORMAT_FIELD, HASHED_FORMAT))
        .with_decode_policy(DecodePolicy::FailFast)
}

pub struct TokensHashed;

#[async_trait]
impl Migration for TokensHashed {
    fn version(&self) -> i64 {
        5
    }

    fn description(&self) -> &str {
        "hash plaintext tenant tokens"
    }

    async fn up(&self, ctx: &MigrationContext, store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        swap_in_transaction(ctx, store, &swap_spec(), rehash).await?;
        Ok(TransformOutcome::Applied)
    }

    async fn down(&self, _ctx: &MigrationContext, _store: &dyn DocumentStore) -> TransformResult<TransformOutcome> {
        Ok(TransformOutcome::irreversible("hashed tokens cannot be restored"))
    }
}
