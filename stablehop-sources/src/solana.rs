//! Solana JSON-RPC calls used for settlement fees and block time sampling.
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::json;
use stablehop_common::{traits::SettlementFeeSource, QuoteError, SourceKind, TtlCache};
use tracing::{debug, instrument};

use crate::rpc::JsonRpcClient;

const LAMPORTS_PER_SOL: f64 = 1e9;
const SETTLEMENT_FEE_KEY: &str = "sol_fee";
/// Index of `Transfer` in the system program instruction enum.
const SYSTEM_TRANSFER: u32 = 2;
/// Number of recent slots sampled for the average block time.
pub const BLOCK_TIME_WINDOW: u64 = 20;

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Clone)]
pub struct SolanaRpcClient {
    rpc: JsonRpcClient,
}

impl SolanaRpcClient {
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }

    pub async fn latest_blockhash(&self, origin: SourceKind) -> Result<[u8; 32], QuoteError> {
        let response: WithContext<LatestBlockhash> = self
            .rpc
            .request("getLatestBlockhash", json!([{"commitment": "confirmed"}]), origin)
            .await?;
        let raw = response.value.blockhash;
        let bytes = bs58::decode(&raw)
            .into_vec()
            .map_err(|e| QuoteError::upstream(origin, format!("invalid blockhash {raw}: {e}")))?;
        <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| QuoteError::upstream(origin, format!("blockhash {raw} is not 32 bytes")))
    }

    /// Fee in lamports the cluster would charge for `message`, `None` when the blockhash
    /// already expired.
    pub async fn fee_for_message(
        &self,
        message: &[u8],
        origin: SourceKind,
    ) -> Result<Option<u64>, QuoteError> {
        let encoded = STANDARD.encode(message);
        let response: WithContext<Option<u64>> = self
            .rpc
            .request("getFeeForMessage", json!([encoded, {"commitment": "confirmed"}]), origin)
            .await?;
        Ok(response.value)
    }

    pub async fn slot(&self, origin: SourceKind) -> Result<u64, QuoteError> {
        self.rpc
            .request("getSlot", json!([{"commitment": "confirmed"}]), origin)
            .await
    }

    /// Produced blocks between `start` and `end`, both inclusive.
    pub async fn blocks(
        &self,
        start: u64,
        end: u64,
        origin: SourceKind,
    ) -> Result<Vec<u64>, QuoteError> {
        self.rpc
            .request("getBlocks", json!([start, end, {"commitment": "confirmed"}]), origin)
            .await
    }

    /// Estimated unix production time of `slot`.
    pub async fn block_time(&self, slot: u64, origin: SourceKind) -> Result<i64, QuoteError> {
        self.rpc
            .request("getBlockTime", json!([slot]), origin)
            .await
    }

    /// Average seconds per slot over the last `window` confirmed slots.
    #[instrument(skip(self))]
    pub async fn average_block_time(&self, window: u64) -> Result<f64, QuoteError> {
        let origin = SourceKind::DestinationConfirmationTime;
        let newest = self.slot(origin).await?;
        let oldest = newest
            .saturating_sub(window.saturating_sub(1))
            .max(1);

        let blocks = self
            .blocks(oldest, newest, origin)
            .await?;
        let (first, last) = match (blocks.first(), blocks.last()) {
            (Some(first), Some(last)) if blocks.len() >= 2 && last > first => (*first, *last),
            _ => {
                return Err(QuoteError::upstream(
                    origin,
                    format!("only {} blocks produced in slots {oldest}..={newest}", blocks.len()),
                ))
            }
        };

        let (first_time, last_time) = tokio::try_join!(
            self.block_time(first, origin),
            self.block_time(last, origin)
        )?;
        let average = (last_time - first_time).unsigned_abs() as f64 / (last - first) as f64;
        debug!(first, last, first_time, last_time, average, "SolanaBlockTimeSampled");
        Ok(average)
    }
}

fn push_compact_u16(out: &mut Vec<u8>, mut value: u16) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

/// Serialized legacy message holding a single 1 lamport system transfer between two fixed
/// reference accounts. Only used for fee estimation, never signed or sent.
pub fn reference_transfer_message(recent_blockhash: &[u8; 32]) -> Vec<u8> {
    let payer = [1u8; 32];
    let recipient = [2u8; 32];
    let system_program = [0u8; 32];

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER.to_le_bytes());
    data.extend_from_slice(&1u64.to_le_bytes());

    let mut message = Vec::with_capacity(150);
    // signers, read-only signers, read-only non-signers
    message.extend_from_slice(&[1, 0, 1]);
    push_compact_u16(&mut message, 3);
    for key in [payer, recipient, system_program] {
        message.extend_from_slice(&key);
    }
    message.extend_from_slice(recent_blockhash);
    push_compact_u16(&mut message, 1);
    message.push(2);
    push_compact_u16(&mut message, 2);
    message.extend_from_slice(&[0, 1]);
    push_compact_u16(&mut message, data.len() as u16);
    message.extend_from_slice(&data);
    message
}

/// Destination chain network fee, quoted for a minimal transfer.
pub struct SolanaSettlementFee {
    rpc: SolanaRpcClient,
    cache: TtlCache<&'static str, f64>,
}

impl SolanaSettlementFee {
    pub fn new(rpc: SolanaRpcClient, cache: TtlCache<&'static str, f64>) -> Self {
        Self { rpc, cache }
    }

    async fn fetch_fee(&self) -> Result<f64, QuoteError> {
        let origin = SourceKind::SettlementFee;
        let blockhash = self
            .rpc
            .latest_blockhash(origin)
            .await?;
        let message = reference_transfer_message(&blockhash);
        let lamports = self
            .rpc
            .fee_for_message(&message, origin)
            .await?
            .ok_or_else(|| QuoteError::upstream(origin, "no fee returned for message"))?;
        debug!(lamports, "SettlementFeeFetched");
        Ok(lamports as f64 / LAMPORTS_PER_SOL)
    }
}

#[async_trait]
impl SettlementFeeSource for SolanaSettlementFee {
    #[instrument(skip(self))]
    async fn get_settlement_fee(&self) -> Result<f64, QuoteError> {
        self.cache
            .get_or_fetch(SETTLEMENT_FEE_KEY, || self.fetch_fee())
            .await
    }
}
