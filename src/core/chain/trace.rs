//! Trace-based fallback trade reconstruction.
//!
//! When calldata decoding yields nothing but the caller still needs the
//! trade details, the transaction is re-executed through `trace_call` and
//! the resulting trace is scanned for token transfers touching the target
//! party: stablecoin `transfer` / `transferFrom` and conditional-token
//! `safeTransferFrom`. The net flow determines side, size, and price.

use alloy_primitives::Address;
use serde_json::Value;
use tracing::debug;

use crate::core::domain::{ContractKind, Role, Side, TradeEvent};
use crate::error::Result;

use super::calldata::in_sanity_range;
use super::contracts::{transfer_selector, CONDITIONAL_TOKENS, STABLECOIN};
use super::rpc::RpcClient;

/// Net stablecoin and token flows for one party across a trace.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct NetFlows {
    usdc_in: u128,
    usdc_out: u128,
    tokens_in: u128,
    tokens_out: u128,
}

impl NetFlows {
    /// Interpret the flows as a trade, if they describe one.
    fn to_trade(self) -> Option<(Side, u128, u128)> {
        // Buying: stablecoin out, tokens in. Selling: the reverse.
        if self.usdc_out > self.usdc_in && self.tokens_in > self.tokens_out {
            Some((
                Side::Buy,
                self.usdc_out - self.usdc_in,
                self.tokens_in - self.tokens_out,
            ))
        } else if self.usdc_in > self.usdc_out && self.tokens_out > self.tokens_in {
            Some((
                Side::Sell,
                self.usdc_in - self.usdc_out,
                self.tokens_out - self.tokens_in,
            ))
        } else {
            None
        }
    }
}

/// Reconstructs trades from `trace_call` output.
pub struct TraceScanner {
    rpc: RpcClient,
}

impl TraceScanner {
    #[must_use]
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Re-execute a transaction and reconstruct the target party's trade.
    ///
    /// `block` is `"latest"` for a pending transaction, or the parent of
    /// the including block for a confirmed one.
    ///
    /// # Errors
    ///
    /// Returns an error when the trace endpoint fails; an undecodable
    /// trace yields `Ok(None)`.
    pub async fn reconstruct(
        &self,
        tx: &Value,
        block: &str,
        tx_hash: &str,
        party: Address,
    ) -> Result<Option<TradeEvent>> {
        let trace = self.rpc.trace_call(tx, block).await?;
        Ok(reconstruct_from_trace(&trace, tx_hash, party))
    }

    /// Trace against the state before `block_number`, for confirmed txs.
    ///
    /// # Errors
    ///
    /// Returns an error when the trace endpoint fails.
    pub async fn reconstruct_confirmed(
        &self,
        tx: &Value,
        block_number: u64,
        tx_hash: &str,
        party: Address,
    ) -> Result<Option<TradeEvent>> {
        let parent = format!("0x{:x}", block_number.saturating_sub(1));
        self.reconstruct(tx, &parent, tx_hash, party).await
    }
}

/// Scan a trace result for transfers touching `party` and fold them into
/// a trade event.
#[must_use]
pub fn reconstruct_from_trace(trace: &Value, tx_hash: &str, party: Address) -> Option<TradeEvent> {
    let entries = trace.get("trace")?.as_array()?;

    let mut flows = NetFlows::default();
    for entry in entries {
        let Some(action) = entry.get("action") else {
            continue;
        };
        let Some(to) = action
            .get("to")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Address>().ok())
        else {
            continue;
        };
        let Some(input) = action
            .get("input")
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s.trim_start_matches("0x")).ok())
        else {
            continue;
        };

        apply_transfer(&mut flows, to, &input, party);
    }

    let (side, usdc, tokens) = flows.to_trade()?;
    if !in_sanity_range(tokens) {
        debug!(tx_hash, tokens, "Trace flows outside sanity range");
        return None;
    }

    let (maker_amount, taker_amount) = match side {
        Side::Buy => (usdc, tokens),
        Side::Sell => (tokens, usdc),
    };

    Some(TradeEvent {
        tx_hash: tx_hash.to_string(),
        log_index: None,
        party: format!("0x{}", hex::encode(party.as_slice())),
        // The trace cannot tell resting from crossing; callers treat the
        // reconstruction as the party's own immediate trade.
        role: Role::Taker,
        side,
        token_id: String::new(),
        maker_amount,
        taker_amount,
        fill_amount: tokens,
        order_salt: 0,
        detected_at: chrono::Utc::now().timestamp_millis(),
        contract: ContractKind::Standard,
    })
}

/// Fold one call's transfer into the net flows, if it is one of the
/// three recognized shapes and touches the party.
fn apply_transfer(flows: &mut NetFlows, to: Address, input: &[u8], party: Address) {
    let Some(sel) = input.get(..4) else { return };
    let words = &input[4..];

    match (to, <[u8; 4]>::try_from(sel).ok()) {
        // stablecoin.transfer(to, amount): sender is the calling context,
        // so only credit arrivals; departures show up as transferFrom or
        // as transfers executed from the party's own context.
        (t, Some(transfer_selector::TRANSFER)) if t == STABLECOIN => {
            let (Some(dst), Some(amount)) = (addr_word(words, 0), u128_word(words, 1)) else {
                return;
            };
            if dst == party {
                flows.usdc_in += amount;
            }
        }
        (t, Some(transfer_selector::TRANSFER_FROM)) if t == STABLECOIN => {
            let (Some(src), Some(dst), Some(amount)) =
                (addr_word(words, 0), addr_word(words, 1), u128_word(words, 2))
            else {
                return;
            };
            if src == party {
                flows.usdc_out += amount;
            }
            if dst == party {
                flows.usdc_in += amount;
            }
        }
        (t, Some(transfer_selector::SAFE_TRANSFER_FROM)) if t == CONDITIONAL_TOKENS => {
            let (Some(src), Some(dst), Some(amount)) =
                (addr_word(words, 0), addr_word(words, 1), u128_word(words, 3))
            else {
                return;
            };
            if src == party {
                flows.tokens_out += amount;
            }
            if dst == party {
                flows.tokens_in += amount;
            }
        }
        _ => {}
    }
}

fn addr_word(words: &[u8], idx: usize) -> Option<Address> {
    let w = words.get(idx * 32..(idx + 1) * 32)?;
    Some(Address::from_slice(&w[12..]))
}

fn u128_word(words: &[u8], idx: usize) -> Option<u128> {
    let w = words.get(idx * 32..(idx + 1) * 32)?;
    if w[..16].iter().any(|&b| b != 0) {
        return None;
    }
    Some(u128::from_be_bytes(w[16..].try_into().ok()?))
}
