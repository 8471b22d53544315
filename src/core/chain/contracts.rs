//! Known contract addresses, function selectors, and event topics.

use alloy_primitives::{address, b256, Address, B256};

use crate::core::domain::ContractKind;

/// CTF exchange on Polygon mainnet.
pub const STANDARD_EXCHANGE: Address = address!("4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E");

/// Neg-risk CTF exchange.
pub const NEG_RISK_EXCHANGE: Address = address!("C5d563A36AE78145C45a50134d48A1215220f80a");

/// Neg-risk adapter sitting in front of the neg-risk exchange.
pub const NEG_RISK_ADAPTER: Address = address!("E3f18aCc55091E2C48D883FC8C8413319D4Ab7b0");

/// USDC on Polygon.
pub const STABLECOIN: Address = address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174");

/// Gnosis conditional tokens framework.
pub const CONDITIONAL_TOKENS: Address = address!("4D97DCd97eC945f40cF65F87097ACe5EA0476045");

/// `OrderFilled(bytes32,address,address,uint256,uint256,uint256,uint256,uint256)`.
pub const ORDER_FILLED_TOPIC: B256 =
    b256!("d0a08e8c493f9c94f29311604c9de1b4e8c8d4c06bd0c789af57f2d65bfec0f6");

/// Exchange function selectors (first 4 bytes of calldata).
pub mod selector {
    pub const FILL_ORDERS: [u8; 4] = [0x22, 0x87, 0xe3, 0x50];
    pub const FILL_ORDER: [u8; 4] = [0xe2, 0x0b, 0x23, 0x04];
    pub const MATCH_ORDERS: [u8; 4] = [0xa4, 0xa6, 0xc5, 0xa5];
    pub const CANCEL_ORDER: [u8; 4] = [0x4f, 0x7e, 0x43, 0xdf];
    pub const CANCEL_ORDERS: [u8; 4] = [0xb9, 0x3e, 0xa7, 0xad];
}

/// ERC20/ERC1155 transfer selectors scanned by the trace fallback.
pub mod transfer_selector {
    pub const TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
    pub const TRANSFER_FROM: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];
    pub const SAFE_TRANSFER_FROM: [u8; 4] = [0xf2, 0x42, 0x43, 0x2a];
}

/// `balanceOf(address)` on the stablecoin contract.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Which exchange contract a transaction's `to` address names, if any.
#[must_use]
pub fn contract_kind(to: Address) -> Option<ContractKind> {
    if to == STANDARD_EXCHANGE {
        Some(ContractKind::Standard)
    } else if to == NEG_RISK_EXCHANGE {
        Some(ContractKind::NegRisk)
    } else if to == NEG_RISK_ADAPTER {
        Some(ContractKind::NegRiskAdapter)
    } else {
        None
    }
}
