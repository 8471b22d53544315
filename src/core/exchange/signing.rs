//! EIP-712 order hashing and ECDSA signing.
//!
//! The digest is `keccak256(0x1901 || domain_separator || struct_hash)`
//! over the exchange's 12-field `Order` type. The verifying contract is
//! selected by the market's neg-risk flag; everything else in the domain
//! is fixed.

use alloy_primitives::{Address, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{eip712_domain, sol, Eip712Domain, SolStruct};

use crate::core::domain::{Side, SignatureType};
use crate::error::SigningError;

use super::super::chain::contracts::{NEG_RISK_EXCHANGE, STANDARD_EXCHANGE};

/// Polygon mainnet.
pub const CHAIN_ID: u64 = 137;

const DOMAIN_NAME: &str = "Polymarket CTF Exchange";
const DOMAIN_VERSION: &str = "1";

sol! {
    /// The exchange's canonical order struct; field order defines the
    /// EIP-712 type hash.
    struct Order {
        uint256 salt;
        address maker;
        address signer;
        address taker;
        uint256 tokenId;
        uint256 makerAmount;
        uint256 takerAmount;
        uint256 expiration;
        uint256 nonce;
        uint256 feeRateBps;
        uint8 side;
        uint8 signatureType;
    }
}

/// The unsigned wire fields the signer consumes.
#[derive(Debug, Clone)]
pub struct UnsignedOrder {
    pub salt: u64,
    pub token_id: U256,
    pub maker_amount: u64,
    pub taker_amount: u64,
    pub expiration: u64,
    pub nonce: u64,
    pub fee_rate_bps: u32,
    pub side: Side,
}

/// Owns the private key. No other component may read it; everything else
/// sees only addresses and finished signatures.
pub struct OrderSigner {
    signer: PrivateKeySigner,
    funder: Option<Address>,
    signature_type: SignatureType,
}

impl OrderSigner {
    /// Build a signer from a hex private key.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::BadKey`] when the key does not parse.
    pub fn from_private_key(
        private_key: &str,
        funder: Option<Address>,
        signature_type: SignatureType,
    ) -> Result<Self, SigningError> {
        let key = private_key.trim_start_matches("0x");
        let signer = key
            .parse::<PrivateKeySigner>()
            .map_err(|e| SigningError::BadKey(e.to_string()))?;

        Ok(Self {
            signer,
            funder,
            signature_type,
        })
    }

    /// The EOA that produces signatures.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The account orders are funded from (proxy wallet when set).
    #[must_use]
    pub fn maker(&self) -> Address {
        self.funder.unwrap_or_else(|| self.signer.address())
    }

    #[must_use]
    pub const fn signature_type(&self) -> SignatureType {
        self.signature_type
    }

    /// EIP-712 domain for the exchange contract this order verifies on.
    #[must_use]
    pub fn domain(neg_risk: bool) -> Eip712Domain {
        let verifying_contract = if neg_risk {
            NEG_RISK_EXCHANGE
        } else {
            STANDARD_EXCHANGE
        };
        eip712_domain! {
            name: DOMAIN_NAME,
            version: DOMAIN_VERSION,
            chain_id: CHAIN_ID,
            verifying_contract: verifying_contract,
        }
    }

    /// Typed-data digest for an order.
    #[must_use]
    pub fn digest(&self, order: &UnsignedOrder, neg_risk: bool) -> B256 {
        let sol_order = Order {
            salt: U256::from(order.salt),
            maker: self.maker(),
            signer: self.address(),
            taker: Address::ZERO,
            tokenId: order.token_id,
            makerAmount: U256::from(order.maker_amount),
            takerAmount: U256::from(order.taker_amount),
            expiration: U256::from(order.expiration),
            nonce: U256::from(order.nonce),
            feeRateBps: U256::from(order.fee_rate_bps),
            side: order.side.as_u8(),
            signatureType: self.signature_type.as_u8(),
        };

        sol_order.eip712_signing_hash(&Self::domain(neg_risk))
    }

    /// Sign an order digest into 65 bytes `r || s || v` with `v` shifted
    /// into `{27, 28}`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::SignError`] when ECDSA signing fails.
    pub fn sign(&self, digest: B256) -> Result<[u8; 65], SigningError> {
        let signature = self
            .signer
            .sign_hash_sync(&digest)
            .map_err(|e| SigningError::SignError(e.to_string()))?;

        let mut bytes: [u8; 65] = signature.as_bytes();
        if bytes[64] < 27 {
            bytes[64] += 27;
        }
        Ok(bytes)
    }
}
