//! Exchange authentication.
//!
//! Two layers: L1 wallet signatures (EIP-712 `ClobAuth`) gate API-key
//! lifecycle calls; L2 HMAC signatures authenticate every write with the
//! derived key. Secrets arrive base64-encoded in either alphabet, so both
//! are tried on decode.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use alloy_primitives::U256;
use alloy_sol_types::{eip712_domain, sol, SolStruct};

use crate::error::{Error, Result};

use super::signing::{OrderSigner, CHAIN_ID};

type HmacSha256 = Hmac<Sha256>;

/// API credentials issued by `POST /auth/api-key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCreds {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

/// The L2 header set attached to authenticated exchange requests.
#[derive(Debug, Clone)]
pub struct L2Headers {
    pub address: String,
    pub api_key: String,
    pub passphrase: String,
    pub timestamp: String,
    pub signature: String,
}

impl L2Headers {
    /// Header name/value pairs in wire order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("POLY_ADDRESS", &self.address),
            ("POLY_API_KEY", &self.api_key),
            ("POLY_PASSPHRASE", &self.passphrase),
            ("POLY_TIMESTAMP", &self.timestamp),
            ("POLY_SIGNATURE", &self.signature),
        ]
    }
}

/// Compute L2 headers for one request.
///
/// The signature is `base64url(HMAC-SHA256(secret, timestamp || method ||
/// path || body))` with the secret decoded from either base64 alphabet.
///
/// # Errors
///
/// Returns [`Error::Auth`] when the secret decodes in neither alphabet.
pub fn l2_headers(
    address: &str,
    creds: &ApiCreds,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<L2Headers> {
    let key = decode_secret(&creds.secret)?;

    let timestamp = timestamp.to_string();
    let message = format!("{timestamp}{method}{path}{body}");

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| Error::Auth(format!("HMAC key: {e}")))?;
    mac.update(message.as_bytes());
    let signature = URL_SAFE.encode(mac.finalize().into_bytes());

    Ok(L2Headers {
        address: address.to_string(),
        api_key: creds.api_key.clone(),
        passphrase: creds.passphrase.clone(),
        timestamp,
        signature,
    })
}

/// Secrets may be standard or URL-safe base64; try both.
fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    URL_SAFE
        .decode(secret)
        .or_else(|_| STANDARD.decode(secret))
        .map_err(|e| Error::Auth(format!("secret is not base64: {e}")))
}

sol! {
    /// Typed data signed by the wallet to prove key ownership.
    struct ClobAuth {
        address address;
        string timestamp;
        uint256 nonce;
        string message;
    }
}

const CLOB_AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
const CLOB_AUTH_DOMAIN_VERSION: &str = "1";
const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

/// The L1 header set attached to API-key lifecycle requests.
#[derive(Debug, Clone)]
pub struct L1Headers {
    pub address: String,
    pub signature: String,
    pub timestamp: String,
    pub nonce: String,
}

impl L1Headers {
    /// Header name/value pairs in wire order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("POLY_ADDRESS", &self.address),
            ("POLY_SIGNATURE", &self.signature),
            ("POLY_TIMESTAMP", &self.timestamp),
            ("POLY_NONCE", &self.nonce),
        ]
    }
}

/// Sign the `ClobAuth` attestation for API-key lifecycle calls.
///
/// # Errors
///
/// Returns [`Error::Signing`] when ECDSA signing fails.
pub fn l1_headers(signer: &OrderSigner, timestamp: i64, nonce: u64) -> Result<L1Headers> {
    let auth = ClobAuth {
        address: signer.address(),
        timestamp: timestamp.to_string(),
        nonce: U256::from(nonce),
        message: CLOB_AUTH_MESSAGE.into(),
    };

    let domain = eip712_domain! {
        name: CLOB_AUTH_DOMAIN_NAME,
        version: CLOB_AUTH_DOMAIN_VERSION,
        chain_id: CHAIN_ID,
    };

    let digest = auth.eip712_signing_hash(&domain);
    let signature = signer.sign(digest)?;

    Ok(L1Headers {
        address: format!("{:?}", signer.address()),
        signature: format!("0x{}", hex::encode(signature)),
        timestamp: timestamp.to_string(),
        nonce: nonce.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::SignatureType;

    const TEST_KEY: &str = "0x0123456789012345678901234567890123456789012345678901234567890123";

    fn creds(secret: &str) -> ApiCreds {
        ApiCreds {
            api_key: "key".into(),
            secret: secret.into(),
            passphrase: "phrase".into(),
        }
    }

    #[test]
    fn l2_signature_is_deterministic() {
        let creds = creds(&URL_SAFE.encode(b"super-secret"));
        let a = l2_headers("0xabc", &creds, 1_700_000_000, "POST", "/order", "{}").unwrap();
        let b = l2_headers("0xabc", &creds, 1_700_000_000, "POST", "/order", "{}").unwrap();

        assert_eq!(a.signature, b.signature);
        assert_eq!(a.timestamp, "1700000000");
    }

    #[test]
    fn l2_signature_covers_every_input() {
        let creds = creds(&URL_SAFE.encode(b"super-secret"));
        let base = l2_headers("0xabc", &creds, 1, "POST", "/order", "{}").unwrap();

        for variant in [
            l2_headers("0xabc", &creds, 2, "POST", "/order", "{}").unwrap(),
            l2_headers("0xabc", &creds, 1, "GET", "/order", "{}").unwrap(),
            l2_headers("0xabc", &creds, 1, "POST", "/other", "{}").unwrap(),
            l2_headers("0xabc", &creds, 1, "POST", "/order", "[]").unwrap(),
        ] {
            assert_ne!(base.signature, variant.signature);
        }
    }

    #[test]
    fn secret_decodes_in_either_alphabet() {
        // A payload whose encodings differ between alphabets.
        let payload: Vec<u8> = (0u8..=255).collect();
        let url_safe = creds(&URL_SAFE.encode(&payload));
        let standard = creds(&STANDARD.encode(&payload));

        let a = l2_headers("0x", &url_safe, 1, "GET", "/", "").unwrap();
        let b = l2_headers("0x", &standard, 1, "GET", "/", "").unwrap();
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn garbage_secret_is_an_auth_error() {
        let bad = creds("!!not base64!!");
        assert!(matches!(
            l2_headers("0x", &bad, 1, "GET", "/", ""),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn l1_headers_carry_wallet_address_and_signature() {
        let signer =
            OrderSigner::from_private_key(TEST_KEY, None, SignatureType::Eoa).unwrap();
        let headers = l1_headers(&signer, 1_700_000_000, 0).unwrap();

        assert_eq!(headers.timestamp, "1700000000");
        assert_eq!(headers.nonce, "0");
        let sig = hex::decode(headers.signature.trim_start_matches("0x")).unwrap();
        assert_eq!(sig.len(), 65);
    }
}
