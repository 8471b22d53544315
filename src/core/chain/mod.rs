//! On-chain trade detection over an EVM node.
//!
//! Two complementary paths watch the exchange contracts:
//!
//! - [`mempool::MempoolWatcher`] decodes raw calldata of pending
//!   transactions and emits a trade event the moment a watched address
//!   appears in a fill, before the transaction confirms.
//! - [`logs::LogWatcher`] decodes confirmed `OrderFilled` logs for the
//!   same contracts, giving the settled view.
//!
//! [`trace::TraceScanner`] reconstructs a trade from `trace_call` when
//! calldata decoding fails but the caller still needs the details.

pub mod calldata;
pub mod contracts;
pub mod logs;
pub mod mempool;
pub mod rpc;
pub mod trace;
pub mod txcache;

pub use mempool::{FollowedAddresses, MempoolWatcher};
pub use rpc::RpcClient;
pub use txcache::TxCache;
