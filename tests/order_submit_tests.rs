//! Submission-loop behavior against a scripted exchange.

mod support;

use std::sync::Arc;

use rust_decimal_macros::dec;
use serde_json::json;

use support::exchange::MockExchange;
use updown::core::domain::{OrderArgs, Pips, Side, SignatureType};
use updown::core::exchange::{ApiCreds, OrderBuilder, OrderSigner, RestClient, Submitter};
use updown::error::{Error, ExchangeReject};

const TEST_KEY: &str = "0x0123456789012345678901234567890123456789012345678901234567890123";

fn creds() -> ApiCreds {
    ApiCreds {
        api_key: "key".into(),
        secret: base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE, b"secret"),
        passphrase: "phrase".into(),
    }
}

async fn submitter(exchange: &MockExchange) -> Submitter {
    let rest = Arc::new(RestClient::new(exchange.base_url(), "0xabc").unwrap());
    rest.set_creds(creds());
    let signer = OrderSigner::from_private_key(TEST_KEY, None, SignatureType::Eoa).unwrap();
    Submitter::new(rest, OrderBuilder::new(signer))
}

#[tokio::test]
async fn size_bump_retry_after_minimum_order_reject() {
    // First POST rejected as undersized; the retry carries size 1.0 at
    // the same price and succeeds.
    let exchange = MockExchange::start(vec![
        json!({"success": false, "errorMsg": "order size must be at least the minimum order size"}),
        json!({"success": true, "orderID": "0xorder"}),
    ])
    .await;
    let submitter = submitter(&exchange).await;

    let args = OrderArgs::new("777", Side::Buy, dec!(0.3), Pips::new(1_000).unwrap());
    let order_id = submitter.place_fast(&args).await.expect("accepted");
    assert_eq!(order_id.as_str(), "0xorder");

    let requests = exchange.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/order");
        assert_eq!(request.body["orderType"], "GTC");
    }

    // 0.3 shares at 0.10, then the first bump size of 1.0.
    assert_eq!(requests[0].body["order"]["takerAmount"], "300000");
    assert_eq!(requests[1].body["order"]["takerAmount"], "1000000");
    // Same price on both attempts: usdc = size * 0.10.
    assert_eq!(requests[0].body["order"]["makerAmount"], "30000");
    assert_eq!(requests[1].body["order"]["makerAmount"], "100000");
}

#[tokio::test]
async fn non_size_rejects_return_immediately() {
    let exchange = MockExchange::start(vec![
        json!({"success": false, "errorMsg": "trading is paused"}),
    ])
    .await;
    let submitter = submitter(&exchange).await;

    let args = OrderArgs::new("777", Side::Buy, dec!(0.3), Pips::new(1_000).unwrap());
    let result = submitter.place_fast(&args).await;

    assert!(matches!(
        result,
        Err(Error::Reject(ExchangeReject::TradingPaused))
    ));
    assert_eq!(exchange.requests().len(), 1);
}

#[tokio::test]
async fn bump_sequence_exhausts_after_five_attempts() {
    let reject = json!({"success": false, "errorMsg": "minimum order size"});
    let exchange = MockExchange::start(vec![
        reject.clone(),
        reject.clone(),
        reject.clone(),
        reject.clone(),
        reject,
    ])
    .await;
    let submitter = submitter(&exchange).await;

    let args = OrderArgs::new("777", Side::Buy, dec!(0.3), Pips::new(1_000).unwrap());
    let result = submitter.place_fast(&args).await;

    assert!(matches!(
        result,
        Err(Error::Reject(ExchangeReject::OrderTooSmall(_)))
    ));
    assert_eq!(exchange.requests().len(), 5);
}

#[tokio::test]
async fn fok_orders_carry_their_type_and_minimums() {
    let exchange = MockExchange::start(vec![json!({"success": true, "orderID": "0xfok"})]).await;
    let submitter = submitter(&exchange).await;

    // 0.5 shares at 0.40 bumps to the $1.00 notional floor.
    let args = OrderArgs::new("777", Side::Buy, dec!(0.5), Pips::new(4_000).unwrap());
    submitter.place_fok(&args).await.expect("accepted");

    let requests = exchange.requests();
    assert_eq!(requests[0].body["orderType"], "FOK");
    assert_eq!(requests[0].body["order"]["takerAmount"], "2500000");
    assert_eq!(requests[0].body["order"]["makerAmount"], "1000000");
}
