//! Order submission paths.
//!
//! `place_fast` posts a GTC order at the requested size and walks a fixed
//! size-bump sequence when the exchange rejects it as undersized. The
//! FOK/FAK paths apply the stricter precision minimums up front, since an
//! immediate order has no second chance.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::core::domain::{OrderArgs, OrderId, OrderType};
use crate::error::{Error, ExchangeReject, Result};

use super::builder::{bump_sequence, OrderBuilder};
use super::rest::RestClient;

/// Attempts per submission including the initial one.
const MAX_ATTEMPTS: usize = 5;

/// Couples the order builder to the REST client.
pub struct Submitter {
    rest: std::sync::Arc<RestClient>,
    builder: OrderBuilder,
}

impl Submitter {
    #[must_use]
    pub fn new(rest: std::sync::Arc<RestClient>, builder: OrderBuilder) -> Self {
        Self { rest, builder }
    }

    #[must_use]
    pub fn builder(&self) -> &OrderBuilder {
        &self.builder
    }

    #[must_use]
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Submit a GTC order, bumping the size on minimum-order rejections.
    ///
    /// Sizes tried: the requested size, then `{1.0, 2.0, 5.0, 10.0}`
    /// skipping values at or below the request, capped at
    /// [`MAX_ATTEMPTS`]. Any rejection other than "too small" returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns the final rejection when every size fails, or the first
    /// non-size rejection.
    pub async fn place_fast(&self, args: &OrderArgs) -> Result<OrderId> {
        let mut sizes = vec![args.size];
        sizes.extend(bump_sequence(args.size));
        sizes.truncate(MAX_ATTEMPTS);

        let mut last_reject: Option<Error> = None;
        for (attempt, size) in sizes.into_iter().enumerate() {
            let order = self.builder.build_with_size(args, size)?;
            match self.rest.post_order(&order, OrderType::GTC).await {
                Ok(order_id) => {
                    if attempt > 0 {
                        debug!(
                            attempt,
                            size = %size,
                            requested = %args.size,
                            "Order accepted after size bump"
                        );
                    }
                    return Ok(order_id);
                }
                Err(Error::Reject(ExchangeReject::OrderTooSmall(msg))) => {
                    warn!(size = %size, error = %msg, "Order too small, bumping size");
                    last_reject = Some(ExchangeReject::OrderTooSmall(msg).into());
                }
                Err(other) => return Err(other),
            }
        }

        Err(last_reject
            .unwrap_or_else(|| Error::Strategy("size bump sequence exhausted".into())))
    }

    /// Submit a fill-or-kill order with the precision minimums applied.
    ///
    /// # Errors
    ///
    /// Returns the exchange rejection unchanged; FOK has no retry.
    pub async fn place_fok(&self, args: &OrderArgs) -> Result<OrderId> {
        let order = self.builder.build_with_minimums(args)?;
        self.rest.post_order(&order, OrderType::FOK).await
    }

    /// Submit a fill-and-kill order with the precision minimums applied.
    ///
    /// # Errors
    ///
    /// Returns the exchange rejection unchanged; FAK has no retry.
    pub async fn place_fak(&self, args: &OrderArgs) -> Result<OrderId> {
        let order = self.builder.build_with_minimums(args)?;
        self.rest.post_order(&order, OrderType::FAK).await
    }

    /// Sizes `place_fast` would try for a request, in order.
    #[must_use]
    pub fn planned_sizes(requested: Decimal) -> Vec<Decimal> {
        let mut sizes = vec![requested];
        sizes.extend(bump_sequence(requested));
        sizes.truncate(MAX_ATTEMPTS);
        sizes
    }
}
