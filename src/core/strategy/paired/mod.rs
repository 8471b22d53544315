//! Paired-trading strategies over one binary market cycle.
//!
//! Two variants ship under distinct registry keys:
//!
//! - [`PHASE_ID`] (`paired_trading`): the phase engine in
//!   [`engine::PairedStrategy`], walking Build -> Lock -> Amplify on the
//!   cycle clock.
//! - [`COMPLETE_SET_ID`] (`pairedtrading`): the complete-set variant in
//!   [`complete_set::CompleteSetStrategy`], which accumulates discounted
//!   YES+NO pairs whenever the combined ask trades under one unit.

pub mod complete_set;
pub mod engine;
pub mod phase;

use crate::core::domain::Market;

use super::{Strategy, StrategySettings};

/// Registry key of the phase-based engine.
pub const PHASE_ID: &str = "paired_trading";

/// Registry key of the complete-set variant.
pub const COMPLETE_SET_ID: &str = "pairedtrading";

/// Constructor for the phase-based engine.
#[must_use]
pub fn new_phase_strategy(settings: &StrategySettings, market: Market) -> Box<dyn Strategy> {
    Box::new(engine::PairedStrategy::new(settings.clone(), market))
}

/// Constructor for the complete-set variant.
#[must_use]
pub fn new_complete_set_strategy(
    settings: &StrategySettings,
    market: Market,
) -> Box<dyn Strategy> {
    Box::new(complete_set::CompleteSetStrategy::new(
        settings.clone(),
        market,
    ))
}
