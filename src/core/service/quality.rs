//! Market-quality scoring.
//!
//! Wraps the arbitrage analyzer's inputs with liquidity and freshness
//! gates. Strategies treat a score under their threshold as non-tradable
//! and skip the tick rather than quote into a broken book.

use rust_decimal::Decimal;

use crate::core::domain::TopOfBook;

/// Why a market scored the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityReason {
    Ok,
    /// One or both ask sides missing.
    MissingAsk,
    /// Not enough size resting at the best prices.
    ThinBook,
    /// Snapshot older than the freshness budget.
    Stale,
    /// Bid above ask on a side; feed glitch.
    Crossed,
}

impl QualityReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::MissingAsk => "missing_ask",
            Self::ThinBook => "thin_book",
            Self::Stale => "stale",
            Self::Crossed => "crossed",
        }
    }
}

/// Score plus the dominant reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketQuality {
    /// `0..=100`; strategies gate on a configured threshold.
    pub score: u8,
    pub reason: QualityReason,
}

impl MarketQuality {
    #[must_use]
    pub const fn is_tradable(&self, threshold: u8) -> bool {
        self.score >= threshold
    }
}

/// Assess a book snapshot against liquidity and freshness gates.
///
/// Gates are ordered by severity: a crossed book or missing ask zeroes
/// the score outright; thinness and staleness shave it.
#[must_use]
pub fn assess_quality(
    book: &TopOfBook,
    now_secs: i64,
    min_size: Decimal,
    max_age_secs: i64,
) -> MarketQuality {
    let yes_crossed =
        !book.yes_bid.is_zero() && !book.yes_ask.is_zero() && book.yes_bid > book.yes_ask;
    let no_crossed =
        !book.no_bid.is_zero() && !book.no_ask.is_zero() && book.no_bid > book.no_ask;
    if yes_crossed || no_crossed {
        return MarketQuality {
            score: 0,
            reason: QualityReason::Crossed,
        };
    }

    if !book.has_both_asks() {
        return MarketQuality {
            score: 0,
            reason: QualityReason::MissingAsk,
        };
    }

    let mut score: u8 = 100;
    let mut reason = QualityReason::Ok;

    if book.yes_ask_size < min_size || book.no_ask_size < min_size {
        score = score.saturating_sub(60);
        reason = QualityReason::ThinBook;
    }

    let age = now_secs - book.taken_at;
    if age > max_age_secs {
        score = score.saturating_sub(50);
        reason = QualityReason::Stale;
    }

    MarketQuality { score, reason }
}
