//! Bankline Oracle - ETH/USD price adapter
//!
//! The price source is an external aggregator that reports a scaled integer
//! answer together with its decimal count (e.g. `200000000000` with 8
//! decimals is $2000.00). This crate only consumes that answer; freshness and
//! correctness of the feed itself are the feed's concern.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reading a price
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Price feed unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Price feed returned a non-positive answer: {answer}")]
    InvalidAnswer { answer: i128 },

    #[error("Price answer {answer} cannot be scaled by {decimals} decimals")]
    ScaleOverflow { answer: i128, decimals: u8 },
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// Latest round reported by an aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: u64,
    /// Raw integer answer, scaled by `10^decimals`
    pub answer: i128,
    pub decimals: u8,
    pub updated_at: DateTime<Utc>,
}

impl RoundData {
    /// The answer as a decimal price
    pub fn price(&self) -> Result<Decimal> {
        if self.answer <= 0 {
            return Err(OracleError::InvalidAnswer {
                answer: self.answer,
            });
        }
        Decimal::try_from_i128_with_scale(self.answer, self.decimals as u32).map_err(|_| {
            OracleError::ScaleOverflow {
                answer: self.answer,
                decimals: self.decimals,
            }
        })
    }
}

/// An external source of price rounds
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn latest_round(&self) -> Result<RoundData>;
}

/// Binds a price source to the feed address it was configured with
#[derive(Clone)]
pub struct OracleAdapter {
    feed_address: String,
    source: Arc<dyn PriceOracle>,
}

impl OracleAdapter {
    pub fn new(feed_address: impl Into<String>, source: Arc<dyn PriceOracle>) -> Self {
        Self {
            feed_address: feed_address.into(),
            source,
        }
    }

    pub fn feed_address(&self) -> &str {
        &self.feed_address
    }

    /// Latest raw round
    pub async fn latest_round(&self) -> Result<RoundData> {
        self.source.latest_round().await
    }

    /// Latest price, scaled by the feed's reported decimals
    pub async fn price(&self) -> Result<Decimal> {
        self.latest_round().await?.price()
    }
}

impl std::fmt::Debug for OracleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleAdapter")
            .field("feed_address", &self.feed_address)
            .finish()
    }
}

#[derive(Debug)]
struct FeedState {
    round: RoundData,
    outage: Option<String>,
}

/// A feed with a settable answer, for local runs and tests
///
/// Clones share state, so a test can change the answer or simulate an outage
/// while the engine holds another handle.
#[derive(Debug, Clone)]
pub struct StaticPriceFeed {
    state: Arc<RwLock<FeedState>>,
}

impl StaticPriceFeed {
    pub fn new(answer: i128, decimals: u8) -> Self {
        Self {
            state: Arc::new(RwLock::new(FeedState {
                round: RoundData {
                    round_id: 1,
                    answer,
                    decimals,
                    updated_at: Utc::now(),
                },
                outage: None,
            })),
        }
    }

    /// Publish a new answer as the next round
    pub fn set_answer(&self, answer: i128) {
        let mut state = self.state.write();
        state.round.round_id += 1;
        state.round.answer = answer;
        state.round.updated_at = Utc::now();
    }

    /// Make every read fail until `restore` is called
    pub fn set_outage(&self, reason: impl Into<String>) {
        self.state.write().outage = Some(reason.into());
    }

    pub fn restore(&self) {
        self.state.write().outage = None;
    }
}

#[async_trait]
impl PriceOracle for StaticPriceFeed {
    async fn latest_round(&self) -> Result<RoundData> {
        let state = self.state.read();
        match &state.outage {
            Some(reason) => Err(OracleError::Unavailable {
                reason: reason.clone(),
            }),
            None => Ok(state.round.clone()),
        }
    }
}
