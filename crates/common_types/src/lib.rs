use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod chain;

pub use chain::ChainScope;

/// Decimals outside this range mark a contract that is not a sane
/// fungible token (or not yet initialized).
pub const DECIMALS_MIN: u8 = 6;
pub const DECIMALS_MAX: u8 = 18;

/// Raw metadata as reported by either metadata source, possibly partial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

impl TokenMetadata {
    pub fn has_symbol(&self) -> bool {
        self.symbol.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
    }
}

/// A freshly deployed contract that passed the token sanity checks.
/// Built once per creation event, dropped after one matching pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCandidate {
    pub address: Address,
    pub chain: ChainScope,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl TokenCandidate {
    /// Reject partial metadata: an empty symbol or decimals outside
    /// [DECIMALS_MIN, DECIMALS_MAX] means "not a token we alert on".
    pub fn from_metadata(chain: ChainScope, address: Address, meta: &TokenMetadata) -> Option<Self> {
        let symbol = meta.symbol.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let decimals = meta.decimals?;
        if !(DECIMALS_MIN..=DECIMALS_MAX).contains(&decimals) {
            return None;
        }
        Some(Self {
            address,
            chain,
            symbol: symbol.to_string(),
            name: meta.name.clone().unwrap_or_default(),
            decimals,
        })
    }
}

/// Pool state for a candidate, in whole native units. Absence of a pair
/// is a normal outcome, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidityInfo {
    pub pair: Option<Address>,
    pub native_reserve: f64,
    pub price_native: Option<f64>,
    pub market_cap_native: Option<f64>,
}

impl LiquidityInfo {
    pub fn absent() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationInfo {
    pub verified: bool,
    pub contract_name: Option<String>,
    pub source_code: Option<String>,
}

impl VerificationInfo {
    pub fn unverified() -> Self {
        Self::default()
    }
}

/// Best-effort deployer data; zero placeholders when lookups fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployerInfo {
    pub address: Address,
    pub native_balance: f64,
}

/// One chat destination. `thread_id` is set for forum-topic chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberScope {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
}

/// A single alert filter. `ticker` present means symbol matching only;
/// absent means threshold matching on balances. The two modes never
/// combine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub eth: f64,
    pub ticker: Option<String>,
    pub chain: ChainScope,
}

impl Subscription {
    pub fn new(eth: f64, ticker: Option<&str>, chain: ChainScope) -> Self {
        Self {
            eth,
            ticker: ticker.and_then(normalize_ticker),
            chain,
        }
    }
}

/// A parsed add/remove request from the chat command layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub eth: f64,
    pub ticker: Option<String>,
    pub chain: ChainScope,
}

impl FilterRequest {
    pub fn into_subscription(self) -> Subscription {
        Subscription {
            eth: self.eth,
            ticker: self.ticker.as_deref().and_then(normalize_ticker),
            chain: self.chain,
        }
    }
}

/// Trim and uppercase a user-supplied ticker. Empty input is the
/// no-ticker state and must never compare equal to a literal ticker.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_uppercase())
    }
}

/// Outbound message capability, scoped to chat+thread. Implemented by
/// the Telegram publisher; mocked in engine tests.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, scope: &SubscriberScope, text: &str, link_preview: bool) -> Result<()>;
}
