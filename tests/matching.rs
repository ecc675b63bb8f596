use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{address, Address, B256, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use chain_gateway::{ChainReader, Creation, PairReserves};
use common_types::{
    ChainScope, FilterRequest, Notifier, SubscriberScope, TokenMetadata, VerificationInfo,
};
use evm_token_watcher::{ScanEngine, SeenSet, SubscriptionRegistry};
use explorer_verify::{PatternSet, Verifier};

const TOKEN: Address = address!("00000000000000000000000000000000000000aa");
const DEPLOYER: Address = address!("00000000000000000000000000000000000000cc");
const PAIR: Address = address!("00000000000000000000000000000000000000bb");

#[derive(Default)]
struct MockReader {
    creations: HashMap<u64, Vec<Creation>>,
    code: Vec<Address>,
    metadata: HashMap<Address, TokenMetadata>,
    balances: HashMap<Address, U256>,
    pairs: HashMap<(Address, Address), Address>,
    reserves: HashMap<Address, PairReserves>,
    metadata_calls: AtomicUsize,
}

#[async_trait]
impl ChainReader for MockReader {
    async fn block_creations(&self, _: ChainScope, number: u64) -> Result<Vec<Creation>> {
        Ok(self.creations.get(&number).cloned().unwrap_or_default())
    }

    async fn has_code(&self, _: ChainScope, address: Address) -> Result<bool> {
        Ok(self.code.contains(&address))
    }

    async fn native_balance(&self, _: ChainScope, address: Address) -> Result<U256> {
        Ok(self.balances.get(&address).copied().unwrap_or(U256::ZERO))
    }

    async fn token_metadata(&self, _: ChainScope, address: Address) -> Result<TokenMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::Relaxed);
        match self.metadata.get(&address) {
            Some(m) => Ok(m.clone()),
            None => bail!("no metadata"),
        }
    }

    async fn pair_for(&self, _: ChainScope, factory: Address, token: Address) -> Result<Option<Address>> {
        Ok(self.pairs.get(&(factory, token)).copied())
    }

    async fn pair_reserves(&self, _: ChainScope, pair: Address) -> Result<PairReserves> {
        match self.reserves.get(&pair) {
            Some(r) => Ok(r.clone()),
            None => bail!("no reserves"),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(SubscriberScope, String)>>,
}

impl RecordingNotifier {
    async fn messages(&self) -> Vec<(SubscriberScope, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, scope: &SubscriberScope, text: &str, _link_preview: bool) -> Result<()> {
        self.sent.lock().await.push((*scope, text.to_string()));
        Ok(())
    }
}

struct StaticVerifier(VerificationInfo);

#[async_trait]
impl Verifier for StaticVerifier {
    async fn verified_source(&self, _: ChainScope, _: Address) -> VerificationInfo {
        self.0.clone()
    }
}

fn creation(address: Address) -> Creation {
    Creation {
        tx_hash: B256::ZERO,
        address,
        deployer: DEPLOYER,
    }
}

fn gem_metadata(symbol: &str) -> TokenMetadata {
    TokenMetadata {
        name: Some("Gem Token".into()),
        symbol: Some(symbol.into()),
        decimals: Some(18),
    }
}

fn scope(chat: i64) -> SubscriberScope {
    SubscriberScope {
        chat_id: chat,
        thread_id: None,
    }
}

fn eth(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10_u64).pow(U256::from(18))
}

struct Harness {
    engine: ScanEngine,
    notifier: Arc<RecordingNotifier>,
    registry: Arc<SubscriptionRegistry>,
    reader: Arc<MockReader>,
}

fn harness(reader: MockReader, verification: VerificationInfo) -> Harness {
    let reader = Arc::new(reader);
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = Arc::new(SubscriptionRegistry::new());
    let engine = ScanEngine::new(
        reader.clone(),
        notifier.clone(),
        Arc::new(StaticVerifier(verification)),
        Arc::new(PatternSet::empty()),
        registry.clone(),
        Arc::new(SeenSet::new()),
    );
    Harness {
        engine,
        notifier,
        registry,
        reader,
    }
}

fn threshold_filter(eth: f64, chain: ChainScope) -> FilterRequest {
    FilterRequest {
        eth,
        ticker: None,
        chain,
    }
}

fn ticker_filter(ticker: &str, chain: ChainScope) -> FilterRequest {
    FilterRequest {
        eth: 0.0,
        ticker: Some(ticker.into()),
        chain,
    }
}

#[tokio::test]
async fn zero_threshold_matches_token_with_no_liquidity() {
    let mut reader = MockReader::default();
    reader.creations.insert(100, vec![creation(TOKEN)]);
    reader.code.push(TOKEN);
    reader.metadata.insert(TOKEN, gem_metadata("GEM"));

    let h = harness(reader, VerificationInfo::unverified());
    h.registry
        .add_filter(scope(1), threshold_filter(0.0, ChainScope::Ethereum));

    h.engine.process_block(ChainScope::Ethereum, 100).await;

    let sent = h.notifier.messages().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("GEM"));
}

#[tokio::test]
async fn threshold_not_met_by_balance_or_reserve_stays_silent() {
    let factory = ChainScope::Ethereum.factories()[0];
    let mut reader = MockReader::default();
    reader.creations.insert(100, vec![creation(TOKEN)]);
    reader.code.push(TOKEN);
    reader.metadata.insert(TOKEN, gem_metadata("GEM"));
    // token balance 0, LP reserve 2: both below threshold 5
    reader.pairs.insert((factory, TOKEN), PAIR);
    reader.reserves.insert(
        PAIR,
        PairReserves {
            token0: ChainScope::Ethereum.wrapped_native(),
            reserve0: 2_u128 * 10_u128.pow(18),
            reserve1: 1000_u128 * 10_u128.pow(18),
        },
    );

    let h = harness(reader, VerificationInfo::unverified());
    h.registry
        .add_filter(scope(1), threshold_filter(5.0, ChainScope::Ethereum));

    h.engine.process_block(ChainScope::Ethereum, 100).await;
    sleep(Duration::from_millis(50)).await;

    assert!(h.notifier.messages().await.is_empty());
}

#[tokio::test]
async fn lp_reserve_alone_meets_threshold_at_boundary() {
    let factory = ChainScope::Ethereum.factories()[0];
    let mut reader = MockReader::default();
    reader.creations.insert(100, vec![creation(TOKEN)]);
    reader.code.push(TOKEN);
    reader.metadata.insert(TOKEN, gem_metadata("GEM"));
    reader.pairs.insert((factory, TOKEN), PAIR);
    reader.reserves.insert(
        PAIR,
        PairReserves {
            token0: ChainScope::Ethereum.wrapped_native(),
            reserve0: 5_u128 * 10_u128.pow(18),
            reserve1: 1000_u128 * 10_u128.pow(18),
        },
    );

    let h = harness(reader, VerificationInfo::unverified());
    h.registry
        .add_filter(scope(1), threshold_filter(5.0, ChainScope::Ethereum));

    h.engine.process_block(ChainScope::Ethereum, 100).await;

    assert_eq!(h.notifier.messages().await.len(), 1);
}

#[tokio::test]
async fn ticker_match_alerts_without_liquidity_and_enriches_later() {
    let mut reader = MockReader::default();
    reader.creations.insert(100, vec![creation(TOKEN)]);
    reader.code.push(TOKEN);
    reader.metadata.insert(TOKEN, gem_metadata("ponk"));

    let h = harness(reader, VerificationInfo::unverified());
    let s = scope(1);
    // ticker and threshold filters side by side in one scope
    h.registry.add_filter(s, ticker_filter("PONK", ChainScope::Ethereum));
    h.registry
        .add_filter(s, threshold_filter(10.0, ChainScope::Ethereum));

    h.engine.process_block(ChainScope::Ethereum, 100).await;
    sleep(Duration::from_millis(50)).await;

    let sent = h.notifier.messages().await;
    // exactly one immediate alert and one enrichment follow-up; the
    // threshold filter contributes nothing
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("New Token Detected"));
    assert!(sent[1].1.contains("update"));
    assert!(sent[1].1.contains("No LP yet"));
}

#[tokio::test]
async fn seen_set_suppresses_reprocessing_across_blocks() {
    let mut reader = MockReader::default();
    reader.creations.insert(100, vec![creation(TOKEN)]);
    reader.creations.insert(101, vec![creation(TOKEN)]);
    reader.code.push(TOKEN);
    reader.metadata.insert(TOKEN, gem_metadata("GEM"));

    let h = harness(reader, VerificationInfo::unverified());
    h.registry
        .add_filter(scope(1), threshold_filter(0.0, ChainScope::Ethereum));

    h.engine.process_block(ChainScope::Ethereum, 100).await;
    h.engine.process_block(ChainScope::Ethereum, 101).await;

    assert_eq!(h.notifier.messages().await.len(), 1);
    assert_eq!(h.reader.metadata_calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn candidates_without_code_or_symbol_are_rejected_silently() {
    let bare = address!("00000000000000000000000000000000000000dd");
    let mut reader = MockReader::default();
    reader.creations.insert(100, vec![creation(TOKEN), creation(bare)]);
    // TOKEN has code but no symbol; `bare` has no code at all
    reader.code.push(TOKEN);
    reader.metadata.insert(
        TOKEN,
        TokenMetadata {
            name: Some("Nameless".into()),
            symbol: None,
            decimals: Some(18),
        },
    );

    let h = harness(reader, VerificationInfo::unverified());
    h.registry
        .add_filter(scope(1), threshold_filter(0.0, ChainScope::Ethereum));

    h.engine.process_block(ChainScope::Ethereum, 100).await;

    assert!(h.notifier.messages().await.is_empty());
}

#[tokio::test]
async fn subscriptions_only_match_their_own_chain() {
    let mut reader = MockReader::default();
    reader.creations.insert(100, vec![creation(TOKEN)]);
    reader.code.push(TOKEN);
    reader.metadata.insert(TOKEN, gem_metadata("GEM"));

    let h = harness(reader, VerificationInfo::unverified());
    h.registry
        .add_filter(scope(1), threshold_filter(0.0, ChainScope::Bsc));
    h.registry
        .add_filter(scope(2), ticker_filter("GEM", ChainScope::Bsc));

    h.engine.process_block(ChainScope::Ethereum, 100).await;
    sleep(Duration::from_millis(50)).await;

    assert!(h.notifier.messages().await.is_empty());
}

#[tokio::test]
async fn enrichment_carries_verification_and_deployer_balance_rides_immediate() {
    let mut reader = MockReader::default();
    reader.creations.insert(100, vec![creation(TOKEN)]);
    reader.code.push(TOKEN);
    reader.metadata.insert(TOKEN, gem_metadata("PONK"));
    reader.balances.insert(DEPLOYER, eth(3));

    let verified = VerificationInfo {
        verified: true,
        contract_name: Some("Ponk".into()),
        source_code: Some("contract Ponk {}".into()),
    };
    let h = harness(reader, verified);
    h.registry
        .add_filter(scope(1), ticker_filter("PONK", ChainScope::Ethereum));

    h.engine.process_block(ChainScope::Ethereum, 100).await;
    sleep(Duration::from_millis(50)).await;

    let sent = h.notifier.messages().await;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("3\\.0000"));
    assert!(sent[1].1.contains("Verified source"));
}
