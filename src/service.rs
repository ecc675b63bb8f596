use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Result;
use futures::{pin_mut, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use chain_gateway::{ChainReader, Creation, EvmGateway};
use common_types::{
    ChainScope, DeployerInfo, LiquidityInfo, Notifier, SubscriberScope, TokenCandidate,
    VerificationInfo,
};
use explorer_verify::{PatternSet, Verifier};

use crate::bus::{ScanEvent, SharedScanBus};
use crate::registry::SubscriptionRegistry;
use crate::seen::SeenSet;

/// Per-candidate balances shared by every threshold subscription in one
/// matching pass, in whole native units.
#[derive(Clone)]
struct ThresholdStats {
    token_balance: f64,
    liq: LiquidityInfo,
}

#[derive(Clone)]
pub struct ScanEngine {
    reader: Arc<dyn ChainReader>,
    notifier: Arc<dyn Notifier>,
    verifier: Arc<dyn Verifier>,
    patterns: Arc<PatternSet>,
    registry: Arc<SubscriptionRegistry>,
    seen: Arc<SeenSet>,
}

impl ScanEngine {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        notifier: Arc<dyn Notifier>,
        verifier: Arc<dyn Verifier>,
        patterns: Arc<PatternSet>,
        registry: Arc<SubscriptionRegistry>,
        seen: Arc<SeenSet>,
    ) -> Self {
        Self {
            reader,
            notifier,
            verifier,
            patterns,
            registry,
            seen,
        }
    }

    /// Engine loop: one spawned pass per arriving block. A new block for
    /// the same chain may start before the previous fan-out finishes;
    /// the seen set keeps that safe.
    pub async fn run(self, bus: SharedScanBus) {
        let mut rx = bus.subscribe();
        loop {
            match rx.recv().await {
                Ok(ScanEvent::NewBlock { chain, number }) => {
                    let engine = self.clone();
                    tokio::spawn(async move {
                        engine.process_block(chain, number).await;
                    });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "scan bus lagged, blocks dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// One block, one chain. A failed fetch skips the whole block; a
    /// missed block is an acceptable loss, never fatal.
    pub async fn process_block(&self, chain: ChainScope, number: u64) {
        let creations = match self.reader.block_creations(chain, number).await {
            Ok(c) => c,
            Err(e) => {
                warn!(?e, %chain, number, "block fetch failed, skipping");
                return;
            }
        };
        if creations.is_empty() {
            return;
        }
        debug!(%chain, number, count = creations.len(), "contract creations");
        for creation in creations {
            // dedup is unconditional and permanent for the process's life
            if !self.seen.insert(chain, creation.address) {
                continue;
            }
            if let Err(e) = self.process_creation(chain, creation).await {
                warn!(?e, %chain, "candidate processing failed");
            }
        }
    }

    async fn process_creation(&self, chain: ChainScope, creation: Creation) -> Result<()> {
        match self.reader.has_code(chain, creation.address).await {
            Ok(true) => {}
            // not materialized yet, or unreadable: either way not a token today
            Ok(false) => return Ok(()),
            Err(e) => {
                debug!(?e, %chain, address = %creation.address, "code check failed");
                return Ok(());
            }
        }

        let meta = match self.reader.token_metadata(chain, creation.address).await {
            Ok(m) => m,
            Err(e) => {
                debug!(?e, %chain, address = %creation.address, "metadata unavailable");
                return Ok(());
            }
        };
        let Some(candidate) = TokenCandidate::from_metadata(chain, creation.address, &meta) else {
            return Ok(());
        };
        info!(%chain, symbol = %candidate.symbol, address = %candidate.address, "new token candidate");

        // verification starts here and is only ever awaited by the
        // enrichment task, never by the immediate-alert path
        let verification = self.spawn_verification(chain, candidate.address);
        let deployer = self.deployer_info(chain, creation.deployer).await;

        let mut stats: Option<ThresholdStats> = None;
        let mut enrich_scopes: Vec<SubscriberScope> = Vec::new();

        for (scope, subs) in self.registry.all_scopes() {
            for sub in subs.iter().filter(|s| s.chain == chain) {
                match &sub.ticker {
                    // ticker mode: symbol equality alone, liquidity never consulted
                    Some(ticker) => {
                        if !ticker_matches(ticker, &candidate.symbol) {
                            continue;
                        }
                        let text = tg_publisher::format_immediate_alert(&candidate, &deployer);
                        match self.notifier.send(&scope, &text, false).await {
                            Ok(()) => {
                                if !enrich_scopes.contains(&scope) {
                                    enrich_scopes.push(scope);
                                }
                            }
                            Err(e) => warn!(?e, chat = scope.chat_id, "immediate alert failed"),
                        }
                    }
                    // threshold mode: balances computed once per candidate
                    None => {
                        if stats.is_none() {
                            stats = Some(self.threshold_stats(&candidate).await);
                        }
                        let current = stats.as_ref().expect("just filled");
                        if !threshold_met(current.token_balance, current.liq.native_reserve, sub.eth)
                        {
                            continue;
                        }
                        let text = tg_publisher::format_threshold_alert(
                            &candidate,
                            &deployer,
                            current.token_balance,
                            &current.liq,
                        );
                        if let Err(e) = self.notifier.send(&scope, &text, false).await {
                            warn!(?e, chat = scope.chat_id, "threshold alert failed");
                        }
                    }
                }
            }
        }

        if !enrich_scopes.is_empty() {
            let engine = self.clone();
            let candidate = candidate.clone();
            tokio::spawn(async move {
                engine
                    .send_enrichment(candidate, verification, enrich_scopes)
                    .await;
            });
        }
        Ok(())
    }

    fn spawn_verification(&self, chain: ChainScope, address: Address) -> JoinHandle<VerificationInfo> {
        let verifier = self.verifier.clone();
        tokio::spawn(async move { verifier.verified_source(chain, address).await })
    }

    /// Fire-and-forget follow-up for ticker matches. Failures are
    /// logged and swallowed; the already-sent immediate alert is never
    /// affected.
    async fn send_enrichment(
        &self,
        candidate: TokenCandidate,
        verification: JoinHandle<VerificationInfo>,
        scopes: Vec<SubscriberScope>,
    ) {
        let liq = liq_metrics::resolve_liquidity(
            self.reader.as_ref(),
            candidate.chain,
            candidate.address,
            candidate.decimals,
        )
        .await;
        let verification = verification.await.unwrap_or_else(|e| {
            warn!(?e, "verification task died");
            VerificationInfo::unverified()
        });
        let hits = verification
            .source_code
            .as_deref()
            .map(|src| self.patterns.scan(src))
            .unwrap_or_default();
        let text = tg_publisher::format_enrichment(&candidate, &liq, &verification, &hits);
        for scope in scopes {
            if let Err(e) = self.notifier.send(&scope, &text, false).await {
                warn!(?e, chat = scope.chat_id, "enrichment send failed");
            }
        }
    }

    async fn deployer_info(&self, chain: ChainScope, deployer: Address) -> DeployerInfo {
        let native_balance = match self.reader.native_balance(chain, deployer).await {
            Ok(wei) => liq_metrics::wei_to_native(wei),
            Err(e) => {
                debug!(?e, %chain, "deployer balance lookup failed");
                0.0
            }
        };
        DeployerInfo {
            address: deployer,
            native_balance,
        }
    }

    async fn threshold_stats(&self, candidate: &TokenCandidate) -> ThresholdStats {
        let token_balance = match self
            .reader
            .native_balance(candidate.chain, candidate.address)
            .await
        {
            Ok(wei) => liq_metrics::wei_to_native(wei),
            Err(e) => {
                debug!(?e, address = %candidate.address, "token balance lookup failed");
                0.0
            }
        };
        let liq = liq_metrics::resolve_liquidity(
            self.reader.as_ref(),
            candidate.chain,
            candidate.address,
            candidate.decimals,
        )
        .await;
        ThresholdStats { token_balance, liq }
    }
}

fn ticker_matches(ticker: &str, symbol: &str) -> bool {
    ticker.eq_ignore_ascii_case(symbol.trim())
}

fn threshold_met(token_balance: f64, lp_native_reserve: f64, threshold: f64) -> bool {
    token_balance >= threshold || lp_native_reserve >= threshold
}

/// Per-chain block feed. Prefers the newHeads subscription; while it
/// cannot be established, polls the latest block once per backoff tick.
pub async fn run_chain_listener(gateway: Arc<EvmGateway>, chain: ChainScope, bus: SharedScanBus) {
    let mut last_seen: Option<u64> = None;
    loop {
        match gateway.subscribe_blocks(chain).await {
            Ok(stream) => {
                info!(%chain, "subscribed to new blocks");
                pin_mut!(stream);
                while let Some(number) = stream.next().await {
                    last_seen = Some(number);
                    bus.publish(ScanEvent::NewBlock { chain, number });
                }
                warn!(%chain, "block subscription ended, reconnecting");
            }
            Err(e) => {
                warn!(?e, %chain, "block subscribe failed, polling latest");
                match gateway.latest_block(chain).await {
                    Ok(number) if last_seen != Some(number) => {
                        last_seen = Some(number);
                        bus.publish(ScanEvent::NewBlock { chain, number });
                    }
                    Ok(_) => {}
                    Err(e) => debug!(?e, %chain, "latest block poll failed"),
                }
            }
        }
        sleep(Duration::from_secs(2)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_comparison_is_case_insensitive() {
        assert!(ticker_matches("PONK", "ponk"));
        assert!(ticker_matches("PONK", " PONK "));
        assert!(!ticker_matches("PONK", "PONKY"));
    }

    #[test]
    fn threshold_boundary_is_inclusive_either_side() {
        assert!(threshold_met(5.0, 0.0, 5.0));
        assert!(threshold_met(0.0, 5.0, 5.0));
        assert!(threshold_met(0.0, 0.0, 0.0));
        assert!(!threshold_met(0.0, 2.0, 5.0));
        assert!(!threshold_met(4.9, 4.9, 5.0));
    }
}
