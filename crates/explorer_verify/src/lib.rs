use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};
use tracing::debug;

use common_types::{ChainScope, VerificationInfo};

mod patterns;

pub use patterns::PatternSet;

const ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Source-verification lookup. Never an error to the caller: exhausted
/// retries simply mean "unverified", which changes alert presentation
/// and nothing else.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verified_source(&self, chain: ChainScope, address: Address) -> VerificationInfo;
}

/// The HTTP leg, split out so retry and parse logic test offline.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl SourceFetcher for reqwest::Client {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }
}

pub struct SourceVerifier<F: SourceFetcher> {
    fetcher: F,
    api_keys: HashMap<ChainScope, String>,
    attempts: u32,
    retry_delay: Duration,
}

impl SourceVerifier<reqwest::Client> {
    pub fn new(api_keys: HashMap<ChainScope, String>) -> Self {
        Self::with_fetcher(reqwest::Client::new(), api_keys)
    }
}

impl<F: SourceFetcher> SourceVerifier<F> {
    pub fn with_fetcher(fetcher: F, api_keys: HashMap<ChainScope, String>) -> Self {
        Self {
            fetcher,
            api_keys,
            attempts: ATTEMPTS,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn request_url(&self, chain: ChainScope, address: Address) -> String {
        let key = self.api_keys.get(&chain).map(String::as_str).unwrap_or("");
        format!(
            "{}?module=contract&action=getsourcecode&address={:#x}&apikey={}",
            chain.explorer_api(),
            address,
            key
        )
    }

    async fn fetch_once(&self, chain: ChainScope, address: Address) -> Result<VerificationInfo> {
        let url = self.request_url(chain, address);
        let body = self.fetcher.fetch(&url).await?;
        parse_source_response(&body).context("unexpected explorer response shape")
    }
}

#[async_trait]
impl<F: SourceFetcher> Verifier for SourceVerifier<F> {
    async fn verified_source(&self, chain: ChainScope, address: Address) -> VerificationInfo {
        for attempt in 1..=self.attempts {
            match self.fetch_once(chain, address).await {
                Ok(info) if info.verified => return info,
                Ok(_) => debug!(%chain, %address, attempt, "source not verified yet"),
                Err(e) => debug!(?e, %chain, %address, attempt, "source lookup failed"),
            }
            if attempt < self.attempts {
                sleep(self.retry_delay).await;
            }
        }
        VerificationInfo::unverified()
    }
}

#[derive(Deserialize)]
struct ExplorerEnvelope {
    result: Vec<ExplorerEntry>,
}

#[derive(Deserialize)]
struct ExplorerEntry {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
    #[serde(rename = "ContractName", default)]
    contract_name: String,
}

/// Explorer APIs answer `result[0].{SourceCode, ABI, ContractName}`;
/// a present but empty SourceCode means "deployed, not verified".
pub fn parse_source_response(body: &str) -> Option<VerificationInfo> {
    let envelope: ExplorerEnvelope = serde_json::from_str(body).ok()?;
    let entry = envelope.result.into_iter().next()?;
    if entry.source_code.trim().is_empty() {
        return Some(VerificationInfo::unverified());
    }
    Some(VerificationInfo {
        verified: true,
        contract_name: (!entry.contract_name.is_empty()).then_some(entry.contract_name),
        source_code: Some(entry.source_code),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::sync::atomic::{AtomicU32, Ordering};

    const VERIFIED_BODY: &str = r#"{"status":"1","message":"OK","result":[{"SourceCode":"contract Gem {}","ABI":"[]","ContractName":"Gem"}]}"#;
    const UNVERIFIED_BODY: &str = r#"{"status":"1","message":"OK","result":[{"SourceCode":"","ABI":"Contract source code not verified","ContractName":""}]}"#;

    struct ScriptedFetcher {
        calls: AtomicU32,
        responses: Vec<Result<String>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                responses,
            }
        }
    }

    #[async_trait]
    impl SourceFetcher for ScriptedFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            let i = self.calls.fetch_add(1, Ordering::Relaxed) as usize;
            match self.responses.get(i) {
                Some(Ok(s)) => Ok(s.clone()),
                Some(Err(_)) | None => anyhow::bail!("fetch failed"),
            }
        }
    }

    fn verifier(f: ScriptedFetcher) -> SourceVerifier<ScriptedFetcher> {
        SourceVerifier::with_fetcher(f, HashMap::new()).retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn parses_verified_entry() {
        let info = parse_source_response(VERIFIED_BODY).unwrap();
        assert!(info.verified);
        assert_eq!(info.contract_name.as_deref(), Some("Gem"));
        assert!(info.source_code.unwrap().contains("contract Gem"));
    }

    #[test]
    fn empty_source_is_unverified_not_error() {
        let info = parse_source_response(UNVERIFIED_BODY).unwrap();
        assert!(!info.verified);
        assert!(info.source_code.is_none());
    }

    #[test]
    fn garbage_body_is_none() {
        assert!(parse_source_response("not json").is_none());
        assert!(parse_source_response(r#"{"result":[]}"#).is_none());
    }

    #[tokio::test]
    async fn short_circuits_on_first_verified_answer() {
        let f = ScriptedFetcher::new(vec![Ok(VERIFIED_BODY.into())]);
        let v = verifier(f);
        let addr = address!("00000000000000000000000000000000000000aa");
        let info = v.verified_source(ChainScope::Ethereum, addr).await;
        assert!(info.verified);
        assert_eq!(v.fetcher.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let f = ScriptedFetcher::new(vec![
            Err(anyhow::anyhow!("timeout")),
            Ok(UNVERIFIED_BODY.into()),
            Ok(VERIFIED_BODY.into()),
        ]);
        let v = verifier(f);
        let addr = address!("00000000000000000000000000000000000000aa");
        let info = v.verified_source(ChainScope::Ethereum, addr).await;
        assert!(info.verified);
        assert_eq!(v.fetcher.calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn exhaustion_yields_unverified_with_empty_fields() {
        let f = ScriptedFetcher::new(vec![]);
        let v = verifier(f);
        let addr = address!("00000000000000000000000000000000000000aa");
        let info = v.verified_source(ChainScope::Ethereum, addr).await;
        assert!(!info.verified);
        assert!(info.contract_name.is_none());
        assert!(info.source_code.is_none());
        assert_eq!(v.fetcher.calls.load(Ordering::Relaxed), 3);
    }
}
