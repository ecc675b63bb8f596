use alloy::eips::BlockId;
use alloy::network::Ethereum;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::sol;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

use common_types::{ChainScope, TokenMetadata};

pub type HttpProvider = RootProvider<Ethereum>;
pub type WsProvider = RootProvider<Ethereum>;

sol! {
    #[sol(rpc)]
    contract Erc20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }

    #[sol(rpc)]
    contract PairFactory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }

    #[sol(rpc)]
    contract LiquidityPair {
        function token0() external view returns (address);
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

/// One contract-creation event, in block order.
#[derive(Debug, Clone)]
pub struct Creation {
    pub tx_hash: B256,
    pub address: Address,
    pub deployer: Address,
}

/// Raw pair state; reserve orientation is decided by the caller against
/// the chain's wrapped-native address.
#[derive(Debug, Clone)]
pub struct PairReserves {
    pub token0: Address,
    pub reserve0: u128,
    pub reserve1: u128,
}

/// Read access to one or more chains. Every method is a recoverable
/// failure from the caller's point of view: a block or address is
/// skipped, the process never dies on an RPC error.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn block_creations(&self, chain: ChainScope, number: u64) -> Result<Vec<Creation>>;
    async fn has_code(&self, chain: ChainScope, address: Address) -> Result<bool>;
    async fn native_balance(&self, chain: ChainScope, address: Address) -> Result<U256>;
    async fn token_metadata(&self, chain: ChainScope, address: Address) -> Result<TokenMetadata>;
    async fn pair_for(&self, chain: ChainScope, factory: Address, token: Address) -> Result<Option<Address>>;
    async fn pair_reserves(&self, chain: ChainScope, pair: Address) -> Result<PairReserves>;
}

struct ChainConn {
    http: HttpProvider,
    ws_url: String,
}

/// Alloy-backed gateway. One HTTP provider per configured chain; WS
/// connections are established per subscription by `subscribe_blocks`.
#[derive(Default)]
pub struct EvmGateway {
    chains: HashMap<ChainScope, ChainConn>,
}

impl EvmGateway {
    pub fn new() -> Self {
        Self { chains: HashMap::new() }
    }

    pub fn add_chain(&mut self, chain: ChainScope, rpc_url: &str, ws_url: &str) -> Result<()> {
        let url = Url::parse(rpc_url).with_context(|| format!("invalid RPC URL for {chain}"))?;
        self.chains.insert(
            chain,
            ChainConn {
                http: RootProvider::new_http(url),
                ws_url: ws_url.to_string(),
            },
        );
        Ok(())
    }

    pub fn configured_chains(&self) -> Vec<ChainScope> {
        self.chains.keys().copied().collect()
    }

    fn conn(&self, chain: ChainScope) -> Result<&ChainConn> {
        match self.chains.get(&chain) {
            Some(c) => Ok(c),
            None => bail!("chain {chain} is not configured"),
        }
    }

    /// newHeads subscription yielding block numbers. The caller owns the
    /// reconnect loop; a dropped stream means "subscribe again".
    pub async fn subscribe_blocks(&self, chain: ChainScope) -> Result<impl Stream<Item = u64> + Send> {
        let ws_url = self.conn(chain)?.ws_url.clone();
        let provider: WsProvider = RootProvider::connect(&ws_url)
            .await
            .with_context(|| format!("ws connect failed for {chain}"))?;
        let sub = provider.subscribe_blocks().await?;
        Ok(sub.into_stream().map(move |header| {
            // keep the pubsub provider alive for the stream's lifetime
            let _ = &provider;
            header.inner.number
        }))
    }

    /// Poll fallback for when the WS subscription cannot be established.
    pub async fn latest_block(&self, chain: ChainScope) -> Result<u64> {
        let conn = self.conn(chain)?;
        Ok(conn.http.get_block_number().await?)
    }

    async fn indexed_metadata(&self, chain: ChainScope, address: Address) -> Result<TokenMetadata> {
        #[derive(Debug, Deserialize)]
        struct Resp {
            name: Option<String>,
            symbol: Option<String>,
            decimals: Option<u8>,
        }
        let conn = self.conn(chain)?;
        let resp: Resp = conn
            .http
            .raw_request("alchemy_getTokenMetadata".into(), [address])
            .await?;
        Ok(TokenMetadata {
            name: resp.name,
            symbol: resp.symbol,
            decimals: resp.decimals,
        })
    }

    async fn onchain_metadata(&self, chain: ChainScope, address: Address) -> Result<TokenMetadata> {
        let conn = self.conn(chain)?;
        let erc20 = Erc20::new(address, conn.http.clone());
        let symbol = erc20.symbol().call().await?;
        let decimals = erc20.decimals().call().await?;
        // a missing name() is tolerable once we have a symbol
        let name = erc20.name().call().await.ok();
        Ok(TokenMetadata {
            name,
            symbol: Some(symbol),
            decimals: Some(decimals),
        })
    }
}

#[async_trait]
impl ChainReader for EvmGateway {
    async fn block_creations(&self, chain: ChainScope, number: u64) -> Result<Vec<Creation>> {
        let conn = self.conn(chain)?;
        let receipts = conn
            .http
            .get_block_receipts(BlockId::number(number))
            .await?
            .with_context(|| format!("block {number} has no receipts yet"))?;
        Ok(receipts
            .into_iter()
            .filter_map(|r| {
                r.contract_address.map(|address| Creation {
                    tx_hash: r.transaction_hash,
                    address,
                    deployer: r.from,
                })
            })
            .collect())
    }

    async fn has_code(&self, chain: ChainScope, address: Address) -> Result<bool> {
        let conn = self.conn(chain)?;
        let code = conn.http.get_code_at(address).await?;
        Ok(!code.is_empty())
    }

    async fn native_balance(&self, chain: ChainScope, address: Address) -> Result<U256> {
        let conn = self.conn(chain)?;
        Ok(conn.http.get_balance(address).await?)
    }

    /// Two independent sources: the indexing-service metadata call first
    /// (it tolerates a contract the node has not fully indexed), direct
    /// ERC-20 calls second. First non-empty symbol wins.
    async fn token_metadata(&self, chain: ChainScope, address: Address) -> Result<TokenMetadata> {
        let indexed = self.indexed_metadata(chain, address).await;
        if let Ok(meta) = &indexed {
            if meta.has_symbol() {
                return Ok(meta.clone());
            }
        }
        match self.onchain_metadata(chain, address).await {
            Ok(meta) if meta.has_symbol() => Ok(meta),
            Ok(meta) => Ok(merge_partial(indexed.ok(), Some(meta))),
            Err(e) => match indexed {
                Ok(meta) => Ok(meta),
                Err(_) => Err(e),
            },
        }
    }

    async fn pair_for(&self, chain: ChainScope, factory: Address, token: Address) -> Result<Option<Address>> {
        let conn = self.conn(chain)?;
        let pair = PairFactory::new(factory, conn.http.clone())
            .getPair(token, chain.wrapped_native())
            .call()
            .await?;
        Ok((!pair.is_zero()).then_some(pair))
    }

    async fn pair_reserves(&self, chain: ChainScope, pair: Address) -> Result<PairReserves> {
        let conn = self.conn(chain)?;
        let contract = LiquidityPair::new(pair, conn.http.clone());
        let token0 = contract.token0().call().await?;
        let reserves = contract.getReserves().call().await?;
        Ok(PairReserves {
            token0,
            reserve0: reserves.reserve0.to::<u128>(),
            reserve1: reserves.reserve1.to::<u128>(),
        })
    }
}

/// Fill holes in whichever source answered with the other's fields;
/// symbol-less output is rejected downstream.
fn merge_partial(a: Option<TokenMetadata>, b: Option<TokenMetadata>) -> TokenMetadata {
    let mut out = a.unwrap_or_default();
    if let Some(b) = b {
        out.name = out.name.or(b.name);
        out.symbol = out.symbol.or(b.symbol);
        out.decimals = out.decimals.or(b.decimals);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_first_source_fields() {
        let a = TokenMetadata {
            name: None,
            symbol: Some("GEM".into()),
            decimals: None,
        };
        let b = TokenMetadata {
            name: Some("Gem".into()),
            symbol: Some("OTHER".into()),
            decimals: Some(18),
        };
        let merged = merge_partial(Some(a), Some(b));
        assert_eq!(merged.symbol.as_deref(), Some("GEM"));
        assert_eq!(merged.name.as_deref(), Some("Gem"));
        assert_eq!(merged.decimals, Some(18));
    }

    #[test]
    fn merge_tolerates_missing_sources() {
        let merged = merge_partial(None, None);
        assert!(!merged.has_symbol());
    }
}
