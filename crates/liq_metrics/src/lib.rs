use alloy::primitives::{Address, U256};
use tracing::debug;

use chain_gateway::{ChainReader, PairReserves};
use common_types::{ChainScope, LiquidityInfo};

const NATIVE_DECIMALS: u8 = 18;

/// Probe the chain's factories in priority order; first non-zero pair
/// wins. A pair nowhere is a normal outcome, not an error.
pub async fn find_pair(reader: &dyn ChainReader, chain: ChainScope, token: Address) -> Option<Address> {
    for factory in chain.factories() {
        match reader.pair_for(chain, *factory, token).await {
            Ok(Some(pair)) => return Some(pair),
            Ok(None) => {}
            Err(e) => debug!(?e, %chain, %factory, "factory probe failed"),
        }
    }
    None
}

/// Full liquidity resolution for one candidate. Every failure on the
/// way degrades to "no liquidity": a token seconds after deployment
/// routinely has none.
pub async fn resolve_liquidity(
    reader: &dyn ChainReader,
    chain: ChainScope,
    token: Address,
    decimals: u8,
) -> LiquidityInfo {
    let Some(pair) = find_pair(reader, chain, token).await else {
        return LiquidityInfo::absent();
    };
    match reader.pair_reserves(chain, pair).await {
        Ok(reserves) => derive(pair, &reserves, chain.wrapped_native(), decimals),
        Err(e) => {
            debug!(?e, %chain, %pair, "reserve read failed");
            LiquidityInfo::absent()
        }
    }
}

/// Orient the reserves against the wrapped native asset, then derive
/// price (native per token, decimals-adjusted) and the constant-product
/// market-cap approximation of 2x the native side.
fn derive(pair: Address, reserves: &PairReserves, wrapped_native: Address, token_decimals: u8) -> LiquidityInfo {
    let (native_raw, token_raw) = if reserves.token0 == wrapped_native {
        (reserves.reserve0, reserves.reserve1)
    } else {
        (reserves.reserve1, reserves.reserve0)
    };
    let native_reserve = units_to_ui(native_raw, NATIVE_DECIMALS);
    let token_reserve = units_to_ui(token_raw, token_decimals);
    let price_native = (token_reserve > 0.0).then(|| native_reserve / token_reserve);
    LiquidityInfo {
        pair: Some(pair),
        native_reserve,
        price_native,
        market_cap_native: Some(2.0 * native_reserve),
    }
}

pub fn units_to_ui(amount: u128, decimals: u8) -> f64 {
    (amount as f64) / 10f64.powi(decimals as i32)
}

/// Wei-denominated balances into whole native units. Goes through the
/// decimal string so values beyond u128 cannot wrap.
pub fn wei_to_native(amount: U256) -> f64 {
    let raw: f64 = amount.to_string().parse().unwrap_or(f64::MAX);
    raw / 10f64.powi(NATIVE_DECIMALS as i32)
}
