use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static ETH_FACTORIES: [Address; 2] = [
    // Uniswap V2, SushiSwap
    address!("5c69bee701ef814a2b6a3edd4b1652cb9cc5aa6f"),
    address!("c0aee478e3658e2610c5f7a4a2e1777ce9e4f2ac"),
];

static BSC_FACTORIES: [Address; 2] = [
    // PancakeSwap V2, Biswap
    address!("ca143ce32fe78f1f7019d7d551a6402fc5350c73"),
    address!("858e3312ed3a876947ea49d572a7c42de08af7ee"),
];

static BASE_FACTORIES: [Address; 2] = [
    // Uniswap V2, BaseSwap
    address!("8909dc15e40173ff4699343b6eb8132c65e18ec6"),
    address!("fda619b6d20975be80a10332cd39b9a4b0faa8bb"),
];

/// One supported network with its fixed addresses and endpoints. All
/// chain-scoped lookups must come from the same scope; mixing scopes is
/// a defect, so everything address-like is resolved through here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainScope {
    Ethereum,
    Bsc,
    Base,
}

impl ChainScope {
    pub const ALL: [ChainScope; 3] = [ChainScope::Ethereum, ChainScope::Bsc, ChainScope::Base];

    pub const fn chain_id(self) -> u64 {
        match self {
            ChainScope::Ethereum => 1,
            ChainScope::Bsc => 56,
            ChainScope::Base => 8453,
        }
    }

    /// The wrapped native asset every LP pool is probed against.
    pub fn wrapped_native(self) -> Address {
        match self {
            ChainScope::Ethereum => address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            ChainScope::Bsc => address!("bb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c"),
            ChainScope::Base => address!("4200000000000000000000000000000000000006"),
        }
    }

    /// DEX pair factories in probe priority order.
    pub fn factories(self) -> &'static [Address] {
        match self {
            ChainScope::Ethereum => &ETH_FACTORIES,
            ChainScope::Bsc => &BSC_FACTORIES,
            ChainScope::Base => &BASE_FACTORIES,
        }
    }

    pub fn explorer_api(self) -> &'static str {
        match self {
            ChainScope::Ethereum => "https://api.etherscan.io/api",
            ChainScope::Bsc => "https://api.bscscan.com/api",
            ChainScope::Base => "https://api.basescan.org/api",
        }
    }

    pub fn explorer_address_url(self, address: Address) -> String {
        let base = match self {
            ChainScope::Ethereum => "https://etherscan.io/address",
            ChainScope::Bsc => "https://bscscan.com/address",
            ChainScope::Base => "https://basescan.org/address",
        };
        format!("{base}/{address:#x}")
    }

    pub fn dexscreener_url(self, address: Address) -> String {
        let slug = match self {
            ChainScope::Ethereum => "ethereum",
            ChainScope::Bsc => "bsc",
            ChainScope::Base => "base",
        };
        format!("https://dexscreener.com/{slug}/{address:#x}")
    }

    pub fn native_ticker(self) -> &'static str {
        match self {
            ChainScope::Ethereum | ChainScope::Base => "ETH",
            ChainScope::Bsc => "BNB",
        }
    }
}

impl fmt::Display for ChainScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainScope::Ethereum => "Ethereum",
            ChainScope::Bsc => "BSC",
            ChainScope::Base => "Base",
        };
        f.write_str(name)
    }
}

impl FromStr for ChainScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eth" | "ethereum" => Ok(ChainScope::Ethereum),
            "bsc" | "bnb" => Ok(ChainScope::Bsc),
            "base" => Ok(ChainScope::Base),
            _ => Err(()),
        }
    }
}
