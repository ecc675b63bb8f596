use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use common_types::ChainScope;
use tg_publisher::TgConfig;

#[derive(Clone, Debug, Deserialize)]
pub struct ChainEndpoints {
    pub rpc_url: String,
    pub ws_url: String,
    #[serde(default)]
    pub explorer_api_key: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WatcherConfig {
    /// A chain is scanned only if it has an entry here.
    #[serde(default)]
    pub chains: HashMap<ChainScope, ChainEndpoints>,
    pub telegram: TgConfig,
    #[serde(default = "default_patterns_file")]
    pub patterns_file: PathBuf,
    #[serde(default = "default_health_addr")]
    pub health_addr: String,
}

fn default_patterns_file() -> PathBuf {
    PathBuf::from("patterns.toml")
}

fn default_health_addr() -> String {
    "127.0.0.1:3000".into()
}

impl WatcherConfig {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&data)?)
    }

    pub fn explorer_api_keys(&self) -> HashMap<ChainScope, String> {
        self.chains
            .iter()
            .filter(|(_, e)| !e.explorer_api_key.is_empty())
            .map(|(chain, e)| (*chain, e.explorer_api_key.clone()))
            .collect()
    }
}
