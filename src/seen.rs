use alloy::primitives::Address;
use dashmap::DashSet;

use common_types::ChainScope;

/// Process-lifetime dedup of handled contract addresses, keyed per
/// chain. Never pruned: bounded by process lifetime, not disk.
#[derive(Default)]
pub struct SeenSet {
    inner: DashSet<(ChainScope, Address)>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic first-insert; `true` exactly once per (chain, address).
    pub fn insert(&self, chain: ChainScope, address: Address) -> bool {
        self.inner.insert((chain, address))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn first_insert_wins_per_chain() {
        let seen = SeenSet::new();
        let addr = address!("00000000000000000000000000000000000000aa");
        assert!(seen.insert(ChainScope::Ethereum, addr));
        assert!(!seen.insert(ChainScope::Ethereum, addr));
        // the same CREATE address on another chain is a distinct contract
        assert!(seen.insert(ChainScope::Bsc, addr));
        assert_eq!(seen.len(), 2);
    }
}
