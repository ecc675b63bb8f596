use dashmap::DashMap;

use common_types::{FilterRequest, SubscriberScope, Subscription};

/// Scope -> ordered subscription list. Insertion order is preserved
/// because humans read `/list` output; snapshots are cheap clones so
/// the matching engine never iterates under the map lock.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: DashMap<SubscriberScope, Vec<Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert and report the scope's new filter count. Exact duplicates
    /// are not stored twice.
    pub fn add_filter(&self, scope: SubscriberScope, req: FilterRequest) -> usize {
        let sub = req.into_subscription();
        let mut entry = self.inner.entry(scope).or_default();
        if !entry.contains(&sub) {
            entry.push(sub);
        }
        entry.len()
    }

    /// Delete the exact matching triple; `false` when nothing matched.
    /// An absent ticker only ever equals an absent ticker.
    pub fn remove_filter(&self, scope: &SubscriberScope, req: FilterRequest) -> bool {
        let sub = req.into_subscription();
        let Some(mut entry) = self.inner.get_mut(scope) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|s| *s != sub);
        let removed = entry.len() < before;
        if entry.is_empty() {
            drop(entry);
            self.inner.remove_if(scope, |_, subs| subs.is_empty());
        }
        removed
    }

    pub fn list(&self, scope: &SubscriberScope) -> Vec<Subscription> {
        self.inner.get(scope).map(|e| e.clone()).unwrap_or_default()
    }

    /// Snapshot of every scope and its filters for one matching pass.
    pub fn all_scopes(&self) -> Vec<(SubscriberScope, Vec<Subscription>)> {
        self.inner
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_types::ChainScope;

    fn scope(chat: i64) -> SubscriberScope {
        SubscriberScope {
            chat_id: chat,
            thread_id: None,
        }
    }

    fn req(eth: f64, ticker: Option<&str>) -> FilterRequest {
        FilterRequest {
            eth,
            ticker: ticker.map(Into::into),
            chain: ChainScope::Ethereum,
        }
    }

    #[test]
    fn add_reports_count_and_dedups_exact_values() {
        let reg = SubscriptionRegistry::new();
        assert_eq!(reg.add_filter(scope(1), req(5.0, None)), 1);
        assert_eq!(reg.add_filter(scope(1), req(0.0, Some("PONK"))), 2);
        // same filter, different ticker case: value-equal after normalization
        assert_eq!(reg.add_filter(scope(1), req(0.0, Some("ponk"))), 2);
    }

    #[test]
    fn remove_needs_the_exact_triple() {
        let reg = SubscriptionRegistry::new();
        reg.add_filter(scope(1), req(5.0, Some("PONK")));
        assert!(!reg.remove_filter(&scope(1), req(5.0, None)));
        assert!(!reg.remove_filter(&scope(1), req(4.0, Some("PONK"))));
        assert!(reg.remove_filter(&scope(1), req(5.0, Some("ponk"))));
        assert!(!reg.remove_filter(&scope(1), req(5.0, Some("PONK"))));
    }

    #[test]
    fn scopes_are_isolated_by_thread() {
        let reg = SubscriptionRegistry::new();
        let main = scope(1);
        let thread = SubscriberScope {
            chat_id: 1,
            thread_id: Some(7),
        };
        reg.add_filter(main, req(1.0, None));
        reg.add_filter(thread, req(2.0, None));
        assert_eq!(reg.list(&main).len(), 1);
        assert_eq!(reg.list(&thread).len(), 1);
        assert_eq!(reg.all_scopes().len(), 2);
    }
}
