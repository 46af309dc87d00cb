//! Concurrent reads of marketplace state.
//!
//! List views need accounts, assets and offers together; the acceptance flow
//! needs the user's and the offer owner's accounts together. Both are issued
//! concurrently and fail as a whole on the first error. Nothing is retried.

use crate::MarketplaceApi;
use sawbuck_core::error::{MarketError, MarketResult};
use sawbuck_core::{Account, MarketSnapshot};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Default max concurrent account requests.
const DEFAULT_CONCURRENCY: usize = 4;

/// Fetches accounts, assets and offers concurrently.
pub async fn fetch_snapshot(api: &dyn MarketplaceApi) -> MarketResult<MarketSnapshot> {
    let (accounts, assets, offers) =
        tokio::try_join!(api.list_accounts(), api.list_assets(), api.list_offers())?;

    tracing::info!(
        accounts = accounts.len(),
        assets = assets.len(),
        offers = offers.len(),
        "fetched snapshot"
    );

    Ok(MarketSnapshot {
        accounts,
        assets,
        offers,
    })
}

/// Fetches a set of accounts by public key, throttled by a semaphore.
///
/// ```ignore
/// let fetcher = AccountFetcher::new(api.clone());
/// let accounts = fetcher.fetch(&[user_key, owner_key]).await?;
/// ```
pub struct AccountFetcher {
    api: Arc<dyn MarketplaceApi>,
    max_concurrent: usize,
}

impl AccountFetcher {
    pub fn new(api: Arc<dyn MarketplaceApi>) -> Self {
        Self {
            api,
            max_concurrent: DEFAULT_CONCURRENCY,
        }
    }

    /// Override max concurrent requests (default: 4). Zero is treated as one.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    /// Fetches every distinct key once. Any failure aborts the whole fetch.
    pub async fn fetch<S: AsRef<str>>(&self, keys: &[S]) -> MarketResult<HashMap<String, Account>> {
        let distinct: BTreeSet<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.max_concurrent));
        let mut tasks = tokio::task::JoinSet::new();

        tracing::debug!(
            accounts = distinct.len(),
            concurrency = self.max_concurrent,
            "fetching accounts"
        );

        for key in distinct {
            let api = self.api.clone();
            let sem = semaphore.clone();
            tasks.spawn(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|e| MarketError::Internal(format!("semaphore closed: {e}")))?;
                api.get_account(&key).await
            });
        }

        let mut accounts = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let account = joined
                .map_err(|e| MarketError::Internal(format!("account fetch task failed: {e}")))??;
            accounts.insert(account.public_key.clone(), account);
        }
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryMarket;

    fn market() -> Arc<MemoryMarket> {
        let snapshot: MarketSnapshot = serde_json::from_value(serde_json::json!({
            "accounts": [
                {"publicKey": "02aa", "holdings": []},
                {"publicKey": "03bb", "holdings": []}
            ],
            "assets": [{"name": "gold"}],
            "offers": []
        }))
        .unwrap();
        Arc::new(MemoryMarket::new(snapshot))
    }

    #[tokio::test]
    async fn snapshot_collects_all_lists() {
        let m = market();
        let snapshot = fetch_snapshot(m.as_ref()).await.unwrap();
        assert_eq!(snapshot.accounts.len(), 2);
        assert_eq!(snapshot.assets.len(), 1);
        assert!(snapshot.offers.is_empty());
    }

    #[tokio::test]
    async fn fetcher_dedupes_keys() {
        let fetcher = AccountFetcher::new(market()).with_concurrency(1);
        let accounts = fetcher.fetch(&["02aa", "02aa", "03bb"]).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.contains_key("03bb"));
    }

    #[tokio::test]
    async fn fetcher_fails_on_missing_account() {
        let fetcher = AccountFetcher::new(market());
        let err = fetcher.fetch(&["02aa", "04cc"]).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }
}
