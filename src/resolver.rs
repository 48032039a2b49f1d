//! Token-account resolution
//!
//! Resolves a root account into its associated token accounts, best
//! effort. Results are cached for five minutes; a freshly created account
//! may transiently resolve to nothing, so an empty network result is
//! retried a bounded number of times before being accepted as "no
//! accounts" (which is a valid answer, not an error).

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::Error;
use crate::keys::PublicKey;
use crate::rpc::LedgerRpc;

/// Capacity of the token-account cache.
pub const TOKEN_ACCOUNT_CACHE_SIZE: usize = 500;

/// How long a cache entry may be served before it must be refreshed.
pub const TOKEN_ACCOUNT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct TokenAccountEntry {
    created: Instant,
    accounts: Vec<PublicKey>,
}

/// Freshness is a pure function of the observation time so the TTL cutoff
/// is directly testable.
fn is_fresh(now: Instant, created: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(created) < ttl
}

/// Resolves root accounts to token accounts with a time-boxed cache.
///
/// Safe for concurrent use; concurrent misses for the same key may race to
/// re-fetch, and the last write wins. The overwrite is idempotent.
pub struct AccountResolver {
    cache: Mutex<LruCache<String, TokenAccountEntry>>,
    ttl: Duration,
    max_retries: u32,
}

impl AccountResolver {
    pub fn new(max_retries: u32) -> Self {
        Self::with_ttl(max_retries, TOKEN_ACCOUNT_TTL)
    }

    fn with_ttl(max_retries: u32, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(TOKEN_ACCOUNT_CACHE_SIZE)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
            max_retries,
        }
    }

    /// Returns the token accounts owned by `account`, possibly empty.
    pub async fn resolve(
        &self,
        rpc: &dyn LedgerRpc,
        account: &PublicKey,
    ) -> Result<Vec<PublicKey>, Error> {
        self.resolve_at(rpc, account, Instant::now()).await
    }

    async fn resolve_at(
        &self,
        rpc: &dyn LedgerRpc,
        account: &PublicKey,
        now: Instant,
    ) -> Result<Vec<PublicKey>, Error> {
        let key = account.to_base58();

        {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.get(&key) {
                if is_fresh(now, entry.created, self.ttl) {
                    return Ok(entry.accounts.clone());
                }
                // Stale entries are never served.
                cache.pop(&key);
                debug!(account = %key, "evicted stale token account entry");
            }
        }

        let max_attempts = self.max_retries.max(1);
        let mut attempt = 0u32;
        let accounts = loop {
            attempt += 1;
            let accounts = rpc
                .resolve_token_accounts(account)
                .await
                .map_err(|e| e.into_account_error())?;
            if !accounts.is_empty() || attempt >= max_attempts {
                break accounts;
            }
            debug!(
                account = %key,
                attempt,
                max_attempts,
                "no token accounts yet, retrying"
            );
        };

        if accounts.is_empty() {
            return Ok(Vec::new());
        }

        self.cache.lock().put(
            key,
            TokenAccountEntry {
                created: now,
                accounts: accounts.clone(),
            },
        );
        Ok(accounts)
    }
}
