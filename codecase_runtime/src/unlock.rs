//! Unlock gate — executes kernel spend plans against the profile store.
//!
//! Store-confirms-first:
//!   1. plan the spend against the cached ledger (kernel, pure)
//!   2. write the whole next ledger to the store, time-bounded
//!   3. only after the write succeeds, replace the cache
//!
//! One spend lock is held across steps 1–3, so concurrent spends observe
//! each other's results. A write that times out keeps running and is parked
//! under the lock. The next spend or refresh waits for it (bounded) and
//! re-reads the store; while it is unresolved no second write is issued.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use codecase_engine::domain::Case;
use codecase_engine::ledger::{case_unlock_cost, plan_spend, LedgerError, LedgerState, SpendPlan};

use crate::store::{ProfileStore, StoreError};

/// Expected results of a spend. Store failures are errors, these are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendOutcome {
    Unlocked { balance: i64 },
    AlreadyUnlocked,
    InsufficientFunds { balance: i64, cost: i64 },
}

#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

type WriteTask = JoinHandle<Result<(), StoreError>>;

/// Guarded by the spend lock.
#[derive(Default)]
struct SpendSlot {
    in_flight: Option<WriteTask>,
    stale: bool,
}

pub struct UnlockGate {
    store: Arc<dyn ProfileStore>,
    user_id: String,
    timeout: Duration,
    cache: watch::Sender<LedgerState>,
    spend_lock: Mutex<SpendSlot>,
}

impl std::fmt::Debug for UnlockGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockGate")
            .field("user_id", &self.user_id)
            .field("timeout", &self.timeout)
            .field("ledger", &*self.cache.borrow())
            .finish_non_exhaustive()
    }
}

impl UnlockGate {
    /// Read the learner's ledger once and cache it.
    pub async fn connect(
        store: Arc<dyn ProfileStore>,
        user_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UnlockError> {
        let user_id = user_id.into();
        let ledger = bounded_read(&store, &user_id, timeout).await?;
        let (cache, _) = watch::channel(ledger);
        Ok(Self {
            store,
            user_id,
            timeout,
            cache,
            spend_lock: Mutex::new(SpendSlot::default()),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Cached ledger.
    pub fn ledger(&self) -> LedgerState {
        self.cache.borrow().clone()
    }

    pub fn balance(&self) -> i64 {
        self.cache.borrow().point_balance
    }

    pub fn is_unlocked(&self, content_id: &str) -> bool {
        self.cache.borrow().is_unlocked(content_id)
    }

    /// Affordability against the cache. A spend re-checks under its lock.
    pub fn can_afford(&self, cost: i64) -> bool {
        self.cache.borrow().can_afford(cost)
    }

    /// Ledger updates, published after each confirmed write.
    pub fn subscribe(&self) -> watch::Receiver<LedgerState> {
        self.cache.subscribe()
    }

    /// Re-read the store into the cache, after any parked write resolves.
    pub async fn refresh(&self) -> Result<LedgerState, UnlockError> {
        let mut slot = self.spend_lock.lock().await;
        slot.stale = true;
        self.settle(&mut slot).await?;
        Ok(self.ledger())
    }

    /// Spend `cost` points to unlock `content_id`.
    pub async fn spend(&self, content_id: &str, cost: i64) -> Result<SpendOutcome, UnlockError> {
        let mut slot = self.spend_lock.lock().await;
        self.settle(&mut slot).await?;

        let current = self.ledger();
        let next = match plan_spend(&current, content_id, cost)? {
            SpendPlan::AlreadyUnlocked => return Ok(SpendOutcome::AlreadyUnlocked),
            SpendPlan::InsufficientFunds { balance, cost } => {
                return Ok(SpendOutcome::InsufficientFunds { balance, cost })
            }
            SpendPlan::Debit { next } => next,
        };

        if let Err(err) = self.bounded_write(&mut slot, &next).await {
            warn!(
                user = %self.user_id,
                content_id,
                error = %err,
                "unlock write failed, ledger unchanged"
            );
            return Err(err.into());
        }

        let balance = next.point_balance;
        self.cache.send_replace(next);
        info!(user = %self.user_id, content_id, cost, balance, "content unlocked");
        Ok(SpendOutcome::Unlocked { balance })
    }

    /// Unlock a whole case at its difficulty-scaled price.
    pub async fn unlock_case(&self, case: &Case) -> Result<SpendOutcome, UnlockError> {
        let cost = case_unlock_cost(case)?;
        self.spend(&case.id, cost).await
    }

    /// Wait out a parked write, then re-read the store if the cache is
    /// stale. A write still unresolved after `timeout` stays parked.
    async fn settle(&self, slot: &mut SpendSlot) -> Result<(), UnlockError> {
        if let Some(write) = slot.in_flight.as_mut() {
            let joined = match tokio::time::timeout(self.timeout, write).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(user = %self.user_id, "earlier unlock write still unresolved");
                    return Err(StoreError::Timeout(self.timeout).into());
                }
            };
            slot.in_flight = None;
            match joined {
                Ok(Ok(())) => info!(user = %self.user_id, "late unlock write landed"),
                Ok(Err(err)) => warn!(user = %self.user_id, error = %err, "late unlock write failed"),
                Err(join) => warn!(user = %self.user_id, error = %join, "late unlock write aborted"),
            }
        }

        if slot.stale {
            let ledger = bounded_read(&self.store, &self.user_id, self.timeout).await?;
            self.cache.send_replace(ledger);
            slot.stale = false;
        }
        Ok(())
    }

    /// The write runs on its own task so a timeout stops the wait without
    /// cancelling a write the store may still apply.
    async fn bounded_write(&self, slot: &mut SpendSlot, next: &LedgerState) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let user_id = self.user_id.clone();
        let doc = next.clone();
        let mut write = tokio::spawn(async move { store.write(&user_id, &doc).await });

        match tokio::time::timeout(self.timeout, &mut write).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(StoreError::Unavailable(join.to_string())),
            Err(_) => {
                slot.in_flight = Some(write);
                slot.stale = true;
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

async fn bounded_read(
    store: &Arc<dyn ProfileStore>,
    user_id: &str,
    timeout: Duration,
) -> Result<LedgerState, StoreError> {
    match tokio::time::timeout(timeout, store.read(user_id)).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProfileStore;

    async fn gate_with(balance: i64) -> (Arc<InMemoryProfileStore>, UnlockGate) {
        let store = Arc::new(InMemoryProfileStore::with_profile("u1", LedgerState::new(balance)));
        let gate = UnlockGate::connect(store.clone(), "u1", Duration::from_secs(5))
            .await
            .unwrap();
        (store, gate)
    }

    #[tokio::test]
    async fn test_spend_debits_after_write() {
        let (store, gate) = gate_with(250).await;
        assert_eq!(
            gate.spend("case-1", 200).await.unwrap(),
            SpendOutcome::Unlocked { balance: 50 }
        );
        assert_eq!(gate.balance(), 50);
        assert_eq!(store.snapshot("u1").await.unwrap().point_balance, 50);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache() {
        let (store, gate) = gate_with(250).await;
        store.set_fail_writes(true);
        let err = gate.spend("case-1", 200).await.unwrap_err();
        assert!(matches!(err, UnlockError::Store(StoreError::Unavailable(_))));
        assert_eq!(gate.balance(), 250);
        assert!(!gate.is_unlocked("case-1"));
    }

    #[tokio::test]
    async fn test_negative_cost_is_ledger_error() {
        let (_, gate) = gate_with(10).await;
        assert!(matches!(
            gate.spend("x", -1).await,
            Err(UnlockError::Ledger(LedgerError::NegativeCost(-1)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_waits_for_parked_write() {
        let (store, gate) = gate_with(300).await;
        store.set_delay(Some(Duration::from_secs(8))).await;
        assert!(matches!(
            gate.spend("a", 100).await,
            Err(UnlockError::Store(StoreError::Timeout(_)))
        ));
        store.set_delay(None).await;

        let ledger = gate.refresh().await.unwrap();
        assert_eq!(ledger.point_balance, 200);
        assert!(ledger.is_unlocked("a"));
        assert_eq!(gate.ledger(), ledger);
    }

    #[tokio::test]
    async fn test_subscribers_see_confirmed_balance() {
        let (_, gate) = gate_with(100).await;
        let mut rx = gate.subscribe();
        gate.spend("a", 40).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().point_balance, 60);
    }
}
