//! Trustline Balance
//!
//! The single signed decimal both peers track their own view of.
//! ALL balance mutations go through `add`/`sub`; the limit check is
//! applied to the post-transfer balance and validation is separated
//! from mutation so the state machine can reject before recording a
//! credit.
//!
//! # Invariant (at rest)
//! `min <= balance <= max`. `min` is the credit the peer extends to
//! us, `max` the credit we extend to the peer.
//!
//! Concurrency: the owning plugin serializes every get-then-put
//! through its state lock; `Balance` itself performs no locking.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

use crate::core_types::BALANCE_KEY;
use crate::error::PluginError;
use crate::events::{EventBus, LedgerEvent};
use crate::money;
use crate::store::Store;

/// Credit-line bounds for the trustline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceLimits {
    pub min: Decimal,
    pub max: Decimal,
}

/// Persistent signed decimal balance guarded by `[min, max]`.
pub struct Balance {
    store: Arc<dyn Store>,
    events: Arc<EventBus>,
    limits: BalanceLimits,
}

impl Balance {
    pub fn new(store: Arc<dyn Store>, events: Arc<EventBus>, limits: BalanceLimits) -> Self {
        Self {
            store,
            events,
            limits,
        }
    }

    pub fn limits(&self) -> BalanceLimits {
        self.limits
    }

    /// Current balance, lazily initialized to zero on first access.
    pub async fn get(&self) -> Result<Decimal, PluginError> {
        match self.store.get(BALANCE_KEY).await? {
            Some(raw) => money::parse_signed(&raw)
                .map_err(|e| PluginError::Store(format!("corrupt balance: {}", e))),
            None => {
                self.store
                    .put(BALANCE_KEY, &money::format_amount(&Decimal::ZERO))
                    .await?;
                Ok(Decimal::ZERO)
            }
        }
    }

    /// Credit the trustline. Fails with `OverLimit` when the
    /// post-transfer balance would exceed `max`; nothing is persisted
    /// on failure.
    pub async fn add(&self, amount: Decimal) -> Result<Decimal, PluginError> {
        let current = self.get().await?;
        let next = current + amount;
        if next > self.limits.max {
            return Err(PluginError::OverLimit(money::format_amount(&next)));
        }
        self.persist(next).await
    }

    /// Debit the trustline. Fails with `UnderLimit` when the
    /// post-transfer balance would fall below `min`.
    pub async fn sub(&self, amount: Decimal) -> Result<Decimal, PluginError> {
        let current = self.get().await?;
        let next = current - amount;
        if next < self.limits.min {
            return Err(PluginError::UnderLimit(money::format_amount(&next)));
        }
        self.persist(next).await
    }

    /// Pure predicate: would crediting `raw` keep the balance within
    /// `max`? A malformed or non-positive amount is simply invalid,
    /// never an error.
    pub async fn is_valid_incoming(&self, raw: &str) -> Result<bool, PluginError> {
        match money::parse_positive(raw) {
            Ok(amount) => self.can_credit(&amount).await,
            Err(_) => Ok(false),
        }
    }

    /// Limit half of `is_valid_incoming`, for callers that already
    /// parsed the amount.
    pub async fn can_credit(&self, amount: &Decimal) -> Result<bool, PluginError> {
        let current = self.get().await?;
        Ok(current + *amount <= self.limits.max)
    }

    async fn persist(&self, next: Decimal) -> Result<Decimal, PluginError> {
        self.store
            .put(BALANCE_KEY, &money::format_amount(&next))
            .await?;
        debug!(balance = %next, "balance changed");
        self.events.emit(LedgerEvent::BalanceChanged(next));
        Ok(next)
    }
}
