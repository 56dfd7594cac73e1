use std::fmt::Debug;

use log::*;
use loyalty_common::{OrderNumber, Points};

use crate::{
    db::traits::{LedgerDatabase, WithdrawalOutcome},
    db_types::{NewWithdrawal, Withdrawal},
    events::{EventProducers, WithdrawalEvent},
    ledger_api::errors::LedgerApiError,
};

/// Spends points from a user's balance.
pub struct WithdrawalApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for WithdrawalApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WithdrawalApi")
    }
}

impl<B> WithdrawalApi<B>
where B: LedgerDatabase
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    /// Debits `sum` from the user's balance and records the withdrawal against `order`, atomically.
    ///
    /// `order` must pass the Luhn check and `sum` must be positive; otherwise nothing is written and `InvalidInput` is
    /// returned. If the balance does not cover `sum`, `InsufficientBalance` is returned and nothing is written.
    /// Concurrent withdrawals cannot overdraw the balance between them.
    pub async fn withdraw(&self, user_id: i64, order: &str, sum: Points) -> Result<Withdrawal, LedgerApiError> {
        let order_number = order.trim().parse::<OrderNumber>()?;
        if !sum.is_positive() {
            return Err(LedgerApiError::InvalidInput(format!("withdrawal sum must be positive, got {sum}")));
        }
        let request = NewWithdrawal { order_number, user_id, sum };
        let outcome = self.db.withdraw(request).await.map_err(LedgerApiError::storage)?;
        match outcome {
            WithdrawalOutcome::Completed(withdrawal) => {
                info!("💸️ User #{user_id} withdrew {sum} against order {}", withdrawal.order_number);
                self.producers.publish_withdrawal(WithdrawalEvent::new(withdrawal.clone())).await;
                Ok(withdrawal)
            },
            WithdrawalOutcome::InsufficientBalance { available } => {
                debug!("💸️ User #{user_id} tried to withdraw {sum}, but only has {available}");
                Err(LedgerApiError::InsufficientBalance { requested: sum, available })
            },
            WithdrawalOutcome::AccountNotFound => Err(LedgerApiError::NotFound(format!("User #{user_id}"))),
        }
    }
}
