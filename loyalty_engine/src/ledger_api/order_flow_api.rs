use std::fmt::Debug;

use log::*;
use loyalty_common::{OrderNumber, Points};

use crate::{
    accrual::ReconciliationQueue,
    db::traits::{AccrualOutcome, InsertOrderResult, LedgerDatabase},
    db_types::{AccrualDecision, NewOrder, OrderStatusType},
    events::{EventProducers, OrderAccruedEvent},
    ledger_api::{errors::LedgerApiError, ledger_objects::SubmissionOutcome},
};

/// `OrderFlowApi` is the submission gate. It validates order numbers, stores new ones and queues them for
/// reconciliation.
pub struct OrderFlowApi<B> {
    db: B,
    queue: ReconciliationQueue,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, queue: ReconciliationQueue, producers: EventProducers) -> Self {
        Self { db, queue, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: LedgerDatabase
{
    /// Submits an order number on behalf of `user_id`.
    ///
    /// * A number that is not all digits or fails the Luhn check is rejected with `InvalidInput`, before the store is
    ///   touched.
    /// * A new number is stored with status `NEW` and queued. This waits if the queue is full.
    /// * A number the caller already submitted is reported as `AlreadyOwnedBySelf`.
    /// * A number owned by someone else is a `Conflict`.
    ///
    /// If the queue has been closed, the order is still stored, and `QueueClosed` is returned. Startup recovery picks
    /// it up later.
    pub async fn submit_order(&self, user_id: i64, raw_number: &str) -> Result<SubmissionOutcome, LedgerApiError> {
        let number = raw_number.trim().parse::<OrderNumber>().map_err(|e| {
            debug!("🔄️📦️ Rejecting order number {raw_number:?} from user #{user_id}: {e}");
            LedgerApiError::from(e)
        })?;
        let result = self.db.insert_order(NewOrder::new(number.clone(), user_id)).await.map_err(LedgerApiError::storage)?;
        match result {
            InsertOrderResult::Inserted(order) => {
                self.queue.enqueue(number).await?;
                debug!("🔄️📦️ Order {} accepted for user #{user_id} and queued", order.number);
                Ok(SubmissionOutcome::Accepted(order))
            },
            InsertOrderResult::AlreadyExists(order) if order.user_id == user_id => {
                trace!("🔄️📦️ User #{user_id} resubmitted order {}", order.number);
                Ok(SubmissionOutcome::AlreadyOwnedBySelf(order))
            },
            InsertOrderResult::AlreadyExists(order) => {
                info!(
                    "🔄️📦️ User #{user_id} tried to submit order {}, which belongs to user #{}",
                    order.number, order.user_id
                );
                Err(LedgerApiError::Conflict(order.number))
            },
        }
    }

    /// Queues every order that has not reached a terminal status yet, oldest first. Run this once the worker is up, so
    /// that orders pending from a previous run are not lost. Returns the number of orders queued.
    pub async fn resume_pending_orders(&self) -> Result<usize, LedgerApiError> {
        let pending = self.db.fetch_pending_orders().await.map_err(LedgerApiError::storage)?;
        let count = pending.len();
        for order in pending {
            self.queue.enqueue(order.number).await?;
        }
        if count > 0 {
            info!("🔄️📦️ Resumed reconciliation of {count} pending orders");
        }
        Ok(count)
    }

    /// Applies a decision to the ledger directly, without asking the oracle.
    ///
    /// This is the same atomic transition the reconciliation worker performs. Negative accruals are rejected, and
    /// applying a decision to a terminal order returns `AlreadyTerminal` without crediting anything.
    pub async fn apply_accrual(
        &self,
        number: &str,
        status: OrderStatusType,
        accrual: Option<Points>,
    ) -> Result<AccrualOutcome, LedgerApiError> {
        let number = number.parse::<OrderNumber>()?;
        if accrual.is_some_and(|a| a.is_negative()) {
            return Err(LedgerApiError::InvalidInput(format!("accrual for order {number} cannot be negative")));
        }
        let decision = match status {
            OrderStatusType::Processed => {
                let accrual = accrual.ok_or_else(|| {
                    LedgerApiError::InvalidInput(format!("a PROCESSED order ({number}) needs an accrual"))
                })?;
                AccrualDecision::processed(number, accrual)
            },
            status => AccrualDecision::pending(number, status),
        };
        let outcome = self.db.apply_accrual(&decision).await.map_err(LedgerApiError::storage)?;
        match &outcome {
            AccrualOutcome::Applied(order) if order.status == OrderStatusType::Processed => {
                self.producers.publish_order_accrued(OrderAccruedEvent::new(order.clone())).await;
            },
            AccrualOutcome::OrderNotFound => {
                return Err(LedgerApiError::NotFound(format!("Order {}", decision.number)));
            },
            _ => {},
        }
        Ok(outcome)
    }
}
