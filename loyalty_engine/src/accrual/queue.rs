use log::*;
use loyalty_common::OrderNumber;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("The reconciliation queue is closed. Order {0} was not queued")]
    Closed(OrderNumber),
}

/// The producer side of the bounded reconciliation queue. Cheap to clone.
///
/// [`enqueue`](Self::enqueue) waits for a free slot when the queue is full, so submitters feel backpressure rather than
/// losing orders. Once the consumer closes the queue every enqueue is rejected.
#[derive(Debug, Clone)]
pub struct ReconciliationQueue {
    sender: mpsc::Sender<OrderNumber>,
}

/// The consumer side of the reconciliation queue. There is exactly one, owned by the worker.
#[derive(Debug)]
pub struct QueueReceiver {
    receiver: mpsc::Receiver<OrderNumber>,
}

impl ReconciliationQueue {
    pub fn new(capacity: usize) -> (Self, QueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, QueueReceiver { receiver })
    }

    pub async fn enqueue(&self, number: OrderNumber) -> Result<(), QueueError> {
        trace!("📥️ Queueing order {number}");
        self.sender.send(number).await.map_err(|e| {
            warn!("📥️ Reconciliation queue is closed. Could not queue order {}", e.0);
            QueueError::Closed(e.0)
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Number of orders waiting in the queue.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl QueueReceiver {
    pub async fn recv(&mut self) -> Option<OrderNumber> {
        self.receiver.recv().await
    }

    /// Rejects further enqueues. Orders already in the queue can still be received.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
