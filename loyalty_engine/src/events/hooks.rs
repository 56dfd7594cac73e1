use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderAccruedEvent, OrderStuckEvent, WithdrawalEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_accrued_producer: Vec<EventProducer<OrderAccruedEvent>>,
    pub order_stuck_producer: Vec<EventProducer<OrderStuckEvent>>,
    pub withdrawal_producer: Vec<EventProducer<WithdrawalEvent>>,
}

impl EventProducers {
    pub async fn publish_order_accrued(&self, event: OrderAccruedEvent) {
        for producer in &self.order_accrued_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_stuck(&self, event: OrderStuckEvent) {
        for producer in &self.order_stuck_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_withdrawal(&self, event: WithdrawalEvent) {
        for producer in &self.withdrawal_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_accrued: Option<EventHandler<OrderAccruedEvent>>,
    pub on_order_stuck: Option<EventHandler<OrderStuckEvent>>,
    pub on_withdrawal: Option<EventHandler<WithdrawalEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_accrued = hooks.on_order_accrued.map(|f| EventHandler::new(buffer_size, f));
        let on_order_stuck = hooks.on_order_stuck.map(|f| EventHandler::new(buffer_size, f));
        let on_withdrawal = hooks.on_withdrawal.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_accrued, on_order_stuck, on_withdrawal }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_accrued {
            result.order_accrued_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_stuck {
            result.order_stuck_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_withdrawal {
            result.withdrawal_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_accrued {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_stuck {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_withdrawal {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_accrued: Option<Handler<OrderAccruedEvent>>,
    pub on_order_stuck: Option<Handler<OrderStuckEvent>>,
    pub on_withdrawal: Option<Handler<WithdrawalEvent>>,
}

impl EventHooks {
    pub fn on_order_accrued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAccruedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_accrued = Some(Arc::new(f));
        self
    }

    pub fn on_order_stuck<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStuckEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_stuck = Some(Arc::new(f));
        self
    }

    pub fn on_withdrawal<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WithdrawalEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_withdrawal = Some(Arc::new(f));
        self
    }
}
