use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderBackloggedEvent, OrderFulfilledEvent, StockLowEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_fulfilled_producer: Vec<EventProducer<OrderFulfilledEvent>>,
    pub order_backlogged_producer: Vec<EventProducer<OrderBackloggedEvent>>,
    pub stock_low_producer: Vec<EventProducer<StockLowEvent>>,
}

pub struct EventHandlers {
    pub on_order_fulfilled: Option<EventHandler<OrderFulfilledEvent>>,
    pub on_order_backlogged: Option<EventHandler<OrderBackloggedEvent>>,
    pub on_stock_low: Option<EventHandler<StockLowEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_fulfilled = hooks.on_order_fulfilled.map(|f| EventHandler::new(buffer_size, f));
        let on_order_backlogged = hooks.on_order_backlogged.map(|f| EventHandler::new(buffer_size, f));
        let on_stock_low = hooks.on_stock_low.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_fulfilled, on_order_backlogged, on_stock_low }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_fulfilled {
            result.order_fulfilled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_backlogged {
            result.order_backlogged_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_stock_low {
            result.stock_low_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_fulfilled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_backlogged {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_stock_low {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_fulfilled: Option<Handler<OrderFulfilledEvent>>,
    pub on_order_backlogged: Option<Handler<OrderBackloggedEvent>>,
    pub on_stock_low: Option<Handler<StockLowEvent>>,
}

impl EventHooks {
    pub fn on_order_fulfilled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderFulfilledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_fulfilled = Some(Arc::new(f));
        self
    }

    pub fn on_order_backlogged<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderBackloggedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_backlogged = Some(Arc::new(f));
        self
    }

    pub fn on_stock_low<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(StockLowEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_stock_low = Some(Arc::new(f));
        self
    }
}
