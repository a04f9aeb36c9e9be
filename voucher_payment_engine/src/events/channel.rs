//! The tokio-mpsc plumbing under the notification hooks.
//!
//! An [`EventHandler`] owns the receiving end of a channel and runs one async handler invocation per delivered
//! event, each on its own task. Handlers see only the event itself and hold no engine state, which keeps SMS
//! delivery and operator alerts out of the allocation transaction. An [`EventProducer`] is a cheap clone of the
//! sending end; the handler shuts down once the last producer is dropped.
use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI64, Arc},
};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // drop the internal sender so that when the last subscriber is dropped, we can automatically shut down the
        // handler
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let job = jobs.clone();
            tokio::spawn(async move {
                (handler)(ev).await;
                job.fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
                trace!("📬️ Event handled");
            });
        }
        match tokio::spawn(async move {
            while jobs.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                debug!("📬️ Waiting for jobs to complete");
                tokio::time::sleep(tokio::time::Duration::from_millis(1000)).await;
            }
        })
        .await
        {
            Ok(_) => {
                debug!("📬️ Event handler shutting down gracefully");
            },
            Err(e) => {
                warn!("📬️ Event handler shutdown process failed: {e}. Logging this just in case.");
            },
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{db_types::VoucherType, events::StockLowEvent};

    #[tokio::test]
    async fn every_stock_alert_reaches_the_handler() {
        let _ = env_logger::try_init();
        let remaining_total = Arc::new(AtomicI64::new(0));
        let seen = remaining_total.clone();
        let handler: Handler<StockLowEvent> = Arc::new(move |ev: StockLowEvent| {
            let seen = seen.clone();
            Box::pin(async move {
                debug!("Stock low: {} {} voucher(s) left", ev.remaining, ev.voucher_type);
                seen.fetch_add(ev.remaining, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        // Buffer of 1 so the producers contend for channel capacity while the handler sleeps.
        let event_handler = EventHandler::new(1, handler);
        let wassce_watcher = event_handler.subscribe();
        let bece_watcher = event_handler.subscribe();
        tokio::spawn(async move {
            for remaining in [4, 3, 2, 1, 0] {
                wassce_watcher.publish_event(StockLowEvent { voucher_type: VoucherType::Wassce, remaining }).await;
            }
        });
        tokio::spawn(async move {
            for remaining in [5, 3, 1] {
                bece_watcher.publish_event(StockLowEvent { voucher_type: VoucherType::Bece, remaining }).await;
            }
        });

        event_handler.start_handler().await;
        assert_eq!(remaining_total.load(Ordering::SeqCst), 19, "Eight alerts totalling 19 remaining vouchers");
    }
}
