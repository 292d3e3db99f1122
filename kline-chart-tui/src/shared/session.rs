//! One view of one symbol/interval: a history load plus a live feed.
//!
//! Switching interval or band settings drops the current session and starts a
//! new one. Cancelling sets the loader's flag, aborts its task and stops the
//! feed, so nothing from an old view reaches the chart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::shared::history::{History, HistoryLoader, HistoryRequest, KlineFetcher};
use crate::shared::types::{Candle, Interval};
use crate::shared::websocket::{spawn_live_feed, ConnectionStatus, LiveFeed, WebSocketConfig};

pub struct ViewSession {
    interval: Interval,
    history_rx: Option<oneshot::Receiver<History>>,
    cancelled: Arc<AtomicBool>,
    loader_task: JoinHandle<()>,
    feed: LiveFeed,
}

impl ViewSession {
    /// Start loading history and streaming live klines for `request`
    pub fn start<F>(loader: Arc<HistoryLoader<F>>, websocket: &WebSocketConfig, request: HistoryRequest) -> Self
    where
        F: KlineFetcher + 'static,
    {
        info!("Starting view {} {}", request.symbol, request.interval);

        let cancelled = Arc::new(AtomicBool::new(false));
        let (history_tx, history_rx) = oneshot::channel();
        let feed = spawn_live_feed(websocket, &request.symbol, request.interval);
        let interval = request.interval;

        let flag = cancelled.clone();
        let loader_task = tokio::spawn(async move {
            if let Some(history) = loader.load(&request, &flag).await {
                // Receiver is gone when the view was already replaced
                let _ = history_tx.send(history);
            }
        });

        Self {
            interval,
            history_rx: Some(history_rx),
            cancelled,
            loader_task,
            feed,
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Completed history load, delivered at most once
    pub fn poll_history(&mut self) -> Option<History> {
        let rx = self.history_rx.as_mut()?;
        match rx.try_recv() {
            Ok(history) => {
                self.history_rx = None;
                Some(history)
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                debug!("History loader for {} ended without a result", self.interval);
                self.history_rx = None;
                None
            }
        }
    }

    pub fn history_pending(&self) -> bool {
        self.history_rx.is_some()
    }

    /// Next buffered live candle
    pub fn poll_candle(&mut self) -> Option<Candle> {
        self.feed.try_next()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.feed.status()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop the loader and the feed; idempotent
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            debug!("Cancelling view {}", self.interval);
        }
        self.loader_task.abort();
        self.feed.cancel();
    }
}

impl Drop for ViewSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::FetchError;
    use crate::shared::history::HistorySource;
    use async_trait::async_trait;
    use std::time::Duration;
    use url::Url;

    struct StaticFetcher {
        hang: bool,
    }

    #[async_trait]
    impl KlineFetcher for StaticFetcher {
        async fn fetch_klines(&self, _url: &Url) -> Result<Vec<Candle>, FetchError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(vec![Candle::new(60, 1.0, 2.0, 0.5, 1.5), Candle::new(120, 1.5, 2.5, 1.0, 2.0)])
        }
    }

    fn websocket() -> WebSocketConfig {
        // Nothing listens here; the feed just keeps retrying
        WebSocketConfig::new(vec!["ws://127.0.0.1:9/ws".to_string()])
            .with_reconnect_delay(Duration::from_secs(60))
    }

    fn loader(hang: bool) -> Arc<HistoryLoader<StaticFetcher>> {
        Arc::new(
            HistoryLoader::new(StaticFetcher { hang }, vec!["http://mirror.test".to_string()])
                .with_timeout(Duration::from_secs(30)),
        )
    }

    async fn wait_for_history(session: &mut ViewSession) -> Option<History> {
        for _ in 0..200 {
            if let Some(history) = session.poll_history() {
                return Some(history);
            }
            if !session.history_pending() {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_history_delivered_once() {
        let mut session = ViewSession::start(
            loader(false),
            &websocket(),
            HistoryRequest::new("ETHUSDT", Interval::M1),
        );

        let history = wait_for_history(&mut session).await.unwrap();
        assert_eq!(history.candles.len(), 2);
        assert_eq!(history.source, HistorySource::Mirror("http://mirror.test".to_string()));

        assert!(!session.history_pending());
        assert!(session.poll_history().is_none());
        assert_eq!(session.interval(), Interval::M1);
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_load() {
        let mut session = ViewSession::start(
            loader(true),
            &websocket(),
            HistoryRequest::new("ETHUSDT", Interval::H1),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(session.history_pending());

        session.cancel();
        session.cancel();
        assert!(session.is_cancelled());

        assert!(wait_for_history(&mut session).await.is_none());
        assert!(!session.history_pending());
    }
}
