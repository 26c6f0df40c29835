use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tracing::{info, warn};

use fabdesk_events::{InMemoryNotificationBus, Notification, NotificationSink, TracingSink};
use fabdesk_infra::{BackOffice, InMemoryStore, PostgresStore, Store, StoreResult, seed_default_pricing};

use crate::config::ApiConfig;

const REALTIME_CAPACITY: usize = 256;

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: Notification,
}

/// Fans a committed notification out to the log, the recent-history buffer
/// and the SSE broadcast channel.
///
/// Broadcasting is lossy: with no listener (or a lagging one) the message is dropped.
#[derive(Debug)]
pub struct RealtimeSink {
    history: Arc<InMemoryNotificationBus>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl RealtimeSink {
    pub fn new(history: Arc<InMemoryNotificationBus>, realtime_tx: broadcast::Sender<RealtimeMessage>) -> Self {
        Self { history, realtime_tx }
    }
}

impl NotificationSink for RealtimeSink {
    fn notify(&self, notification: Notification) {
        TracingSink.notify(notification.clone());
        self.history.notify(notification.clone());
        let _ = self.realtime_tx.send(RealtimeMessage {
            topic: notification.kind.topic().to_string(),
            payload: notification,
        });
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub office: BackOffice,
    history: Arc<InMemoryNotificationBus>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let history = Arc::new(InMemoryNotificationBus::new());
        let (realtime_tx, _) = broadcast::channel(REALTIME_CAPACITY);
        let sink = RealtimeSink::new(history.clone(), realtime_tx.clone());
        Self {
            office: BackOffice::new(store, Arc::new(sink)),
            history,
            realtime_tx,
        }
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Recent notifications with their read state.
    pub fn notifications(&self) -> &InMemoryNotificationBus {
        &self.history
    }
}

/// Pick the store backend, apply the schema and seed price tables.
pub async fn build_services(config: &ApiConfig) -> StoreResult<AppServices> {
    let store: Arc<dyn Store> = match (config.use_persistent_stores, config.database_url.as_deref()) {
        (true, Some(url)) => {
            let store = PostgresStore::connect(url, config.db_max_connections).await?;
            store.migrate().await?;
            info!(max_connections = config.db_max_connections, "using postgres store");
            Arc::new(store)
        }
        (true, None) => {
            warn!("USE_PERSISTENT_STORES set without DATABASE_URL; falling back to in-memory store");
            Arc::new(InMemoryStore::new())
        }
        (false, _) => {
            info!("using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    if config.seed_default_pricing {
        seed_default_pricing(store.as_ref()).await?;
    }

    Ok(AppServices::new(store))
}

pub fn notification_sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
