use crate::config::Config;
use crate::domain::notification::NewMessageEvent;
use crate::storage::pubsub::RedisClient;
use async_trait::async_trait;
use dashmap::DashMap;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, UpDownCounter},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    sends_total: Counter<u64>,
    received_total: Counter<u64>,
    unrouted_total: Counter<u64>,
    active_channels: UpDownCounter<i64>,
    gc_duration_seconds: Histogram<f64>,
    gc_reclaimed_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("telereach-server");
        Self {
            sends_total: meter
                .u64_counter("telereach_notification_sends_total")
                .with_description("Realtime event publish attempts")
                .build(),
            received_total: meter
                .u64_counter("telereach_notification_received_total")
                .with_description("Events received from pub/sub")
                .build(),
            unrouted_total: meter
                .u64_counter("telereach_notification_unrouted_total")
                .with_description("Events received from pub/sub with no local subscriber")
                .build(),
            active_channels: meter
                .i64_up_down_counter("telereach_notification_active_channels")
                .with_description("Active local notification channels")
                .build(),
            gc_duration_seconds: meter
                .f64_histogram("telereach_notification_gc_duration_seconds")
                .with_description("Time taken by a channel GC iteration")
                .build(),
            gc_reclaimed_total: meter
                .u64_counter("telereach_notification_gc_reclaimed_total")
                .with_description("Stale channels reclaimed by GC")
                .build(),
        }
    }
}

/// Fan-out of `new_message` events to a recipient's private channel. Delivery
/// is advisory: the message store stays authoritative, and a recipient with
/// no open connection simply picks the message up on the next history fetch.
#[async_trait]
pub trait NotificationService: Send + Sync + std::fmt::Debug {
    /// A receiver on the given user's channel. Only the gateway calls this,
    /// after the connection has authenticated as that user.
    async fn subscribe(&self, user_id: i64) -> broadcast::Receiver<NewMessageEvent>;

    /// Pushes an event to the user's channel. Infallible by contract;
    /// transport errors are logged, never propagated to the sender.
    async fn notify(&self, user_id: i64, event: NewMessageEvent);
}

const CHANNEL_PREFIX: &str = "user:";
const CHANNEL_PATTERN: &str = "user:*";

/// Redis-pub/sub-backed implementation. Events travel through the channel
/// `user:{id}`, so delivery works when the recipient's websocket lives on a
/// different instance; a dashmap of broadcast senders (reclaimed by a
/// periodic GC) does the local routing.
#[derive(Debug)]
pub struct DistributedNotificationService {
    pubsub: Arc<RedisClient>,
    channels: Arc<DashMap<i64, broadcast::Sender<NewMessageEvent>>>,
    user_channel_capacity: usize,
    metrics: Metrics,
}

impl DistributedNotificationService {
    /// Starts the GC and dispatcher tasks and subscribes to the user channel
    /// pattern. The returned handles let the caller bound shutdown waiting.
    ///
    /// # Errors
    /// Returns an error if the pub/sub subscription fails.
    pub async fn new(
        pubsub: Arc<RedisClient>,
        config: &Config,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> anyhow::Result<(Self, Vec<tokio::task::JoinHandle<()>>)> {
        let channels = Arc::new(DashMap::new());
        let metrics = Metrics::new();

        let gc_task = tokio::spawn(
            Self::run_gc(
                Arc::clone(&channels),
                metrics.clone(),
                config.notifications.gc_interval_secs,
                shutdown.clone(),
            )
            .instrument(tracing::info_span!("notification_gc")),
        );

        let mut pubsub_rx = pubsub.subscribe(CHANNEL_PATTERN).await?;
        let dispatcher_channels = Arc::clone(&channels);
        let dispatcher_metrics = metrics.clone();
        let mut dispatcher_shutdown = shutdown;

        let dispatcher_task = tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        _ = dispatcher_shutdown.changed() => break,
                        msg = pubsub_rx.recv() => {
                            match msg {
                                Ok(msg) => {
                                    let Some(user_id) = msg
                                        .channel
                                        .strip_prefix(CHANNEL_PREFIX)
                                        .and_then(|s| s.parse::<i64>().ok())
                                    else {
                                        continue;
                                    };
                                    let Ok(event) = serde_json::from_slice::<NewMessageEvent>(&msg.payload) else {
                                        tracing::warn!(channel = %msg.channel, "Undecodable event on pub/sub channel");
                                        continue;
                                    };

                                    dispatcher_metrics.received_total.add(1, &[]);
                                    if let Some(tx) = dispatcher_channels.get(&user_id) {
                                        let _ = tx.send(event);
                                    } else {
                                        dispatcher_metrics.unrouted_total.add(1, &[]);
                                    }
                                }
                                Err(broadcast::error::RecvError::Lagged(n)) => {
                                    tracing::warn!(missed = n, "Notification dispatcher lagged");
                                }
                                Err(broadcast::error::RecvError::Closed) => break,
                            }
                        }
                    }
                }
            }
            .instrument(tracing::info_span!("notification_dispatcher")),
        );

        let service =
            Self { pubsub, channels, user_channel_capacity: config.notifications.user_channel_capacity, metrics };
        Ok((service, vec![gc_task, dispatcher_task]))
    }

    async fn run_gc(
        channels: Arc<DashMap<i64, broadcast::Sender<NewMessageEvent>>>,
        metrics: Metrics,
        interval_secs: u64,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let start = std::time::Instant::now();
                    let mut reclaimed_this_cycle = 0;

                    channels.retain(|_, sender| {
                        let active = sender.receiver_count() > 0;
                        if !active {
                            metrics.active_channels.add(-1, &[]);
                            reclaimed_this_cycle += 1;
                        }
                        active
                    });

                    metrics.gc_duration_seconds.record(start.elapsed().as_secs_f64(), &[]);
                    if reclaimed_this_cycle > 0 {
                        metrics.gc_reclaimed_total.add(reclaimed_this_cycle, &[]);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}

#[async_trait]
impl NotificationService for DistributedNotificationService {
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn subscribe(&self, user_id: i64) -> broadcast::Receiver<NewMessageEvent> {
        let tx = self
            .channels
            .entry(user_id)
            .or_insert_with(|| {
                self.metrics.active_channels.add(1, &[]);
                let (tx, _rx) = broadcast::channel(self.user_channel_capacity);
                tx
            })
            .value()
            .clone();

        tx.subscribe()
    }

    #[tracing::instrument(skip(self, event), fields(user_id = %user_id, message_id = %event.message_id))]
    async fn notify(&self, user_id: i64, event: NewMessageEvent) {
        let channel_name = format!("{CHANNEL_PREFIX}{user_id}");

        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize notification event");
                self.metrics.sends_total.add(1, &[KeyValue::new("status", "error")]);
                return;
            }
        };

        if let Err(e) = self.pubsub.publish(&channel_name, &payload).await {
            tracing::error!(error = %e, "Failed to publish to pub/sub");
            self.metrics.sends_total.add(1, &[KeyValue::new("status", "error")]);
        } else {
            self.metrics.sends_total.add(1, &[KeyValue::new("status", "sent")]);
        }
    }
}
