//! Ready-notification dispatch.
//!
//! Each notification starts one independent run on its own task. At most
//! `max_concurrent` runs are in flight, and no further notification is pulled
//! while all slots are busy. The notification is acknowledged after its run
//! finishes, whether the run succeeded or not, so a failed run is not
//! redelivered. Notifications that carry no usable video ID are terminated.

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::consumer::{pull, AckPolicy, PullConsumer};
use async_nats::jetstream::{self, Message};
use futures::{Stream, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use vidlock_core::config::NatsConfig;
use vidlock_core::events::{headers, READY_SUBJECT};
use vidlock_core::{Error, Result, VideoId};
use vidlock_pipeline::VideoProcessor;

use crate::delivery::Delivery;

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Upper bound on concurrently running videos.
    pub max_concurrent: usize,
    /// Interval of in-progress acks sent while a run is still going, so long
    /// runs are not redelivered. `None` disables them.
    pub keepalive: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            keepalive: None,
        }
    }
}

impl DispatchOptions {
    /// Options derived from the NATS section: keepalive at half the ack wait.
    pub fn from_config(config: &NatsConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent_runs.max(1),
            keepalive: Some(config.ack_wait() / 2).filter(|d| !d.is_zero()),
        }
    }
}

/// Counters for one dispatch session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: usize,
    pub rejected: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Video ID of a ready notification: the body, else the `Video-ID` header.
pub fn notification_video_id<D: Delivery + ?Sized>(message: &D) -> Option<VideoId> {
    std::str::from_utf8(message.payload())
        .ok()
        .and_then(|body| VideoId::parse(body).ok())
        .or_else(|| {
            message
                .header(headers::VIDEO_ID)
                .and_then(|h| VideoId::parse(h).ok())
        })
}

/// Run `processor` for every notification from `messages` until the stream
/// ends or `shutdown` fires. In-flight runs are always drained before this
/// returns.
pub async fn dispatch<S, D>(
    messages: S,
    processor: Arc<dyn VideoProcessor>,
    options: DispatchOptions,
    shutdown: CancellationToken,
) -> Result<DispatchStats>
where
    S: Stream<Item = Result<D>> + Send,
    D: Delivery + 'static,
{
    let slots = Arc::new(Semaphore::new(options.max_concurrent.max(1)));
    let mut runs: JoinSet<bool> = JoinSet::new();
    let mut stats = DispatchStats::default();
    let mut messages = std::pin::pin!(messages);

    loop {
        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            Some(joined) = runs.join_next(), if !runs.is_empty() => {
                record(&mut stats, joined);
                continue;
            }
            permit = Arc::clone(&slots).acquire_owned() => {
                permit.map_err(|e| Error::Internal(format!("dispatch semaphore closed: {e}")))?
            }
        };

        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = messages.next() => next,
        };
        let Some(next) = next else {
            tracing::info!("Notification stream ended");
            break;
        };
        let message = match next {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to receive notification");
                continue;
            }
        };
        stats.received += 1;

        let Some(video_id) = notification_video_id(&message) else {
            stats.rejected += 1;
            tracing::warn!(
                body = %String::from_utf8_lossy(message.payload()),
                "Notification without a valid video id; terminating"
            );
            if let Err(e) = message.term().await {
                tracing::warn!(error = %e, "Failed to terminate notification");
            }
            continue;
        };

        let user_id = message.header(headers::USER_ID).unwrap_or_default().to_string();
        let file_name = message.header(headers::FILE_NAME).unwrap_or_default().to_string();
        let span = tracing::info_span!("run", video_id = %video_id, user_id = %user_id, file_name = %file_name);
        let processor = Arc::clone(&processor);
        let keepalive = options.keepalive;

        runs.spawn(
            async move {
                let _permit = permit;
                run_and_ack(processor.as_ref(), &message, &video_id, keepalive).await
            }
            .instrument(span),
        );
    }

    if !runs.is_empty() {
        tracing::info!(in_flight = runs.len(), "Waiting for running videos to finish");
    }
    while let Some(joined) = runs.join_next().await {
        record(&mut stats, joined);
    }

    tracing::info!(
        received = stats.received,
        rejected = stats.rejected,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "Dispatch stopped"
    );
    Ok(stats)
}

/// Process one video, then acknowledge its notification.
async fn run_and_ack<D: Delivery>(
    processor: &dyn VideoProcessor,
    message: &D,
    video_id: &VideoId,
    keepalive: Option<Duration>,
) -> bool {
    let mut run = processor.process(video_id);
    let result = match keepalive {
        Some(period) => {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    result = &mut run => break result,
                    _ = ticker.tick() => {
                        if let Err(e) = message.in_progress().await {
                            tracing::debug!(error = %e, "In-progress ack failed");
                        }
                    }
                }
            }
        }
        None => run.await,
    };

    let ok = match result {
        Ok(report) => {
            tracing::info!(
                segments_total = report.segments_total(),
                segments_uploaded = report.segments_uploaded(),
                "Video processed"
            );
            true
        }
        Err(e) => {
            tracing::error!(stage = e.stage().unwrap_or("unknown"), error = %e, "Video processing aborted");
            false
        }
    };

    if let Err(e) = message.ack().await {
        tracing::warn!(error = %e, "Failed to acknowledge notification");
    }
    ok
}

fn record(stats: &mut DispatchStats, joined: std::result::Result<bool, tokio::task::JoinError>) {
    match joined {
        Ok(true) => stats.succeeded += 1,
        Ok(false) => stats.failed += 1,
        Err(e) => {
            stats.failed += 1;
            tracing::error!(error = %e, "Run task panicked");
        }
    }
}

/// Open the durable ready-notification consumer and stream its messages.
pub async fn ready_messages(
    context: &jetstream::Context,
    config: &NatsConfig,
) -> Result<impl Stream<Item = Result<Message>> + Send> {
    let stream = context
        .get_stream(&config.stream)
        .await
        .map_err(|e| Error::transport(format!("stream {} unavailable: {e}", config.stream)))?;
    let consumer: PullConsumer = stream
        .get_or_create_consumer(
            &config.durable,
            pull::Config {
                durable_name: Some(config.durable.clone()),
                filter_subject: READY_SUBJECT.to_string(),
                ack_policy: AckPolicy::Explicit,
                ack_wait: config.ack_wait(),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| Error::transport(format!("failed to open consumer {}: {e}", config.durable)))?;
    let messages = consumer
        .messages()
        .await
        .map_err(|e| Error::transport(format!("failed to subscribe: {e}")))?;

    tracing::info!(durable = %config.durable, subject = READY_SUBJECT, "Listening for ready notifications");
    Ok(messages.map(|m| m.map_err(Error::transport)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::{AckLog, FakeMessage};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vidlock_core::Locator;
    use vidlock_pipeline::RunReport;

    /// Records concurrency and fails for ids starting with "bad".
    #[derive(Default)]
    struct FakeProcessor {
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        acks_at_start: parking_lot::Mutex<Vec<usize>>,
        log: Option<Arc<AckLog>>,
    }

    #[async_trait]
    impl VideoProcessor for FakeProcessor {
        async fn process(&self, video_id: &VideoId) -> Result<RunReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(log) = &self.log {
                self.acks_at_start.lock().push(log.acks());
            }
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if video_id.as_str().starts_with("bad") {
                return Err(Error::pipeline("fetch", "no chunks"));
            }
            Ok(RunReport {
                video_id: video_id.clone(),
                started_at: Utc::now(),
                finished_at: Utc::now(),
                locator: Locator::new("ipfs", &format!("video/{video_id}")),
                segments: vec![],
                completion_published: true,
            })
        }
    }

    fn notifications(log: &Arc<AckLog>, ids: &[&str]) -> Vec<Result<FakeMessage>> {
        ids.iter()
            .map(|id| Ok(FakeMessage::new(id.as_bytes(), log)))
            .collect()
    }

    #[tokio::test]
    async fn acks_after_success_and_failure() {
        let log = Arc::new(AckLog::default());
        let processor = Arc::new(FakeProcessor {
            delay: Duration::from_millis(5),
            log: Some(Arc::clone(&log)),
            ..Default::default()
        });
        let stats = dispatch(
            futures::stream::iter(notifications(&log, &["a", "bad-1", "b"])),
            processor.clone(),
            DispatchOptions {
                max_concurrent: 1,
                keepalive: None,
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(stats.received, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(log.acks(), 3);
        // With one slot, each run starts only after the previous one was acked.
        assert_eq!(*processor.acks_at_start.lock(), [0, 1, 2]);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let log = Arc::new(AckLog::default());
        let processor = Arc::new(FakeProcessor {
            delay: Duration::from_millis(30),
            ..Default::default()
        });
        let ids: Vec<String> = (0..8).map(|i| format!("v{i}")).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

        let stats = dispatch(
            futures::stream::iter(notifications(&log, &ids)),
            processor.clone(),
            DispatchOptions {
                max_concurrent: 3,
                keepalive: None,
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(stats.succeeded, 8);
        assert!(processor.peak.load(Ordering::SeqCst) <= 3);
        assert!(processor.peak.load(Ordering::SeqCst) >= 2);
        assert_eq!(log.acks(), 8);
    }

    #[tokio::test]
    async fn missing_video_id_is_terminated() {
        let log = Arc::new(AckLog::default());
        let processor = Arc::new(FakeProcessor::default());
        let messages = vec![
            Ok(FakeMessage::new(b"".to_vec(), &log)),
            Ok(FakeMessage::new(b"not a/valid id".to_vec(), &log)),
            Ok(FakeMessage::new(b"".to_vec(), &log).with_header(headers::VIDEO_ID, "from-header")),
        ];
        let stats = dispatch(
            futures::stream::iter(messages),
            processor.clone(),
            DispatchOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(stats.rejected, 2);
        assert_eq!(log.terms(), 2);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.acks(), 1);
    }

    #[tokio::test]
    async fn receive_errors_are_skipped() {
        let log = Arc::new(AckLog::default());
        let messages = vec![
            Err(Error::transport("heartbeat missed")),
            Ok(FakeMessage::new(b"ok-1".to_vec(), &log)),
        ];
        let stats = dispatch(
            futures::stream::iter(messages),
            Arc::new(FakeProcessor::default()),
            DispatchOptions::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_running_videos() {
        let log = Arc::new(AckLog::default());
        let processor = Arc::new(FakeProcessor {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let first = futures::stream::iter(notifications(&log, &["slow"]));
        let messages = first.chain(futures::stream::pending());
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let stats = dispatch(messages, processor, DispatchOptions::default(), shutdown)
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(log.acks(), 1);
    }

    #[tokio::test]
    async fn keepalive_sends_in_progress_acks() {
        let log = Arc::new(AckLog::default());
        let processor = Arc::new(FakeProcessor {
            delay: Duration::from_millis(60),
            ..Default::default()
        });
        dispatch(
            futures::stream::iter(notifications(&log, &["long"])),
            processor,
            DispatchOptions {
                max_concurrent: 1,
                keepalive: Some(Duration::from_millis(10)),
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(log.progress.load(Ordering::SeqCst) >= 2);
        assert_eq!(log.acks(), 1);
    }

    #[test]
    fn body_takes_precedence_over_header() {
        let log = Arc::new(AckLog::default());
        let msg = FakeMessage::new(b"body-id".to_vec(), &log).with_header(headers::VIDEO_ID, "header-id");
        assert_eq!(notification_video_id(&msg).unwrap().as_str(), "body-id");
    }

    #[test]
    fn options_from_config() {
        let config = NatsConfig::default();
        let options = DispatchOptions::from_config(&config);
        assert_eq!(options.max_concurrent, config.max_concurrent_runs);
        assert_eq!(options.keepalive, Some(config.ack_wait() / 2));
    }
}
