use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;

use crate::activity::{ActivityLog, LogEntry, OutcomeKind};
use crate::config::{FileAttachment, Payload, SendTarget, SpamSettings};
use crate::stats::SpamStats;
use crate::transport::WebhookTransport;
use crate::{log_debug, log_error, log_info};

/// Retained activity history per controller.
const LOG_CAPACITY: usize = 256;

/// Characters of a text payload shown in a success entry.
const PREVIEW_CHARS: usize = 50;

/// Run state plus settings, all mutation funneled through one lock.
struct Inner {
    settings: SpamSettings,
    running: bool,
    /// Bumped on every accepted start; outcomes carry the generation of the
    /// run that initiated them and are discarded once superseded.
    generation: u64,
    initiated: u64,
    sent: u64,
    failed: u64,
    total_planned: SendTarget,
    log: ActivityLog,
    ticker: Option<JoinHandle<()>>,
}

/// Send-loop controller: starts, paces and stops repeated webhook
/// deliveries and aggregates their outcomes.
///
/// Pacing is by wall-clock interval, not by completion of the previous
/// attempt, so requests may overlap in flight when the endpoint is slower
/// than the delay. Log order reflects completion order.
pub struct WebhookSpammer {
    transport: Arc<dyn WebhookTransport>,
    inner: Arc<Mutex<Inner>>,
}

impl WebhookSpammer {
    pub fn new(transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            transport,
            inner: Arc::new(Mutex::new(Inner {
                settings: SpamSettings::default(),
                running: false,
                generation: 0,
                initiated: 0,
                sent: 0,
                failed: 0,
                total_planned: SendTarget::Bounded(0),
                log: ActivityLog::new(LOG_CAPACITY),
                ticker: None,
            })),
        }
    }

    pub async fn configure(&self, settings: SpamSettings) {
        let mut inner = self.inner.lock().await;
        inner.settings = settings;
    }

    /// Selecting a file makes file mode sticky until cleared.
    pub async fn attach_file(&self, name: impl Into<String>, bytes: Vec<u8>) {
        let mut inner = self.inner.lock().await;
        let name = name.into();
        inner
            .log
            .push(OutcomeKind::Success, format!("File selected: {name}"));
        inner.settings.attachment = Some(FileAttachment { name, bytes });
    }

    pub async fn clear_file(&self) {
        let mut inner = self.inner.lock().await;
        inner.settings.attachment = None;
    }

    /// Begins a run, returning whether one actually began. No-op while one
    /// is running; refused (logged, not fatal) when no webhook URL is
    /// configured.
    ///
    /// Attempt #1 fires immediately, the rest at the configured period. The
    /// ticker never waits on a dispatch's network response.
    pub async fn start(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.running {
            return false;
        }
        if inner.settings.url.is_empty() {
            inner
                .log
                .push(OutcomeKind::Failure, "Error: Webhook URL is required");
            log_error!("Webhook URL is required");
            return false;
        }

        inner.generation += 1;
        inner.running = true;
        inner.initiated = 0;
        inner.sent = 0;
        inner.failed = 0;
        inner.total_planned = inner.settings.target;

        let target = inner.settings.target;
        inner
            .log
            .push(OutcomeKind::Success, format!("Spamming started ({target})"));
        log_info!("🚀 Spamming started ({target})");

        let generation = inner.generation;
        let url = inner.settings.url.clone();
        let delay = Duration::from_millis(inner.settings.delay_ms.max(1));
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.inner);

        inner.ticker = Some(tokio::spawn(async move {
            let mut ticker = time::interval(delay);
            loop {
                ticker.tick().await;

                let (payload, attempt, done) = {
                    let mut st = state.lock().await;
                    if st.generation != generation {
                        break;
                    }
                    st.initiated += 1;
                    let done = matches!(st.total_planned, SendTarget::Bounded(n) if st.initiated >= n);
                    if done {
                        st.running = false;
                        st.ticker = None;
                    }
                    (st.settings.payload_for_attempt(), st.initiated, done)
                };

                log_debug!("--- Attempt {attempt} ---");
                tokio::spawn(Self::dispatch_attempt(
                    Arc::clone(&transport),
                    url.clone(),
                    payload,
                    Arc::clone(&state),
                    generation,
                ));

                if done {
                    break;
                }
            }
        }));
        true
    }

    /// Cancels future ticks. In-flight requests are not aborted; their
    /// outcomes still land for this generation.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.running {
            return;
        }
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        inner.running = false;
        inner.log.push(OutcomeKind::Success, "Spamming stopped");
        log_info!("🛑 Spamming stopped");
    }

    /// Resolves once the run is no longer running and every initiated
    /// attempt has reported an outcome. Requests carry no timeout, so this
    /// waits as long as they do.
    pub async fn await_completion(&self) {
        loop {
            {
                let inner = self.inner.lock().await;
                if !inner.running && inner.sent + inner.failed >= inner.initiated {
                    return;
                }
            }
            time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running
    }

    pub async fn stats(&self) -> SpamStats {
        let inner = self.inner.lock().await;
        SpamStats {
            running: inner.running,
            initiated: inner.initiated,
            sent: inner.sent,
            failed: inner.failed,
            total_planned: inner.total_planned,
        }
    }

    /// Up to `n` latest activity entries, newest first.
    pub async fn recent_activity(&self, n: usize) -> Vec<LogEntry> {
        self.inner.lock().await.log.latest(n)
    }

    async fn dispatch_attempt(
        transport: Arc<dyn WebhookTransport>,
        url: String,
        payload: Payload,
        state: Arc<Mutex<Inner>>,
        generation: u64,
    ) {
        let result = transport.post_multipart(&url, &payload).await;

        let mut st = state.lock().await;
        // Outcomes of a superseded run must not touch the live counters.
        if st.generation != generation {
            return;
        }

        match result {
            Ok(response) if response.ok => {
                st.sent += 1;
                let message = match &payload {
                    Payload::Text(text) => format!("Success: {}...", preview(text)),
                    Payload::File { name, .. } => format!("Success: File {name} sent"),
                };
                log_info!("✅ {message} (Status: {})", response.status);
                st.log.push(OutcomeKind::Success, message);
            }
            Ok(response) => {
                st.failed += 1;
                let message = format!("Error: HTTP error: {}", response.status);
                log_error!("{message}");
                st.log.push(OutcomeKind::Failure, message);
            }
            Err(error) => {
                st.failed += 1;
                let mut reason = error.to_string();
                if reason.is_empty() {
                    reason = "Unknown error".to_string();
                }
                let message = format!("Error: {reason}");
                log_error!("{message}");
                st.log.push(OutcomeKind::Failure, message);
            }
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::transport::DeliveryResponse;

    #[derive(Debug, Clone)]
    enum Scripted {
        Status(u16),
        Fail(&'static str),
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum SentPayload {
        Text(String),
        File(String),
    }

    /// Replays a queue of outcomes and records what was sent. Attempts past
    /// the end of the script succeed with a 200.
    struct MockTransport {
        script: StdMutex<VecDeque<Scripted>>,
        recorded: StdMutex<Vec<SentPayload>>,
    }

    impl MockTransport {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                recorded: StdMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.recorded.lock().unwrap().len()
        }

        fn payloads(&self) -> Vec<SentPayload> {
            self.recorded.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebhookTransport for MockTransport {
        async fn post_multipart(
            &self,
            _url: &str,
            payload: &Payload,
        ) -> anyhow::Result<DeliveryResponse> {
            self.recorded.lock().unwrap().push(match payload {
                Payload::Text(text) => SentPayload::Text(text.clone()),
                Payload::File { name, .. } => SentPayload::File(name.clone()),
            });
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Scripted::Status(200));
            match outcome {
                Scripted::Status(status) => Ok(DeliveryResponse {
                    ok: (200..300).contains(&status),
                    status,
                }),
                Scripted::Fail(reason) => Err(anyhow::anyhow!("{reason}")),
            }
        }
    }

    /// Succeeds, but only after a permit is released. Lets a test hold
    /// requests in flight across stop/restart boundaries.
    struct GatedTransport {
        permits: Arc<Semaphore>,
        calls: StdMutex<usize>,
    }

    impl GatedTransport {
        fn new(permits: Arc<Semaphore>) -> Arc<Self> {
            Arc::new(Self {
                permits,
                calls: StdMutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl WebhookTransport for GatedTransport {
        async fn post_multipart(
            &self,
            _url: &str,
            _payload: &Payload,
        ) -> anyhow::Result<DeliveryResponse> {
            *self.calls.lock().unwrap() += 1;
            self.permits.acquire().await?.forget();
            Ok(DeliveryResponse {
                ok: true,
                status: 200,
            })
        }
    }

    fn settings(target: SendTarget, delay_ms: u64) -> SpamSettings {
        SpamSettings {
            url: "https://example.test/hook".to_string(),
            message: "ping".to_string(),
            attachment: None,
            target,
            delay_ms,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_run_resolves_all_outcomes() {
        let transport = MockTransport::new(vec![
            Scripted::Status(200),
            Scripted::Status(500),
            Scripted::Status(204),
        ]);
        let spammer = WebhookSpammer::new(transport.clone());
        spammer.configure(settings(SendTarget::Bounded(3), 100)).await;

        spammer.start().await;
        spammer.await_completion().await;

        let stats = spammer.stats().await;
        assert!(!stats.running);
        assert_eq!(stats.initiated, 3);
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success_rate(), "66.67");
        assert_eq!(transport.calls(), 3);

        // one start entry plus three delivery entries, newest first
        let activity = spammer.recent_activity(10).await;
        assert_eq!(activity.len(), 4);
        assert!(activity[3].message.contains("Spamming started (3 messages)"));
        let failures = activity
            .iter()
            .filter(|entry| entry.kind == OutcomeKind::Failure)
            .count();
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn empty_url_refuses_start() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());

        // default settings carry no URL
        assert!(!spammer.start().await);

        assert!(!spammer.is_running().await);
        assert_eq!(transport.calls(), 0);
        let activity = spammer.recent_activity(10).await;
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].kind, OutcomeKind::Failure);
        assert!(activity[0].message.contains("Webhook URL is required"));
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_fires_without_waiting() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());
        spammer
            .configure(settings(SendTarget::Bounded(5), 60_000))
            .await;

        spammer.start().await;
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls(), 1);

        time::sleep(Duration::from_millis(60_000)).await;
        assert_eq!(transport.calls(), 2);

        spammer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_ticks() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());
        spammer
            .configure(settings(SendTarget::Unbounded, 60_000))
            .await;

        spammer.start().await;
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls(), 1);

        spammer.stop().await;
        assert!(!spammer.is_running().await);

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(transport.calls(), 1);

        let activity = spammer.recent_activity(10).await;
        assert!(activity[0].message.contains("Spamming stopped"));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_run_only_stops_explicitly() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());
        spammer.configure(settings(SendTarget::Unbounded, 100)).await;

        spammer.start().await;
        time::sleep(Duration::from_millis(2_000)).await;

        assert!(spammer.is_running().await);
        assert!(transport.calls() >= 20);
        assert_eq!(spammer.stats().await.success_rate(), "∞");

        spammer.stop().await;
        spammer.await_completion().await;
        assert!(!spammer.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_a_noop() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());
        spammer
            .configure(settings(SendTarget::Unbounded, 60_000))
            .await;

        assert!(spammer.start().await);
        time::sleep(Duration::from_millis(10)).await;
        assert!(!spammer.start().await);
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(transport.calls(), 1);
        let started = spammer
            .recent_activity(10)
            .await
            .iter()
            .filter(|entry| entry.message.contains("Spamming started"))
            .count();
        assert_eq!(started, 1);

        spammer.stop().await;
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_noop() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());

        spammer.stop().await;

        assert!(spammer.recent_activity(10).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn file_mode_sends_the_file() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());
        spammer.configure(settings(SendTarget::Bounded(1), 100)).await;
        spammer.attach_file("cat.png", vec![0xde, 0xad]).await;

        spammer.start().await;
        spammer.await_completion().await;

        assert_eq!(
            transport.payloads(),
            vec![SentPayload::File("cat.png".to_string())]
        );
        let activity = spammer.recent_activity(10).await;
        assert!(activity[0].message.contains("Success: File cat.png sent"));
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_file_reverts_to_text() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());
        spammer.configure(settings(SendTarget::Bounded(1), 100)).await;
        spammer.attach_file("cat.png", vec![1]).await;
        spammer.clear_file().await;

        spammer.start().await;
        spammer.await_completion().await;

        assert_eq!(
            transport.payloads(),
            vec![SentPayload::Text("ping".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_are_recorded() {
        let transport = MockTransport::new(vec![
            Scripted::Fail("connection refused"),
            Scripted::Fail(""),
        ]);
        let spammer = WebhookSpammer::new(transport.clone());
        spammer.configure(settings(SendTarget::Bounded(2), 100)).await;

        spammer.start().await;
        spammer.await_completion().await;

        let stats = spammer.stats().await;
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.failed, 2);

        let activity = spammer.recent_activity(10).await;
        assert!(activity[1].message.contains("Error: connection refused"));
        assert!(activity[0].message.contains("Error: Unknown error"));
    }

    #[tokio::test(start_paused = true)]
    async fn success_preview_truncates_long_text() {
        let transport = MockTransport::new(vec![]);
        let spammer = WebhookSpammer::new(transport.clone());
        let mut run = settings(SendTarget::Bounded(1), 100);
        run.message = "x".repeat(80);
        spammer.configure(run).await;

        spammer.start().await;
        spammer.await_completion().await;

        let activity = spammer.recent_activity(10).await;
        assert_eq!(
            activity[0].message,
            format!("Success: {}...", "x".repeat(50))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_outcome_lands_after_stop() {
        let permits = Arc::new(Semaphore::new(0));
        let transport = GatedTransport::new(permits.clone());
        let spammer = WebhookSpammer::new(transport.clone());
        spammer
            .configure(settings(SendTarget::Unbounded, 60_000))
            .await;

        spammer.start().await;
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls(), 1);

        spammer.stop().await;
        permits.add_permits(1);
        spammer.await_completion().await;

        let stats = spammer.stats().await;
        assert!(!stats.running);
        assert_eq!(stats.sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completions_from_previous_run_are_discarded() {
        let permits = Arc::new(Semaphore::new(0));
        let transport = GatedTransport::new(permits.clone());
        let spammer = WebhookSpammer::new(transport.clone());
        spammer.configure(settings(SendTarget::Bounded(1), 100)).await;

        spammer.start().await;
        time::sleep(Duration::from_millis(10)).await;
        // run 1 auto-stopped after initiating its only attempt, which is
        // still held in flight by the transport
        assert!(!spammer.is_running().await);
        assert_eq!(transport.calls(), 1);

        spammer.start().await;
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls(), 2);

        permits.add_permits(2);
        spammer.await_completion().await;

        // the first run's late outcome was discarded, not double-counted
        let stats = spammer.stats().await;
        assert_eq!(stats.initiated, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 0);
    }
}
