//! The poll loop.
//!
//! # Architecture
//!
//! ```text
//! PricePoller.start() ──► timer task (owned, cancelled on stop/drop)
//!     every tick ──► [in-flight guard] ──► poll task in a JoinSet
//!                        poll_once: source.fetch ─► PriceSnapshot::from_json
//!                                   ─► render_table ─► target.replace
//! PricePoller.stop()  ──► shutdown signal, abort in-flight polls, join
//! ```
//!
//! A failed poll is logged and counted; the target keeps its previous
//! content.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use pw_core::Service;
use pw_core::config::{BoardConfig, DEFAULT_PAGE_TITLE, OverlapPolicy};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::PollError;
use crate::render::render_table;
use crate::snapshot::PriceSnapshot;
use crate::source::{HttpSource, SnapshotSource};
use crate::target::{PageFileTarget, RenderTarget};

/// One fetch-validate-render cycle.
///
/// The target is only touched after the body has been fully validated, so
/// any error leaves it exactly as it was.
pub async fn poll_once(source: &dyn SnapshotSource, target: &dyn RenderTarget) -> Result<PriceSnapshot, PollError> {
    let body = source.fetch().await?;
    let snapshot = PriceSnapshot::from_json(&body)?;
    target.replace(&render_table(&snapshot)).await?;
    Ok(snapshot)
}

/// Point-in-time copy of the poller's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Polls actually started.
    pub attempted: u64,
    pub rendered: u64,
    pub failed: u64,
    /// Ticks dropped by the in-flight guard.
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    attempted: AtomicU64,
    rendered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PollStats {
        PollStats {
            attempted: self.attempted.load(Ordering::Acquire),
            rendered: self.rendered.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
        }
    }
}

/// Clears the in-flight flag when the poll finishes or is aborted.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything the timer task needs, moved into it on start.
#[derive(Clone)]
struct PollContext {
    label: String,
    interval: Duration,
    overlap: OverlapPolicy,
    source: Arc<dyn SnapshotSource>,
    target: Arc<dyn RenderTarget>,
    counters: Arc<Counters>,
}

/// Periodically polls a [`SnapshotSource`] and renders into a
/// [`RenderTarget`].
///
/// The first poll fires one `interval` after [`start`](Service::start).
/// Dropping a running poller aborts its timer task and every in-flight poll.
pub struct PricePoller {
    name: String,
    interval: Duration,
    overlap: OverlapPolicy,
    source: Arc<dyn SnapshotSource>,
    target: Arc<dyn RenderTarget>,
    counters: Arc<Counters>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl PricePoller {
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        overlap: OverlapPolicy,
        source: Arc<dyn SnapshotSource>,
        target: Arc<dyn RenderTarget>,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            overlap,
            source,
            target,
            counters: Arc::new(Counters::default()),
            shutdown_tx: None,
            task: None,
        }
    }

    /// HTTP source + page file target as described by the `board` section.
    pub fn from_config(config: &BoardConfig) -> Result<Self> {
        config.validate()?;
        let source = HttpSource::new(config.effective_endpoint(), config.request_timeout())?;
        let target =
            PageFileTarget::new(config.effective_page_path(), config.effective_target_id(), DEFAULT_PAGE_TITLE);
        Ok(Self::new("board", config.interval(), config.effective_overlap(), Arc::new(source), Arc::new(target)))
    }

    pub fn stats(&self) -> PollStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn context(&self) -> PollContext {
        PollContext {
            label: self.name.clone(),
            interval: self.interval,
            overlap: self.overlap,
            source: self.source.clone(),
            target: self.target.clone(),
            counters: self.counters.clone(),
        }
    }
}

impl Drop for PricePoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Service for PricePoller {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            bail!("[{}] already running", self.name);
        }
        if self.interval.is_zero() {
            bail!("[{}] poll interval must be > 0", self.name);
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = self.context();

        info!(
            "[{}] polling {} every {:?} into {} (overlap={:?})",
            self.name,
            self.source.describe(),
            self.interval,
            self.target.describe(),
            self.overlap,
        );
        self.task = Some(tokio::spawn(poll_loop(ctx, shutdown_rx)));
        self.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("[{}] poll loop panicked: {e}", self.name);
                }
            }
        }
        let stats = self.stats();
        info!(
            "[{}] stopped (attempted={} rendered={} failed={} skipped={})",
            self.name, stats.attempted, stats.rendered, stats.failed, stats.skipped,
        );
        Ok(())
    }
}

async fn poll_loop(ctx: PollContext, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + ctx.interval, ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let in_flight = Arc::new(AtomicBool::new(false));
    let mut polls: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,

            _ = ticker.tick() => {
                let guard = match ctx.overlap {
                    OverlapPolicy::Skip => {
                        if in_flight.swap(true, Ordering::AcqRel) {
                            ctx.counters.skipped.fetch_add(1, Ordering::AcqRel);
                            debug!("[{}] previous poll still in flight, skipping tick", ctx.label);
                            continue;
                        }
                        Some(InFlightGuard(in_flight.clone()))
                    }
                    OverlapPolicy::Overlap => None,
                };
                let ctx = ctx.clone();
                polls.spawn(async move {
                    let _guard = guard;
                    run_poll(&ctx).await;
                });
            }

            Some(res) = polls.join_next() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("[{}] poll task panicked: {e}", ctx.label);
                    }
                }
            }
        }
    }

    // in-flight polls are cancelled, never rendered after stop
    polls.shutdown().await;
}

async fn run_poll(ctx: &PollContext) {
    ctx.counters.attempted.fetch_add(1, Ordering::AcqRel);
    match poll_once(ctx.source.as_ref(), ctx.target.as_ref()).await {
        Ok(snapshot) => {
            ctx.counters.rendered.fetch_add(1, Ordering::AcqRel);
            debug!(
                "[{}] rendered {} market={} user={} ({})",
                ctx.label,
                snapshot.symbol(),
                snapshot.market_price().raw(),
                snapshot.user_price().raw(),
                snapshot.verdict().as_str(),
            );
        }
        Err(e) => {
            ctx.counters.failed.fetch_add(1, Ordering::AcqRel);
            warn!("[{}] poll failed: {e}", ctx.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::target::MemoryTarget;

    /// Replies with scripted `(delay, body)` pairs, repeating the last one.
    struct ScriptedSource {
        script: Vec<(Duration, Result<serde_json::Value, u16>)>,
        calls: AtomicU64,
    }

    impl ScriptedSource {
        fn new(script: Vec<(Duration, Result<serde_json::Value, u16>)>) -> Arc<Self> {
            Arc::new(Self { script, calls: AtomicU64::new(0) })
        }

        fn fixed(body: serde_json::Value) -> Arc<Self> {
            Self::new(vec![(Duration::ZERO, Ok(body))])
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        fn describe(&self) -> String {
            "scripted".into()
        }

        async fn fetch(&self) -> Result<serde_json::Value, PollError> {
            let n = self.calls.fetch_add(1, Ordering::AcqRel) as usize;
            let (delay, reply) = self.script[n.min(self.script.len() - 1)].clone();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            reply.map_err(PollError::Status)
        }
    }

    fn btc(user: &str) -> serde_json::Value {
        json!({ "Symbol": "BTC", "price": "50000", "user": user })
    }

    fn poller(source: Arc<dyn SnapshotSource>, target: Arc<dyn RenderTarget>, overlap: OverlapPolicy) -> PricePoller {
        PricePoller::new("test", Duration::from_millis(1000), overlap, source, target)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test]
    async fn poll_once_renders_scenarios() {
        let target = MemoryTarget::new("");

        poll_once(ScriptedSource::fixed(btc("49000")).as_ref(), &target).await.unwrap();
        assert!(target.content().contains(r#"data-verdict="favorable"><b>49000</b>"#));

        poll_once(ScriptedSource::fixed(btc("51000")).as_ref(), &target).await.unwrap();
        assert!(target.content().contains(r#"data-verdict="warning"><b>51000</b>"#));

        let eth = json!({ "Symbol": "ETH", "price": "3000", "user": "3000" });
        let snap = poll_once(ScriptedSource::fixed(eth).as_ref(), &target).await.unwrap();
        assert_eq!(snap.verdict().as_str(), "favorable");
        assert_eq!(target.writes(), 3);
    }

    #[tokio::test]
    async fn invalid_snapshot_leaves_target_unchanged() {
        let target = MemoryTarget::new("<p>previous</p>");
        let source = ScriptedSource::fixed(json!({ "Symbol": "BTC", "price": "50000" }));

        let err = poll_once(source.as_ref(), &target).await.unwrap_err();
        assert!(matches!(err, PollError::Snapshot(_)));
        assert_eq!(target.content(), "<p>previous</p>");
        assert_eq!(target.writes(), 0);
    }

    #[tokio::test]
    async fn network_error_leaves_target_unchanged() {
        // grab a free port, then close it so the connection is refused
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpSource::new(format!("http://{addr}/live_price"), Some(Duration::from_secs(2))).unwrap();
        let target = MemoryTarget::new("<p>previous</p>");

        let err = poll_once(&source, &target).await.unwrap_err();
        assert!(matches!(err, PollError::Transport(_)));
        assert_eq!(target.content(), "<p>previous</p>");
    }

    #[tokio::test]
    async fn poll_once_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/live_price"))
            .respond_with(ResponseTemplate::new(200).set_body_json(btc("51000")))
            .mount(&server)
            .await;

        let source = HttpSource::new(format!("{}/live_price", server.uri()), None).unwrap();
        let target = MemoryTarget::new("");
        let snap = poll_once(&source, &target).await.unwrap();
        assert_eq!(snap.symbol(), "BTC");
        assert!(target.content().contains("color:red"));
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_after_one_interval() {
        let target = Arc::new(MemoryTarget::new(""));
        let mut p = poller(ScriptedSource::fixed(btc("1")), target.clone(), OverlapPolicy::Skip);
        p.start().await.unwrap();

        advance(999).await;
        assert_eq!(target.writes(), 0);
        advance(2).await;
        assert_eq!(target.writes(), 1);
        advance(2000).await;
        assert_eq!(target.writes(), 3);

        p.stop().await.unwrap();
        assert_eq!(p.stats(), PollStats { attempted: 3, rendered: 3, failed: 0, skipped: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn failing_polls_keep_previous_content() {
        let target = Arc::new(MemoryTarget::new("<p>previous</p>"));
        let source = ScriptedSource::new(vec![(Duration::ZERO, Err(503))]);
        let mut p = poller(source, target.clone(), OverlapPolicy::Skip);
        p.start().await.unwrap();

        advance(3500).await;
        p.stop().await.unwrap();

        assert_eq!(target.content(), "<p>previous</p>");
        assert_eq!(p.stats(), PollStats { attempted: 3, rendered: 0, failed: 3, skipped: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn slow_poll_skips_overlapping_ticks() {
        let target = Arc::new(MemoryTarget::new(""));
        let source = ScriptedSource::new(vec![(Duration::from_millis(2500), Ok(btc("1")))]);
        let mut p = poller(source, target.clone(), OverlapPolicy::Skip);
        p.start().await.unwrap();

        // poll started at 1000 resolves at 3500; ticks at 2000 and 3000 skipped
        advance(3700).await;
        assert_eq!(p.stats(), PollStats { attempted: 1, rendered: 1, failed: 0, skipped: 2 });
        p.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn overlap_policy_is_last_writer_wins() {
        let target = Arc::new(MemoryTarget::new(""));
        let source = ScriptedSource::new(vec![
            (Duration::from_millis(1500), Ok(json!({ "Symbol": "OLD", "price": "1", "user": "1" }))),
            (Duration::from_millis(100), Ok(json!({ "Symbol": "NEW", "price": "1", "user": "1" }))),
            (Duration::from_secs(3600), Ok(btc("1"))),
        ]);
        let mut p = poller(source, target.clone(), OverlapPolicy::Overlap);
        p.start().await.unwrap();

        // poll 1: 1000 → 2500, poll 2: 2000 → 2100; the older response lands last
        advance(2600).await;
        assert!(target.content().contains("<b>OLD</b>"));
        assert_eq!(target.writes(), 2);
        p.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_in_flight_poll() {
        let target = Arc::new(MemoryTarget::new(""));
        let source = ScriptedSource::new(vec![(Duration::from_secs(5), Ok(btc("1")))]);
        let mut p = poller(source, target.clone(), OverlapPolicy::Skip);
        p.start().await.unwrap();

        advance(1500).await;
        p.stop().await.unwrap();
        assert!(!p.is_running());

        advance(10_000).await;
        assert_eq!(target.writes(), 0);
        assert_eq!(p.stats().rendered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_timer() {
        let target = Arc::new(MemoryTarget::new(""));
        {
            let mut p = poller(ScriptedSource::fixed(btc("1")), target.clone(), OverlapPolicy::Skip);
            p.start().await.unwrap();
        }
        advance(5000).await;
        assert_eq!(target.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop() {
        let target = Arc::new(MemoryTarget::new(""));
        let mut p = poller(ScriptedSource::fixed(btc("1")), target.clone(), OverlapPolicy::Skip);
        p.start().await.unwrap();
        assert!(p.start().await.is_err());
        p.stop().await.unwrap();

        p.start().await.unwrap();
        advance(1500).await;
        p.stop().await.unwrap();
        assert_eq!(target.writes(), 1);
    }

    #[tokio::test]
    async fn poll_loop_writes_page_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.html");
        let target = Arc::new(PageFileTarget::new(&path, "log", "Live price"));
        let source = ScriptedSource::fixed(btc("51000"));
        let mut p = PricePoller::new("file", Duration::from_millis(50), OverlapPolicy::Skip, source, target);
        p.start().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while p.stats().rendered < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        p.stop().await.unwrap();

        let page = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(page.contains(r#"<div id="log"><table class="table table-striped">"#));
        assert!(page.contains("color:red"));
    }

    #[tokio::test]
    async fn from_config_builds_page_target() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("board.html");
        let cfg = BoardConfig {
            endpoint: Some("http://127.0.0.1:5000/live_price".into()),
            page_path: Some(page.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let p = PricePoller::from_config(&cfg).unwrap();
        assert_eq!(p.name(), "board");
        assert!(!p.is_running());

        let bad = BoardConfig { interval_ms: Some(0), ..Default::default() };
        assert!(PricePoller::from_config(&bad).is_err());
    }
}
