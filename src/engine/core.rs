//! The core engine implementation: a single-owner spider runtime.
//!
//! The engine is one dedicated tokio task owning all crawl state. Every
//! external interaction (crawl ticks, export RPCs, stop requests) flows
//! through a command channel, and every top-level request reports its
//! completion through a second channel, so state transitions form one
//! serial event stream and per-seed writes are linearizable. The loop
//! itself never blocks on network I/O: fetching and parsing happen on
//! request tasks, and a parse callback awaiting its own nested requests
//! suspends only that task.
//!
//! The one place the loop deliberately waits is completion resolution and
//! the export drain, where pending top-level requests are awaited with an
//! infinite budget before data is emitted.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use kanal::{unbounded_async, AsyncReceiver, AsyncSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::engine::data_table::DataTable;
use crate::engine::export::{self, Exported, ExportFormat};
use crate::engine::registry;
use crate::error::ScrapexError;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::options::SpiderOptions;
use crate::request::RequestContext;
use crate::spider::{Init, ParseValue, Record, Spider};
use crate::stats::EngineStats;

enum Command {
    Crawl,
    Export {
        refresh: bool,
        reply: oneshot::Sender<Vec<Record>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

struct Completion {
    url: Url,
    outcome: Result<ParseValue, ScrapexError>,
}

// What a completion boils down to after recursive resolution.
enum Resolution {
    Records(Vec<Record>),
    PrunedSeed,
    Stop(String),
}

/// A cheap, clonable handle to a running spider runtime.
///
/// All methods are safe to call from any task; they are RPCs into the
/// engine's event loop. Once the engine has terminated, whether by a stop
/// request, a `ParseValue::Stop` from a callback, or a partial export, every RPC
/// answers `ScrapexError::Stopped`.
#[derive(Clone)]
pub struct Engine {
    cmd_tx: AsyncSender<Command>,
    stats: Arc<EngineStats>,
}

impl Engine {
    /// Starts a spider with the default HTTP fetcher.
    pub async fn start<S: Spider>(
        spider: S,
        options: SpiderOptions,
    ) -> Result<Engine, ScrapexError> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);
        Engine::start_with_fetcher(spider, options, fetcher).await
    }

    /// Starts a spider with a caller-supplied fetch capability.
    ///
    /// Runs the spider's `init` under the configured timeout budget. An
    /// `Ignore` or `Stop` verdict fails startup without spawning the
    /// runtime; `After(delay)` schedules the first crawl accordingly.
    pub async fn start_with_fetcher<S: Spider>(
        spider: S,
        options: SpiderOptions,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Engine, ScrapexError> {
        options.validate()?;
        let seeds = options.seed_urls()?;
        let spider = Arc::new(spider);

        let verdict = tokio::time::timeout(options.timeout, Arc::clone(&spider).init())
            .await
            .map_err(|_| ScrapexError::InitTimeout)?;
        let first_crawl_delay = match verdict {
            Init::Ready => Duration::ZERO,
            Init::After(delay) => delay,
            Init::Ignore => return Err(ScrapexError::InitIgnore),
            Init::Stop(reason) => return Err(ScrapexError::InitStop(reason)),
        };

        let (cmd_tx, cmd_rx) = unbounded_async();
        let (completion_tx, completion_rx) = unbounded_async();
        let stats = Arc::new(EngineStats::new());
        let engine = Engine {
            cmd_tx: cmd_tx.clone(),
            stats: Arc::clone(&stats),
        };

        if let Some(name) = &options.name {
            registry::register(name, engine.clone())?;
        }

        let runtime = EngineRuntime {
            spider,
            table: DataTable::new(&seeds),
            seeds,
            name: options.name.clone(),
            interval: options.interval,
            pending: Vec::new(),
            timer: None,
            ctx: RequestContext::new(fetcher),
            cmd_tx,
            completion_tx,
            stats,
        };
        tokio::spawn(runtime.run(cmd_rx, completion_rx, first_crawl_delay));
        Ok(engine)
    }

    /// Finds a running engine registered under `name`.
    pub fn lookup(name: &str) -> Option<Engine> {
        registry::lookup(name)
    }

    /// Exports the merged crawl data as the raw record list.
    ///
    /// Blocks until pending top-level requests settle. Equivalent to
    /// `export_with(ExportFormat::Records, false)`.
    pub async fn export(&self) -> Result<Vec<Record>, ScrapexError> {
        Ok(self
            .export_with(ExportFormat::Records, false)
            .await?
            .into_records())
    }

    /// Exports with an explicit encoding and optional refresh.
    ///
    /// `refresh` forces a fresh crawl before emitting and is honoured for
    /// the raw format only, matching the runtime's override semantics.
    /// Unsupported formats are rejected up front and leave the engine
    /// idle. If the emitted data was partial, with some seeds still without
    /// a result, the data is returned and the engine then terminates.
    pub async fn export_with(
        &self,
        format: ExportFormat,
        refresh: bool,
    ) -> Result<Exported, ScrapexError> {
        export::validate(&format)?;
        let refresh = refresh && matches!(format, ExportFormat::Records);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Export {
                refresh,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ScrapexError::Stopped)?;
        let rows = reply_rx.await.map_err(|_| ScrapexError::Stopped)?;
        export::encode(&format, rows)
    }

    /// Stops the engine, waiting for the loop to acknowledge.
    pub async fn stop(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Stop { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    /// The engine's activity counters; live for the life of the handle.
    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

struct EngineRuntime<S: Spider> {
    spider: Arc<S>,
    seeds: Vec<Url>,
    table: DataTable,
    name: Option<String>,
    interval: Option<Duration>,
    pending: Vec<Url>,
    timer: Option<JoinHandle<()>>,
    ctx: RequestContext,
    cmd_tx: AsyncSender<Command>,
    completion_tx: AsyncSender<Completion>,
    stats: Arc<EngineStats>,
}

impl<S: Spider> EngineRuntime<S> {
    async fn run(
        mut self,
        cmd_rx: AsyncReceiver<Command>,
        completion_rx: AsyncReceiver<Completion>,
        first_crawl_delay: Duration,
    ) {
        info!(seeds = self.seeds.len(), "engine started");
        self.arm_timer(first_crawl_delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Ok(Command::Crawl) => self.start_crawl().await,
                    Ok(Command::Export { refresh, reply }) => {
                        if self.handle_export(refresh, reply, &completion_rx).await.is_break() {
                            break;
                        }
                    }
                    Ok(Command::Stop { reply }) => {
                        info!("stop requested");
                        let _ = reply.send(());
                        break;
                    }
                    Err(_) => {
                        debug!("all engine handles dropped, shutting down");
                        break;
                    }
                },
                completion = completion_rx.recv() => match completion {
                    Ok(completion) => {
                        if self.handle_completion(completion).await.is_break() {
                            break;
                        }
                        if self.pending.is_empty() {
                            self.arm_interval();
                        }
                    }
                    Err(_) => break,
                },
            }
        }

        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel_timer();
        if let Some(name) = &self.name {
            registry::deregister(name);
        }
        info!("engine terminated");
    }

    /// One crawl tick: materialise the spider's start requests into the
    /// pending set and hand each to a forwarder that reports its
    /// completion back to the loop.
    async fn start_crawl(&mut self) {
        if !self.pending.is_empty() {
            debug!(pending = self.pending.len(), "crawl tick ignored, previous crawl still settling");
            return;
        }
        self.cancel_timer();
        self.stats.increment_crawls_started();
        trace!(seeds = self.seeds.len(), "crawl tick");

        let handles = Arc::clone(&self.spider)
            .start_requests(self.seeds.clone(), self.ctx.clone())
            .await;
        for handle in handles {
            let url = handle.url().clone();
            trace!(%url, request = %handle.id(), "dispatching top-level request");
            self.pending.push(url.clone());
            self.stats.increment_requests_dispatched();
            let completion_tx = self.completion_tx.clone();
            tokio::spawn(async move {
                let outcome = handle.await_within(None).await;
                let _ = completion_tx.send(Completion { url, outcome }).await;
            });
        }

        if self.pending.is_empty() {
            self.arm_interval();
        }
    }

    /// Merges one top-level completion into the result table.
    async fn handle_completion(&mut self, completion: Completion) -> ControlFlow<()> {
        let Completion { url, outcome } = completion;
        // One completion settles one entry; duplicate seeds dispatch
        // duplicate requests that each settle on their own.
        if let Some(pos) = self.pending.iter().position(|pending| pending == &url) {
            self.pending.remove(pos);
        }

        match self.resolve(&url, outcome).await {
            Resolution::Records(records) => {
                self.stats.increment_requests_completed();
                self.stats.add_records_stored(records.len());
                debug!(%url, records = records.len(), "completion merged");
                if !self.table.store(&url, records) {
                    warn!(%url, "completion for unknown seed slot dropped");
                }
                ControlFlow::Continue(())
            }
            Resolution::PrunedSeed => {
                self.stats.increment_requests_completed();
                ControlFlow::Continue(())
            }
            Resolution::Stop(reason) => {
                info!(%reason, "parse callback requested stop");
                ControlFlow::Break(())
            }
        }
    }

    /// Resolves a completion outcome to its final record list, awaiting
    /// returned sub-requests with an infinite budget and concatenating
    /// their results in list order. Fetch errors degrade to an empty
    /// list; a 404 prunes the offending seed.
    fn resolve<'a>(
        &'a mut self,
        slot_url: &'a Url,
        outcome: Result<ParseValue, ScrapexError>,
    ) -> BoxFuture<'a, Resolution> {
        Box::pin(async move {
            match outcome {
                Ok(ParseValue::Records(records)) => Resolution::Records(records),
                Ok(ParseValue::Stop(reason)) => Resolution::Stop(reason),
                Ok(ParseValue::Follow(handle)) => {
                    trace!(url = %handle.url(), "awaiting returned sub-request");
                    let next = handle.await_within(None).await;
                    self.resolve(slot_url, next).await
                }
                Ok(ParseValue::FollowMany(handles)) => {
                    let mut merged = Vec::new();
                    for handle in handles {
                        trace!(url = %handle.url(), "awaiting returned sub-request");
                        let next = handle.await_within(None).await;
                        match self.resolve(slot_url, next).await {
                            Resolution::Records(records) => merged.extend(records),
                            Resolution::PrunedSeed => {}
                            Resolution::Stop(reason) => return Resolution::Stop(reason),
                        }
                    }
                    Resolution::Records(merged)
                }
                Err(ScrapexError::NotFound(not_found)) => {
                    error!(url = %not_found, "resource not found, pruning seed");
                    self.stats.increment_urls_pruned();
                    self.seeds.retain(|seed| seed != &not_found);
                    self.table.prune(&not_found);
                    if &not_found == slot_url {
                        Resolution::PrunedSeed
                    } else {
                        Resolution::Records(Vec::new())
                    }
                }
                Err(err) => {
                    error!(url = %slot_url, error = %err, "request failed, storing empty result");
                    self.stats.increment_requests_failed();
                    Resolution::Records(Vec::new())
                }
            }
        })
    }

    /// The blocking export RPC: drain pending completions, optionally
    /// refresh, then emit the table in seed order. Serving partial data
    /// terminates the engine after the reply.
    async fn handle_export(
        &mut self,
        refresh: bool,
        reply: oneshot::Sender<Vec<Record>>,
        completion_rx: &AsyncReceiver<Completion>,
    ) -> ControlFlow<()> {
        self.stats.increment_exports_served();

        let mut halted = self.drain_pending(completion_rx).await;
        if refresh && !halted {
            debug!("override export, forcing immediate re-crawl");
            self.cancel_timer();
            self.start_crawl().await;
            halted = self.drain_pending(completion_rx).await;
        }

        let (rows, partial) = self.table.collect_rows();
        debug!(rows = rows.len(), partial, "export emitted");
        let _ = reply.send(rows);

        if halted || partial {
            info!(partial, "export served before all seeds settled, terminating");
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Awaits every pending top-level completion with an infinite budget,
    /// merging each. Returns true when a stop request halted the drain
    /// early. A drain that consumed completions re-arms the interval, since
    /// the pending set became empty here rather than in the main loop; a
    /// no-op drain leaves an already-armed timer's phase alone.
    async fn drain_pending(&mut self, completion_rx: &AsyncReceiver<Completion>) -> bool {
        let mut drained = false;
        while !self.pending.is_empty() {
            match completion_rx.recv().await {
                Ok(completion) => {
                    drained = true;
                    if self.handle_completion(completion).await.is_break() {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
        if drained {
            self.arm_interval();
        }
        false
    }

    fn arm_interval(&mut self) {
        if let Some(interval) = self.interval {
            trace!(?interval, "arming re-crawl timer");
            self.arm_timer(interval);
        }
    }

    /// Schedules a crawl tick after `delay`, cancelling any previous
    /// timer first so at most one is ever armed.
    fn arm_timer(&mut self, delay: Duration) {
        self.cancel_timer();
        let cmd_tx = self.cmd_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = cmd_tx.send(Command::Crawl).await;
        }));
    }

    // Aborting an already-fired timer is a no-op.
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
