//! Work distribution over a fixed pool of browser workers.
//!
//! The coordinator owns the FIFO queue, the in-flight map and the outcome
//! list. Workers own one renderer session each, reuse it across tasks, and
//! talk to the coordinator only through channels. Every submitted pair ends
//! with exactly one [`PageOutcome`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{PageSession, Renderer};
use crate::error::VrcError;
use crate::pipeline::{compare_pair, PipelineContext};
use crate::store::ResultStore;
use crate::types::{PageOutcome, TaskFailure, UrlPair};

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(150);
pub const DEFAULT_RESPAWN_BUDGET: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub workers: usize,
    /// Hard limit for one page comparison, including navigation retries.
    pub task_timeout: Duration,
    /// Respawns allowed per worker slot after a crash.
    pub respawn_budget: u32,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            respawn_budget: DEFAULT_RESPAWN_BUDGET,
        }
    }
}

/// Outcomes of a run plus how they were obtained.
#[derive(Debug, Clone, Default)]
pub struct RunOutcomes {
    /// One outcome per submitted pair, sorted by URL.
    pub outcomes: Vec<PageOutcome>,
    /// Pairs loaded from a previous run without rendering.
    pub resumed: usize,
    /// Pairs dispatched to a worker.
    pub dispatched: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Busy,
    Crashed,
}

struct Slot {
    state: WorkerState,
    sender: Option<mpsc::Sender<UrlPair>>,
    respawns_left: u32,
}

enum WorkerEvent {
    Ready { slot: usize },
    Done { slot: usize, outcome: PageOutcome },
}

fn failed(pair: &UrlPair, reason: impl Into<String>) -> PageOutcome {
    PageOutcome::Failed(TaskFailure {
        url: pair.relative_url.clone(),
        reason: reason.into(),
    })
}

/// Runs one page on the worker's session, opening it on first use.
///
/// Timeouts and browser failures drop the session so the next task starts
/// on a fresh helper process.
async fn run_task(
    session: &mut Option<Box<dyn PageSession>>,
    renderer: &dyn Renderer,
    ctx: &PipelineContext,
    pair: &UrlPair,
    task_timeout: Duration,
) -> PageOutcome {
    if session.is_none() {
        match renderer.open_session().await {
            Ok(opened) => *session = Some(opened),
            Err(err) => {
                warn!(url = %pair.relative_url, error = %err, "failed to open browser session");
                return failed(pair, err.to_string());
            }
        }
    }
    let Some(active) = session.as_deref() else {
        return failed(pair, "browser session unavailable");
    };

    match timeout(task_timeout, compare_pair(active, pair, ctx)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            warn!(url = %pair.relative_url, error = %err, "page comparison failed");
            if matches!(err, VrcError::Browser(_) | VrcError::Timeout(_)) {
                session.take();
            }
            failed(pair, err.to_string())
        }
        Err(_) => {
            warn!(
                url = %pair.relative_url,
                timeout = ?task_timeout,
                "page comparison timed out; restarting browser session"
            );
            // Dropping the session kills its helper process.
            session.take();
            failed(pair, format!("timed out after {task_timeout:?}"))
        }
    }
}

async fn worker_loop(
    slot: usize,
    renderer: Arc<dyn Renderer>,
    ctx: Arc<PipelineContext>,
    task_timeout: Duration,
    mut tasks: mpsc::Receiver<UrlPair>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let mut session: Option<Box<dyn PageSession>> = None;
    if events.send(WorkerEvent::Ready { slot }).is_ok() {
        while let Some(pair) = tasks.recv().await {
            let outcome = run_task(&mut session, renderer.as_ref(), &ctx, &pair, task_timeout).await;
            if events.send(WorkerEvent::Done { slot, outcome }).is_err() {
                break;
            }
        }
    }
    if let Some(active) = session {
        if let Err(err) = active.close().await {
            debug!(slot, error = %err, "session close failed");
        }
    }
    debug!(slot, "worker exited");
}

/// Fixed-size worker pool driven by a single coordinator.
pub struct Scheduler {
    renderer: Arc<dyn Renderer>,
    ctx: Arc<PipelineContext>,
    options: SchedulerOptions,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        ctx: Arc<PipelineContext>,
        options: SchedulerOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            renderer,
            ctx,
            options,
            cancel,
        }
    }

    fn spawn_worker(
        &self,
        slot: usize,
        events: &mpsc::UnboundedSender<WorkerEvent>,
        supervisors: &mut JoinSet<(usize, bool)>,
    ) -> mpsc::Sender<UrlPair> {
        let (tx, rx) = mpsc::channel(1);
        let worker = tokio::spawn(worker_loop(
            slot,
            self.renderer.clone(),
            self.ctx.clone(),
            self.options.task_timeout,
            rx,
            events.clone(),
        ));
        supervisors.spawn(async move {
            let crashed = worker.await.is_err();
            (slot, crashed)
        });
        tx
    }

    /// Compares every pair, resuming from persisted results where present.
    pub async fn run(&self, pairs: Vec<UrlPair>) -> RunOutcomes {
        let store = ResultStore::new(self.ctx.layout.clone());
        let mut outcomes = Vec::with_capacity(pairs.len());
        let mut queue = VecDeque::new();
        for pair in pairs {
            match store.load(&self.ctx.file_name(&pair)) {
                Some(previous) => {
                    debug!(url = %pair.relative_url, "resuming from persisted result");
                    outcomes.push(previous);
                }
                None => queue.push_back(pair),
            }
        }
        let resumed = outcomes.len();
        let dispatched = queue.len();
        info!(resumed, pending = dispatched, "starting comparison run");

        if !queue.is_empty() {
            self.drive(&store, &mut queue, &mut outcomes).await;
        }

        outcomes.sort_by(|a, b| a.url().cmp(b.url()));
        RunOutcomes {
            outcomes,
            resumed,
            dispatched,
        }
    }

    async fn drive(
        &self,
        store: &ResultStore,
        queue: &mut VecDeque<UrlPair>,
        outcomes: &mut Vec<PageOutcome>,
    ) {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut supervisors = JoinSet::new();
        let worker_count = self.options.workers.max(1).min(queue.len());
        let mut slots: Vec<Slot> = (0..worker_count)
            .map(|slot| Slot {
                state: WorkerState::Idle,
                sender: Some(self.spawn_worker(slot, &events_tx, &mut supervisors)),
                respawns_left: self.options.respawn_budget,
            })
            .collect();
        let mut in_flight: HashMap<usize, UrlPair> = HashMap::new();
        let mut live = worker_count;
        let mut cancelled = false;

        while !queue.is_empty() || !in_flight.is_empty() {
            if live == 0 {
                warn!(remaining = queue.len(), "no workers left; failing remaining pages");
                outcomes.extend(queue.drain(..).map(|pair| failed(&pair, "no workers available")));
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    info!(queued = queue.len(), "cancellation requested; draining queue");
                    outcomes.extend(queue.drain(..).map(|pair| failed(&pair, "cancelled")));
                }
                Some(event) = events.recv() => {
                    let slot = match event {
                        WorkerEvent::Ready { slot } => slot,
                        WorkerEvent::Done { slot, outcome } => {
                            if let Some(pair) = in_flight.remove(&slot) {
                                if outcome.is_persistable() {
                                    let file = self.ctx.file_name(&pair);
                                    if let Err(err) = store.save(&file, &outcome) {
                                        warn!(url = %pair.relative_url, error = %err, "failed to persist result");
                                    }
                                }
                            }
                            outcomes.push(outcome);
                            slot
                        }
                    };
                    slots[slot].state = WorkerState::Idle;
                    if cancelled {
                        continue;
                    }
                    let Some(pair) = queue.pop_front() else {
                        continue;
                    };
                    let Some(sender) = slots[slot].sender.as_ref() else {
                        queue.push_front(pair);
                        continue;
                    };
                    match sender.try_send(pair.clone()) {
                        Ok(()) => {
                            slots[slot].state = WorkerState::Busy;
                            in_flight.insert(slot, pair);
                        }
                        Err(_) => queue.push_front(pair),
                    }
                }
                Some(joined) = supervisors.join_next() => {
                    let Ok((slot, crashed)) = joined else {
                        continue;
                    };
                    live -= 1;
                    slots[slot].sender = None;
                    debug!(slot, state = ?slots[slot].state, crashed, "worker stopped");
                    if let Some(pair) = in_flight.remove(&slot) {
                        warn!(slot, url = %pair.relative_url, "worker crashed during task");
                        outcomes.push(failed(&pair, "worker crashed"));
                    }
                    if crashed {
                        slots[slot].state = WorkerState::Crashed;
                        if slots[slot].respawns_left > 0 && !cancelled && !queue.is_empty() {
                            slots[slot].respawns_left -= 1;
                            info!(slot, respawns_left = slots[slot].respawns_left, "respawning worker");
                            slots[slot].sender = Some(self.spawn_worker(slot, &events_tx, &mut supervisors));
                            slots[slot].state = WorkerState::Idle;
                            live += 1;
                        }
                    }
                }
            }
        }

        for slot in &mut slots {
            slot.sender = None;
        }
        drop(events_tx);
        while let Some(joined) = supervisors.join_next().await {
            if let Ok((slot, true)) = joined {
                warn!(slot, "worker crashed during shutdown");
            }
        }
    }
}
