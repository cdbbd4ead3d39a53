use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use super::state::{LoadState, LoadStateMachine, LoadStatus, Step};
use super::timer::ScopedTimer;
use crate::config::retry_delay;
use crate::error::{ErrorKind, TransitionError};
use crate::kind::AssetKind;
use crate::probe::ErrorClassifier;
use crate::render::{AssetRenderer, RenderOutcome};
use crate::stats::EngineStats;

/// Collaborators a session needs to drive its machine.
#[derive(Clone)]
pub struct SessionContext {
    pub renderer: Arc<dyn AssetRenderer>,
    pub classifier: ErrorClassifier,
    pub kind: AssetKind,
    pub load_timeout: Duration,
    pub auto_retry_limit: u32,
    pub retry_backoff: Duration,
    pub stats: Arc<EngineStats>,
}

#[derive(Debug)]
enum Command {
    Retry,
}

enum Flow {
    Settled,
    Retry,
    Closed,
}

/// A mounted asset: a background task driving one [`LoadStateMachine`].
///
/// Dropping the session unmounts it. The task is aborted, which cancels the
/// timer and abandons any in-flight render or probe.
pub struct AssetSession {
    id: Uuid,
    kind: AssetKind,
    state_rx: watch::Receiver<LoadState>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl AssetSession {
    /// Mount `machine` and start driving it. Must be called within a tokio
    /// runtime.
    pub fn spawn(machine: LoadStateMachine, ctx: SessionContext) -> Self {
        let id = Uuid::new_v4();
        let kind = ctx.kind;
        let (state_tx, state_rx) = watch::channel(machine.state().clone());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let span = info_span!("asset", session = %id, url = %machine.canonical_url(), %kind);
        let task = tokio::spawn(run(machine, ctx, state_tx, command_rx).instrument(span));
        Self {
            id,
            kind,
            state_rx,
            commands,
            task,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn state(&self) -> LoadState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state_rx.clone()
    }

    /// Request a retry. Supersedes any attempt or probe still in flight.
    pub fn retry(&self) -> bool {
        self.commands.send(Command::Retry).is_ok()
    }

    /// Wait for the first state matching `predicate`.
    pub async fn wait_until(&self, predicate: impl FnMut(&LoadState) -> bool) -> LoadState {
        let mut rx = self.state_rx.clone();
        let result = rx.wait_for(predicate).await.map(|s| s.clone());
        match result {
            Ok(state) => state,
            Err(_) => rx.borrow().clone(),
        }
    }

    /// Wait until the asset is loaded or has failed with a final kind.
    pub async fn settled(&self) -> LoadState {
        self.wait_until(LoadState::is_settled).await
    }
}

impl Drop for AssetSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn publish(state_tx: &watch::Sender<LoadState>, machine: &LoadStateMachine) {
    state_tx.send_replace(machine.state().clone());
}

fn log_rejected(result: Result<(), TransitionError>) {
    if let Err(e) = result {
        warn!(error = %e, "Rejected load state transition");
    }
}

fn should_auto_retry(state: &LoadState, limit: u32) -> bool {
    state.status == LoadStatus::Error
        && !state.probing
        && state.error_kind.is_some_and(ErrorKind::allows_retry)
        && state.retry_count < limit
}

fn begin_retry(
    machine: &mut LoadStateMachine,
    ctx: &SessionContext,
    state_tx: &watch::Sender<LoadState>,
) -> Option<String> {
    match machine.retry() {
        Ok(url) => {
            ctx.stats.record_retry();
            publish(state_tx, machine);
            Some(url)
        }
        Err(e) => {
            warn!(error = %e, "Retry rejected");
            None
        }
    }
}

async fn run(
    mut machine: LoadStateMachine,
    ctx: SessionContext,
    state_tx: watch::Sender<LoadState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    ctx.stats.record_mount();

    let mut pending = match machine.mount() {
        Ok(Step::Loaded) => {
            ctx.stats.record_cache_hit();
            None
        }
        Ok(Step::Load { url }) => Some(url),
        Err(e) => {
            warn!(error = %e, "Mount rejected");
            return;
        }
    };
    publish(&state_tx, &machine);

    loop {
        if let Some(url) = pending.take() {
            match attempt(&mut machine, &ctx, &url, &state_tx, &mut commands).await {
                Flow::Settled => {}
                Flow::Retry => {
                    pending = begin_retry(&mut machine, &ctx, &state_tx);
                    continue;
                }
                Flow::Closed => return,
            }
        }

        if should_auto_retry(machine.state(), ctx.auto_retry_limit) {
            let backoff = retry_delay(ctx.retry_backoff, machine.state().retry_count);
            debug!(backoff_ms = backoff.as_millis(), "Scheduling automatic retry");
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                cmd = commands.recv() => {
                    if cmd.is_none() {
                        return;
                    }
                }
            }
            pending = begin_retry(&mut machine, &ctx, &state_tx);
            continue;
        }

        match commands.recv().await {
            Some(Command::Retry) => pending = begin_retry(&mut machine, &ctx, &state_tx),
            None => return,
        }
    }
}

async fn attempt(
    machine: &mut LoadStateMachine,
    ctx: &SessionContext,
    url: &str,
    state_tx: &watch::Sender<LoadState>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Flow {
    let mut timer = ScopedTimer::start(ctx.load_timeout);

    let outcome = tokio::select! {
        biased;
        cmd = commands.recv() => {
            return match cmd {
                Some(Command::Retry) => Flow::Retry,
                None => Flow::Closed,
            };
        }
        outcome = ctx.renderer.render(url, ctx.kind) => Some(outcome),
        _ = timer.expired() => None,
    };
    timer.cancel();

    let reason = match outcome {
        Some(RenderOutcome::Success) => {
            log_rejected(machine.succeed());
            ctx.stats.record_load();
            publish(state_tx, machine);
            return Flow::Settled;
        }
        None => {
            warn!(url, timeout_ms = ctx.load_timeout.as_millis(), "Asset load timed out");
            log_rejected(machine.time_out());
            ctx.stats.record_error(ErrorKind::Timeout);
            publish(state_tx, machine);
            return Flow::Settled;
        }
        Some(RenderOutcome::Failure(reason)) => reason,
    };

    debug!(url, %reason, "Asset failed to render");
    log_rejected(machine.fail(reason));
    publish(state_tx, machine);

    ctx.stats.record_probe();
    let kind = tokio::select! {
        biased;
        cmd = commands.recv() => {
            return match cmd {
                Some(Command::Retry) => Flow::Retry,
                None => Flow::Closed,
            };
        }
        kind = ctx.classifier.classify(url, ctx.kind) => kind,
    };

    log_rejected(machine.refine(kind));
    ctx.stats.record_error(kind);
    publish(state_tx, machine);
    Flow::Settled
}
