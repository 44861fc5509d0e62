//! In-process controller executor
//!
//! Stands in for the real-time controller so the gateway runs end to end.
//! Calls are buffered on submit, pushed to the executor task on flush, run
//! in submission order against a single simulated machine, and published
//! after a configurable latency (plus optional jitter, so results can come
//! back out of order).

mod call;

pub use call::{ControllerCall, PowerState};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tokio::sync::mpsc;

use mc_core::config::ExecutorConfig;
use mc_core::error::BridgeError;
use mc_core::BackendBridge;
use mc_protocol::BackendCallId;

type Submission = (BackendCallId, ControllerCall);
type Completion = (BackendCallId, Value);

/// Simulated controller behind the [`BackendBridge`] interface
pub struct ControllerSim {
    /// Last call number handed out
    last_call: AtomicU32,
    /// Submitted but not yet flushed
    outbox: Mutex<Vec<Submission>>,
    /// Feed of the executor task
    executor_tx: mpsc::UnboundedSender<Submission>,
    /// Results published by the executor task
    completed_rx: Mutex<mpsc::UnboundedReceiver<Completion>>,
    /// Results received but held over to a later drain
    backlog: Mutex<VecDeque<Completion>>,
    /// Most results handed out per drain
    max_per_drain: usize,
}

impl ControllerSim {
    /// Start the executor task and return the bridge in front of it.
    ///
    /// Must be called from within a tokio runtime. The task stops once the
    /// returned bridge is dropped.
    pub fn spawn(config: ExecutorConfig, max_per_drain: usize) -> Arc<Self> {
        let (executor_tx, executor_rx) = mpsc::unbounded_channel();
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_executor(executor_rx, completed_tx, config));

        Arc::new(Self {
            last_call: AtomicU32::new(0),
            outbox: Mutex::new(Vec::new()),
            executor_tx,
            completed_rx: Mutex::new(completed_rx),
            backlog: Mutex::new(VecDeque::new()),
            max_per_drain: max_per_drain.max(1),
        })
    }

    /// Calls submitted since the last flush
    pub fn queued(&self) -> usize {
        self.outbox.lock().map(|outbox| outbox.len()).unwrap_or(0)
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, BridgeError> {
    mutex
        .lock()
        .map_err(|_| BridgeError::Unavailable(format!("{} lock poisoned", what)))
}

impl BackendBridge for ControllerSim {
    fn submit(&self, payload: Value) -> Result<BackendCallId, BridgeError> {
        let call = ControllerCall::from_payload(payload)?;
        let id = BackendCallId::new(self.last_call.fetch_add(1, Ordering::Relaxed).wrapping_add(1));

        lock(&self.outbox, "outbox")?.push((id, call));
        tracing::trace!(backend_id = %id, "Queued controller call");
        Ok(id)
    }

    fn flush(&self) -> Result<(), BridgeError> {
        let pending = std::mem::take(&mut *lock(&self.outbox, "outbox")?);

        for submission in pending {
            self.executor_tx
                .send(submission)
                .map_err(|_| BridgeError::Unavailable("executor task has stopped".to_string()))?;
        }
        Ok(())
    }

    fn drain(&self) -> Result<HashMap<BackendCallId, Value>, BridgeError> {
        let mut backlog = lock(&self.backlog, "backlog")?;
        {
            let mut completed = lock(&self.completed_rx, "completion queue")?;
            while let Ok(completion) = completed.try_recv() {
                backlog.push_back(completion);
            }
        }

        let take = backlog.len().min(self.max_per_drain);
        let ready: HashMap<BackendCallId, Value> = backlog.drain(..take).collect();

        if !backlog.is_empty() {
            tracing::warn!(
                remaining = backlog.len(),
                "More completed calls than one drain takes; rest deferred to next cycle"
            );
        }

        Ok(ready)
    }
}

/// Simulated machine
#[derive(Debug, Default)]
struct Machine {
    state: Option<PowerState>,
}

impl Machine {
    fn execute(&mut self, request: ControllerCall) -> Value {
        match request {
            ControllerCall::MachineState { commanded_state } => {
                if let Some(commanded) = commanded_state {
                    if self.state != Some(commanded) {
                        tracing::info!(state = %commanded, "Machine state changed");
                        self.state = Some(commanded);
                    }
                }
                call::machine_state_result(self.state, commanded_state)
            }
            ControllerCall::PrintUint32 { value } => {
                tracing::info!(value, "Controller print");
                call::print_uint32_result(value)
            }
        }
    }
}

async fn run_executor(
    mut calls: mpsc::UnboundedReceiver<Submission>,
    completed: mpsc::UnboundedSender<Completion>,
    config: ExecutorConfig,
) {
    let mut machine = Machine::default();

    while let Some((id, call)) = calls.recv().await {
        let result = machine.execute(call);
        let delay = processing_delay(&config);
        let completed = completed.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = completed.send((id, result));
        });
    }

    tracing::debug!("Controller executor stopped");
}

fn processing_delay(config: &ExecutorConfig) -> Duration {
    let jitter_ms = config.jitter.as_millis() as u64;
    if jitter_ms == 0 {
        return config.latency;
    }
    config.latency + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}
