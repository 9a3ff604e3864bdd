//! The execution engine: a ready-queue main loop that dispatches node
//! tasks to worker threads under a concurrency cap, races each task
//! against a soft timeout, retries failures, and honors cooperative
//! cancellation.
//!
//! The engine is the single owner of the output cache, the status map, and
//! the run statistics; worker threads only compute and report back over a
//! channel. Operators receive read-only views of their inputs and return
//! owned outputs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, info, warn};

use tabflow_common::{AppError, codes};

use crate::cancel::CancelToken;
use crate::events::{Callbacks, EngineEvent, EventHub};
use crate::executor::{
    ExecutionContext, ExecutionMetadata, ExecutionResult, InputBinding, NodeExecutor, NodeValue,
    run_node,
};
use crate::graph::{Edge, ExecutionGraph, Node, NodeStatus};
use crate::{nodes, registry};

/// How long the main loop sleeps waiting for a completion before rechecking
/// cancellation and deadlines.
const LOOP_TICK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on simultaneously running node tasks. Must be ≥ 1.
    pub max_concurrent_executions: usize,
    /// Soft per-task timeout. Must be ≥ 1 second.
    pub execution_timeout: Duration,
    /// Failed tasks are re-queued up to this many times.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 4,
            execution_timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl EngineConfig {
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent_executions = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_concurrent_executions < 1 {
            return Err(AppError::configuration(
                "maxConcurrentExecutions must be at least 1",
            ));
        }
        if self.execution_timeout < Duration::from_millis(1000) {
            return Err(AppError::configuration(
                "executionTimeout must be at least 1000ms",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub total_nodes: usize,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
    pub retried_tasks: usize,
    pub execution_time_ms: u64,
}

impl ExecutionStats {
    pub fn progress_pct(&self) -> f64 {
        if self.total_nodes == 0 {
            100.0
        } else {
            100.0 * (self.completed_nodes + self.failed_nodes) as f64 / self.total_nodes as f64
        }
    }
}

/// Result of a whole-graph run. Operator failures do not error the call;
/// they surface as `success = false` with the counts in `stats`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub stats: ExecutionStats,
}

/// A cached node output. Never partially written: insertion happens only
/// after the producing task fully succeeded.
#[derive(Debug, Clone)]
pub struct CachedOutput {
    pub value: Arc<NodeValue>,
    pub completed_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Snapshot returned by [`ExecutionEngine::get_execution_status`].
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub is_executing: bool,
    pub stats: ExecutionStats,
    pub node_statuses: FxHashMap<String, NodeStatus>,
    pub node_outputs: FxHashMap<String, Arc<NodeValue>>,
}

struct QueueItem {
    index: usize,
    level: u32,
    retries: u32,
}

struct ActiveTask {
    attempt: u64,
    level: u32,
    retries: u32,
    deadline: Instant,
    cancel: CancelToken,
}

struct TaskDone {
    index: usize,
    attempt: u64,
    result: ExecutionResult,
}

/// Resets the in-flight flag on every exit path.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ExecutionEngine {
    config: RwLock<EngineConfig>,
    cache: RwLock<FxHashMap<String, CachedOutput>>,
    statuses: RwLock<FxHashMap<String, NodeStatus>>,
    stats: Mutex<ExecutionStats>,
    failures: Mutex<FxHashMap<String, AppError>>,
    last_graph: Mutex<Option<ExecutionGraph>>,
    executing: AtomicBool,
    current_cancel: Mutex<CancelToken>,
    attempt_seq: AtomicU64,
    events: EventHub,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        nodes::register_builtins();
        Self {
            config: RwLock::new(config),
            cache: RwLock::new(FxHashMap::default()),
            statuses: RwLock::new(FxHashMap::default()),
            stats: Mutex::new(ExecutionStats::default()),
            failures: Mutex::new(FxHashMap::default()),
            last_graph: Mutex::new(None),
            executing: AtomicBool::new(false),
            current_cancel: Mutex::new(CancelToken::new()),
            attempt_seq: AtomicU64::new(0),
            events: EventHub::new(),
        }
    }

    /// Replace the engine configuration. Rejected while a run is active.
    pub fn configure(&self, config: EngineConfig) -> Result<(), AppError> {
        config.validate()?;
        if self.executing.load(Ordering::SeqCst) {
            return Err(AppError::execution("Cannot reconfigure during a run")
                .with_code(codes::ALREADY_EXECUTING));
        }
        *self.config.write() = config;
        Ok(())
    }

    pub fn set_callbacks(&self, callbacks: Callbacks) {
        self.events.set_callbacks(callbacks);
    }

    /// Execute a whole graph. Fails fast with `DependencyError` /
    /// `ConfigurationError` before any work starts; operator failures end
    /// the run with `success = false` instead.
    pub fn execute_graph(&self, nodes: &[Node], edges: &[Edge]) -> Result<RunOutcome, AppError> {
        self.run(nodes, edges, None)
    }

    /// Execute a single node, first materializing its dependencies through
    /// the same graph build and scheduling path.
    pub fn execute_node(&self, node_id: &str, nodes: &[Node], edges: &[Edge]) -> ExecutionResult {
        let started_at = Utc::now();
        let started = Instant::now();
        let metadata = ExecutionMetadata {
            node_id: node_id.to_string(),
            execution_id: "single".to_string(),
            started_at,
        };

        if let Err(error) = self.run(nodes, edges, Some(node_id)) {
            return ExecutionResult::failure(error, metadata, started.elapsed());
        }

        // A stale cache entry from an earlier run must not masquerade as
        // this run's result; only a fresh Success counts.
        if self.get_node_status(node_id) == Some(NodeStatus::Success) {
            if let Some(cached) = self.cache.read().get(node_id) {
                return ExecutionResult {
                    success: true,
                    output: Some(Arc::clone(&cached.value)),
                    error: None,
                    execution_time: cached.duration,
                    metadata,
                };
            }
        }

        let error = self
            .failures
            .lock()
            .get(node_id)
            .cloned()
            .unwrap_or_else(|| {
                AppError::execution("Node did not complete").with_node(node_id)
            });
        ExecutionResult::failure(error, metadata, started.elapsed())
    }

    /// Signal cancellation of the current run. Idempotent; a no-op when
    /// nothing is executing.
    pub fn abort(&self) {
        self.current_cancel.lock().cancel();
    }

    pub fn get_execution_status(&self) -> EngineStatus {
        EngineStatus {
            is_executing: self.executing.load(Ordering::SeqCst),
            stats: self.stats.lock().clone(),
            node_statuses: self.statuses.read().clone(),
            node_outputs: self
                .cache
                .read()
                .iter()
                .map(|(id, cached)| (id.clone(), Arc::clone(&cached.value)))
                .collect(),
        }
    }

    pub fn get_node_output(&self, node_id: &str) -> Option<Arc<NodeValue>> {
        self.cache.read().get(node_id).map(|c| Arc::clone(&c.value))
    }

    pub fn get_node_status(&self, node_id: &str) -> Option<NodeStatus> {
        self.statuses.read().get(node_id).copied()
    }

    /// Drop a node's cached output together with every transitive
    /// dependent's — a stale upstream must not leave stale downstream
    /// results behind.
    pub fn invalidate_node(&self, node_id: &str) {
        let mut invalidated: Vec<String> = vec![node_id.to_string()];
        if let Some(graph) = self.last_graph.lock().as_ref() {
            if let Some(index) = graph.index_of(node_id) {
                invalidated.extend(graph.dependents_closure(index));
            }
        }

        let mut cache = self.cache.write();
        let mut statuses = self.statuses.write();
        for id in &invalidated {
            cache.remove(id);
            if statuses.contains_key(id) {
                statuses.insert(id.clone(), NodeStatus::Idle);
            }
        }
        debug!(node = node_id, count = invalidated.len(), "invalidated outputs");
    }

    /* ─────────────────────── internals ─────────────────────── */

    fn set_status(&self, node_id: &str, status: NodeStatus, error: Option<&AppError>) {
        self.statuses
            .write()
            .insert(node_id.to_string(), status);
        self.events.emit(EngineEvent::NodeStatus {
            node_id: node_id.to_string(),
            status,
            error: error.cloned(),
        });
    }

    fn emit_progress(&self) {
        let stats = self.stats.lock().clone();
        self.events.emit(EngineEvent::Progress(stats));
    }

    fn run(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        target: Option<&str>,
    ) -> Result<RunOutcome, AppError> {
        if self
            .executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::execution("Execution already in progress")
                .with_code(codes::ALREADY_EXECUTING));
        }
        let _flight = FlightGuard(&self.executing);
        let run_started = Instant::now();

        let config = self.config.read().clone();
        let graph = ExecutionGraph::build(nodes, edges)?;

        // Resolve every executor before any work starts.
        let mut executors: Vec<Arc<dyn NodeExecutor>> = Vec::with_capacity(graph.len());
        for vertex in graph.vertices() {
            let executor = registry::get(&vertex.node_type).ok_or_else(|| {
                AppError::configuration(format!(
                    "No executor registered for node type '{}'",
                    vertex.node_type
                ))
                .with_code(codes::UNKNOWN_NODE_TYPE)
                .with_node(&vertex.id)
            })?;
            executors.push(executor);
        }

        // Scope to the target's ancestry for single-node runs.
        let included: Vec<bool> = match target {
            Some(id) => {
                let index = graph.index_of(id).ok_or_else(|| {
                    AppError::configuration(format!("Unknown node '{id}'"))
                })?;
                let closure = graph.ancestors_closure(index);
                (0..graph.len()).map(|i| closure.contains(&i)).collect()
            }
            None => vec![true; graph.len()],
        };
        let total: usize = included.iter().filter(|&&inc| inc).count();

        // Fresh run state.
        let cancel = CancelToken::new();
        *self.current_cancel.lock() = cancel.clone();
        self.failures.lock().clear();
        *self.stats.lock() = ExecutionStats {
            total_nodes: total,
            ..Default::default()
        };
        *self.last_graph.lock() = Some(graph.clone());
        for (i, vertex) in graph.vertices().iter().enumerate() {
            if included[i] {
                self.set_status(&vertex.id, NodeStatus::Idle, None);
            }
        }

        info!(nodes = total, max_level = graph.max_level(), "execution started");

        // Queue in analyzer order; every included node starts idle.
        let mut queue: VecDeque<QueueItem> = graph
            .execution_order()
            .iter()
            .filter(|&&i| included[i])
            .map(|&i| QueueItem {
                index: i,
                level: graph.vertex(i).level,
                retries: 0,
            })
            .collect();

        let mut unsettled_per_level: FxHashMap<u32, usize> = FxHashMap::default();
        for item in &queue {
            *unsettled_per_level.entry(item.level).or_insert(0) += 1;
        }

        let (tx, rx) = crossbeam_channel::unbounded::<TaskDone>();
        let mut active: FxHashMap<usize, ActiveTask> = FxHashMap::default();
        let mut completed: FxHashSet<usize> = FxHashSet::default();
        let mut failed: FxHashSet<usize> = FxHashSet::default();

        let outcome = loop {
            if cancel.is_cancelled() {
                // In-flight tasks observe the same token through their
                // child tokens and wind down on their own.
                let mut stats = self.stats.lock();
                stats.execution_time_ms = run_started.elapsed().as_millis() as u64;
                let stats = stats.clone();
                self.events.emit(EngineEvent::Complete {
                    success: false,
                    stats,
                });
                warn!("execution aborted");
                return Err(AppError::aborted());
            }

            // Greedily dispatch ready items up to the concurrency cap. A
            // task is ready when its dependencies are all completed and
            // every lower level is fully settled.
            let mut dispatched = 0usize;
            while active.len() < config.max_concurrent_executions {
                let position = queue.iter().position(|item| {
                    let vertex = graph.vertex(item.index);
                    vertex.dependencies.iter().all(|d| completed.contains(d))
                        && (0..item.level)
                            .all(|l| unsettled_per_level.get(&l).copied().unwrap_or(0) == 0)
                });
                let Some(position) = position else { break };
                let item = queue.remove(position).expect("position is valid");
                self.dispatch(item, &graph, &executors, &config, &cancel, &tx, &mut active);
                dispatched += 1;
            }

            if active.is_empty() {
                if queue.is_empty() {
                    break true; // drained
                }
                if dispatched == 0 {
                    // Everything left is blocked behind a failed
                    // dependency; those nodes stay idle.
                    debug!(blocked = queue.len(), "run stalled on failed dependencies");
                    break false;
                }
            }

            // Wait for the next completion, bounded by the earliest task
            // deadline and the cancellation tick.
            let wait = active
                .values()
                .map(|t| t.deadline.saturating_duration_since(Instant::now()))
                .min()
                .unwrap_or(LOOP_TICK)
                .min(LOOP_TICK);

            match rx.recv_timeout(wait) {
                Ok(done) => self.handle_done(
                    done,
                    &graph,
                    &config,
                    &mut queue,
                    &mut active,
                    &mut completed,
                    &mut failed,
                    &mut unsettled_per_level,
                ),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => unreachable!("engine holds a sender"),
            }

            // Expire overdue tasks: cancel the task, settle it as failed
            // (retry-eligible), and discard any late completion by attempt
            // id.
            let now = Instant::now();
            let overdue: Vec<usize> = active
                .iter()
                .filter(|(_, task)| task.deadline <= now)
                .map(|(&index, _)| index)
                .collect();
            for index in overdue {
                let task = active.remove(&index).expect("task is active");
                task.cancel.cancel();
                let vertex = graph.vertex(index);
                let error = AppError::timeout(config.execution_timeout.as_millis() as u64)
                    .with_node(&vertex.id);
                warn!(node = %vertex.id, "task timed out");
                self.settle_failure(
                    index,
                    task.retries,
                    task.level,
                    error,
                    &graph,
                    &config,
                    &mut queue,
                    &mut failed,
                    &mut unsettled_per_level,
                );
                self.emit_progress();
            }
        };

        let success = outcome && failed.is_empty() && completed.len() == total;
        let stats = {
            let mut stats = self.stats.lock();
            stats.execution_time_ms = run_started.elapsed().as_millis() as u64;
            stats.clone()
        };
        self.events.emit(EngineEvent::Complete {
            success,
            stats: stats.clone(),
        });
        info!(
            success,
            completed = stats.completed_nodes,
            failed = stats.failed_nodes,
            elapsed_ms = stats.execution_time_ms,
            "execution finished"
        );
        Ok(RunOutcome { success, stats })
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        item: QueueItem,
        graph: &ExecutionGraph,
        executors: &[Arc<dyn NodeExecutor>],
        config: &EngineConfig,
        run_cancel: &CancelToken,
        tx: &Sender<TaskDone>,
        active: &mut FxHashMap<usize, ActiveTask>,
    ) {
        let vertex = graph.vertex(item.index);
        let attempt = self.attempt_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let task_cancel = run_cancel.child();
        let deadline = Instant::now() + config.execution_timeout;

        // Route upstream outputs to inputs, in edge-port order. Dependencies
        // are all completed, so the cache holds every needed value.
        let inputs: Vec<InputBinding> = {
            let cache = self.cache.read();
            vertex
                .input_ports
                .iter()
                .filter_map(|(port, source)| {
                    let source_id = &graph.vertex(*source).id;
                    cache.get(source_id).map(|cached| InputBinding {
                        source: source_id.clone(),
                        port: port.clone(),
                        value: Arc::clone(&cached.value),
                    })
                })
                .collect()
        };

        let ctx = ExecutionContext {
            node_id: vertex.id.clone(),
            execution_id: format!("exec-{attempt}"),
            config: vertex.config.clone(),
            inputs,
            started_at: Utc::now(),
            deadline: Some(deadline),
            cancel: task_cancel.clone(),
        };

        self.set_status(&vertex.id, NodeStatus::Processing, None);
        debug!(node = %vertex.id, attempt, retries = item.retries, "dispatching");

        let executor = Arc::clone(&executors[item.index]);
        let sender = tx.clone();
        let index = item.index;
        let spawned = thread::Builder::new()
            .name(format!("tabflow-task-{}", vertex.id))
            .spawn(move || {
                let result = run_node(executor.as_ref(), &ctx);
                // The engine may have moved on (timeout); send failures are
                // expected then.
                let _ = sender.send(TaskDone {
                    index,
                    attempt,
                    result,
                });
            });

        match spawned {
            Ok(_) => {
                active.insert(
                    item.index,
                    ActiveTask {
                        attempt,
                        level: item.level,
                        retries: item.retries,
                        deadline,
                        cancel: task_cancel,
                    },
                );
            }
            Err(e) => {
                // Treat a spawn failure like an immediate task failure.
                let error =
                    AppError::execution(format!("Failed to spawn worker: {e}")).with_node(&vertex.id);
                let _ = tx.send(TaskDone {
                    index,
                    attempt,
                    result: ExecutionResult::failure(
                        error,
                        ExecutionMetadata {
                            node_id: vertex.id.clone(),
                            execution_id: format!("exec-{attempt}"),
                            started_at: Utc::now(),
                        },
                        Duration::ZERO,
                    ),
                });
                active.insert(
                    item.index,
                    ActiveTask {
                        attempt,
                        level: item.level,
                        retries: item.retries,
                        deadline,
                        cancel: task_cancel,
                    },
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_done(
        &self,
        done: TaskDone,
        graph: &ExecutionGraph,
        config: &EngineConfig,
        queue: &mut VecDeque<QueueItem>,
        active: &mut FxHashMap<usize, ActiveTask>,
        completed: &mut FxHashSet<usize>,
        failed: &mut FxHashSet<usize>,
        unsettled_per_level: &mut FxHashMap<u32, usize>,
    ) {
        // A completion from a superseded attempt (timed out earlier) is
        // discarded; its partial result must not reach the cache.
        let stale = active
            .get(&done.index)
            .map(|task| task.attempt != done.attempt)
            .unwrap_or(true);
        if stale {
            debug!(index = done.index, attempt = done.attempt, "discarding stale completion");
            return;
        }
        let task = active.remove(&done.index).expect("checked above");
        let vertex = graph.vertex(done.index);

        if done.result.success {
            let value = done.result.output.expect("success carries an output");
            self.cache.write().insert(
                vertex.id.clone(),
                CachedOutput {
                    value,
                    completed_at: Utc::now(),
                    duration: done.result.execution_time,
                },
            );
            completed.insert(done.index);
            settle_level(unsettled_per_level, task.level);
            self.stats.lock().completed_nodes += 1;
            self.set_status(&vertex.id, NodeStatus::Success, None);
            debug!(node = %vertex.id, elapsed = ?done.result.execution_time, "task succeeded");
        } else {
            let error = done
                .result
                .error
                .unwrap_or_else(|| AppError::execution("Unknown failure").with_node(&vertex.id));
            self.settle_failure(
                done.index,
                task.retries,
                task.level,
                error,
                graph,
                config,
                queue,
                failed,
                unsettled_per_level,
            );
        }
        self.emit_progress();
    }

    #[allow(clippy::too_many_arguments)]
    fn settle_failure(
        &self,
        index: usize,
        retries: u32,
        level: u32,
        error: AppError,
        graph: &ExecutionGraph,
        config: &EngineConfig,
        queue: &mut VecDeque<QueueItem>,
        failed: &mut FxHashSet<usize>,
        unsettled_per_level: &mut FxHashMap<u32, usize>,
    ) {
        let vertex = graph.vertex(index);
        if retries < config.max_retries {
            self.stats.lock().retried_tasks += 1;
            // Back to idle with the error attached so observers can see
            // the retry; the item re-enters the queue with its count
            // bumped and the node stays unsettled at its level.
            self.set_status(&vertex.id, NodeStatus::Idle, Some(&error));
            debug!(node = %vertex.id, retry = retries + 1, "re-queueing after failure");
            queue.push_back(QueueItem {
                index,
                level,
                retries: retries + 1,
            });
        } else {
            failed.insert(index);
            settle_level(unsettled_per_level, level);
            self.stats.lock().failed_nodes += 1;
            self.failures.lock().insert(vertex.id.clone(), error.clone());
            self.set_status(&vertex.id, NodeStatus::Error, Some(&error));
            warn!(node = %vertex.id, error = %error, "node failed permanently");
        }
    }
}

fn settle_level(unsettled_per_level: &mut FxHashMap<u32, usize>, level: u32) {
    if let Some(count) = unsettled_per_level.get_mut(&level) {
        *count = count.saturating_sub(1);
    }
}
