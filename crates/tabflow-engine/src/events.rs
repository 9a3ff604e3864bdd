//! Outbound event stream, decoupled from scheduling.
//!
//! The engine emits events into an unbounded channel; a dedicated listener
//! thread drains it and invokes the registered callbacks. A slow or
//! panicking callback therefore never sits on the scheduling path and never
//! affects a run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use tracing::warn;

use tabflow_common::AppError;

use crate::engine::ExecutionStats;
use crate::graph::NodeStatus;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    NodeStatus {
        node_id: String,
        status: NodeStatus,
        error: Option<AppError>,
    },
    Progress(ExecutionStats),
    Complete {
        success: bool,
        stats: ExecutionStats,
    },
}

pub type StatusCallback = Arc<dyn Fn(&str, NodeStatus, Option<&AppError>) + Send + Sync>;
pub type ProgressCallback = Arc<dyn Fn(&ExecutionStats) + Send + Sync>;
pub type CompleteCallback = Arc<dyn Fn(bool, &ExecutionStats) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_node_status_change: Option<StatusCallback>,
    pub on_execution_progress: Option<ProgressCallback>,
    pub on_execution_complete: Option<CompleteCallback>,
}

impl Callbacks {
    pub fn on_status<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, NodeStatus, Option<&AppError>) + Send + Sync + 'static,
    {
        self.on_node_status_change = Some(Arc::new(f));
        self
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutionStats) + Send + Sync + 'static,
    {
        self.on_execution_progress = Some(Arc::new(f));
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(bool, &ExecutionStats) + Send + Sync + 'static,
    {
        self.on_execution_complete = Some(Arc::new(f));
        self
    }
}

pub struct EventHub {
    tx: Sender<EngineEvent>,
    callbacks: Arc<RwLock<Callbacks>>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<EngineEvent>();
        let callbacks: Arc<RwLock<Callbacks>> = Arc::default();

        let listener_callbacks = Arc::clone(&callbacks);
        // Detached: the thread exits when the sender side is dropped.
        let _ = thread::Builder::new()
            .name("tabflow-events".to_string())
            .spawn(move || {
                for event in rx {
                    let callbacks = listener_callbacks.read().clone();
                    if catch_unwind(AssertUnwindSafe(|| dispatch(&callbacks, &event))).is_err() {
                        warn!("event callback panicked; event dropped");
                    }
                }
            });

        Self { tx, callbacks }
    }

    pub fn set_callbacks(&self, callbacks: Callbacks) {
        *self.callbacks.write() = callbacks;
    }

    pub fn emit(&self, event: EngineEvent) {
        // The listener may already be gone during shutdown; dropping the
        // event is the right behavior then.
        let _ = self.tx.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(callbacks: &Callbacks, event: &EngineEvent) {
    match event {
        EngineEvent::NodeStatus {
            node_id,
            status,
            error,
        } => {
            if let Some(cb) = &callbacks.on_node_status_change {
                cb(node_id, *status, error.as_ref());
            }
        }
        EngineEvent::Progress(stats) => {
            if let Some(cb) = &callbacks.on_execution_progress {
                cb(stats);
            }
        }
        EngineEvent::Complete { success, stats } => {
            if let Some(cb) = &callbacks.on_execution_complete {
                cb(*success, stats);
            }
        }
    }
}
