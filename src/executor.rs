//! # Execution Engine
//!
//! Compiles and runs a supplied program inside an ephemeral, exclusively-owned
//! workspace and reports progress through the event bus. One call to
//! [`Executor::execute`] drives the full lifecycle:
//!
//! ```text
//! Starting → Compiling → { CompileError | Running → { Completed | Error } }
//! ```
//!
//! Faults never escape to the caller: environment problems, compiler
//! diagnostics, runtime failures, timeouts and I/O errors are all folded into
//! the returned [`ExecutionRecord`]. The record store keeps results for later
//! lookup and for replay-on-join delivery to late event subscribers.

use std::num::NonZeroUsize;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::event_bus::{EventBus, ExecutionEvent};

pub type ExecutionId = String;

/// Lifecycle state of one execution. The last three states are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Starting,
    Compiling,
    Running,
    CompileError,
    Error,
    Completed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::CompileError | ExecutionStatus::Error | ExecutionStatus::Completed
        )
    }
}

/// Result of one compile-and-run attempt.
///
/// The wire shape is exactly `{output, error, status_code, execution_time}`;
/// the lifecycle status travels separately in events and is skipped here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub output: String,
    pub error: String,
    pub status_code: i32,
    pub execution_time: f64,
    #[serde(skip)]
    pub status: ExecutionStatus,
}

impl Default for ExecutionRecord {
    fn default() -> Self {
        Self {
            output: String::new(),
            error: String::new(),
            status_code: 0,
            execution_time: 0.0,
            status: ExecutionStatus::Starting,
        }
    }
}

impl ExecutionRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Capacity-bounded store of execution records, execution id → record.
///
/// Records are written through their non-terminal states and become immutable
/// once terminal: a write against a terminal record is refused. When the
/// capacity is exceeded the least recently used record is evicted.
pub struct ExecutionStore {
    records: Mutex<LruCache<ExecutionId, ExecutionRecord>>,
}

impl ExecutionStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            records: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Inserts or updates the record for `execution_id`. Returns `false`
    /// without writing when the stored record is already terminal.
    pub fn insert(&self, execution_id: &str, record: ExecutionRecord) -> bool {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = records.peek(execution_id) {
            if existing.is_terminal() {
                warn!(
                    execution_id,
                    "refusing to overwrite terminal execution record"
                );
                return false;
            }
        }
        records.put(execution_id.to_string(), record);
        true
    }

    pub fn get(&self, execution_id: &str) -> Option<ExecutionRecord> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.get(execution_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The compile-and-run engine.
///
/// The compiler toolchain is probed once at construction; if it is missing
/// the engine degrades to returning a fixed error record for every request.
pub struct Executor {
    config: ExecutorConfig,
    store: Arc<ExecutionStore>,
    events: Arc<EventBus>,
    toolchain_available: bool,
}

impl Executor {
    pub async fn new(config: ExecutorConfig, store: Arc<ExecutionStore>, events: Arc<EventBus>) -> Self {
        let toolchain_available = Self::probe_toolchain(&config.compiler).await;
        if toolchain_available {
            info!(compiler = %config.compiler, "compiler toolchain found");
        } else {
            warn!(
                compiler = %config.compiler,
                "compiler toolchain not found, executions will fail immediately"
            );
        }
        Self {
            config,
            store,
            events,
            toolchain_available,
        }
    }

    async fn probe_toolchain(compiler: &str) -> bool {
        Command::new(compiler)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    pub fn toolchain_available(&self) -> bool {
        self.toolchain_available
    }

    pub fn store(&self) -> Arc<ExecutionStore> {
        self.store.clone()
    }

    /// Compiles and runs `code`, optionally feeding `input` to the program's
    /// standard input. Returns the execution id together with the terminal
    /// record; all faults are captured in the record.
    #[tracing::instrument(skip(self, code, input))]
    pub async fn execute(
        &self,
        code: &str,
        input: &str,
        execution_id: Option<ExecutionId>,
    ) -> (ExecutionId, ExecutionRecord) {
        let execution_id = execution_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let started = Instant::now();
        let mut record = ExecutionRecord::default();

        if !self.toolchain_available {
            record.error = format!(
                "Compiler `{}` is not available. Please install it or adjust the executor configuration.",
                self.config.compiler
            );
            record.status_code = 1;
            record.status = ExecutionStatus::Error;
            record.execution_time = started.elapsed().as_secs_f64();
            self.store.insert(&execution_id, record.clone());
            self.events
                .publish(&execution_id, ExecutionEvent::terminal(&record));
            return (execution_id, record);
        }

        self.transition(&execution_id, &mut record, ExecutionStatus::Starting);

        if let Err(e) = self.run_pipeline(&execution_id, code, input, &mut record).await {
            record.error = format!("Unexpected error: {}", e);
            record.status_code = 1;
            record.status = ExecutionStatus::Error;
        }

        record.execution_time = started.elapsed().as_secs_f64();
        self.store.insert(&execution_id, record.clone());
        self.events
            .publish(&execution_id, ExecutionEvent::terminal(&record));
        debug!(
            execution_id,
            status = %record.status,
            status_code = record.status_code,
            "execution finished"
        );
        (execution_id, record)
    }

    /// Workspace acquisition, compile and run. Leaves `record` in a terminal
    /// state on return; I/O faults bubble up for the caller to capture. The
    /// workspace directory is removed on every exit path when the `TempDir`
    /// guard goes out of scope.
    async fn run_pipeline(
        &self,
        execution_id: &str,
        code: &str,
        input: &str,
        record: &mut ExecutionRecord,
    ) -> std::io::Result<()> {
        let workspace = tempfile::Builder::new().prefix("crucible-").tempdir()?;
        let source_path = workspace
            .path()
            .join(format!("program.{}", self.config.source_extension));
        let binary_path = workspace.path().join("program");
        tokio::fs::write(&source_path, code).await?;

        self.transition(execution_id, record, ExecutionStatus::Compiling);

        let child = Command::new(&self.config.compiler)
            .arg("-o")
            .arg(&binary_path)
            .arg(&source_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let compiled = match timeout(self.config.compile_timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                record.error = format!(
                    "Compilation timed out after {} seconds",
                    self.config.compile_timeout.as_secs()
                );
                record.status_code = 1;
                record.status = ExecutionStatus::Error;
                return Ok(());
            }
        };
        if !compiled.status.success() {
            record.error = String::from_utf8_lossy(&compiled.stderr).into_owned();
            record.status_code = compiled.status.code().unwrap_or(1);
            record.status = ExecutionStatus::CompileError;
            return Ok(());
        }

        self.transition(execution_id, record, ExecutionStatus::Running);

        let stdin = if input.is_empty() {
            Stdio::null()
        } else {
            let input_path = workspace.path().join("input.txt");
            tokio::fs::write(&input_path, input).await?;
            Stdio::from(std::fs::File::open(&input_path)?)
        };
        let child = Command::new(&binary_path)
            .current_dir(workspace.path())
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        match timeout(self.config.run_timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                record.output = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.is_empty() {
                    record.error = stderr.into_owned();
                }
                record.status_code = output.status.code().unwrap_or(1);
                record.status = ExecutionStatus::Completed;
            }
            Err(_) => {
                record.error = format!(
                    "Execution timed out after {} seconds",
                    self.config.run_timeout.as_secs()
                );
                record.status_code = 1;
                record.status = ExecutionStatus::Error;
            }
        }
        Ok(())
    }

    fn transition(&self, execution_id: &str, record: &mut ExecutionRecord, status: ExecutionStatus) {
        record.status = status;
        self.store.insert(execution_id, record.clone());
        self.events
            .publish(execution_id, ExecutionEvent::status(status));
    }
}
