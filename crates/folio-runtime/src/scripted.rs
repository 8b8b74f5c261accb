//! Deterministic in-process runtime for tests.
//!
//! Race-sensitive tests need to control exactly when a kernel call returns
//! and when its result settles. `ScriptedRuntime` records every invocation,
//! counts aborts per operation, and lets a test hold either phase of the
//! two-phase call behind a gate it releases explicitly.

use crate::errors::RuntimeError;
use crate::kernel::{
    DocumentScope, KernelRuntime, PythonResult, SqlResult, VisualizationResult,
};
use crate::operation::{AbortFn, Operation};
use async_trait::async_trait;
use folio_doc::BlockId;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

enum Script {
    /// Settle the operation's result with this outcome as soon as awaited.
    Resolve(Result<Value, RuntimeError>),
    /// Fail the kernel call itself, before an operation handle exists.
    RejectCall(RuntimeError),
    /// Park the kernel call until the test releases the gate.
    HoldCall {
        entered: oneshot::Sender<()>,
        release: oneshot::Receiver<()>,
    },
    /// Return the operation immediately but park its result until resolved.
    HoldResult {
        awaited: oneshot::Sender<()>,
        outcome: oneshot::Receiver<Result<Value, RuntimeError>>,
    },
}

/// Test-side handle for a held kernel call (phase one of the operation).
pub struct CallGate {
    entered: oneshot::Receiver<()>,
    release: Option<oneshot::Sender<()>>,
}

impl CallGate {
    /// Resolves once the runtime has entered the held call.
    pub async fn entered(&mut self) {
        let _ = (&mut self.entered).await;
    }

    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
    }
}

/// Test-side handle for a held operation result (phase two).
pub struct ResultGate {
    awaited: oneshot::Receiver<()>,
    outcome: Option<oneshot::Sender<Result<Value, RuntimeError>>>,
}

impl ResultGate {
    /// Resolves once the executor has started awaiting the operation result,
    /// which is strictly after its cancellation check.
    pub async fn awaited(&mut self) {
        let _ = (&mut self.awaited).await;
    }

    pub fn resolve(mut self, outcome: Result<Value, RuntimeError>) {
        if let Some(tx) = self.outcome.take() {
            let _ = tx.send(outcome);
        }
    }
}

#[derive(Default)]
struct ScriptedState {
    scripts: HashMap<String, VecDeque<Script>>,
    calls: Vec<String>,
    aborts: HashMap<String, usize>,
}

/// Operation keys are `"bind:{name}"`, `"sql:{block}"`, `"python:{block}"`,
/// and `"viz:{block}"`. Unscripted calls resolve immediately with a default
/// result.
#[derive(Default)]
pub struct ScriptedRuntime {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, key: &str, script: Script) {
        let mut state = self.state.lock().expect("scripted runtime lock");
        state
            .scripts
            .entry(key.to_string())
            .or_default()
            .push_back(script);
    }

    /// Scripts the next call for `key` to settle with `outcome`.
    pub fn respond(&self, key: &str, outcome: Result<Value, RuntimeError>) {
        self.push(key, Script::Resolve(outcome));
    }

    /// Scripts the next call for `key` to fail at the call itself.
    pub fn reject_call(&self, key: &str, error: RuntimeError) {
        self.push(key, Script::RejectCall(error));
    }

    /// Parks the next call for `key` until the returned gate is released.
    pub fn hold_call(&self, key: &str) -> CallGate {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.push(
            key,
            Script::HoldCall {
                entered: entered_tx,
                release: release_rx,
            },
        );
        CallGate {
            entered: entered_rx,
            release: Some(release_tx),
        }
    }

    /// Parks the next result for `key` until the returned gate resolves it.
    pub fn hold_result(&self, key: &str) -> ResultGate {
        let (awaited_tx, awaited_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        self.push(
            key,
            Script::HoldResult {
                awaited: awaited_tx,
                outcome: outcome_rx,
            },
        );
        ResultGate {
            awaited: awaited_rx,
            outcome: Some(outcome_tx),
        }
    }

    /// Every invocation key, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().expect("scripted runtime lock").calls.clone()
    }

    pub fn call_count(&self, key: &str) -> usize {
        let state = self.state.lock().expect("scripted runtime lock");
        state.calls.iter().filter(|call| call.as_str() == key).count()
    }

    pub fn abort_count(&self, key: &str) -> usize {
        let state = self.state.lock().expect("scripted runtime lock");
        state.aborts.get(key).copied().unwrap_or(0)
    }

    async fn begin<T>(
        &self,
        key: String,
        decode: fn(Value) -> T,
    ) -> Result<Operation<T>, RuntimeError>
    where
        T: Default + Send + 'static,
    {
        let script = {
            let mut state = self.state.lock().expect("scripted runtime lock");
            state.calls.push(key.clone());
            state
                .scripts
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
        };

        let abort = self.abort_fn(key);
        match script {
            None => Ok(Operation {
                result: Box::pin(async move { Ok(T::default()) }),
                abort,
            }),
            Some(Script::Resolve(outcome)) => Ok(Operation {
                result: Box::pin(async move { outcome.map(decode) }),
                abort,
            }),
            Some(Script::RejectCall(error)) => Err(error),
            Some(Script::HoldCall { entered, release }) => {
                let _ = entered.send(());
                let _ = release.await;
                Ok(Operation {
                    result: Box::pin(async move { Ok(T::default()) }),
                    abort,
                })
            }
            Some(Script::HoldResult { awaited, outcome }) => Ok(Operation {
                result: Box::pin(async move {
                    let _ = awaited.send(());
                    match outcome.await {
                        Ok(outcome) => outcome.map(decode),
                        Err(_) => Err(RuntimeError::OperationFailed(
                            "scripted outcome dropped".to_string(),
                        )),
                    }
                }),
                abort,
            }),
        }
    }

    fn abort_fn(&self, key: String) -> AbortFn {
        let state = Arc::clone(&self.state);
        Box::new(move || {
            Box::pin(async move {
                let mut state = state.lock().expect("scripted runtime lock");
                *state.aborts.entry(key).or_insert(0) += 1;
            })
        })
    }
}

fn decode_or_default<T: Default + serde::de::DeserializeOwned>(raw: Value) -> T {
    serde_json::from_value(raw).unwrap_or_default()
}

#[async_trait]
impl KernelRuntime for ScriptedRuntime {
    async fn bind_variable(
        &self,
        _scope: &DocumentScope,
        name: &str,
        _value: Value,
    ) -> Result<Operation<()>, RuntimeError> {
        self.begin(format!("bind:{name}"), |_| ()).await
    }

    async fn run_sql(
        &self,
        _scope: &DocumentScope,
        block: &BlockId,
        _query: &str,
    ) -> Result<Operation<SqlResult>, RuntimeError> {
        self.begin(format!("sql:{block}"), decode_or_default).await
    }

    async fn run_python(
        &self,
        _scope: &DocumentScope,
        block: &BlockId,
        _source: &str,
    ) -> Result<Operation<PythonResult>, RuntimeError> {
        self.begin(format!("python:{block}"), decode_or_default).await
    }

    async fn render_visualization(
        &self,
        _scope: &DocumentScope,
        source_block: &BlockId,
        _spec: &Value,
    ) -> Result<Operation<VisualizationResult>, RuntimeError> {
        self.begin(format!("viz:{source_block}"), decode_or_default)
            .await
    }
}
