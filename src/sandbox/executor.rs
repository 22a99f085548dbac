//! Runs one entry point of a script on the blocking pool under the sandbox limits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rhai::{Array, Dynamic, EvalAltResult, Scope};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::convert::{describe_thrown, dynamic_to_json};
use super::engine::{TERMINATED_BY_CALLER, invocation_engine};
use super::http_api::ScriptHttp;
use super::logger::{ScriptLogEntry, ScriptLogger};
use super::promise::ScriptPromise;
use super::share_api::ScriptShare;
use super::{SandboxError, SandboxLimits, ScriptProgram};
use crate::model::{FileInfo, ShareLinkInfo};
use crate::resolver::{HttpFetch, ResolveError};

/// Extra time the awaiting side grants past the script deadline before it
/// gives up on the blocking task.
const JOIN_GRACE: Duration = Duration::from_millis(500);

/// Why a script produced no usable value.
#[derive(Debug, Clone)]
pub(crate) enum ScriptFailure {
    /// The script threw, or its returned promise was rejected.
    Rejected(String),
    /// The sandbox stopped or rejected the script.
    Sandbox(SandboxError),
}

impl ScriptFailure {
    pub(crate) fn into_resolve_error(self, parser_type: &str) -> ResolveError {
        match self {
            Self::Rejected(reason) => ResolveError::resolution_failed(parser_type, reason),
            Self::Sandbox(error) => ResolveError::sandbox(parser_type, error),
        }
    }
}

/// Everything one invocation produced.
pub(crate) struct ScriptRun {
    pub(crate) outcome: Result<Dynamic, ScriptFailure>,
    pub(crate) logs: Vec<ScriptLogEntry>,
    /// Parameters the script added through `share.put_param`.
    pub(crate) params: Map<String, Value>,
}

/// Sets the cancellation flag when the awaiting future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Calls `entry_point(share, http, logger)` and settles a returned promise.
///
/// Must be awaited inside a Tokio runtime; the script itself runs on the
/// blocking pool and performs HTTP through `fetch` on the current runtime.
pub(crate) async fn invoke(
    program: &ScriptProgram,
    entry_point: &'static str,
    info: &ShareLinkInfo,
    fetch: Arc<dyn HttpFetch>,
    limits: SandboxLimits,
) -> ScriptRun {
    let parser_type = info.parser_type().to_string();
    let deadline = Instant::now() + limits.timeout;
    let cancelled = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(Arc::clone(&cancelled));

    let share = ScriptShare::new(info.clone());
    let logger = ScriptLogger::new(&parser_type);
    let http = ScriptHttp::new(fetch, Handle::current(), deadline, &parser_type);

    let task = {
        let program = program.clone();
        let share = share.clone();
        let logger = logger.clone();
        let cancelled = Arc::clone(&cancelled);
        tokio::task::spawn_blocking(move || {
            let engine = invocation_engine(&limits, deadline, cancelled, &logger);
            let mut scope = Scope::new();
            engine
                .call_fn::<Dynamic>(
                    &mut scope,
                    program.ast(),
                    entry_point,
                    (share, http, logger),
                )
                .map_err(|error| classify(error, limits.timeout))
                .and_then(|value| settle(value, entry_point))
        })
    };

    debug!(parser_type = %parser_type, entry_point, timeout = ?limits.timeout, "Script invoked");
    let outcome = match tokio::time::timeout(limits.timeout + JOIN_GRACE, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => {
            warn!(parser_type = %parser_type, error = %join_error, "Script task aborted");
            Err(ScriptFailure::Sandbox(SandboxError::runtime(format!(
                "script task aborted: {join_error}"
            ))))
        }
        Err(_) => {
            cancelled.store(true, Ordering::Relaxed);
            Err(ScriptFailure::Sandbox(SandboxError::Timeout {
                timeout: limits.timeout,
            }))
        }
    };

    ScriptRun {
        outcome,
        logs: logger.take_entries(),
        params: share.take_additions(),
    }
}

/// Maps an engine error to a failure; thrown values keep their message.
fn classify(error: Box<EvalAltResult>, timeout: Duration) -> ScriptFailure {
    match *error {
        EvalAltResult::ErrorInFunctionCall(.., inner, _) => classify(inner, timeout),
        EvalAltResult::ErrorRuntime(value, _) => ScriptFailure::Rejected(describe_thrown(&value)),
        EvalAltResult::ErrorTerminated(token, _) => {
            if token.as_int().ok() == Some(TERMINATED_BY_CALLER) {
                ScriptFailure::Sandbox(SandboxError::Cancelled)
            } else {
                ScriptFailure::Sandbox(SandboxError::Timeout { timeout })
            }
        }
        other => ScriptFailure::Sandbox(SandboxError::runtime(other.to_string())),
    }
}

/// Unwraps a returned promise into its settled value.
fn settle(value: Dynamic, entry_point: &str) -> Result<Dynamic, ScriptFailure> {
    let Some(promise) = value.clone().try_cast::<ScriptPromise>() else {
        return Ok(value);
    };
    match promise.outcome() {
        Some(Ok(settled)) => Ok(settled),
        Some(Err(reason)) => Err(ScriptFailure::Rejected(describe_thrown(&reason))),
        None => Err(ScriptFailure::Sandbox(SandboxError::invalid_return(
            entry_point,
            "returned a promise that never settled",
        ))),
    }
}

/// Expects a non-empty string.
pub(crate) fn into_direct_url(value: Dynamic, entry_point: &str) -> Result<String, ScriptFailure> {
    if value.is_unit() {
        return Err(ScriptFailure::Sandbox(SandboxError::invalid_return(
            entry_point,
            "expected a URL string, got nothing",
        )));
    }
    let type_name = value.type_name();
    let url = value.into_string().map_err(|_| {
        ScriptFailure::Sandbox(SandboxError::invalid_return(
            entry_point,
            format!("expected a URL string, got {type_name}"),
        ))
    })?;
    let url = url.trim();
    if url.is_empty() {
        return Err(ScriptFailure::Sandbox(SandboxError::invalid_return(
            entry_point,
            "returned an empty URL",
        )));
    }
    Ok(url.to_string())
}

/// Expects an array of maps shaped like [`FileInfo`] (camelCase keys).
pub(crate) fn into_file_list(value: Dynamic, entry_point: &str) -> Result<Vec<FileInfo>, ScriptFailure> {
    let type_name = value.type_name();
    let items = value.try_cast::<Array>().ok_or_else(|| {
        ScriptFailure::Sandbox(SandboxError::invalid_return(
            entry_point,
            format!("expected an array of file maps, got {type_name}"),
        ))
    })?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let json = dynamic_to_json(item);
            if !json.is_object() {
                return Err(ScriptFailure::Sandbox(SandboxError::invalid_return(
                    entry_point,
                    format!("item {index} is not a map"),
                )));
            }
            serde_json::from_value::<FileInfo>(json).map_err(|error| {
                ScriptFailure::Sandbox(SandboxError::invalid_return(
                    entry_point,
                    format!("item {index}: {error}"),
                ))
            })
        })
        .collect()
}
