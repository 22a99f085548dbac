//! Logger capability handed to scripts.
//!
//! Script messages are recorded per invocation and emitted through `tracing`
//! under the `sharelink::script` target with the script's type attached.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, error, info, warn};

const MAX_ENTRIES: usize = 1_000;
const MAX_MESSAGE_CHARS: usize = 4_096;

/// Severity of a script log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for ScriptLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// One line a script logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptLogEntry {
    pub level: ScriptLogLevel,
    pub message: String,
}

#[derive(Clone)]
pub(crate) struct ScriptLogger {
    parser_type: Arc<str>,
    entries: Arc<Mutex<Vec<ScriptLogEntry>>>,
}

impl ScriptLogger {
    pub(crate) fn new(parser_type: &str) -> Self {
        Self {
            parser_type: Arc::from(parser_type),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn log(&self, level: ScriptLogLevel, message: &str) {
        let message: String = message.chars().take(MAX_MESSAGE_CHARS).collect();
        let parser_type = &*self.parser_type;
        match level {
            ScriptLogLevel::Debug => debug!(target: "sharelink::script", parser_type, "{message}"),
            ScriptLogLevel::Info => info!(target: "sharelink::script", parser_type, "{message}"),
            ScriptLogLevel::Warn => warn!(target: "sharelink::script", parser_type, "{message}"),
            ScriptLogLevel::Error => error!(target: "sharelink::script", parser_type, "{message}"),
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() < MAX_ENTRIES {
            entries.push(ScriptLogEntry { level, message });
        }
    }

    pub(crate) fn take_entries(&self) -> Vec<ScriptLogEntry> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
