//! Published variable management
//!
//! Workflows build an [`OutputSet`] and return it; the publisher commits
//! the set as a unit, so a failing workflow records nothing. Every
//! recorded pair is exported to the process environment immediately and
//! appended to the candidate sink files at finalize.

use crate::error::PrepError;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Ordered set of variables produced by one workflow.
#[derive(Debug, Default, Clone)]
pub struct OutputSet {
    entries: Vec<(String, String)>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, overwriting an earlier value for the same key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shape recommended for output keys; a mismatch is a warning, not an error.
fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid key pattern"))
}

/// Accumulates published variables for one run and flushes them to the
/// configured sink files.
pub struct OutputPublisher {
    outputs: OutputSet,
    sinks: Vec<PathBuf>,
    require_sink: bool,
}

impl OutputPublisher {
    /// Publisher with the standard candidate sinks.
    pub fn new(require_sink: bool) -> Self {
        Self::with_sinks(candidate_sinks(), require_sink)
    }

    /// Publisher with explicit sink candidates.
    pub fn with_sinks(sinks: Vec<PathBuf>, require_sink: bool) -> Self {
        Self {
            outputs: OutputSet::new(),
            sinks,
            require_sink,
        }
    }

    /// Record one variable and export it to the process environment, so
    /// later steps of the same run can read it back.
    pub fn record(&mut self, key: &str, value: &str) -> Result<(), PrepError> {
        if key.is_empty() {
            return Err(PrepError::InvalidOutputKey);
        }
        if !key_pattern().is_match(key) {
            tracing::warn!("Output key '{}' may cause issues in some environments", key);
        }

        self.outputs.set(key, value);
        std::env::set_var(key, value);

        tracing::info!("EXPORTED: {}={}", key, truncate_for_log(value, 50));
        Ok(())
    }

    /// Commit a workflow's variables in order.
    pub fn commit(&mut self, set: &OutputSet) -> Result<(), PrepError> {
        for (key, value) in set.iter() {
            self.record(key, value)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.outputs.get(key)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Append the accumulated variables to every writable sink.
    ///
    /// Individual write failures are logged and the loop continues.
    /// Zero successful sinks is an error only under `require_sink`; the
    /// variables remain visible through the process environment either
    /// way. Returns the number of sinks written.
    pub fn finalize(&self) -> Result<usize, PrepError> {
        if self.outputs.is_empty() {
            tracing::info!("No outputs to write");
            return Ok(0);
        }

        let mut written = 0usize;
        for path in &self.sinks {
            match self.append_to(path) {
                Ok(()) => {
                    written += 1;
                    tracing::info!("Wrote {} outputs to: {}", self.outputs.len(), path.display());
                }
                Err(err) => {
                    tracing::warn!("Failed to write sink {}: {}", path.display(), err);
                }
            }
        }

        if written == 0 && self.require_sink {
            return Err(PrepError::NoWritableSink);
        }

        tracing::info!("Generated {} output variables", self.outputs.len());
        Ok(written)
    }

    fn append_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        for (key, value) in self.outputs.iter() {
            writeln!(file, "{}=\"{}\"", key, escape_value(value))?;
        }
        Ok(())
    }
}

/// Candidate destinations in priority order; env-configured files first.
fn candidate_sinks() -> Vec<PathBuf> {
    let mut sinks = Vec::new();
    for var in ["DRONE_OUTPUT", "DRONE_STEP_ENV"] {
        if let Ok(path) = std::env::var(var) {
            if !path.is_empty() {
                sinks.push(PathBuf::from(path));
            }
        }
    }
    sinks.push(PathBuf::from("/drone/src/output.env"));
    // Fallback location
    sinks.push(PathBuf::from("/tmp/drone_outputs.env"));
    sinks
}

/// Escape quoting and interpolation characters for key="value" lines.
fn escape_value(value: &str) -> String {
    value.replace('"', "\\\"").replace('$', "\\$")
}

fn truncate_for_log(value: &str, max: usize) -> String {
    if value.len() > max {
        let cut = value
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);
        format!("{}...", &value[..cut])
    } else {
        value.to_string()
    }
}
