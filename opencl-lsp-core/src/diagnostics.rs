//! Component B — Diagnostics Engine.

use lsp_types::Diagnostic;
use serde_json::Value;
use std::path::Path;

use crate::buildlog::parse_build_log;
use crate::device::{enumerate_all, ClBackend, DeviceRecord};
use crate::error::{Error, Result};

const DEFAULT_MAX_PROBLEMS: usize = 100;

/// A compilation request. `file_path` only ever affects the
/// `source` field of the resulting diagnostics — it is never opened or read.
#[derive(Debug, Clone, Default)]
pub struct SourceJob {
    pub text: String,
    pub file_path: Option<String>,
}

impl SourceJob {
    pub fn new(text: impl Into<String>) -> Self {
        SourceJob {
            text: text.into(),
            file_path: None,
        }
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    fn display_source(&self) -> Option<String> {
        let path = self.file_path.as_ref()?;
        Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
    }
}

/// Compiles source strings on a selected OpenCL device and turns the resulting build
/// log into LSP diagnostics.
pub struct DiagnosticsEngine {
    backend: Box<dyn ClBackend>,
    selected: Option<DeviceRecord>,
    build_options: String,
    max_problems: usize,
}

impl DiagnosticsEngine {
    pub fn new(backend: Box<dyn ClBackend>) -> Self {
        DiagnosticsEngine {
            backend,
            selected: None,
            build_options: String::new(),
            max_problems: DEFAULT_MAX_PROBLEMS,
        }
    }

    /// Concatenate `options` with single spaces and store as the compiler invocation
    /// flag string. A non-string entry aborts the whole update (previous value kept)
    /// and logs an error.
    pub fn set_build_options(&mut self, options: &[Value]) {
        let mut parsed = Vec::with_capacity(options.len());
        for option in options {
            match option.as_str() {
                Some(s) => parsed.push(s.to_string()),
                None => {
                    log::error!(
                        "ignoring buildOptions update: non-string entry {option:?}"
                    );
                    return;
                }
            }
        }
        self.build_options = parsed.join(" ");
    }

    pub fn set_max_problems(&mut self, max_problems: usize) {
        self.max_problems = max_problems;
    }

    /// Device selection algorithm:
    /// 1. Enumerate all platforms/devices.
    /// 2. If one matches `requested_stable_id` exactly, select it.
    /// 3. Otherwise select the greatest `power_index`, ties broken by enumeration order.
    /// 4. If nothing was enumerated, leave the selection empty.
    pub fn set_device(&mut self, requested_stable_id: u32) -> Result<()> {
        let mut records = enumerate_all(self.backend.as_ref())?;

        if records.is_empty() {
            self.selected = None;
            return Ok(());
        }

        if let Some(index) = records
            .iter()
            .position(|record| record.stable_id == requested_stable_id)
        {
            self.selected = Some(records.remove(index));
            return Ok(());
        }

        let mut best = 0;
        for (index, record) in records.iter().enumerate().skip(1) {
            if record.power_index > records[best].power_index {
                best = index;
            }
        }
        self.selected = Some(records.remove(best));
        Ok(())
    }

    /// Compile `job.text` on the selected device and translate the build log into
    /// diagnostics, capped at `max_problems`.
    pub fn get(&self, job: &SourceJob) -> Result<Vec<Diagnostic>> {
        let device = self.selected.as_ref().ok_or(Error::NoDevice)?;
        let raw_log = device.handle.build_program(&job.text, &self.build_options)?;
        let source_override = job.display_source();
        Ok(parse_build_log(
            &raw_log,
            source_override.as_deref(),
            self.max_problems,
        ))
    }
}
