//! Boundary to the external resource pack converter.
//!
//! The converter works on a directory tree: it is pointed at a scratch
//! directory holding the source archive and is expected to leave a
//! `*_converted.<ext>` file next to it. Its diagnostic output is written
//! into a [`ConsoleBuffer`] owned by the caller, one buffer per call.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::ConverterConfig;

/// Arguments for one conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Scratch directory containing the source archive.
    pub input_dir: PathBuf,
    pub source_version: String,
    pub target_version: String,
    /// Ask the converter for verbose diagnostics.
    pub verbose: bool,
}

/// Per-call sink for converter output (stdout and stderr alike).
#[derive(Debug, Default, Clone)]
pub struct ConsoleBuffer {
    buf: Vec<u8>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a line of text.
    pub fn line(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.push(b'\n');
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_string(self) -> String {
        match String::from_utf8(self.buf) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

impl io::Write for ConsoleBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Failure reported by a converter.
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    #[error("Failed to launch converter '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Converter exited with {0}")]
    ExitStatus(String),

    #[error("{0}")]
    Failed(String),
}

/// The opaque conversion routine.
#[async_trait]
pub trait PackConverter: Send + Sync {
    /// Convert the archive in `request.input_dir`, writing all diagnostic
    /// output into `console`. Output written before a failure is kept.
    async fn convert(
        &self,
        request: &ConversionRequest,
        console: &mut ConsoleBuffer,
    ) -> Result<(), ConverterError>;
}

/// Runs an external converter program:
///
/// ```text
/// <program> <args...> -i <input_dir> --from <source> --to <target> [--debug true]
/// ```
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    fn command(&self, request: &ConversionRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("-i")
            .arg(&request.input_dir)
            .arg("--from")
            .arg(&request.source_version)
            .arg("--to")
            .arg(&request.target_version);
        if request.verbose {
            cmd.arg("--debug").arg("true");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl PackConverter for CommandConverter {
    async fn convert(
        &self,
        request: &ConversionRequest,
        console: &mut ConsoleBuffer,
    ) -> Result<(), ConverterError> {
        tracing::debug!(
            program = %self.program.display(),
            input_dir = %request.input_dir.display(),
            from = %request.source_version,
            to = %request.target_version,
            "Launching converter",
        );

        let output = self
            .command(request)
            .output()
            .await
            .map_err(|source| ConverterError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        // Both channels land in the same buffer; stdout first.
        console.push(&output.stdout);
        console.push(&output.stderr);

        if output.status.success() {
            Ok(())
        } else {
            Err(ConverterError::ExitStatus(output.status.to_string()))
        }
    }
}
