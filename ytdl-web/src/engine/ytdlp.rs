//! yt-dlp driven as a subprocess.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use serde_json::Value;
use tracing::{debug, warn};

use super::traits::{EngineOptions, EngineProgress, ExtractionEngine, MediaInfo, ProgressSink};
use crate::{Error, Result};

/// Prefix marking our progress lines on stdout.
const PROGRESS_MARKER: &str = "[ytdl-web:progress]";

/// Number of stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 50;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Create a command with `CREATE_NO_WINDOW` applied on Windows.
fn std_command(program: impl AsRef<OsStr>) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// Engine backed by the `yt-dlp` executable.
pub struct YtDlpEngine {
    binary: String,
    version: OnceLock<Option<String>>,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            version: OnceLock::new(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = std_command(&self.binary);
        cmd.stdin(Stdio::null());
        cmd
    }

    fn launch_error(&self, e: std::io::Error) -> Error {
        Error::engine(format!("Failed to launch {}: {}", self.binary, e))
    }

    fn detect_version(&self) -> Option<String> {
        let output = self.command().arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }
}

/// Arguments shared by every invocation: format selector, then user options.
fn push_selection_args(args: &mut Vec<String>, options: &EngineOptions) {
    if let Some(format) = &options.format {
        args.push("--format".to_string());
        args.push(format.clone());
    }
    args.extend(options.native.to_cli_args());
}

/// Arguments for a metadata-only resolution.
pub(crate) fn resolve_args(url: &str, options: &EngineOptions) -> Vec<String> {
    let mut args: Vec<String> = ["--dump-single-json", "--skip-download", "--no-warnings"]
        .into_iter()
        .map(String::from)
        .collect();
    push_selection_args(&mut args, options);
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// Arguments for a transfer with machine-readable progress on stdout.
///
/// User options come after the service's output template so a user supplied
/// `outtmpl` takes precedence.
pub(crate) fn download_args(url: &str, options: &EngineOptions) -> Vec<String> {
    let mut args: Vec<String> = ["--newline", "--progress", "--no-warnings", "--progress-template"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(format!("download:{PROGRESS_MARKER}%(progress)j"));
    if options.no_overwrites {
        args.push("--no-overwrites".to_string());
    }
    if let Some(template) = &options.output_template {
        args.push("-o".to_string());
        args.push(template.clone());
    }
    push_selection_args(&mut args, options);
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// Parse a progress line emitted through our progress template.
pub(crate) fn parse_progress_line(line: &str) -> Option<EngineProgress> {
    let (_, payload) = line.split_once(PROGRESS_MARKER)?;
    match serde_json::from_str::<Value>(payload.trim()) {
        Ok(value @ Value::Object(_)) => Some(EngineProgress(value)),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Unparsable progress line");
            None
        }
    }
}

/// Human-readable failure summary from the engine's stderr.
///
/// Prefers the last `ERROR:` line, then the last non-empty line.
pub(crate) fn error_summary(stderr: &str, exit_code: Option<i32>) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| match exit_code {
            Some(code) => format!("yt-dlp exited with status {code}"),
            None => "yt-dlp was terminated by a signal".to_string(),
        })
}

/// Keep the last `max` lines of a stream.
fn collect_tail(reader: impl Read, max: usize) -> Vec<String> {
    let mut tail = VecDeque::with_capacity(max);
    for line in BufReader::new(reader).split(b'\n') {
        let Ok(line) = line else { break };
        if tail.len() == max {
            tail.pop_front();
        }
        tail.push_back(String::from_utf8_lossy(&line).trim_end().to_string());
    }
    tail.into()
}

impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn resolve(&self, url: &str, options: &EngineOptions) -> Result<MediaInfo> {
        let args = resolve_args(url, options);
        debug!(url = %url, "Resolving metadata");

        let output = self
            .command()
            .args(&args)
            .output()
            .map_err(|e| self.launch_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::engine(error_summary(&stderr, output.status.code())));
        }

        let value: Value = serde_json::from_slice(&output.stdout)?;
        MediaInfo::from_json(value)
    }

    fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let args = download_args(url, options);
        debug!(url = %url, args = ?args, "Starting yt-dlp download");

        let mut child = self
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        // Drained on its own thread so a chatty stderr cannot block stdout.
        let stderr_reader = child
            .stderr
            .take()
            .map(|stderr| std::thread::spawn(move || collect_tail(stderr, STDERR_TAIL_LINES)));

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).split(b'\n') {
                let Ok(line) = line else { break };
                let line = String::from_utf8_lossy(&line);
                if let Some(event) = parse_progress_line(&line) {
                    progress.on_progress(event);
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| Error::engine(format!("Failed to wait for yt-dlp: {e}")))?;

        let stderr_tail = match stderr_reader.map(|h| h.join()) {
            Some(Ok(lines)) => lines.join("\n"),
            Some(Err(_)) => {
                warn!("stderr reader thread panicked");
                String::new()
            }
            None => String::new(),
        };

        if status.success() {
            Ok(())
        } else {
            Err(Error::engine(error_summary(&stderr_tail, status.code())))
        }
    }

    fn version(&self) -> Option<String> {
        self.version.get_or_init(|| self.detect_version()).clone()
    }
}
