//! Engine trait and the data exchanged with it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use ytdl_options::NativeOptions;

use crate::Result;

/// Parameters for one engine invocation.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Format selector (e.g. `"137+140"` or `"bestaudio"`).
    pub format: Option<String>,
    /// Output path template.
    pub output_template: Option<String>,
    /// Refuse to overwrite files that already exist.
    pub no_overwrites: bool,
    /// Translated user options.
    pub native: NativeOptions,
}

impl EngineOptions {
    pub fn new(native: NativeOptions) -> Self {
        Self {
            native,
            ..Self::default()
        }
    }

    /// Set the format selector.
    pub fn with_format(mut self, format: Option<impl Into<String>>) -> Self {
        self.format = format.map(Into::into);
        self
    }

    /// Set the output path template.
    pub fn with_output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    /// Do not overwrite existing files.
    pub fn with_no_overwrites(mut self) -> Self {
        self.no_overwrites = true;
        self
    }
}

/// One entry of the engine's format list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatInfo {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub height: Option<u32>,
    /// Average audio bitrate in kbit/s.
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub tbr: Option<f64>,
}

impl FormatInfo {
    /// Human-readable quality tag: `720p`, `128kbps` or `unknown`.
    pub fn quality(&self) -> String {
        if let Some(height) = self.height.filter(|h| *h > 0) {
            format!("{height}p")
        } else if let Some(abr) = self.abr.filter(|a| *a > 0.0) {
            format!("{abr}kbps")
        } else {
            "unknown".to_string()
        }
    }
}

/// Engine sizes are integers, but some extractors report them as floats.
fn lenient_u64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
    }))
}

/// Metadata resolved for a URL without transferring anything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
    /// The complete info document as returned by the engine.
    #[serde(skip)]
    pub raw: Value,
}

impl MediaInfo {
    /// Build from the engine's JSON info document.
    pub fn from_json(raw: Value) -> Result<Self> {
        let mut info: MediaInfo = serde_json::from_value(raw.clone())?;
        info.raw = raw;
        Ok(info)
    }

    pub fn find_format(&self, format_id: &str) -> Option<&FormatInfo> {
        self.formats.iter().find(|f| f.format_id == format_id)
    }

    /// Raw field lookup for fields without a typed accessor.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.raw.get(key).filter(|v| !v.is_null())
    }
}

/// Engine-native progress record.
///
/// Kept as raw JSON because the engine emits many optional keys; the hook
/// adapter only needs a handful of them.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProgress(pub Value);

impl EngineProgress {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn status(&self) -> &str {
        self.str_field("status").unwrap_or("unknown")
    }

    pub fn filename(&self) -> Option<&str> {
        self.str_field("filename")
    }

    /// Percentage string such as `"42.0%"`.
    ///
    /// Falls back to computing it from the byte counters when the engine did
    /// not pre-format it.
    pub fn percent(&self) -> Option<String> {
        if let Some(p) = self.str_field("_percent_str") {
            return Some(p.trim().to_string());
        }
        let downloaded = self.0.get("downloaded_bytes")?.as_f64()?;
        let total = self
            .0
            .get("total_bytes")
            .and_then(Value::as_f64)
            .or_else(|| self.0.get("total_bytes_estimate").and_then(Value::as_f64))
            .filter(|t| *t > 0.0)?;
        Some(format!("{:.1}%", downloaded / total * 100.0))
    }

    pub fn speed(&self) -> Option<String> {
        self.str_field("_speed_str").map(|s| s.trim().to_string())
    }

    pub fn eta(&self) -> Option<String> {
        self.str_field("_eta_str").map(|s| s.trim().to_string())
    }
}

/// Receiver of engine progress, called synchronously from the transfer.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: EngineProgress);
}

/// The extraction/download engine.
///
/// Both primitives block the calling thread; callers run them inside
/// `tokio::task::spawn_blocking`.
pub trait ExtractionEngine: Send + Sync + 'static {
    /// Engine name for logs and health output.
    fn name(&self) -> &'static str;

    /// Resolve metadata for `url` without transferring media.
    fn resolve(&self, url: &str, options: &EngineOptions) -> Result<MediaInfo>;

    /// Transfer `url`, reporting progress to `progress`.
    fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        progress: &dyn ProgressSink,
    ) -> Result<()>;

    /// Engine version, `None` when the engine cannot be run.
    fn version(&self) -> Option<String>;

    fn is_available(&self) -> bool {
        self.version().is_some()
    }
}
