//! Extraction/download engine boundary.

mod traits;
mod ytdlp;

pub use traits::{
    EngineOptions, EngineProgress, ExtractionEngine, FormatInfo, MediaInfo, ProgressSink,
};
pub use ytdlp::YtDlpEngine;
