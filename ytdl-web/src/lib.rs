//! ytdl-web: a web front end for the yt-dlp download engine.
//!
//! Submissions become background jobs tracked in a [`downloader::JobRegistry`];
//! progress reported by the engine is coalesced per job and fanned out to
//! WebSocket observers by the [`broadcast::BroadcastHub`].

pub mod api;
pub mod broadcast;
pub mod config;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod logging;
pub mod utils;

pub use error::{Error, Result};
