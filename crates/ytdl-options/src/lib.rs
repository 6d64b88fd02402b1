//! # ytdl-options
//!
//! Static catalog of the download engine options exposed to users, and the
//! translator that turns loosely typed submission fields into the engine's
//! native option bundle.
//!
//! The catalog is pure data: every entry declares its [`OptionType`], the
//! command-line flag(s) the engine understands and some presentation hints.
//! [`translate`] consults the catalog to coerce raw values and drops anything
//! it does not know about.

mod catalog;
mod translate;
mod types;

pub use catalog::{OptionCatalog, catalog};
pub use translate::{NativeOption, NativeOptions, is_truthy, parse_bool_token, translate};
pub use types::{OptionCategory, OptionDefault, OptionSpec, OptionType};
