//! Option metadata types.

use serde::{Serialize, Serializer};

/// Declared type of a catalog option.
///
/// The type decides how a raw submission value is coerced and how the
/// translated value is rendered on the engine command line.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OptionType {
    Boolean,
    String,
    Number,
    Select,
    MultiSelect,
    FilePath,
    Url,
    Regex,
    Template,
}

impl OptionType {
    /// Whether the engine flag takes a value argument.
    ///
    /// Booleans are bare switches; every other type is `--flag VALUE`.
    pub fn takes_value(self) -> bool {
        !matches!(self, Self::Boolean)
    }
}

/// Grouping used when presenting the catalog.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum OptionCategory {
    #[strum(serialize = "General Options")]
    General,
    #[strum(serialize = "Network Options")]
    Network,
    #[strum(serialize = "Video Selection")]
    VideoSelection,
    #[strum(serialize = "Download Options")]
    Download,
    #[strum(serialize = "Filesystem Options")]
    Filesystem,
    #[strum(serialize = "Thumbnail Options")]
    Thumbnail,
    #[strum(serialize = "Verbosity & Simulation Options")]
    Verbosity,
    #[strum(serialize = "Workarounds")]
    Workarounds,
    #[strum(serialize = "Video Format Options")]
    VideoFormat,
    #[strum(serialize = "Subtitle Options")]
    Subtitle,
    #[strum(serialize = "Authentication Options")]
    Authentication,
    #[strum(serialize = "Post-Processing Options")]
    PostProcessing,
    #[strum(serialize = "SponsorBlock Options")]
    SponsorBlock,
    #[strum(serialize = "Extractor Options")]
    Extractor,
    #[strum(serialize = "Geo Restriction")]
    GeoRestriction,
    #[strum(serialize = "Cookies & Headers")]
    Cookies,
}

impl Serialize for OptionCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

/// Default value advertised for an option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionDefault {
    None,
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

/// One entry of the option catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    /// User-facing key, identical to the engine's native parameter name.
    pub key: &'static str,
    pub category: OptionCategory,
    #[serde(rename = "type")]
    pub kind: OptionType,
    /// Command-line spellings, short form first when one exists.
    pub cli: &'static [&'static str],
    pub description: &'static str,
    pub default: OptionDefault,
    #[serde(rename = "options", skip_serializing_if = "<[_]>::is_empty")]
    pub choices: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    /// Number of command-line arguments the flag consumes.
    #[serde(skip_serializing_if = "is_single_arg")]
    pub arity: u8,
}

fn is_single_arg(arity: &u8) -> bool {
    *arity == 1
}

impl OptionSpec {
    /// The flag used when rendering this option for the engine.
    ///
    /// Prefers the long `--` spelling.
    pub fn flag(&self) -> &'static str {
        self.cli
            .iter()
            .copied()
            .find(|f| f.starts_with("--"))
            .or_else(|| self.cli.first().copied())
            .unwrap_or(self.key)
    }
}
