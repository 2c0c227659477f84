//! Decoder configuration.
use serde::Deserialize;

/// How much checking a decode call performs.
///
/// `Fast` drops shape and content checks (wrong container kinds, tuple
/// arity, refinement predicates, enum and intersection membership). It still
/// visits every child, still calls every constructor, and still reports
/// unusable descriptors and leaf-type failures.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Strict,
    Fast,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub mode: Mode,
}

impl DecodeConfig {
    pub fn strict() -> Self {
        Self { mode: Mode::Strict }
    }

    pub fn fast() -> Self {
        Self { mode: Mode::Fast }
    }

    pub fn checks(&self) -> bool {
        self.mode == Mode::Strict
    }
}

impl From<Mode> for DecodeConfig {
    fn from(mode: Mode) -> Self {
        Self { mode }
    }
}
