//! Error types returned by the growth engine and its ambient CLI.

use thiserror::Error;

/// Everything that can go wrong while building or emitting a vascular tree.
#[derive(Debug, Error)]
pub enum GrowthError {
    /// One or more mandatory CLI/config values were never supplied.
    #[error("missing the following arguments: {}", .missing.join(", "))]
    ConfigurationIncomplete { missing: Vec<String> },

    /// A supplied value could not be parsed into the expected type.
    #[error("failed to parse option {flag}: {reason}")]
    ParseFailure { flag: String, reason: String },

    /// The configured perfusion point does not land inside the myocardium
    /// volume constructed from the bounding box and wall thickness.
    #[error("perfusion point lies outside the myocardium volume")]
    PerfusionOutsideVolume,

    /// Fifty consecutive candidate rejections occurred before the tree had
    /// even three nodes placed; growth cannot make progress from here.
    #[error("growth starved: no viable candidate after 50 consecutive attempts")]
    GrowthStarved,

    /// Writing the SWC record to its destination failed.
    #[error("failed to emit output: {0}")]
    EmissionFailure(#[from] std::io::Error),
}
