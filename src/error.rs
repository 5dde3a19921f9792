//! Error types shared across the scenario pipeline.
//!
//! Most functions in this crate return [`anyhow::Result`]. Failures that callers may want to
//! handle specially are raised as [`ScoutError`] values inside the `anyhow` chain, so they can be
//! recovered with [`anyhow::Error::downcast_ref`].
use thiserror::Error;

/// Failures of the scenario pipeline with a defined recovery path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoutError {
    /// A scenario is neither a file on disk nor an entry in the project file map
    #[error("Scenario not found: \"{0}\"")]
    ScenarioNotFound(String),

    /// A scenario has no original cost parameter table to recalculate from
    #[error("No original cost parameters for scenario \"{0}\"")]
    MissingParameters(String),

    /// An original cost parameter could not be resolved from a scenario's field table
    #[error(
        "No unique match for parameter \"{key}\" in scenario \"{scenario}\" \
         ({found} candidate fields)"
    )]
    MissingParameter {
        /// The canonical parameter searched for
        key: String,
        /// The scenario whose field table was searched
        scenario: String,
        /// How many fields matched
        found: usize,
    },

    /// A filter predicate does not have the form `<column> <operator> <value>`
    #[error("Malformed filter predicate: \"{0}\"")]
    MalformedPredicate(String),

    /// A column required by the requested operation is absent or has the wrong type
    #[error("Required column \"{0}\" is missing or has the wrong type")]
    MissingColumn(String),
}
