//! # histsys
//!
//! Bookkeeping for systematic template variations in binned template fits:
//! load nominal and varied histogram [`Template`]s from an external artifact,
//! symmetrize one-sided or model-pair variations into up/down pairs, keep the
//! results in a per-systematic [`SystRegistry`], and write them back out keyed
//! by `(scheme, discriminant, process, systematic)` with `High`/`Low`
//! suffixes. A small [`trigger`] module resolves trigger-item names to bit
//! indices through a run-range-keyed configuration that fails closed.
//!
//! The processing model is single-threaded and batch-oriented: one job owns
//! one input artifact and one output path at a time.
#![warn(clippy::perf, clippy::style)]

use thiserror::Error;

/// Channel definitions grouping samples and systematics over a discriminant.
pub mod channel;
/// Arena-indexed event records with integer-id particle/vertex relations.
pub mod event;
/// Binned histogram [`Template`]s and binning validation.
pub mod hist;
/// Per-systematic storage of combined variation templates.
pub mod registry;
/// The external template-storage artifact adapter.
pub mod store;
/// Systematic definitions and up/down combination.
pub mod systematics;
/// Trigger-item to bit-index lookup over run-range-keyed configuration.
pub mod trigger;
/// Utility enums shared across the crate.
pub mod utils;

pub use crate::channel::Channel;
pub use crate::event::{EventRecord, Particle, ParticleId, Vertex, VertexId};
pub use crate::hist::Template;
pub use crate::registry::{SystRegistry, VariationEntry};
pub use crate::store::{TemplateKey, TemplateStore};
pub use crate::systematics::{SystKind, Systematic, VariationSource};
pub use crate::trigger::{RunRange, TriggerBits, TriggerConfig, TriggerConfigSource, TriggerLookup};
pub use crate::utils::enums::{Recentering, Symmetrization, Variation};

pub type HistSysResult<T> = Result<T, HistSysError>;

/// The error type used by all `histsys` methods
#[derive(Error, Debug)]
pub enum HistSysError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`serde_json::Error`].
    #[error("JSON Error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// An alias for [`shellexpand::LookupError`].
    #[error("Failed to expand path: {0}")]
    LookupError(#[from] shellexpand::LookupError<std::env::VarError>),
    /// An error which occurs when a template key has no entry in the store.
    #[error("No template with key \"{key}\" in the store!")]
    TemplateNotFound {
        /// Canonical key string which failed lookup
        key: String,
    },
    /// An error which occurs when a nominal and a variation template do not
    /// share identical binning. Mismatched inputs are rejected, never coerced.
    #[error("Binning mismatch between \"{nominal}\" and \"{variation}\": {reason}")]
    BinningMismatch {
        /// Name of the nominal template
        nominal: String,
        /// Name of the variation template
        variation: String,
        /// What differed (bin count or edge values)
        reason: String,
    },
    /// An error which occurs when a template fails structural validation at
    /// construction time (edge/content length disagreement, unsorted edges).
    #[error("Invalid template \"{name}\": {reason}")]
    InvalidTemplate {
        /// Name of the offending template
        name: String,
        /// What was wrong with it
        reason: String,
    },
    /// An error which occurs when the user tries to register two entries by
    /// the same process name in the same registry.
    #[error("A process by the name \"{name}\" is already registered by this registry!")]
    RegistrationError {
        /// Name of the process which is already registered
        name: String,
    },
    /// An error which occurs when a systematic is handed the wrong shape of
    /// variation source for its kind.
    #[error("Systematic \"{name}\" expected a {expected} variation source!")]
    SourceMismatch {
        /// Name of the systematic
        name: String,
        /// The source shape its kind requires
        expected: &'static str,
    },
    /// An error which occurs when no configured run range contains the
    /// requested run number.
    #[error("No trigger configuration covers run {run}!")]
    RunNotCovered {
        /// The uncovered run number
        run: u32,
    },
    /// An error which occurs when the user tries to parse an invalid string of
    /// text, typically into an enum variant.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
    /// A custom fallback error for errors too infrequent to warrant their own
    /// error category.
    #[error("{0}")]
    Custom(String),
}
