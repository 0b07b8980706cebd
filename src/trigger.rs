use std::{fs::File, io::BufReader, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{HistSysError, HistSysResult};

/// One run range of the trigger configuration: an inclusive run interval and
/// the trigger items defined within it, each mapped to its bit index in the
/// per-event trigger-bits array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRange {
    /// First run of the range (inclusive).
    pub first_run: u32,
    /// Last run of the range (inclusive).
    pub last_run: u32,
    /// Trigger item name to bit index.
    pub items: IndexMap<String, usize>,
}

impl RunRange {
    /// Whether `run` falls inside this range.
    pub fn contains(&self, run: u32) -> bool {
        (self.first_run..=self.last_run).contains(&run)
    }
}

/// A provider of run-range-keyed trigger configuration.
///
/// The configuration store is owned by an external collaborator; this trait
/// is the seam through which it is injected into [`TriggerLookup`], so lookup
/// never reaches for ambient global state.
pub trait TriggerConfigSource {
    /// The configuration entry covering `run`.
    fn load(&self, run: u32) -> HistSysResult<RunRange>;
}

/// An in-memory run-range-keyed configuration table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// The configured run ranges.
    pub ranges: Vec<RunRange>,
}

impl TriggerConfig {
    /// Load a configuration table from a JSON file.
    pub fn open(file_path: &str) -> HistSysResult<Self> {
        let path = Path::new(&*shellexpand::full(file_path)?).canonicalize()?;
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

impl TriggerConfigSource for TriggerConfig {
    fn load(&self, run: u32) -> HistSysResult<RunRange> {
        self.ranges
            .iter()
            .find(|r| r.contains(run))
            .cloned()
            .ok_or(HistSysError::RunNotCovered { run })
    }
}

/// The per-event trigger decision words.
///
/// Bit `i` lives in word `i / 32` at offset `i % 32`; out-of-range indices
/// read as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerBits(Vec<u32>);

impl TriggerBits {
    /// Wrap the raw decision words of one event.
    pub fn new(words: Vec<u32>) -> Self {
        Self(words)
    }

    /// Whether bit `index` is set.
    pub fn is_set(&self, index: usize) -> bool {
        self.0
            .get(index / 32)
            .map(|word| word & (1 << (index % 32)) != 0)
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
enum MenuState {
    Unloaded,
    Loaded(RunRange),
    /// A load failed for this run; decisions fail closed until the run number
    /// changes and a reload can be attempted.
    Failed(u32),
}

/// Resolves trigger item names to bit indices through a cached run range.
///
/// The cached range is reloaded from the injected source whenever a query's
/// run number falls outside it. A failed reload invalidates all decisions for
/// that run: queries fail closed (treated as not passed) and the failure is
/// reported once per run-range transition, not per event.
#[derive(Clone, Debug)]
pub struct TriggerLookup<S: TriggerConfigSource> {
    source: S,
    state: MenuState,
}

impl<S: TriggerConfigSource> TriggerLookup<S> {
    /// A lookup over `source`, initially unloaded.
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: MenuState::Unloaded,
        }
    }

    /// The bit index of `item` for `run`, or `None` when the item is not
    /// defined in the covering range or the configuration cannot be loaded.
    pub fn bit_index(&mut self, item: &str, run: u32) -> Option<usize> {
        self.ensure_loaded(run);
        match &self.state {
            MenuState::Loaded(range) => range.items.get(item).copied(),
            _ => None,
        }
    }

    /// Whether `item` passed for the event with the given `run` and decision
    /// `bits`. Unknown items and configuration failures read as not passed.
    pub fn passed(&mut self, item: &str, run: u32, bits: &TriggerBits) -> bool {
        self.bit_index(item, run)
            .map(|index| bits.is_set(index))
            .unwrap_or(false)
    }

    fn ensure_loaded(&mut self, run: u32) {
        let stale = match &self.state {
            MenuState::Unloaded => true,
            MenuState::Loaded(range) => !range.contains(run),
            MenuState::Failed(failed_run) => *failed_run != run,
        };
        if !stale {
            return;
        }
        match self.source.load(run) {
            Ok(range) => self.state = MenuState::Loaded(range),
            Err(e) => {
                warn!(
                    run = run,
                    error = %e,
                    "trigger configuration load failed, decisions fail closed"
                );
                self.state = MenuState::Failed(run);
            }
        }
    }
}
