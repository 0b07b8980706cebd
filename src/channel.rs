use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{systematics::Systematic, HistSysResult};

/// A group of samples and systematics sharing a discriminant and a template
/// lookup root.
///
/// Channel definitions are plain data and can be read from a JSON file
/// alongside the template artifacts they describe.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Channel {
    /// The channel's name (e.g. an analysis region).
    pub name: String,
    /// The rate discriminant templates are binned in.
    pub discriminant: String,
    /// The directory holding this channel's template artifact.
    pub base_dir: String,
    /// The physical processes (sample names) entering this channel.
    pub samples: Vec<String>,
    /// The systematics evaluated for this channel.
    pub systematics: Vec<Systematic>,
}

impl Channel {
    /// Load a channel definition from a JSON file.
    pub fn open(file_path: &str) -> HistSysResult<Self> {
        let path = Path::new(&*shellexpand::full(file_path)?).canonicalize()?;
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// The path of this channel's template artifact under its own `base_dir`.
    pub fn artifact_path(&self) -> String {
        self.artifact_path_in(&self.base_dir)
    }

    /// The path of this channel's template artifact under an explicit
    /// `base_dir`, for jobs relocating the artifact tree.
    pub fn artifact_path_in(&self, base_dir: &str) -> String {
        format!("{}/{}.templates.json", base_dir, self.name)
    }
}
