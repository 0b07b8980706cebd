use std::{
    fmt::Display,
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{hist::Template, utils::enums::Variation, HistSysError, HistSysResult};

/// The lookup key for one template in the storage artifact.
///
/// Keys follow the `(scheme, discriminant, process, systematic)` convention
/// of the plotting output, with the systematic name suffixed `High`/`Low` for
/// combined variations and left bare for raw source templates. Nominal
/// templates carry no systematic component at all.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateKey {
    /// The selection scheme (e.g. a cut set or tag region).
    pub scheme: String,
    /// The discriminant observable the template is binned in.
    pub discriminant: String,
    /// The physical process the template predicts.
    pub process: String,
    /// The systematic's name, absent for nominal templates.
    pub systematic: Option<String>,
    /// The variation direction, absent for raw source templates.
    pub variation: Option<Variation>,
}

impl TemplateKey {
    /// The key of a nominal template.
    pub fn nominal(scheme: &str, discriminant: &str, process: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            discriminant: discriminant.to_string(),
            process: process.to_string(),
            systematic: None,
            variation: None,
        }
    }

    /// The key of a raw source template for `systematic` (no direction
    /// suffix), as produced by the upstream plotting step.
    pub fn source(scheme: &str, discriminant: &str, process: &str, systematic: &str) -> Self {
        Self {
            systematic: Some(systematic.to_string()),
            ..Self::nominal(scheme, discriminant, process)
        }
    }

    /// The key of a combined variation template for `systematic` in
    /// `direction`.
    pub fn variation(
        scheme: &str,
        discriminant: &str,
        process: &str,
        systematic: &str,
        direction: Variation,
    ) -> Self {
        Self {
            systematic: Some(systematic.to_string()),
            variation: Some(direction),
            ..Self::nominal(scheme, discriminant, process)
        }
    }

    /// This key with `direction` appended to its systematic component.
    pub fn with_variation(&self, direction: Variation) -> Self {
        Self {
            variation: Some(direction),
            ..self.clone()
        }
    }
}

impl Display for TemplateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.scheme, self.discriminant, self.process)?;
        if let Some(systematic) = &self.systematic {
            write!(f, "/{}", systematic)?;
            if let Some(direction) = self.variation {
                write!(f, "{}", direction)?;
            }
        }
        Ok(())
    }
}

/// The external template-storage artifact, read-only during combination and
/// write-once on save.
///
/// The on-disk form is a single flat JSON object mapping canonical key
/// strings to templates, so the key convention of the artifact survives
/// verbatim in the file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateStore {
    templates: IndexMap<String, Template>,
}

fn expand_input_path(file_path: &str) -> HistSysResult<PathBuf> {
    Ok(Path::new(&*shellexpand::full(file_path)?).canonicalize()?)
}

fn expand_output_path(file_path: &str) -> HistSysResult<PathBuf> {
    Ok(PathBuf::from(&*shellexpand::full(file_path)?))
}

impl TemplateStore {
    /// An empty store, the starting point for an output artifact.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON artifact on disk.
    pub fn open(file_path: &str) -> HistSysResult<Self> {
        let path = expand_input_path(file_path)?;
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Write the store to `file_path`, replacing any existing artifact.
    pub fn write(&self, file_path: &str) -> HistSysResult<()> {
        let path = expand_output_path(file_path)?;
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Look up a template, returning `None` when the key has no entry.
    pub fn get(&self, key: &TemplateKey) -> Option<&Template> {
        self.templates.get(&key.to_string())
    }

    /// Look up a template, turning a missing key into
    /// [`HistSysError::TemplateNotFound`].
    pub fn fetch(&self, key: &TemplateKey) -> HistSysResult<&Template> {
        self.get(key).ok_or_else(|| HistSysError::TemplateNotFound {
            key: key.to_string(),
        })
    }

    /// Whether the store holds an entry for `key`.
    pub fn contains(&self, key: &TemplateKey) -> bool {
        self.templates.contains_key(&key.to_string())
    }

    /// Insert a template under `key`, replacing any previous entry.
    pub fn insert(&mut self, key: &TemplateKey, template: Template) {
        self.templates.insert(key.to_string(), template);
    }

    /// The number of stored templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterate over `(canonical key, template)` entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Template)> {
        self.templates.iter()
    }
}
