use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    channel::Channel,
    hist::Template,
    store::{TemplateKey, TemplateStore},
    systematics::{SystKind, Systematic, VariationSource},
    utils::enums::Variation,
    HistSysError, HistSysResult,
};

/// The combined templates held for one process under one systematic.
///
/// Nominal-kind systematics keep only the nominal template; every other kind
/// carries the symmetrized up/down pair as well.
#[derive(Clone, Debug)]
pub struct VariationEntry {
    /// The nominal template for the process.
    pub nominal: Template,
    /// The combined upward template, absent for nominal-kind systematics.
    pub up: Option<Template>,
    /// The combined downward template, absent for nominal-kind systematics.
    pub down: Option<Template>,
}

/// Per-systematic storage of combined variation templates, keyed by process
/// name in insertion order.
///
/// A registry is bulk-loaded from a [`TemplateStore`] with
/// [`initialize`](SystRegistry::initialize), queried during the analysis, and
/// written back out with [`save_templates`](SystRegistry::save_templates).
/// One registry serves one systematic at a time; [`clear`](SystRegistry::clear)
/// resets it for the next input.
#[derive(Clone, Debug)]
pub struct SystRegistry {
    systematic: Systematic,
    entries: IndexMap<String, VariationEntry>,
    context: Option<LookupContext>,
}

#[derive(Clone, Debug)]
struct LookupContext {
    scheme: String,
    discriminant: String,
}

impl SystRegistry {
    /// An empty registry for `systematic`.
    pub fn new(systematic: Systematic) -> Self {
        Self {
            systematic,
            entries: IndexMap::new(),
            context: None,
        }
    }

    /// The systematic this registry serves.
    pub fn systematic(&self) -> &Systematic {
        &self.systematic
    }

    /// Bulk-load and combine templates for every sample of `channel`.
    ///
    /// A sample whose nominal or source template is missing from the store is
    /// logged and skipped; the rest of the bulk load proceeds. A binning
    /// mismatch is a validation failure and aborts the load with an error,
    /// leaving previously loaded entries in place.
    pub fn initialize(
        &mut self,
        store: &TemplateStore,
        scheme: &str,
        channel: &Channel,
    ) -> HistSysResult<()> {
        self.context = Some(LookupContext {
            scheme: scheme.to_string(),
            discriminant: channel.discriminant.clone(),
        });
        for process in &channel.samples {
            let nominal_key = TemplateKey::nominal(scheme, &channel.discriminant, process);
            let nominal = match store.get(&nominal_key) {
                Some(t) => t,
                None => {
                    warn!(
                        systematic = %self.systematic.name,
                        process = %process,
                        key = %nominal_key,
                        "no nominal template in store, skipping process"
                    );
                    continue;
                }
            };
            if matches!(self.systematic.kind, SystKind::Nominal) {
                self.insert(process, nominal.clone(), None, None)?;
                continue;
            }
            let source = match self.load_source(store, scheme, channel, process) {
                Ok(Some(source)) => source,
                Ok(None) => continue,
                Err(e) => return Err(e),
            };
            let (up, down) = self.systematic.combine(process, nominal, &source)?;
            self.insert(process, nominal.clone(), Some(up), Some(down))?;
            debug!(
                systematic = %self.systematic.name,
                process = %process,
                "combined variation templates"
            );
        }
        Ok(())
    }

    /// Open the channel's artifact under `base_dir` and
    /// [`initialize`](SystRegistry::initialize) from it.
    pub fn initialize_from_dir(
        &mut self,
        base_dir: &str,
        scheme: &str,
        channel: &Channel,
    ) -> HistSysResult<()> {
        let store = TemplateStore::open(&channel.artifact_path_in(base_dir))?;
        self.initialize(&store, scheme, channel)
    }

    /// Fetch the source templates for one process, or `None` (after a
    /// warning) when they are missing from the store.
    fn load_source(
        &self,
        store: &TemplateStore,
        scheme: &str,
        channel: &Channel,
        process: &str,
    ) -> HistSysResult<Option<VariationSource>> {
        let discriminant = self
            .systematic
            .shape_discriminant
            .as_deref()
            .unwrap_or(&channel.discriminant);
        let source_key = TemplateKey::source(scheme, discriminant, process, &self.systematic.name);
        match &self.systematic.kind {
            SystKind::Nominal => Ok(None),
            SystKind::OneSided { .. } | SystKind::Pdf { .. } => match store.get(&source_key) {
                Some(t) => Ok(Some(VariationSource::Single(t.clone()))),
                None => {
                    warn!(
                        systematic = %self.systematic.name,
                        process = %process,
                        key = %source_key,
                        "no source template in store, skipping process"
                    );
                    Ok(None)
                }
            },
            SystKind::Pair { .. } => {
                let up_key = source_key.with_variation(Variation::Up);
                let down_key = source_key.with_variation(Variation::Down);
                match (store.get(&up_key), store.get(&down_key)) {
                    (Some(up), Some(down)) => Ok(Some(VariationSource::UpDown {
                        up: up.clone(),
                        down: down.clone(),
                    })),
                    _ => {
                        warn!(
                            systematic = %self.systematic.name,
                            process = %process,
                            up_key = %up_key,
                            down_key = %down_key,
                            "incomplete up/down source pair in store, skipping process"
                        );
                        Ok(None)
                    }
                }
            }
            SystKind::ModelPair { .. } => {
                let (model_a, model_b) = self.systematic.models.as_ref().ok_or_else(|| {
                    HistSysError::SourceMismatch {
                        name: self.systematic.name.clone(),
                        expected: "model pair",
                    }
                })?;
                let a_key = TemplateKey::nominal(scheme, discriminant, model_a);
                let b_key = TemplateKey::nominal(scheme, discriminant, model_b);
                match (store.get(&a_key), store.get(&b_key)) {
                    (Some(a), Some(b)) => Ok(Some(VariationSource::Models {
                        a: a.clone(),
                        b: b.clone(),
                    })),
                    _ => {
                        warn!(
                            systematic = %self.systematic.name,
                            process = %process,
                            a_key = %a_key,
                            b_key = %b_key,
                            "missing model prediction in store, skipping process"
                        );
                        Ok(None)
                    }
                }
            }
        }
    }

    fn insert(
        &mut self,
        process: &str,
        nominal: Template,
        up: Option<Template>,
        down: Option<Template>,
    ) -> HistSysResult<()> {
        if self.entries.contains_key(process) {
            return Err(HistSysError::RegistrationError {
                name: process.to_string(),
            });
        }
        self.entries
            .insert(process.to_string(), VariationEntry { nominal, up, down });
        Ok(())
    }

    /// The entry for `process`, if it was loaded.
    pub fn get(&self, process: &str) -> Option<&VariationEntry> {
        self.entries.get(process)
    }

    /// Iterate over `(process, entry)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &VariationEntry)> {
        self.entries.iter()
    }

    /// The process names with loaded entries, in insertion order.
    pub fn processes(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// The number of loaded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release all held templates, resetting the registry for the next input.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.context = None;
    }

    /// Serialize the held templates into `output`.
    ///
    /// Combined variations are written under the
    /// `(scheme, discriminant, process, systematic)` key with `High`/`Low`
    /// suffixes; a nominal-kind systematic writes one suffix-free template
    /// per process.
    pub fn save_templates(&self, output: &mut TemplateStore) {
        let Some(context) = &self.context else {
            return;
        };
        for (process, entry) in &self.entries {
            match (&entry.up, &entry.down) {
                (Some(up), Some(down)) => {
                    let key = TemplateKey::source(
                        &context.scheme,
                        &context.discriminant,
                        process,
                        &self.systematic.name,
                    );
                    output.insert(&key.with_variation(Variation::Up), up.clone());
                    output.insert(&key.with_variation(Variation::Down), down.clone());
                }
                _ => {
                    let key =
                        TemplateKey::nominal(&context.scheme, &context.discriminant, process);
                    output.insert(&key, entry.nominal.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::enums::Symmetrization;

    fn channel() -> Channel {
        Channel {
            name: "el_2jet".to_string(),
            discriminant: "mlv".to_string(),
            base_dir: ".".to_string(),
            samples: vec!["ttbar".to_string(), "wjets".to_string()],
            systematics: vec![],
        }
    }

    fn one_sided_jes() -> Systematic {
        Systematic::new(
            "jes",
            "Jet energy scale",
            SystKind::OneSided {
                symmetrization: Symmetrization::FullDifference,
            },
        )
    }

    fn store_with(entries: &[(&TemplateKey, &[f64])]) -> TemplateStore {
        let mut store = TemplateStore::new();
        for (key, contents) in entries {
            store.insert(
                key,
                Template::uniform("t", "", 0.0, 3.0, contents.to_vec()).unwrap(),
            );
        }
        store
    }

    #[test]
    fn initialize_combines_all_processes() {
        let store = store_with(&[
            (
                &TemplateKey::nominal("pretag", "mlv", "ttbar"),
                &[10.0, 20.0, 10.0],
            ),
            (
                &TemplateKey::source("pretag", "mlv", "ttbar", "jes"),
                &[12.0, 18.0, 11.0],
            ),
            (
                &TemplateKey::nominal("pretag", "mlv", "wjets"),
                &[5.0, 5.0, 5.0],
            ),
            (
                &TemplateKey::source("pretag", "mlv", "wjets", "jes"),
                &[6.0, 5.0, 4.0],
            ),
        ]);
        let mut registry = SystRegistry::new(one_sided_jes());
        registry.initialize(&store, "pretag", &channel()).unwrap();
        assert_eq!(registry.len(), 2);
        let entry = registry.get("ttbar").unwrap();
        assert_eq!(entry.up.as_ref().unwrap().contents(), &[12.0, 18.0, 11.0]);
        assert_eq!(entry.down.as_ref().unwrap().contents(), &[8.0, 22.0, 9.0]);
    }

    #[test]
    fn missing_source_skips_only_that_process() {
        let store = store_with(&[
            (
                &TemplateKey::nominal("pretag", "mlv", "ttbar"),
                &[10.0, 20.0, 10.0],
            ),
            (
                &TemplateKey::nominal("pretag", "mlv", "wjets"),
                &[5.0, 5.0, 5.0],
            ),
            (
                &TemplateKey::source("pretag", "mlv", "wjets", "jes"),
                &[6.0, 5.0, 4.0],
            ),
        ]);
        let mut registry = SystRegistry::new(one_sided_jes());
        registry.initialize(&store, "pretag", &channel()).unwrap();
        assert!(registry.get("ttbar").is_none());
        assert!(registry.get("wjets").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn binning_mismatch_aborts_with_an_error() {
        let mut store = store_with(&[(
            &TemplateKey::nominal("pretag", "mlv", "ttbar"),
            &[10.0; 10],
        )]);
        store.insert(
            &TemplateKey::source("pretag", "mlv", "ttbar", "jes"),
            Template::uniform("t", "", 0.0, 3.0, vec![1.0; 12]).unwrap(),
        );
        let mut registry = SystRegistry::new(one_sided_jes());
        assert!(matches!(
            registry.initialize(&store, "pretag", &channel()),
            Err(HistSysError::BinningMismatch { .. })
        ));
    }

    #[test]
    fn nominal_kind_keeps_one_template_per_process() {
        let store = store_with(&[
            (
                &TemplateKey::nominal("pretag", "mlv", "ttbar"),
                &[10.0, 20.0, 10.0],
            ),
            (
                &TemplateKey::nominal("pretag", "mlv", "wjets"),
                &[5.0, 5.0, 5.0],
            ),
        ]);
        let mut registry = SystRegistry::new(Systematic::new("nominal", "", SystKind::Nominal));
        registry.initialize(&store, "pretag", &channel()).unwrap();
        let entry = registry.get("ttbar").unwrap();
        assert!(entry.up.is_none());
        assert!(entry.down.is_none());

        let mut output = TemplateStore::new();
        registry.save_templates(&mut output);
        assert_eq!(output.len(), 2);
        assert!(output.contains(&TemplateKey::nominal("pretag", "mlv", "ttbar")));
    }

    #[test]
    fn save_templates_writes_high_low_keys() {
        let store = store_with(&[
            (
                &TemplateKey::nominal("pretag", "mlv", "ttbar"),
                &[10.0, 20.0, 10.0],
            ),
            (
                &TemplateKey::source("pretag", "mlv", "ttbar", "jes"),
                &[12.0, 18.0, 11.0],
            ),
        ]);
        let mut registry = SystRegistry::new(one_sided_jes());
        registry.initialize(&store, "pretag", &channel()).unwrap();

        let mut output = TemplateStore::new();
        registry.save_templates(&mut output);
        let up = output
            .get(&TemplateKey::variation(
                "pretag",
                "mlv",
                "ttbar",
                "jes",
                Variation::Up,
            ))
            .unwrap();
        assert_eq!(up.contents(), &[12.0, 18.0, 11.0]);
        assert!(output.contains(&TemplateKey::variation(
            "pretag",
            "mlv",
            "ttbar",
            "jes",
            Variation::Down,
        )));
    }

    #[test]
    fn clear_releases_all_entries() {
        let store = store_with(&[(
            &TemplateKey::nominal("pretag", "mlv", "ttbar"),
            &[10.0, 20.0, 10.0],
        )]);
        let mut registry = SystRegistry::new(Systematic::new("nominal", "", SystKind::Nominal));
        registry.initialize(&store, "pretag", &channel()).unwrap();
        assert!(!registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn shape_discriminant_redirects_source_lookup() {
        let syst = Systematic::new(
            "wshape",
            "",
            SystKind::OneSided {
                symmetrization: Symmetrization::HalfDifference,
            },
        )
        .with_shape_discriminant("eta_lj");
        let store = store_with(&[
            (
                &TemplateKey::nominal("pretag", "mlv", "wjets"),
                &[4.0, 4.0, 4.0],
            ),
            (
                &TemplateKey::source("pretag", "eta_lj", "wjets", "wshape"),
                &[6.0, 4.0, 2.0],
            ),
        ]);
        let mut channel = channel();
        channel.samples = vec!["wjets".to_string()];
        let mut registry = SystRegistry::new(syst);
        registry.initialize(&store, "pretag", &channel).unwrap();
        let entry = registry.get("wjets").unwrap();
        assert_eq!(entry.up.as_ref().unwrap().contents(), &[5.0, 4.0, 3.0]);
    }

    #[test]
    fn model_pair_loads_both_model_predictions() {
        let syst = Systematic::new(
            "generator",
            "",
            SystKind::ModelPair {
                symmetrization: Symmetrization::HalfDifference,
            },
        )
        .with_models("ttbar_powheg", "ttbar_amc");
        let store = store_with(&[
            (
                &TemplateKey::nominal("pretag", "mlv", "ttbar"),
                &[10.0, 20.0, 10.0],
            ),
            (
                &TemplateKey::nominal("pretag", "mlv", "ttbar_powheg"),
                &[12.0, 22.0, 10.0],
            ),
            (
                &TemplateKey::nominal("pretag", "mlv", "ttbar_amc"),
                &[10.0, 18.0, 12.0],
            ),
        ]);
        let mut channel = channel();
        channel.samples = vec!["ttbar".to_string()];
        let mut registry = SystRegistry::new(syst);
        registry.initialize(&store, "pretag", &channel).unwrap();
        let entry = registry.get("ttbar").unwrap();
        assert_eq!(entry.up.as_ref().unwrap().contents(), &[11.0, 22.0, 9.0]);
        assert_eq!(entry.down.as_ref().unwrap().contents(), &[9.0, 18.0, 11.0]);
    }
}
