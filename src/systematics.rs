use serde::{Deserialize, Serialize};

use crate::{
    hist::Template,
    utils::enums::{Recentering, Symmetrization, Variation},
    HistSysError, HistSysResult,
};

/// The kind of a [`Systematic`], selecting how source templates are combined
/// into an up/down pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystKind {
    /// No variation; the registry keeps a single nominal template per process.
    Nominal,
    /// A single varied template, symmetrized around nominal.
    OneSided {
        /// How the difference to nominal is folded into an up/down pair.
        symmetrization: Symmetrization,
    },
    /// An up/down template pair taken as-is, optionally re-centered when it
    /// was produced on a shape-only discriminant.
    Pair {
        /// Re-centering policy applied to the pair.
        #[serde(default)]
        recentering: Recentering,
    },
    /// A PDF variation template, symmetrized around nominal like a one-sided
    /// variation.
    Pdf {
        /// How the difference to nominal is folded into an up/down pair.
        symmetrization: Symmetrization,
    },
    /// Two independently modeled predictions whose difference is applied to a
    /// shared nominal and symmetrized like a one-sided variation.
    ModelPair {
        /// How the model difference is folded into an up/down pair.
        symmetrization: Symmetrization,
    },
}

/// The source templates handed to one combination step.
///
/// Which shape is required depends on the [`SystKind`]: `Single` for
/// one-sided and PDF variations, `UpDown` for pairs, `Models` for model
/// comparisons.
#[derive(Clone, Debug)]
pub enum VariationSource {
    /// One varied template.
    Single(Template),
    /// An already up/down-shaped template pair.
    UpDown {
        /// The upward template.
        up: Template,
        /// The downward template.
        down: Template,
    },
    /// Two alternative model predictions.
    Models {
        /// The first model's prediction.
        a: Template,
        /// The second model's prediction.
        b: Template,
    },
}

/// A named source of systematic uncertainty.
///
/// Carries the combination kind and, optionally, the name of a shape-only
/// discriminant whose templates are used for the variation lookup instead of
/// the rate discriminant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Systematic {
    /// The systematic's name, used as the lookup key in the store.
    pub name: String,
    /// A human-readable title.
    pub title: String,
    /// How source templates are combined.
    pub kind: SystKind,
    /// A shape discriminant distinct from the rate discriminant, if any.
    #[serde(default)]
    pub shape_discriminant: Option<String>,
    /// For [`SystKind::ModelPair`], the two sample names under which the
    /// alternative model predictions are stored.
    #[serde(default)]
    pub models: Option<(String, String)>,
}

impl Systematic {
    /// Create a systematic with no shape discriminant.
    pub fn new(name: &str, title: &str, kind: SystKind) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            kind,
            shape_discriminant: None,
            models: None,
        }
    }

    /// Use `discriminant` for variation-template lookup instead of the
    /// channel's rate discriminant.
    pub fn with_shape_discriminant(mut self, discriminant: &str) -> Self {
        self.shape_discriminant = Some(discriminant.to_string());
        self
    }

    /// Name the two samples holding the alternative model predictions for a
    /// [`SystKind::ModelPair`] systematic.
    pub fn with_models(mut self, a: &str, b: &str) -> Self {
        self.models = Some((a.to_string(), b.to_string()));
        self
    }

    /// Produce the symmetrized up/down templates for one process.
    ///
    /// `nominal` and every template in `source` must share identical binning;
    /// a mismatch is a validation failure for this systematic/process pair.
    /// The sources are never mutated; the returned templates are fresh, named
    /// `{process}_{systematic}High` and `{process}_{systematic}Low`.
    pub fn combine(
        &self,
        process: &str,
        nominal: &Template,
        source: &VariationSource,
    ) -> HistSysResult<(Template, Template)> {
        let up_name = self.template_name(process, Variation::Up);
        let down_name = self.template_name(process, Variation::Down);
        match (&self.kind, source) {
            (
                SystKind::OneSided { symmetrization } | SystKind::Pdf { symmetrization },
                VariationSource::Single(syst),
            ) => one_sided(nominal, syst, *symmetrization, &up_name, &down_name),
            (SystKind::Pair { recentering }, VariationSource::UpDown { up, down }) => {
                two_sided(nominal, up, down, *recentering, &up_name, &down_name)
            }
            (SystKind::ModelPair { symmetrization }, VariationSource::Models { a, b }) => {
                model_pair(nominal, a, b, *symmetrization, &up_name, &down_name)
            }
            (SystKind::Nominal, _) => Err(HistSysError::SourceMismatch {
                name: self.name.clone(),
                expected: "nominal-only",
            }),
            (SystKind::OneSided { .. } | SystKind::Pdf { .. }, _) => {
                Err(HistSysError::SourceMismatch {
                    name: self.name.clone(),
                    expected: "single-template",
                })
            }
            (SystKind::Pair { .. }, _) => Err(HistSysError::SourceMismatch {
                name: self.name.clone(),
                expected: "up/down pair",
            }),
            (SystKind::ModelPair { .. }, _) => Err(HistSysError::SourceMismatch {
                name: self.name.clone(),
                expected: "model pair",
            }),
        }
    }

    /// The name given to a combined template for `process` in `direction`.
    pub fn template_name(&self, process: &str, direction: Variation) -> String {
        format!("{}_{}{}", process, self.name, direction)
    }
}

fn one_sided(
    nominal: &Template,
    syst: &Template,
    symmetrization: Symmetrization,
    up_name: &str,
    down_name: &str,
) -> HistSysResult<(Template, Template)> {
    let scale = symmetrization.scale();
    let up = nominal.shifted_toward(up_name, syst, scale)?;
    let down = nominal.shifted_toward(down_name, syst, -scale)?;
    Ok((up, down))
}

fn two_sided(
    nominal: &Template,
    up: &Template,
    down: &Template,
    recentering: Recentering,
    up_name: &str,
    down_name: &str,
) -> HistSysResult<(Template, Template)> {
    nominal.check_compatible(up)?;
    nominal.check_compatible(down)?;
    let pair = match recentering {
        Recentering::None => (
            up.renamed(up_name, nominal.title()),
            down.renamed(down_name, nominal.title()),
        ),
        Recentering::NormalizeToNominal => {
            let target = nominal.integral();
            let up_integral = up.integral();
            let down_integral = down.integral();
            // a zero-integral variation has no shape to rescale
            if up_integral == 0.0 || down_integral == 0.0 {
                let empty = if up_integral == 0.0 { up } else { down };
                return Err(HistSysError::InvalidTemplate {
                    name: empty.name().to_string(),
                    reason: "zero integral, cannot re-center on the nominal rate".to_string(),
                });
            }
            (
                up.scaled(up_name, target / up_integral),
                down.scaled(down_name, target / down_integral),
            )
        }
    };
    Ok(pair)
}

fn model_pair(
    nominal: &Template,
    a: &Template,
    b: &Template,
    symmetrization: Symmetrization,
    up_name: &str,
    down_name: &str,
) -> HistSysResult<(Template, Template)> {
    let scale = symmetrization.scale();
    let up = nominal.shifted_by_difference(up_name, a, b, scale)?;
    let down = nominal.shifted_by_difference(down_name, a, b, -scale)?;
    Ok((up, down))
}
