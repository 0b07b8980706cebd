use serde::{Deserialize, Serialize};

use crate::{HistSysError, HistSysResult};

/// A named, binned 1-D histogram template.
///
/// A `Template` holds the predicted yield shape for one process under one
/// variation: an ordered sequence of bin contents with per-bin uncertainties
/// over a fixed binning. Templates are immutable once constructed; the
/// combination step produces new templates rather than editing its inputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Template {
    name: String,
    title: String,
    edges: Vec<f64>,
    contents: Vec<f64>,
    uncertainties: Vec<f64>,
}

impl Template {
    /// Construct a template, validating its structure.
    ///
    /// There must be at least one bin, `edges` must have exactly one more
    /// entry than `contents`, edges must be strictly increasing, and
    /// `uncertainties` must match `contents` in length.
    pub fn new(
        name: &str,
        title: &str,
        edges: Vec<f64>,
        contents: Vec<f64>,
        uncertainties: Vec<f64>,
    ) -> HistSysResult<Self> {
        if contents.is_empty() {
            return Err(HistSysError::InvalidTemplate {
                name: name.to_string(),
                reason: "no bins".to_string(),
            });
        }
        if edges.len() != contents.len() + 1 {
            return Err(HistSysError::InvalidTemplate {
                name: name.to_string(),
                reason: format!(
                    "{} edges for {} bins (expected {})",
                    edges.len(),
                    contents.len(),
                    contents.len() + 1
                ),
            });
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(HistSysError::InvalidTemplate {
                name: name.to_string(),
                reason: "bin edges must be finite".to_string(),
            });
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(HistSysError::InvalidTemplate {
                name: name.to_string(),
                reason: "bin edges are not strictly increasing".to_string(),
            });
        }
        if uncertainties.len() != contents.len() {
            return Err(HistSysError::InvalidTemplate {
                name: name.to_string(),
                reason: format!(
                    "{} uncertainties for {} bins",
                    uncertainties.len(),
                    contents.len()
                ),
            });
        }
        Ok(Self {
            name: name.to_string(),
            title: title.to_string(),
            edges,
            contents,
            uncertainties,
        })
    }

    /// Construct a template over `n` equal-width bins spanning `[x_min, x_max)`
    /// with all uncertainties set to zero.
    pub fn uniform(
        name: &str,
        title: &str,
        x_min: f64,
        x_max: f64,
        contents: Vec<f64>,
    ) -> HistSysResult<Self> {
        let n = contents.len();
        if n == 0 {
            return Err(HistSysError::InvalidTemplate {
                name: name.to_string(),
                reason: "no bins".to_string(),
            });
        }
        let width = (x_max - x_min) / n as f64;
        let edges = (0..=n).map(|i| x_min + width * i as f64).collect();
        let uncertainties = vec![0.0; n];
        Self::new(name, title, edges, contents, uncertainties)
    }

    /// The template's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The template's title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The number of bins.
    pub fn bins(&self) -> usize {
        self.contents.len()
    }

    /// The bin edges (one more than the number of bins).
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// The bin contents.
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    /// The per-bin uncertainties.
    pub fn uncertainties(&self) -> &[f64] {
        &self.uncertainties
    }

    /// The sum of all bin contents.
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Check that `other` shares this template's binning exactly.
    ///
    /// Bin counts and edge values must be identical; mismatched inputs are
    /// rejected, never truncated or padded.
    pub fn check_compatible(&self, other: &Template) -> HistSysResult<()> {
        if self.bins() != other.bins() {
            return Err(HistSysError::BinningMismatch {
                nominal: self.name.clone(),
                variation: other.name.clone(),
                reason: format!("{} bins vs {} bins", self.bins(), other.bins()),
            });
        }
        if let Some(i) = self
            .edges
            .iter()
            .zip(other.edges.iter())
            .position(|(a, b)| a != b)
        {
            return Err(HistSysError::BinningMismatch {
                nominal: self.name.clone(),
                variation: other.name.clone(),
                reason: format!(
                    "bin edge {} differs ({} vs {})",
                    i, self.edges[i], other.edges[i]
                ),
            });
        }
        Ok(())
    }

    /// A copy of this template under a new name and title.
    pub fn renamed(&self, name: &str, title: &str) -> Template {
        Template {
            name: name.to_string(),
            title: title.to_string(),
            edges: self.edges.clone(),
            contents: self.contents.clone(),
            uncertainties: self.uncertainties.clone(),
        }
    }

    /// A copy of this template with contents and uncertainties scaled by
    /// `factor`, under a new name.
    pub fn scaled(&self, name: &str, factor: f64) -> Template {
        Template {
            name: name.to_string(),
            title: self.title.clone(),
            edges: self.edges.clone(),
            contents: self.contents.iter().map(|c| c * factor).collect(),
            uncertainties: self.uncertainties.iter().map(|u| u * factor).collect(),
        }
    }

    /// A new template equal to `self + scale * (other - self)` bin by bin.
    ///
    /// Uncertainties combine in quadrature with the same weights,
    /// `sqrt(((1 - scale) * u_self)^2 + (scale * u_other)^2)`. Callers must
    /// have validated binning compatibility; this is enforced here as well so
    /// arithmetic can never run over mismatched binnings.
    pub fn shifted_toward(
        &self,
        name: &str,
        other: &Template,
        scale: f64,
    ) -> HistSysResult<Template> {
        self.check_compatible(other)?;
        let contents = self
            .contents
            .iter()
            .zip(other.contents.iter())
            .map(|(a, b)| a + scale * (b - a))
            .collect();
        let uncertainties = self
            .uncertainties
            .iter()
            .zip(other.uncertainties.iter())
            .map(|(a, b)| (((1.0 - scale) * a).powi(2) + (scale * b).powi(2)).sqrt())
            .collect();
        Ok(Template {
            name: name.to_string(),
            title: self.title.clone(),
            edges: self.edges.clone(),
            contents,
            uncertainties,
        })
    }

    /// A new template equal to `self + scale * (a - b)` bin by bin, the model
    /// comparison form where `a` and `b` are two independently modeled
    /// predictions sharing this template's binning.
    pub fn shifted_by_difference(
        &self,
        name: &str,
        a: &Template,
        b: &Template,
        scale: f64,
    ) -> HistSysResult<Template> {
        self.check_compatible(a)?;
        self.check_compatible(b)?;
        let contents = self
            .contents
            .iter()
            .zip(a.contents.iter().zip(b.contents.iter()))
            .map(|(n, (a, b))| n + scale * (a - b))
            .collect();
        let uncertainties = self
            .uncertainties
            .iter()
            .zip(a.uncertainties.iter().zip(b.uncertainties.iter()))
            .map(|(n, (a, b))| (n.powi(2) + (scale * a).powi(2) + (scale * b).powi(2)).sqrt())
            .collect();
        Ok(Template {
            name: name.to_string(),
            title: self.title.clone(),
            edges: self.edges.clone(),
            contents,
            uncertainties,
        })
    }
}
