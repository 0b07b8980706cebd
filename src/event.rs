use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::trigger::TriggerBits;

/// An index into the particle arena of an [`EventRecord`].
///
/// Relations between event entities are plain indices into flat owned
/// collections; holding an id never implies ownership of the entity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticleId(usize);

/// An index into the vertex arena of an [`EventRecord`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexId(usize);

/// A reconstructed particle: four-momentum, PDG code, and its relations to
/// the rest of the event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Particle {
    /// Momentum x-component (GeV).
    pub px: f64,
    /// Momentum y-component (GeV).
    pub py: f64,
    /// Momentum z-component (GeV).
    pub pz: f64,
    /// Energy (GeV).
    pub e: f64,
    /// PDG particle code.
    pub pdg_id: i32,
    /// The decay vertex this particle originates from, if any.
    pub vertex: Option<VertexId>,
    /// Decay daughters, by index.
    pub daughters: Vec<ParticleId>,
}

impl Particle {
    /// A particle with the given four-momentum and PDG code, unattached to
    /// any vertex.
    pub fn new(px: f64, py: f64, pz: f64, e: f64, pdg_id: i32) -> Self {
        Self {
            px,
            py,
            pz,
            e,
            pdg_id,
            vertex: None,
            daughters: Vec::new(),
        }
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Invariant mass, zero for (numerically) light-like momenta.
    pub fn mass(&self) -> f64 {
        let m2 = self.e.powi(2) - self.px.powi(2) - self.py.powi(2) - self.pz.powi(2);
        m2.max(0.0).sqrt()
    }
}

/// A decay vertex position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vertex {
    /// x-position (mm).
    pub x: f64,
    /// y-position (mm).
    pub y: f64,
    /// z-position (mm).
    pub z: f64,
}

/// One event's worth of reconstructed objects, weights, and trigger decisions.
///
/// Particles and vertices live in flat arenas addressed by [`ParticleId`] and
/// [`VertexId`]; the record owns everything and the accessors only look up.
/// The event weight is the product of named weight components, so individual
/// corrections can be inspected or replaced without re-deriving the total.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventRecord {
    /// Run number, used for trigger-configuration lookup.
    pub run: u32,
    /// Event number within the run.
    pub event: u64,
    /// The event's trigger decision words.
    pub trigger_bits: TriggerBits,
    particles: Vec<Particle>,
    vertices: Vec<Vertex>,
    weights: IndexMap<String, f64>,
}

impl EventRecord {
    /// An empty record for `(run, event)`.
    pub fn new(run: u32, event: u64) -> Self {
        Self {
            run,
            event,
            ..Self::default()
        }
    }

    /// Add a particle to the arena and return its id.
    pub fn add_particle(&mut self, particle: Particle) -> ParticleId {
        self.particles.push(particle);
        ParticleId(self.particles.len() - 1)
    }

    /// Add a vertex to the arena and return its id.
    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexId {
        self.vertices.push(vertex);
        VertexId(self.vertices.len() - 1)
    }

    /// The particle behind `id`, if it exists in this record.
    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id.0)
    }

    /// The vertex behind `id`, if it exists in this record.
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0)
    }

    /// All particles, in insertion order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// All vertices, in insertion order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Record `daughter` as a decay daughter of `parent`. Ids referring to
    /// nothing are ignored.
    pub fn link_daughter(&mut self, parent: ParticleId, daughter: ParticleId) {
        if daughter.0 < self.particles.len() {
            if let Some(p) = self.particles.get_mut(parent.0) {
                p.daughters.push(daughter);
            }
        }
    }

    /// Attach `particle` to its decay vertex. Ids referring to nothing are
    /// ignored.
    pub fn link_vertex(&mut self, particle: ParticleId, vertex: VertexId) {
        if vertex.0 < self.vertices.len() {
            if let Some(p) = self.particles.get_mut(particle.0) {
                p.vertex = Some(vertex);
            }
        }
    }

    /// The decay daughters of `id`, resolved to particles.
    pub fn daughters(&self, id: ParticleId) -> impl Iterator<Item = &Particle> {
        self.particle(id)
            .map(|p| p.daughters.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|d| self.particle(*d))
    }

    /// Set the named weight component, replacing any previous value.
    pub fn set_weight(&mut self, name: &str, weight: f64) {
        self.weights.insert(name.to_string(), weight);
    }

    /// The named weight component, if set.
    pub fn weight_component(&self, name: &str) -> Option<f64> {
        self.weights.get(name).copied()
    }

    /// The total event weight: the product of all components, `1.0` when none
    /// are set.
    pub fn weight(&self) -> f64 {
        self.weights.values().product()
    }
}
