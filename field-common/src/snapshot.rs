use crate::emitter::EmitterField;
use crate::particle::Particle;
use crate::universe::Universe;
use serde::{Deserialize, Serialize};

/// One live particle as a renderer draws it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleView {
    pub x: f64,
    pub y: f64,
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
    /// `1 - age / lifeSpan`, clamped to `[0, 1]`.
    pub opacity: f64,
}

impl From<&Particle> for ParticleView {
    fn from(p: &Particle) -> Self {
        ParticleView {
            x: p.position.x,
            y: p.position.y,
            hue: p.color.hue,
            saturation: p.color.saturation,
            lightness: p.color.lightness,
            opacity: p.opacity(),
        }
    }
}

/// The draggable marker of an emitter or attractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleView {
    pub name: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    /// Launch angle for emitters, mass for attractors.
    pub value: f64,
}

/// A snapshot of the field at a specific tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSnapshot {
    /// The tick at which the snapshot was taken.
    pub tick: u64,
    /// The number of live particles.
    pub particle_count: usize,
    pub emitters: Vec<HandleView>,
    pub attractors: Vec<HandleView>,
    /// Names of the selected items.
    pub selected: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "particles": null
    pub particles: Option<Vec<ParticleView>>,
}

impl FieldSnapshot {
    /// Captures `universe` and `particles` at `tick`. Particle views are only
    /// included when `with_particles` is set.
    pub fn capture(tick: u64, universe: &Universe, particles: &[Particle], with_particles: bool) -> Self {
        let emitters = universe
            .emitters()
            .iter()
            .map(|e| {
                let position = e.position();
                HandleView {
                    name: e.name.clone(),
                    label: e.label.clone(),
                    x: position.x,
                    y: position.y,
                    value: e.value(EmitterField::Angle),
                }
            })
            .collect();

        let attractors = universe
            .attractors()
            .iter()
            .map(|a| {
                let position = a.position();
                HandleView {
                    name: a.name.clone(),
                    label: a.label.clone(),
                    x: position.x,
                    y: position.y,
                    value: a.mass(),
                }
            })
            .collect();

        FieldSnapshot {
            tick,
            particle_count: particles.len(),
            emitters,
            attractors,
            selected: universe.selected_names().to_vec(),
            particles: with_particles.then(|| particles.iter().map(ParticleView::from).collect()),
        }
    }
}
