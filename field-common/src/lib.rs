pub mod attractor;
pub mod config;
pub mod emitter;
pub mod error;
pub mod expression;
pub mod hash_codec;
pub mod particle;
pub mod presets;
pub mod snapshot;
pub mod universe;
pub mod variable;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use attractor::{Attractor, AttractorField};
pub use config::{FieldConfig, OutputConfig, OutputFormat, RandomConfig, SourceConfig, TimingConfig};
pub use emitter::{Emitter, EmitterField};
pub use error::{EditError, ExpressionError, HashError};
pub use expression::{Expression, Scope};
pub use particle::{Hsl, Particle, FIELD_SIZE};
pub use presets::{Preset, PRESETS};
pub use snapshot::{FieldSnapshot, HandleView, ParticleView};
pub use universe::{Item, ItemKind, Selection, Universe};
pub use variable::Variable;
pub use vecmath::{clamp, Vec2};
