use crate::error::{EditError, HashError};
use crate::expression::Scope;
use crate::hash_codec::{check_field_text, FIELD_SEPARATOR};
use crate::particle::Particle;
use crate::variable::Variable;
use crate::vecmath::Vec2;
use std::fmt;
use std::str::FromStr;

/// Gravitational constant of the field.
pub const G: f64 = 0.1;

/// Editable attractor fields, in serialization order after name and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttractorField {
    X,
    Y,
    Mass,
}

impl AttractorField {
    pub const ALL: [AttractorField; 3] = [AttractorField::X, AttractorField::Y, AttractorField::Mass];

    pub fn as_str(self) -> &'static str {
        match self {
            AttractorField::X => "x",
            AttractorField::Y => "y",
            AttractorField::Mass => "mass",
        }
    }
}

impl fmt::Display for AttractorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttractorField {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttractorField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| EditError::UnknownField {
                kind: "attractor",
                field: s.to_string(),
            })
    }
}

/// A moving point mass. Negative mass repels.
#[derive(Debug, Clone)]
pub struct Attractor {
    pub name: String,
    pub label: String,
    x: Variable,
    y: Variable,
    mass: Variable,
    tick: u64,
}

impl Attractor {
    /// Number of `_`-separated fields in the serialized form.
    pub const SERIALIZED_FIELDS: usize = 5;

    /// An attractor at the centre of the field with the stock expressions.
    pub fn new(name: &str) -> Self {
        Attractor::with_expressions(name, name, "250", "250", "10")
    }

    pub fn with_expressions(name: &str, label: &str, x: &str, y: &str, mass: &str) -> Self {
        Attractor {
            name: name.to_string(),
            label: label.to_string(),
            x: Variable::from_text(x),
            y: Variable::from_text(y),
            mass: Variable::from_text(mass),
            tick: 0,
        }
    }

    /// Re-evaluates every field against `scope`.
    pub fn update(&self, scope: &Scope) -> Attractor {
        Attractor {
            name: self.name.clone(),
            label: self.label.clone(),
            x: self.x.update(scope),
            y: self.y.update(scope),
            mass: self.mass.update(scope),
            tick: scope.tick(),
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x.value(), self.y.value())
    }

    pub fn mass(&self) -> f64 {
        self.mass.value()
    }

    /// Tick of the last `update`.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn field(&self, field: AttractorField) -> &Variable {
        match field {
            AttractorField::X => &self.x,
            AttractorField::Y => &self.y,
            AttractorField::Mass => &self.mass,
        }
    }

    /// Replaces one field's expression.
    ///
    /// Unchecked: an expression containing `_` will not survive
    /// [`Attractor::serialize`]. Use [`Attractor::try_change`] for user input.
    pub fn change(&self, field: AttractorField, expression: &str) -> Attractor {
        let mut next = self.clone();
        let slot = match field {
            AttractorField::X => &mut next.x,
            AttractorField::Y => &mut next.y,
            AttractorField::Mass => &mut next.mass,
        };
        *slot = slot.change_expression(expression);
        next
    }

    /// Like [`Attractor::change`], rejecting expressions that do not evaluate or
    /// that contain the field separator.
    pub fn try_change(&self, field: AttractorField, expression: &str) -> Result<Attractor, EditError> {
        check_field_text(&field.to_string(), expression)?;
        self.field(field)
            .try_change_expression(expression)
            .map_err(|source| EditError::InvalidExpression {
                field: field.to_string(),
                source,
            })?;
        Ok(self.change(field, expression))
    }

    /// Replaces the display label. Labels are serialized verbatim, so `_`
    /// is rejected.
    pub fn try_change_label(&self, label: &str) -> Result<Attractor, EditError> {
        check_field_text("label", label)?;
        Ok(Attractor {
            label: label.to_string(),
            ..self.clone()
        })
    }

    /// Copy under a new name; the label follows the name. Names are
    /// generated, never typed, so they are not checked for `_`.
    pub fn renamed(&self, name: &str) -> Attractor {
        Attractor {
            name: name.to_string(),
            label: name.to_string(),
            ..self.clone()
        }
    }

    pub fn reset_time(&self) -> Attractor {
        Attractor {
            tick: 0,
            ..self.clone()
        }
    }

    /// Inverse-square pull on `particle`.
    ///
    /// There is no softening term: a particle sitting exactly on the
    /// attractor receives a NaN force.
    pub fn force_on(&self, particle: &Particle) -> Vec2 {
        let delta = self.position() - particle.position;
        let r2 = delta.length_squared();
        let r = r2.sqrt();
        let strength = G * self.mass() * particle.mass / r2;
        delta * strength / r
    }

    /// `name_label_x_y_mass`.
    pub fn serialize(&self) -> String {
        [
            self.name.as_str(),
            self.label.as_str(),
            self.x.expression(),
            self.y.expression(),
            self.mass.expression(),
        ]
        .join(FIELD_SEPARATOR)
    }

    pub fn unserialize(value: &str) -> Result<Attractor, HashError> {
        let bits: Vec<&str> = value.split(FIELD_SEPARATOR).collect();
        if bits.len() != Self::SERIALIZED_FIELDS {
            return Err(HashError::FieldCount {
                kind: "attractor",
                entry: value.to_string(),
                expected: Self::SERIALIZED_FIELDS,
                found: bits.len(),
            });
        }
        Ok(Attractor::with_expressions(bits[0], bits[1], bits[2], bits[3], bits[4]))
    }
}

impl PartialEq for Attractor {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.x == other.x && self.y == other.y && self.mass == other.mass
    }
}
