use crate::error::{EditError, HashError};
use crate::expression::Scope;
use crate::hash_codec::{check_field_text, FIELD_SEPARATOR};
use crate::particle::{Hsl, Particle};
use crate::variable::Variable;
use crate::vecmath::Vec2;
use log::warn;
use std::fmt;
use std::str::FromStr;

/// Divides the user-facing velocity into simulation units per tick.
pub const VELOCITY_SCALE: f64 = 20.0;

/// Upper bound on particles spawned by one emitter in one tick.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Editable emitter fields, in serialization order after name and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterField {
    X,
    Y,
    Angle,
    Spread,
    Velocity,
    BatchSize,
    EmissionRate,
    Hue,
    Saturation,
    Lightness,
    LifeSpan,
}

impl EmitterField {
    pub const COUNT: usize = 11;

    pub const ALL: [EmitterField; Self::COUNT] = [
        EmitterField::X,
        EmitterField::Y,
        EmitterField::Angle,
        EmitterField::Spread,
        EmitterField::Velocity,
        EmitterField::BatchSize,
        EmitterField::EmissionRate,
        EmitterField::Hue,
        EmitterField::Saturation,
        EmitterField::Lightness,
        EmitterField::LifeSpan,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EmitterField::X => "x",
            EmitterField::Y => "y",
            EmitterField::Angle => "angle",
            EmitterField::Spread => "spread",
            EmitterField::Velocity => "velocity",
            EmitterField::BatchSize => "batchSize",
            EmitterField::EmissionRate => "emissionRate",
            EmitterField::Hue => "hue",
            EmitterField::Saturation => "saturation",
            EmitterField::Lightness => "lightness",
            EmitterField::LifeSpan => "lifeSpan",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EmitterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmitterField {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmitterField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| EditError::UnknownField {
                kind: "emitter",
                field: s.to_string(),
            })
    }
}

/// Expressions a freshly added emitter starts with, in field order.
const DEFAULT_EXPRESSIONS: [&str; EmitterField::COUNT] = [
    "50",
    "50",
    "0",
    "pi / 4",
    "20",
    "6",
    "true",
    "abs(sin(t / 50)) + 1",
    "90",
    "70",
    "500",
];

/// Spawns a fan of particles whenever its emission rate evaluates non-zero.
#[derive(Debug, Clone)]
pub struct Emitter {
    pub name: String,
    pub label: String,
    fields: [Variable; EmitterField::COUNT],
    /// Tick of the last `update`.
    tick: u64,
    /// Tick at which this emitter last emitted, if it has since the last reset.
    emitted_at: Option<u64>,
}

impl Emitter {
    /// Number of `_`-separated fields in the serialized form.
    pub const SERIALIZED_FIELDS: usize = EmitterField::COUNT + 2;

    /// An emitter with the stock expressions.
    pub fn new(name: &str) -> Self {
        Emitter::from_parts(name, name, DEFAULT_EXPRESSIONS)
    }

    fn from_parts(name: &str, label: &str, expressions: [&str; EmitterField::COUNT]) -> Self {
        Emitter {
            name: name.to_string(),
            label: label.to_string(),
            fields: expressions.map(Variable::from_text),
            tick: 0,
            emitted_at: None,
        }
    }

    /// Re-evaluates every field against `scope`. Emission bookkeeping is
    /// carried over, so updating twice at one tick cannot emit twice.
    pub fn update(&self, scope: &Scope) -> Emitter {
        Emitter {
            name: self.name.clone(),
            label: self.label.clone(),
            fields: self.fields.each_ref().map(|v| v.update(scope)),
            tick: scope.tick(),
            emitted_at: self.emitted_at,
        }
    }

    pub fn field(&self, field: EmitterField) -> &Variable {
        &self.fields[field.index()]
    }

    /// Cached value of one field.
    pub fn value(&self, field: EmitterField) -> f64 {
        self.field(field).value()
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.value(EmitterField::X), self.value(EmitterField::Y))
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Whether the current tick has not emitted yet.
    pub fn can_emit(&self) -> bool {
        self.emitted_at.map_or(true, |last| self.tick > last)
    }

    /// Number of particles per emission: the rounded `batchSize`, never
    /// negative and at most [`MAX_BATCH_SIZE`].
    pub fn batch_size(&self) -> usize {
        let raw = self.value(EmitterField::BatchSize).round();
        if raw <= 0.0 {
            return 0;
        }
        if raw > MAX_BATCH_SIZE as f64 {
            warn!(
                "Emitter '{}' batch size {} clamped to {}.",
                self.name, raw, MAX_BATCH_SIZE
            );
            return MAX_BATCH_SIZE;
        }
        raw as usize
    }

    /// Launch angle of particle `index` within a batch of `count`.
    ///
    /// The batch fans evenly across `[angle - spread/2, angle + spread/2]`;
    /// a single particle leaves at `angle`.
    pub fn launch_angle(&self, index: usize, count: usize) -> f64 {
        let angle = self.value(EmitterField::Angle);
        let spread = self.value(EmitterField::Spread);
        let step = if count > 1 {
            spread / (count - 1) as f64 * index as f64
        } else {
            spread / 2.0
        };
        angle - spread / 2.0 + step
    }

    /// Appends this tick's batch to `target` and returns the emitter marked
    /// as having emitted. A zero emission rate still consumes the tick.
    pub fn emit(&self, target: &mut Vec<Particle>) -> Emitter {
        if !self.can_emit() {
            return self.clone();
        }

        if self.value(EmitterField::EmissionRate) != 0.0 {
            let count = self.batch_size();
            let speed = self.value(EmitterField::Velocity) / VELOCITY_SCALE;
            let color = Hsl {
                hue: self.value(EmitterField::Hue),
                saturation: self.value(EmitterField::Saturation),
                lightness: self.value(EmitterField::Lightness),
            };
            let life_span = self.value(EmitterField::LifeSpan);
            let position = self.position();

            target.reserve(count);
            for i in 0..count {
                let velocity = Vec2::from_polar(speed, self.launch_angle(i, count));
                target.push(Particle::spawn(self.tick, position, velocity, color, life_span));
            }
        }

        Emitter {
            emitted_at: Some(self.tick),
            ..self.clone()
        }
    }

    /// Replaces one field's expression.
    ///
    /// Unchecked: an expression containing `_` will not survive
    /// [`Emitter::serialize`]. Use [`Emitter::try_change`] for user input.
    pub fn change(&self, field: EmitterField, expression: &str) -> Emitter {
        let mut next = self.clone();
        next.fields[field.index()] = self.field(field).change_expression(expression);
        next
    }

    /// Like [`Emitter::change`], rejecting expressions that do not evaluate or
    /// that contain the field separator.
    pub fn try_change(&self, field: EmitterField, expression: &str) -> Result<Emitter, EditError> {
        check_field_text(&field.to_string(), expression)?;
        let variable = self
            .field(field)
            .try_change_expression(expression)
            .map_err(|source| EditError::InvalidExpression {
                field: field.to_string(),
                source,
            })?;
        let mut next = self.clone();
        next.fields[field.index()] = variable;
        Ok(next)
    }

    /// Replaces the display label. Labels are serialized verbatim, so `_`
    /// is rejected.
    pub fn try_change_label(&self, label: &str) -> Result<Emitter, EditError> {
        check_field_text("label", label)?;
        Ok(Emitter {
            label: label.to_string(),
            ..self.clone()
        })
    }

    /// Copy under a new name; the label follows the name. Names are
    /// generated, never typed, so they are not checked for `_`.
    pub fn renamed(&self, name: &str) -> Emitter {
        Emitter {
            name: name.to_string(),
            label: name.to_string(),
            ..self.clone()
        }
    }

    /// Rewinds the emitter to tick 0 so that tick 0 can emit again.
    pub fn reset_time(&self) -> Emitter {
        Emitter {
            tick: 0,
            emitted_at: None,
            ..self.clone()
        }
    }

    /// `name_label_x_y_angle_spread_velocity_batchSize_emissionRate_hue_saturation_lightness_lifeSpan`.
    pub fn serialize(&self) -> String {
        let mut bits = Vec::with_capacity(Self::SERIALIZED_FIELDS);
        bits.push(self.name.as_str());
        bits.push(self.label.as_str());
        bits.extend(self.fields.iter().map(Variable::expression));
        bits.join(FIELD_SEPARATOR)
    }

    pub fn unserialize(value: &str) -> Result<Emitter, HashError> {
        let bits: Vec<&str> = value.split(FIELD_SEPARATOR).collect();
        if bits.len() != Self::SERIALIZED_FIELDS {
            return Err(HashError::FieldCount {
                kind: "emitter",
                entry: value.to_string(),
                expected: Self::SERIALIZED_FIELDS,
                found: bits.len(),
            });
        }
        let expressions: [&str; EmitterField::COUNT] = std::array::from_fn(|i| bits[i + 2]);
        Ok(Emitter::from_parts(bits[0], bits[1], expressions))
    }
}

impl PartialEq for Emitter {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.fields == other.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn configured(changes: &[(EmitterField, &str)]) -> Emitter {
        changes
            .iter()
            .fold(Emitter::new("E"), |e, (field, expr)| e.change(*field, expr))
    }

    #[test]
    fn zero_rate_never_emits() {
        let e = configured(&[(EmitterField::EmissionRate, "0")]);
        let mut out = Vec::new();
        let mut current = e;
        for t in 0..50 {
            current = current.update(&Scope::shared(t, 0.5)).emit(&mut out);
        }
        assert!(out.is_empty());
    }

    #[test]
    fn batch_fans_across_spread() {
        let e = configured(&[
            (EmitterField::BatchSize, "3"),
            (EmitterField::Angle, "0"),
            (EmitterField::Spread, "pi"),
            (EmitterField::Velocity, "20"),
        ])
        .update(&Scope::default());

        let mut out = Vec::new();
        e.emit(&mut out);
        assert_eq!(out.len(), 3);

        let angles: Vec<f64> = out.iter().map(|p| p.velocity.angle()).collect();
        assert_abs_diff_eq!(angles[0], -PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(angles[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(angles[2], PI / 2.0, epsilon = 1e-12);
        for p in &out {
            assert_abs_diff_eq!(p.velocity.length(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_particle_leaves_at_angle() {
        let e = configured(&[
            (EmitterField::BatchSize, "1"),
            (EmitterField::Angle, "pi"),
            (EmitterField::Spread, "pi / 4"),
        ])
        .update(&Scope::default());
        assert_abs_diff_eq!(e.launch_angle(0, 1), PI, epsilon = 1e-12);
    }

    #[test]
    fn particles_carry_emitter_values() {
        let e = configured(&[
            (EmitterField::X, "10 + t"),
            (EmitterField::Y, "20"),
            (EmitterField::BatchSize, "2.6"),
            (EmitterField::Hue, "400"),
            (EmitterField::Saturation, "50"),
            (EmitterField::Lightness, "-5"),
            (EmitterField::LifeSpan, "42"),
        ])
        .update(&Scope::shared(5, 0.0));

        let mut out = Vec::new();
        e.emit(&mut out);
        assert_eq!(out.len(), 3);
        let p = &out[0];
        assert_eq!(p.position, Vec2::new(15.0, 20.0));
        assert_eq!(p.color.hue, 400.0);
        assert_eq!(p.color.lightness, -5.0);
        assert_eq!(p.life_span, 42.0);
        assert_eq!(p.created_at, 5);
        assert_eq!(p.current_tick, 5);
    }

    #[test]
    fn a_tick_emits_at_most_once() {
        let e = configured(&[(EmitterField::BatchSize, "1")]).update(&Scope::shared(3, 0.0));
        let mut out = Vec::new();
        let e = e.emit(&mut out);
        let e = e.emit(&mut out);
        assert_eq!(out.len(), 1);

        // Re-evaluating the same or an earlier tick is harmless.
        let e = e.update(&Scope::shared(3, 0.0)).emit(&mut out);
        assert_eq!(out.len(), 1);
        let e = e.update(&Scope::shared(2, 0.0)).emit(&mut out);
        assert_eq!(out.len(), 1);

        e.update(&Scope::shared(4, 0.0)).emit(&mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn reset_time_allows_tick_zero_again() {
        let e = configured(&[(EmitterField::BatchSize, "1")]).update(&Scope::default());
        let mut out = Vec::new();
        let e = e.emit(&mut out);
        assert!(!e.can_emit());
        let e = e.reset_time().update(&Scope::default());
        assert!(e.can_emit());
        e.emit(&mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn negative_batch_size_emits_nothing() {
        let e = configured(&[(EmitterField::BatchSize, "-4")]).update(&Scope::default());
        let mut out = Vec::new();
        e.emit(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn serialized_form() {
        let e = Emitter::new("Emitter #3");
        let s = e.serialize();
        assert_eq!(
            s,
            "Emitter #3_Emitter #3_50_50_0_pi / 4_20_6_true_abs(sin(t / 50)) + 1_90_70_500"
        );
        let back = Emitter::unserialize(&s).unwrap();
        assert_eq!(back.name, "Emitter #3");
        assert_eq!(back, e);
        assert!(Emitter::unserialize("only_three_bits").is_err());
    }

    #[test]
    fn field_names() {
        for field in EmitterField::ALL {
            assert_eq!(field.as_str().parse::<EmitterField>().unwrap(), field);
        }
        assert!("color".parse::<EmitterField>().is_err());
    }
}
