use crate::attractor::Attractor;
use crate::vecmath::{clamp, Vec2};
use serde::{Deserialize, Serialize};

/// Side length of the square field. Particles outside `[0, FIELD_SIZE]` on
/// either axis are lost.
pub const FIELD_SIZE: f64 = 500.0;

/// Hue, saturation and lightness as produced by an emitter. Not clamped.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

/// A point mass spawned by an emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub color: Hsl,
    pub mass: f64,
    pub created_at: u64,
    pub current_tick: u64,
    pub life_span: f64,
}

impl Particle {
    /// A particle born at `tick`, at rest apart from `velocity`.
    pub fn spawn(tick: u64, position: Vec2, velocity: Vec2, color: Hsl, life_span: f64) -> Self {
        Particle {
            position,
            velocity,
            acceleration: Vec2::zero(),
            color,
            mass: 1.0,
            created_at: tick,
            current_tick: tick,
            life_span,
        }
    }

    /// Ticks elapsed since creation. Negative once time has been reset
    /// below the creation tick.
    pub fn age(&self) -> f64 {
        self.current_tick as f64 - self.created_at as f64
    }

    pub fn is_dead(&self) -> bool {
        self.age() >= self.life_span
    }

    /// Outside the field bounds. NaN coordinates count as lost.
    pub fn is_lost(&self) -> bool {
        let inside = |v: f64| (0.0..=FIELD_SIZE).contains(&v);
        !(inside(self.position.x) && inside(self.position.y))
    }

    /// Fades linearly from 1 at birth to 0 at the end of the life span.
    pub fn opacity(&self) -> f64 {
        let age = self.age();
        if age < 0.0 || self.life_span <= 0.0 {
            return 0.0;
        }
        clamp(1.0 - age / self.life_span, 0.0, 1.0)
    }

    /// Advances one tick: position by velocity, velocity by acceleration,
    /// then acceleration by the summed attractor forces.
    ///
    /// Acceleration is never reset, so forces compound across ticks. The
    /// bundled presets depend on this.
    pub fn integrate(&mut self, tick: u64, attractors: &[Attractor]) {
        self.position += self.velocity;
        self.velocity += self.acceleration;

        for attractor in attractors.iter().rev() {
            self.acceleration += attractor.force_on(self);
        }

        self.current_tick = tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle_at(x: f64, y: f64) -> Particle {
        Particle::spawn(0, Vec2::new(x, y), Vec2::zero(), Hsl::default(), 100.0)
    }

    #[test]
    fn dies_when_age_reaches_life_span() {
        let mut p = Particle::spawn(10, Vec2::new(250.0, 250.0), Vec2::zero(), Hsl::default(), 50.0);
        p.integrate(59, &[]);
        assert!(!p.is_dead());
        p.integrate(60, &[]);
        assert!(p.is_dead());
    }

    #[test]
    fn lost_outside_bounds() {
        assert!(particle_at(-1.0, 250.0).is_lost());
        assert!(particle_at(250.0, 500.5).is_lost());
        assert!(!particle_at(0.0, 500.0).is_lost());
        assert!(particle_at(f64::NAN, 250.0).is_lost());
    }

    #[test]
    fn integration_order() {
        let mut p = particle_at(100.0, 100.0);
        p.velocity = Vec2::new(1.0, 0.0);
        p.acceleration = Vec2::new(0.0, 2.0);
        p.integrate(1, &[]);
        assert_eq!(p.position, Vec2::new(101.0, 100.0));
        assert_eq!(p.velocity, Vec2::new(1.0, 2.0));
        assert_eq!(p.acceleration, Vec2::new(0.0, 2.0));
        p.integrate(2, &[]);
        assert_eq!(p.position, Vec2::new(102.0, 102.0));
        assert_eq!(p.velocity, Vec2::new(1.0, 4.0));
    }

    #[test]
    fn opacity_fades() {
        let mut p = particle_at(1.0, 1.0);
        assert_eq!(p.opacity(), 1.0);
        p.current_tick = 25;
        assert_eq!(p.opacity(), 0.75);
        p.current_tick = 200;
        assert_eq!(p.opacity(), 0.0);
    }
}
