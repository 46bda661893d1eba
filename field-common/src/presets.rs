//! Bundled example fields.

use crate::error::HashError;
use crate::universe::Universe;
use rand::Rng;
use serde_json::json;

/// A named example, stored in the serialized item form.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub label: &'static str,
    pub description: &'static str,
    pub emitters: &'static [&'static str],
    pub attractors: &'static [&'static str],
}

const CENTRAL_ATTRACTOR: &str = "Attractor #0_Attractor #0_250_250_sin(t / 50) * 20";

macro_rules! flower_petal {
    ($name:literal) => {
        concat!(
            $name, "_", $name,
            "_cos(t/100 + j*pi/2)*200 + 250",
            "_-sin(t/100 + j*pi/2)*200 + 250",
            "_-t/100 + j*pi/2 + (j +1) * pi",
            "_pi / 4_3_6_true_sin(t / 100)*255_70_70_500"
        )
    };
}

macro_rules! spiral_arm {
    ($name:literal) => {
        concat!(
            $name, "_", $name,
            "_cos(t/100 + j*pi)*60 + 250",
            "_-sin(t/100 + j*pi)*60 + 250",
            "_-t/100 + j*pi + pi + sin(t/100)",
            "_pi / 4_20_6_t%2 == true_sin(t / 100)*255_70_70_500"
        )
    };
}

pub static PRESETS: [Preset; 3] = [
    Preset {
        label: "Waves",
        description: "Two facing emitters firing every tick past a pulsing attractor.",
        emitters: &[
            "Emitter #0_Emitter #0_50_250_0_pi / 4_20_6_t % 1 == 0_sin(t / 100)*255_90_70_500",
            "Emitter #1_Emitter #1_450_250_pi_pi / 4_20_6_t % 1 == 0_sin(t / 100)*255_90_70_500",
        ],
        attractors: &[CENTRAL_ATTRACTOR],
    },
    Preset {
        label: "Flower",
        description: "Four slow emitters orbiting a pulsing attractor.",
        emitters: &[
            flower_petal!("Emitter #0"),
            flower_petal!("Emitter #2"),
            flower_petal!("Emitter #1"),
            flower_petal!("Emitter #3"),
        ],
        attractors: &[CENTRAL_ATTRACTOR],
    },
    Preset {
        label: "Spiral",
        description: "Two counter-rotating emitters firing on odd ticks, no attractors.",
        emitters: &[spiral_arm!("Emitter #2"), spiral_arm!("Emitter #3")],
        attractors: &[],
    },
];

/// Looks a preset up by label, ignoring case.
pub fn find(label: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.label.eq_ignore_ascii_case(label))
}

impl Preset {
    /// The preset's JSON configuration, nothing selected.
    pub fn to_json(&self) -> String {
        json!({
            "selectedItems": [],
            "controlsHidden": false,
            "emitters": self.emitters,
            "attractors": self.attractors,
        })
        .to_string()
    }

    pub fn universe<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Universe, HashError> {
        Universe::from_json(&self.to_json(), rng)
    }
}

impl Universe {
    /// Loads a bundled preset by label, evaluated at tick 0.
    pub fn from_preset<R: Rng + ?Sized>(label: &str, rng: &mut R) -> Result<Universe, HashError> {
        find(label)
            .ok_or_else(|| HashError::UnknownPreset(label.to_string()))?
            .universe(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::EmitterField;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn every_preset_loads() {
        let mut rng = StdRng::seed_from_u64(3);
        for preset in PRESETS.iter() {
            let u = preset.universe(&mut rng).unwrap();
            assert_eq!(u.emitters().len(), preset.emitters.len(), "{}", preset.label);
            assert_eq!(u.attractors().len(), preset.attractors.len(), "{}", preset.label);
            assert!(u.emitters().iter().all(|e| e.field(EmitterField::X).is_valid()));
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find("spiral").map(|p| p.label), Some("Spiral"));
        assert!(find("Galaxy").is_none());
        assert!(matches!(
            Universe::from_preset("Galaxy", &mut StdRng::seed_from_u64(0)),
            Err(HashError::UnknownPreset(_))
        ));
    }

    #[test]
    fn flower_petals_keep_their_order() {
        let u = Universe::from_preset("Flower", &mut StdRng::seed_from_u64(0)).unwrap();
        let names: Vec<&str> = u.emitters().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Emitter #0", "Emitter #2", "Emitter #1", "Emitter #3"]);

        // Petals are spaced by their position in the list, not their name.
        let second = &u.emitters()[1];
        assert!((second.value(EmitterField::X) - 250.0).abs() < 1e-9);
        assert!((second.value(EmitterField::Y) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn spiral_fires_on_odd_ticks() {
        // `t % 2 == true` compares against 1.
        let mut rng = StdRng::seed_from_u64(0);
        let u = Universe::from_preset("Spiral", &mut rng).unwrap();
        assert_eq!(u.emitters()[0].value(EmitterField::EmissionRate), 0.0);
        let u = u.update(1, &mut rng);
        assert_eq!(u.emitters()[0].value(EmitterField::EmissionRate), 1.0);
    }
}
