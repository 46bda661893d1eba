use anyhow::{Context, Result};
use field_common::{FieldConfig, FieldSnapshot, Particle, Universe};
use log::{debug, info, trace, warn};
use rand::prelude::*;

/// Drives a [`Universe`] tick by tick and owns the live particles.
pub struct FieldSimulation {
    /// The driver configuration.
    config: FieldConfig,
    /// Source of every `r` / `R` draw.
    rng: StdRng,
    /// Emitters, attractors and selection as of the last tick.
    universe: Universe,
    /// Live particles, oldest first.
    particles: Vec<Particle>,
    /// The tick the next `step` will run.
    current_tick: u64,
    /// While paused no tick advances.
    paused: bool,
    /// Stores collected snapshots at record intervals.
    recorded_snapshots: Vec<FieldSnapshot>,
}

impl FieldSimulation {
    /// Creates a new `FieldSimulation` from the configured source: a hash,
    /// a preset, or the default universe.
    pub fn new(config: FieldConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.random.seed);

        let universe = match (&config.source.hash, &config.source.preset) {
            (Some(hash), _) => Universe::from_hash(hash, &mut rng),
            (None, Some(label)) => Universe::from_preset(label, &mut rng)
                .with_context(|| format!("Cannot load preset '{}'", label))?,
            (None, None) => Universe::initial(&mut rng),
        };
        info!(
            "Universe loaded: {} emitters, {} attractors.",
            universe.emitters().len(),
            universe.attractors().len()
        );

        Ok(Self {
            config,
            rng,
            universe,
            particles: Vec::new(),
            current_tick: 0,
            paused: false,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Advances the field by one tick: re-evaluate every item, let emitters
    /// fire, integrate the particles that existed before this tick, then drop
    /// the dead and the lost.
    ///
    /// While paused only lost particles are dropped.
    pub fn step(&mut self) -> Result<()> {
        if self.paused {
            self.particles.retain(|p| !p.is_lost());
            return Ok(());
        }

        let tick = self.current_tick;
        let existing = self.particles.len();

        // --- 1. Update expressions ---
        self.universe = self.universe.update(tick, &mut self.rng);

        // --- 2. Emit ---
        self.universe = self.universe.emit(&mut self.particles);
        let emitted = self.particles.len() - existing;

        // --- 3. Integrate ---
        let attractors = self.universe.attractors();
        for particle in &mut self.particles[..existing] {
            particle.integrate(tick, attractors);
        }

        // --- 4. Reap ---
        let before = self.particles.len();
        self.particles.retain(|p| !p.is_dead() && !p.is_lost());

        trace!(
            "Tick {}: emitted {}, removed {}, live {}",
            tick,
            emitted,
            before - self.particles.len(),
            self.particles.len()
        );

        self.current_tick += 1;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Clears every particle and restarts all items from tick 0.
    pub fn reset_time(&mut self) {
        debug!("Resetting time at tick {}.", self.current_tick);
        self.particles.clear();
        self.universe = self.universe.reset_time();
        self.current_tick = 0;
    }

    /// Replaces the universe with a bundled preset and restarts from tick 0.
    pub fn load_preset(&mut self, label: &str) -> Result<()> {
        let universe = Universe::from_preset(label, &mut self.rng)
            .with_context(|| format!("Cannot load preset '{}'", label))?;
        info!("Loaded preset '{}'.", label);
        self.replace_universe(universe);
        Ok(())
    }

    /// Replaces the universe with a decoded configuration string and
    /// restarts from tick 0. Malformed strings load the default universe.
    pub fn load_hash(&mut self, hash: &str) {
        let universe = Universe::from_hash(hash, &mut self.rng);
        self.replace_universe(universe);
    }

    fn replace_universe(&mut self, universe: Universe) {
        self.universe = universe;
        self.particles.clear();
        self.current_tick = 0;
    }

    /// Applies an edit to the universe, keeping particles and time.
    pub fn edit<F>(&mut self, edit: F)
    where
        F: FnOnce(&Universe) -> Universe,
    {
        self.universe = edit(&self.universe);
    }

    /// Like [`FieldSimulation::edit`] for edits that can be rejected. On error
    /// the universe is left untouched.
    pub fn try_edit<F, E>(&mut self, edit: F) -> Result<(), E>
    where
        F: FnOnce(&Universe) -> Result<Universe, E>,
        E: std::fmt::Display,
    {
        match edit(&self.universe) {
            Ok(universe) => {
                self.universe = universe;
                Ok(())
            }
            Err(e) => {
                warn!("Edit rejected: {}", e);
                Err(e)
            }
        }
    }

    /// Adds an emitter evaluated at the current tick.
    pub fn add_emitter(&mut self) {
        self.universe = self.universe.add_emitter(self.current_tick, &mut self.rng);
    }

    /// Adds an attractor evaluated at the current tick.
    pub fn add_attractor(&mut self) {
        self.universe = self.universe.add_attractor(self.current_tick, &mut self.rng);
    }

    /// Retrieves the current positions of all live particles.
    pub fn get_results(&self) -> Vec<(f64, f64)> {
        self.particles.iter().map(|p| (p.position.x, p.position.y)).collect()
    }

    pub fn current_particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Provides access to the driver configuration.
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// The shareable configuration string of the current universe.
    pub fn hash(&self) -> String {
        self.universe.to_hash()
    }

    /// Captures the current state as a snapshot.
    pub fn record_snapshot(&mut self) -> Result<()> {
        debug!("Recording snapshot at tick {}...", self.current_tick);
        let snapshot = FieldSnapshot::capture(
            self.current_tick,
            &self.universe,
            &self.particles,
            self.config.output.save_particles_in_snapshot,
        );
        self.recorded_snapshots.push(snapshot);
        Ok(())
    }

    /// Provides access to the recorded snapshots.
    pub fn get_recorded_snapshots(&self) -> &[FieldSnapshot] {
        &self.recorded_snapshots
    }
}
