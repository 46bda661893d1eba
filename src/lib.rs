//! Headless driver for the particle field.

pub mod simulation;

pub use simulation::FieldSimulation;
