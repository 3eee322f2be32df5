//! Crossroads
//!
//! A four-way signalized intersection simulator with a runtime safety
//! kernel that drops to flashing amber on any unsafe light pattern.

pub mod simulation;
