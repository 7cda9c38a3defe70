// src/engine/mod.rs

pub mod attempt;
pub mod grading;
pub mod progress;
