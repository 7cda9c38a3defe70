// src/handlers/mod.rs

pub mod attempts;
pub mod cheating;
pub mod progress;
