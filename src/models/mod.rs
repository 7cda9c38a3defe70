// src/models/mod.rs

pub mod attempt;
pub mod cheating;
pub mod progress;
pub mod question;
pub mod response;
pub mod user;
