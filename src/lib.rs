//! RCA AI - composite rule-based decision engine for turn-based strategy sides

pub mod ai;
pub mod config;
pub mod core;
pub mod game;
