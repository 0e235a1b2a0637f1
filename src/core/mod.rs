//! Core modules for the stopgate termination gate.
//!
//! All gate subsystems and shared primitives live here.

pub mod bias;
pub mod broker;
pub mod bypass;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod model;
pub mod output;
pub mod postcompletion;
pub mod requirements;
pub mod schemas;
pub mod store;
pub mod subagents;
pub mod time;
