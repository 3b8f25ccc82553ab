//! # hdb-core
//!
//! Ambient plumbing shared by the HDB resale price predictor: layered
//! configuration and the tracing subscriber setup.

pub mod config;
pub mod logging;
