//! Core synthesis logic: types, configuration, templates, resolution, planning.

pub mod environment;
pub mod executor;
pub mod exports;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod state;
pub mod template;
pub mod types;
