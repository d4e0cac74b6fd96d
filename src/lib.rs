pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod learner;
pub mod monitor;
pub mod orchestrator;
pub mod phase;
pub mod tool;
pub mod ui;
