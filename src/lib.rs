pub mod adapters;
pub mod config;
pub mod critic;
pub mod derive;
pub mod errors;
pub mod judge;
pub mod logging;
pub mod orchestrator;
pub mod package;
pub mod run_id;
pub mod spec;
pub mod tools;
pub mod ui;
pub mod util;
pub mod verify;
