pub mod command_runner;
pub mod config_loader;
pub mod orchestrator;
pub mod shell;
pub mod supervisor;
