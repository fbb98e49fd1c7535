pub mod chartink;
pub mod client;
pub mod orchestrator;
pub mod simulator;
