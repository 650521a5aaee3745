pub mod commands;
pub mod coordinator;
pub mod orchestrator;
pub mod realtime;
