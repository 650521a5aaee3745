pub mod error;
pub mod language;
pub mod sequence;
pub mod settings;
pub mod surface;
pub mod types;
