pub mod config;

pub use config::{AnnotatorConfig, Config};
