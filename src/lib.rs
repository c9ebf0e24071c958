pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{As3Client, LocalStorage};
pub use config::DeployConfig;
pub use crate::core::{declaration::As3Document, engine::{DeployEngine, RunOutcome}, render::DeclarationRenderer};
pub use domain::model::{Application, ApplicationSpec, Configuration, Declaration, DeployReport};
pub use utils::error::{As3Error, Result};
