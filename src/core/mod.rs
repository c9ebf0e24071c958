pub mod declaration;
pub mod engine;
pub mod render;
pub mod template;

pub use crate::domain::model::{Configuration, Declaration, DeployReport};
pub use crate::domain::ports::{DeployAgent, Storage};
pub use crate::utils::error::Result;
