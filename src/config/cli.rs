use crate::utils::error::Result;
use crate::utils::validation::{validate_path, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "as3-deploy")]
#[command(about = "Render an AS3 declaration from an application inventory and deploy it to a BIG-IP")]
pub struct CliConfig {
    /// Path to the TOML inventory
    #[arg(short, long, default_value = "as3-deploy.toml")]
    pub config: String,

    /// Render and print the declaration without contacting the device
    #[arg(long, conflicts_with = "remove")]
    pub dry_run: bool,

    /// Also write the rendered declaration to this file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Delete the partition's declaration from the device instead of deploying
    #[arg(long)]
    pub remove: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("--config", &self.config)?;
        if let Some(output) = &self.output {
            validate_path("--output", output)?;
        }
        Ok(())
    }
}
