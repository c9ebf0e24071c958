use crate::core::render::DeclarationRenderer;
use crate::core::{DeployAgent, Storage};
use crate::domain::model::{Configuration, Declaration, DeployReport};
use crate::utils::error::{As3Error, Result};

/// What a run produced. `report` is `None` for a dry run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub declaration: Declaration,
    pub report: Option<DeployReport>,
}

/// One render-and-submit run: render, optionally persist, then hand the
/// declaration to the agent. Stops at the first failure; nothing is retried.
pub struct DeployEngine<S: Storage> {
    renderer: DeclarationRenderer,
    storage: S,
    output: Option<String>,
    dry_run: bool,
}

impl<S: Storage> DeployEngine<S> {
    pub fn new(renderer: DeclarationRenderer, storage: S) -> Self {
        Self {
            renderer,
            storage,
            output: None,
            dry_run: false,
        }
    }

    /// Stop after rendering (and writing `--output`); the agent is never called.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Also write the rendered declaration to `path` (relative to the storage root).
    pub fn with_output(mut self, path: Option<String>) -> Self {
        self.output = path;
        self
    }

    /// Render and persist without contacting the device.
    pub async fn prepare(&self, config: &Configuration) -> Result<Declaration> {
        tracing::info!(
            "🧩 Rendering declaration for partition {} ({} application(s))",
            config.partition(),
            config.applications().len()
        );
        let declaration = self.renderer.render(config)?;

        if let Some(path) = &self.output {
            let text = declaration.to_pretty_json()?;
            self.storage.write_file(path, text.as_bytes()).await?;
            tracing::info!("📁 Declaration saved to: {}", path);
        }

        Ok(declaration)
    }

    /// Render, persist, then submit unless this is a dry run. `agent` may be
    /// `None` only for a dry run.
    pub async fn run<A>(&self, config: &Configuration, agent: Option<&A>) -> Result<RunOutcome>
    where
        A: DeployAgent + ?Sized,
    {
        let declaration = self.prepare(config).await?;

        if self.dry_run {
            tracing::info!(
                "🔍 DRY RUN MODE - declaration for {} was not submitted",
                declaration.tenant
            );
            return Ok(RunOutcome {
                declaration,
                report: None,
            });
        }

        let agent = agent.ok_or_else(|| {
            As3Error::config("a [provider] section is required unless running with --dry-run")
        })?;
        let report = agent.submit(&declaration).await?;
        tracing::info!("✅ Partition {} deployed: {}", report.tenant, report.message);

        Ok(RunOutcome {
            declaration,
            report: Some(report),
        })
    }

    pub async fn remove<A>(&self, tenant: &str, agent: &A) -> Result<DeployReport>
    where
        A: DeployAgent + ?Sized,
    {
        let report = agent.remove(tenant).await?;
        tracing::info!("✅ Partition {} removed: {}", report.tenant, report.message);
        Ok(report)
    }
}
