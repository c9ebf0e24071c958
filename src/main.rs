use as3_deploy::utils::{logger, validation::Validate};
use as3_deploy::{As3Error, CliConfig, DeployConfig, DeployEngine, LocalStorage};
use clap::Parser;
use std::io::Write;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting as3-deploy");
    tracing::debug!("CLI config: {:?}", cli);

    match run(&cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(
                "❌ as3-deploy failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: &CliConfig) -> Result<(), As3Error> {
    cli.validate()?;

    tracing::info!("📁 Loading configuration from: {}", cli.config);
    let config = DeployConfig::from_file(&cli.config)?;

    // 驗證配置：任何錯誤都在渲染之前回報
    config.validate()?;
    let variables = config.variables()?;
    tracing::info!(
        "✅ Configuration validated: partition {} with {} application(s)",
        variables.partition(),
        variables.applications().len()
    );

    let storage = LocalStorage::new(".".to_string());
    let engine = DeployEngine::new(config.renderer()?, storage)
        .with_output(cli.output.clone())
        .with_dry_run(cli.dry_run);

    if cli.remove {
        let client = config.client()?;
        let report = engine.remove(variables.partition(), &client).await?;
        println!("✅ Partition {} removed: {}", report.tenant, report.message);
        return Ok(());
    }

    // dry run 不需要 [provider]
    let client = if engine.is_dry_run() {
        None
    } else {
        let client = config.client()?;
        tracing::info!("🎯 Target device: {}", client.base_url());
        Some(client)
    };

    let outcome = engine.run(&variables, client.as_ref()).await?;
    match outcome.report {
        Some(report) => {
            println!("✅ Partition {} deployed: {}", report.tenant, report.message);
            if let Some(task_id) = &report.task_id {
                println!("📋 Task id: {}", task_id);
            }
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", outcome.declaration.to_pretty_json()?)?;
        }
    }

    Ok(())
}
