use buildflow::cli::CliArgs;
use buildflow::collaborators::Collaborators;
use buildflow::events::LoggingEventSink;
use buildflow::observability::init_logging;
use buildflow::pipeline::{PhasePipeline, PlanSource, EXIT_ABORTED};
use buildflow::VERSION;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, error, info, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(&args.logging_config());

    debug!("buildflow v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            1
        }
    };

    std::process::exit(exit_code);
}

/// Runs the pipeline and returns the process exit code.
///
/// Settings errors surface as `Err` and exit with the Planning code.
async fn run(args: &CliArgs) -> anyhow::Result<i32> {
    let config = args
        .resolve_config()
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;
    let collaborators = Collaborators::from_config(&config);

    info!(
        manifest = %config.manifest_path.display(),
        max_parallel_agents = config.max_parallel_agents,
        "Starting build run"
    );

    let pipeline = PhasePipeline::new(config.clone(), collaborators)
        .with_event_sink(Arc::new(LoggingEventSink::new(Level::INFO)));

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel("interrupted by Ctrl-C");
        }
    });

    let report = pipeline
        .run(PlanSource::ManifestFile(config.manifest_path.clone()))
        .await;

    if let Err(e) = report.write_to(&config.report_path) {
        error!(
            path = %config.report_path.display(),
            error = %e,
            "Failed to write run report"
        );
    }

    println!("{}", report.summary());
    if report.exit_code == EXIT_ABORTED {
        eprintln!("Run aborted; partial report at {}", config.report_path.display());
    }

    Ok(report.exit_code)
}
