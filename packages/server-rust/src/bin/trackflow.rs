use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use trackflow_core::ToolCall;
use trackflow_server::cli::{load_pipeline, parse_arguments, Cli, Command};
use trackflow_server::linear::LinearClient;
use trackflow_server::logging;
use trackflow_server::service::{BackgroundWorker, MetricsCollector, MetricsReporter, ToolServer};
use trackflow_server::TrackerApi;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, cli.log_json);

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to start the Prometheus exporter")?;
        tracing::info!(%addr, "serving Prometheus metrics");
    }

    let config = cli.server_config();
    let api: Arc<dyn TrackerApi> = Arc::new(LinearClient::new(cli.linear_config())?);
    let collector = Arc::new(MetricsCollector::new());
    let server = ToolServer::with_catalog(&api, &config, Arc::clone(&collector));

    let mut reporter = BackgroundWorker::start(
        MetricsReporter::new(collector),
        config.metrics_report_interval_ms,
    );

    let response = match cli.command {
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&server.list_tools())?);
            None
        }
        Command::Call { name, args } => {
            let arguments = parse_arguments(&args)?;
            Some(server.call(ToolCall::new(name, arguments)).await)
        }
        Command::Pipeline { file } => {
            let request = load_pipeline(&file).await?;
            Some(server.run_pipeline(&request).await)
        }
    };

    // Stopping the reporter emits the final report.
    reporter.stop().await;

    let Some(response) = response else {
        return Ok(ExitCode::SUCCESS);
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
