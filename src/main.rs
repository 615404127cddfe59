use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use cmdcore::commands::standard_commands;
use cmdcore::paths;
use cmdcore::registry::Registry;
use cmdcore::server::Server;
use cmdcore::settings::{self, LogFormat, Settings};
use cmdcore::telemetry;

#[derive(Parser)]
#[command(name = "cmdcore", about = "Serve registered commands over a line shell and JSON-RPC", version)]
struct Cli {
    /// Settings file (default: <config dir>/cmdcore/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind both listeners to this host
    #[arg(long)]
    host: Option<String>,

    /// Line-protocol port
    #[arg(long)]
    shell_port: Option<u16>,

    /// JSON-RPC port
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Log filter directive, e.g. `debug` or `cmdcore::shell=trace`
    #[arg(long)]
    log_filter: Option<String>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn apply(self, settings: &mut Settings) {
        if let Some(host) = self.host {
            settings.shell.host.clone_from(&host);
            settings.rpc.host = host;
        }
        if let Some(port) = self.shell_port {
            settings.shell.port = port;
        }
        if let Some(port) = self.rpc_port {
            settings.rpc.port = port;
        }
        if let Some(filter) = self.log_filter {
            settings.log.filter = filter;
        }
        if let Some(format) = self.log_format {
            settings.log.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match settings::resolve(cli.config.as_deref(), &paths::config_dir()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut settings);

    if let Err(e) = telemetry::initialise(&settings.log) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let registry = Arc::new(Registry::new());
    for command in standard_commands() {
        registry.register(command);
    }

    let server = match Server::start(&settings, registry).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");

    match server.stop().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "unclean shutdown");
            ExitCode::FAILURE
        }
    }
}
