use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cmdcore-cli", about = "JSON-RPC client for a running cmdcore server", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the JSON-RPC listener
    #[arg(long, global = true, default_value = "http://127.0.0.1:7001")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Invoke a command, e.g. `call add '[1, 2]'` or `call echo '{"text": "hi"}'`
    Call {
        method: String,
        /// JSON array or object of parameters
        params: Option<String>,
        /// Request id to send
        #[arg(long, default_value_t = 1)]
        id: u64,
    },
    /// Check that the server is up
    Health,
    /// List registered commands and their parameters
    Commands,
}

// ── Requests ─────────────────────────────────────────────────────

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

async fn run(cli: Cli) -> Result<Value, String> {
    let client = reqwest::Client::new();
    let request = match cli.command {
        Commands::Call { method, params, id } => {
            let mut body = json!({ "jsonrpc": "2.0", "method": method, "id": id });
            if let Some(params) = params {
                let params: Value =
                    serde_json::from_str(&params).map_err(|e| format!("params are not valid JSON: {e}"))?;
                body["params"] = params;
            }
            client.post(endpoint(&cli.url, "")).json(&body)
        }
        Commands::Health => client.get(endpoint(&cli.url, "health")),
        Commands::Commands => client.get(endpoint(&cli.url, "commands")),
    };
    let response = request
        .send()
        .await
        .map_err(|e| format!("request to {} failed: {e}", cli.url))?;
    response
        .json::<Value>()
        .await
        .map_err(|e| format!("invalid response body: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(body) => {
            let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
            println!("{pretty}");
            if body.get("error").is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unreachable)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        assert_eq!(endpoint("http://h:1/", "health"), "http://h:1/health");
        assert_eq!(endpoint("http://h:1", ""), "http://h:1/");
    }

    #[test]
    fn call_parses_params_positionally() {
        let cli = Cli::try_parse_from(["cmdcore-cli", "call", "add", "[1, 2]", "--id", "7"]).unwrap_or_else(|e| e.exit());
        match cli.command {
            Commands::Call { method, params, id } => {
                assert_eq!(method, "add");
                assert_eq!(params.as_deref(), Some("[1, 2]"));
                assert_eq!(id, 7);
            }
            _ => unreachable!(),
        }
    }
}
