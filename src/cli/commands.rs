use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use http::Method;
use serde_json::json;

use crate::config::GuardConfig;
use crate::exchange::{Exchange, HttpRequest, HttpResponse};
use crate::filter::handler_fn;
use crate::runtime_config::RuntimeConfig;
use crate::telemetry::{init_logging_with_config, LogConfig};

/// Command-line interface for brrtguard
#[derive(Parser)]
#[command(name = "brrtguard")]
#[command(about = "Filter-chain request security pipeline", long_about = None)]
pub struct Cli {
    /// Logging preset; `BRRTG_LOG_*` variables apply when omitted
    #[arg(long, global = true, value_enum)]
    pub log_preset: Option<LogPreset>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Named logging setups selectable with `--log-preset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogPreset {
    /// Pretty, debug level, synchronous, with source locations
    Dev,
    /// JSON, info level, sampled, non-blocking
    Prod,
}

impl Cli {
    /// Logging configuration for this invocation
    pub fn log_config(&self) -> LogConfig {
        match self.log_preset {
            Some(LogPreset::Dev) => LogConfig::default_dev(),
            Some(LogPreset::Prod) => LogConfig::default_prod(),
            None => LogConfig::from_env(),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a configuration file and print the resulting filter chain
    Check {
        /// Configuration file (defaults to BRRTG_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run one synthetic request through the configured chain
    Simulate {
        /// Configuration file (defaults to BRRTG_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long, default_value = "GET")]
        method: String,

        #[arg(short, long)]
        path: String,

        /// Value of the Origin header
        #[arg(long)]
        origin: Option<String>,

        /// Extra request header, `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request cookie, `name=value` (repeatable)
        #[arg(long = "cookie")]
        cookies: Vec<String>,

        /// Request body (form login expects `username=..&password=..`)
        #[arg(long)]
        body: Option<String>,
    },
}

/// Parse the command line, initialise logging and run the command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging_with_config(&cli.log_config())?;
    let stdout = std::io::stdout();
    execute(&cli.command, &RuntimeConfig::from_env(), &mut stdout.lock())
}

/// Run `command`, writing its report to `out`
pub fn execute(command: &Commands, runtime: &RuntimeConfig, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Check { config } => {
            let config = load_config(config.as_ref(), runtime)?;
            let proxy = config.into_proxy().context("Configuration check failed")?;
            for chain in proxy.chains() {
                writeln!(out, "chain {}", chain.matcher())?;
                for name in chain.filter_names() {
                    writeln!(out, "  {name}")?;
                }
            }
            writeln!(out, "configuration ok")?;
            Ok(())
        }
        Commands::Simulate {
            config,
            method,
            path,
            origin,
            headers,
            cookies,
            body,
        } => {
            let config = load_config(config.as_ref(), runtime)?;
            let proxy = config.into_proxy().context("Configuration check failed")?;

            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| anyhow!("'{method}' is not a valid HTTP method"))?;
            let mut request = HttpRequest::new(method, path.clone());
            if let Some(origin) = origin {
                request = request.with_header("origin", origin.clone());
            }
            for header in headers {
                let (name, value) = header
                    .split_once(':')
                    .ok_or_else(|| anyhow!("header '{header}' is not of the form 'Name: value'"))?;
                request = request.with_header(name.trim(), value.trim());
            }
            for cookie in cookies {
                let Some((name, value)) = cookie.split_once('=') else {
                    bail!("cookie '{cookie}' is not of the form 'name=value'");
                };
                request = request.with_cookie(name.trim(), value.trim());
            }
            if let Some(body) = body {
                request = request.with_body(body.clone());
            }

            let handler = handler_fn(|exchange: &mut Exchange| {
                let principal = exchange
                    .security_context()
                    .authentication()
                    .map(|a| a.principal().to_string());
                Ok(HttpResponse::json(
                    200,
                    json!({ "handler": "simulate", "principal": principal }),
                ))
            });
            let response = proxy.serve(request, &handler);
            write_response(out, &response)
        }
    }
}

fn load_config(path: Option<&PathBuf>, runtime: &RuntimeConfig) -> Result<GuardConfig> {
    let path = path
        .or(runtime.config_path.as_ref())
        .ok_or_else(|| anyhow!("no configuration file: pass --config or set BRRTG_CONFIG"))?;
    let mut config = GuardConfig::load(path)?;
    config.apply_runtime(runtime);
    Ok(config)
}

fn write_response(out: &mut impl Write, response: &HttpResponse) -> Result<()> {
    writeln!(out, "status {}", response.status)?;
    for (name, value) in response.headers.iter() {
        writeln!(out, "{name}: {value}")?;
    }
    if !response.body.is_null() {
        writeln!(out, "{}", serde_json::to_string_pretty(&response.body)?)?;
    }
    Ok(())
}
