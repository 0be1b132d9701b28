mod logging;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cities_core::{
    AsyncFetchController, DisplayMode, DisplayResult, FetchListener, HttpSoapTransport,
    ServiceConfig, SoapVersion, UreqExecutor,
};

#[derive(Parser, Debug)]
#[command(name = "cities")]
#[command(about = "List the major cities of a country via the webserviceX SOAP service")]
struct Args {
    /// Country to look up. Without it, every line read from stdin is a query.
    country: Option<String>,

    /// How to show the result
    #[arg(short, long)]
    mode: Option<DisplayMode>,

    /// SOAP endpoint URL (overrides config file and CITIES_ENDPOINT)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// SOAP version, 1.1 or 1.2
    #[arg(long)]
    soap_version: Option<SoapVersion>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Writes each delivered result to stdout.
struct PrintListener<W: Write> {
    out: W,
}

impl<W: Write> FetchListener for PrintListener<W> {
    fn on_result(&mut self, generation: u64, result: DisplayResult) {
        tracing::debug!(generation, "Rendering result");
        if let Err(err) = render(&mut self.out, &result) {
            tracing::error!(error = %err, "Could not write result");
        }
    }
}

fn render(out: &mut impl Write, result: &DisplayResult) -> io::Result<()> {
    match result {
        DisplayResult::Cities(cities) if cities.is_empty() => writeln!(out, "No cities found.")?,
        DisplayResult::Cities(cities) => {
            for city in cities {
                writeln!(out, "{city}")?;
            }
        }
        DisplayResult::Text(text) => writeln!(out, "{text}")?,
    }
    out.flush()
}

fn load_config(args: &Args) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(version) = args.soap_version {
        config.soap_version = version;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    config.validate().context("validating configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_cli_logger(args.verbose);

    let config = load_config(&args)?;
    tracing::debug!(?config, "Configuration");

    let settings = config.fetch_settings();
    tracing::info!(endpoint = %settings.endpoint, mode = %settings.mode, "Starting cities client");

    let transport = Arc::new(HttpSoapTransport::new(UreqExecutor::new()));
    let listener = PrintListener { out: io::stdout() };
    let mut controller = AsyncFetchController::new(transport, settings, listener);

    match args.country {
        Some(country) => {
            controller.start(&country);
            controller.wait();
        }
        None => {
            for line in io::stdin().lock().lines() {
                let line = line.context("reading stdin")?;
                controller.start(line.trim());
                controller.wait();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(result: &DisplayResult) -> String {
        let mut out = Vec::new();
        render(&mut out, result).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn renders_one_city_per_line() {
        let result = DisplayResult::Cities(vec!["Agen".to_string(), "Brest".to_string()]);
        assert_eq!(rendered(&result), "Agen\nBrest\n");
    }

    #[test]
    fn renders_empty_state() {
        assert_eq!(rendered(&DisplayResult::Cities(Vec::new())), "No cities found.\n");
    }

    #[test]
    fn renders_text_verbatim() {
        let result = DisplayResult::Text("No Data".to_string());
        assert_eq!(rendered(&result), "No Data\n");
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "cities",
            "France",
            "--mode",
            "text",
            "--endpoint",
            "http://127.0.0.1:3000/globalweather.asmx",
            "--soap-version",
            "1.1",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.mode, DisplayMode::Text);
        assert_eq!(config.endpoint, "http://127.0.0.1:3000/globalweather.asmx");
        assert_eq!(config.soap_version, SoapVersion::V11);
    }

    #[test]
    fn bad_soap_version_flag_is_rejected() {
        assert!(Args::try_parse_from(["cities", "--soap-version", "3"]).is_err());
    }

    #[test]
    fn bad_endpoint_flag_fails_validation() {
        let args = Args::parse_from(["cities", "--endpoint", "ftp://example.com/ws"]);
        assert!(load_config(&args).is_err());
    }
}
