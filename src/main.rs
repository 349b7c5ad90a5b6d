use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod tools;
mod utils;

use api::server::{RelayConfig, RelayServer};
use utils::kome::DEFAULT_EXTRACT_ENDPOINT;
use utils::tmpfiles::{DEFAULT_DOWNLOAD_BASE, DEFAULT_UPLOAD_ENDPOINT};

/// Prints a banner framed to fit its widest line.
fn print_banner(lines: &[&str]) {
    let width = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0) + 4;

    eprintln!("\n\x1b[36m┌{}┐", "─".repeat(width));
    for line in lines {
        let padding = width - line.chars().count();
        let left = padding / 2;
        eprintln!("│{}{}{}│", " ".repeat(left), line, " ".repeat(padding - left));
    }
    eprintln!("└{}┘\x1b[0m\n", "─".repeat(width));
}

fn cli() -> Command {
    Command::new("pdf-relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Relays uploaded PDFs through tmpfiles.org and kome.ai and returns their text")
        .long_about(
            "Accepts POST /pdf with a multipart `pdf` field, re-uploads the file to\n\
            tmpfiles.org, hands the direct-download URL to kome.ai's pdf-to-text\n\
            endpoint and answers with {\"success\": true, \"text\": ...}.",
        )
        .arg(
            Arg::new("host")
                .long("host")
                .env("PDF_RELAY_HOST")
                .value_name("ADDR")
                .default_value("0.0.0.0")
                .help("Address to listen on"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .env("PDF_RELAY_PORT")
                .value_name("PORT")
                .default_value("8000")
                .value_parser(value_parser!(u16))
                .help("Port to listen on"),
        )
        .arg(
            Arg::new("upload-endpoint")
                .long("upload-endpoint")
                .env("PDF_RELAY_UPLOAD_ENDPOINT")
                .value_name("URL")
                .default_value(DEFAULT_UPLOAD_ENDPOINT)
                .help("File hosting upload endpoint"),
        )
        .arg(
            Arg::new("download-base")
                .long("download-base")
                .env("PDF_RELAY_DOWNLOAD_BASE")
                .value_name("URL")
                .default_value(DEFAULT_DOWNLOAD_BASE)
                .help("Origin used to build /dl/<id>/<filename> download URLs"),
        )
        .arg(
            Arg::new("extract-endpoint")
                .long("extract-endpoint")
                .env("PDF_RELAY_EXTRACT_ENDPOINT")
                .value_name("URL")
                .default_value(DEFAULT_EXTRACT_ENDPOINT)
                .help("Text extraction endpoint"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .env("PDF_RELAY_TIMEOUT_SECS")
                .value_name("SECS")
                .default_value("60")
                .value_parser(value_parser!(u64))
                .help("Timeout for each upstream call"),
        )
        .arg(
            Arg::new("max-upload-mb")
                .long("max-upload-mb")
                .env("PDF_RELAY_MAX_UPLOAD_MB")
                .value_name("MB")
                .default_value("100")
                .value_parser(value_parser!(usize))
                .help("Largest accepted request body"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors and skip the banner")
                .action(ArgAction::SetTrue),
        )
}

fn config_from(matches: &ArgMatches) -> RelayConfig {
    let string = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();
    let defaults = RelayConfig::default();

    RelayConfig {
        host: string("host"),
        port: matches.get_one::<u16>("port").copied().unwrap_or(defaults.port),
        upload_endpoint: string("upload-endpoint"),
        download_base: string("download-base"),
        extract_endpoint: string("extract-endpoint"),
        timeout: matches
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(defaults.timeout),
        max_upload_bytes: matches
            .get_one::<usize>("max-upload-mb")
            .map(|mb| mb.saturating_mul(1024 * 1024))
            .unwrap_or(defaults.max_upload_bytes),
    }
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    let quiet = matches.get_flag("quiet");

    // Logs go to stderr; RUST_LOG wins over --quiet
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if quiet { "error" } else { "info" }));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let config = config_from(&matches);

    if !quiet {
        print_banner(&[
            "",
            "PDF Relay",
            "",
            "POST /pdf  ->  tmpfiles.org  ->  kome.ai",
            "",
        ]);
    }

    info!("Starting PDF relay...");

    if let Err(e) = RelayServer::new(config).start().await {
        error!("Failed to start server: {:#}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_public_services() {
        let matches = cli().try_get_matches_from(["pdf-relay"]).unwrap();
        let config = config_from(&matches);

        assert_eq!(config.port, 8000);
        assert_eq!(config.upload_endpoint, "https://tmpfiles.org/api/v1/upload");
        assert_eq!(config.download_base, "https://tmpfiles.org");
        assert_eq!(
            config.extract_endpoint,
            "https://api.kome.ai/api/tools/pdf-to-text"
        );
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn flags_override_defaults() {
        let matches = cli()
            .try_get_matches_from([
                "pdf-relay",
                "-p",
                "9090",
                "--timeout",
                "5",
                "--max-upload-mb",
                "1",
                "--extract-endpoint",
                "http://localhost:1/x",
            ])
            .unwrap();
        let config = config_from(&matches);

        assert_eq!(config.port, 9090);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_upload_bytes, 1024 * 1024);
        assert_eq!(config.extract_endpoint, "http://localhost:1/x");
    }
}
