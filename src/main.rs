//! daybrief CLI.
//!
//! Reads a JSON array of raw reports (file argument or stdin), runs the
//! digest pipeline, and prints the briefing wrapped in a dated envelope.
//! The envelope (generation time, report count, footer) lives here so the
//! pipeline output itself stays deterministic.

use std::io::Read;
use std::process::ExitCode;
use std::sync::Arc;

use daybrief::config::DigestConfig;
use daybrief::digest::DigestPipeline;
use daybrief::error::DigestError;
use daybrief::reasoning::HttpReasoningClient;
use daybrief::types::RawReport;

fn print_usage() {
    eprintln!("Usage: daybrief [--probe] [reports.json]");
    eprintln!();
    eprintln!("  reports.json   JSON array of {{author, subject, date, body}} records;");
    eprintln!("                 read from stdin when omitted");
    eprintln!("  --probe        test the reasoning service connection and exit");
}

fn read_reports(path: Option<&str>) -> Result<Vec<RawReport>, DigestError> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&content)?)
}

/// Wrap the pipeline output in the delivery envelope.
fn envelope(body: &str, report_count: usize) -> String {
    let now = chrono::Local::now();
    format!(
        "=== Team Status Digest ===\n\
         Generated: {}\n\
         Reports collected: {}\n\n\
         {}\n\n\
         ---\n\
         Generated automatically by daybrief\n",
        now.format("%Y-%m-%d %H:%M:%S"),
        report_count,
        body
    )
}

async fn run() -> Result<(), DigestError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let probe = args.iter().any(|a| a == "--probe");
    let input_path = args.iter().find(|a| !a.starts_with("--")).map(|s| s.as_str());

    let config = DigestConfig::load()?;
    let client = Arc::new(HttpReasoningClient::new(config.service.clone()));
    let pipeline = DigestPipeline::new(config, client);

    if probe {
        pipeline.probe().await?;
        println!("reasoning service reachable");
        return Ok(());
    }

    let reports = read_reports(input_path)?;
    let body = pipeline.run(&reports).await;
    print!("{}", envelope(&body, reports.len()));
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` first so DAYBRIEF_* overrides and RUST_LOG are visible.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
