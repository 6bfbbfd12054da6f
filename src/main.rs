use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use netscope::cli::Args;
use netscope::config::app_config::{load_config, setup_resolver, setup_tls_connector};
use netscope::probe::NetworkProber;
use netscope::probe::process::SystemRunner;
use netscope::report::{Console, build_report, explain, report_filename};
use netscope::session::run_session;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netscope=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let args = Args::parse();
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    let app_config = load_config(args.config.as_deref())?;
    if let Some(path) = &app_config.config_file {
        log::info!("Loaded configuration from {}", path.display());
    }
    let config = app_config.config;

    let resolver = setup_resolver(&app_config.dns_hosts)?;
    let connector = setup_tls_connector().context("Failed to build TLS connector")?;
    let prober = NetworkProber::new(config.probes.clone(), resolver, connector);

    let request = args.session_request(&config);
    if request.layers.is_empty() {
        anyhow::bail!("No layers enabled");
    }
    if request.faults.is_active() {
        log::info!(
            "Fault injection active: slow={:?} fail={:?} delay={}ms",
            request.faults.slow,
            request.faults.fail,
            request.faults.delay_ms
        );
    }

    let mut console = Console::new(std::io::stdout(), std::io::stderr(), args.json);

    let outcome = run_session(&prober, &request, |progress, result| {
        if let Err(e) = console.layer(progress, result) {
            log::warn!("Failed to print {} result: {}", progress.layer, e);
        }
    })
    .await;
    console.summary(&outcome)?;

    if config.explainer.enabled && !args.no_explain {
        let explanation = explain(&SystemRunner, &config.explainer, &outcome.results).await;
        console.explanation(&explanation)?;
    }

    let report = build_report(&request.domain, outcome.results);
    if args.json {
        console.report(&report)?;
    } else {
        let path = args
            .output
            .clone()
            .unwrap_or_else(|| report_filename(&request.domain).into());
        let file = File::create(&path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        report
            .write_json(BufWriter::new(file))
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        console.saved(&path)?;
    }

    Ok(())
}
