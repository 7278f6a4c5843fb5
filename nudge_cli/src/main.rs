use nudge_api::{Finding, guide_towards_containment, guide_towards_equality, report_finding_from_hook};
use nudge_core::config::NudgeConfig;
use nudge_core::{Fuzzer, runtime};

use clap::Parser;
use env_logger::{Builder, Env, fmt};
use log::Level;
use std::io::Write;
use std::panic::catch_unwind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    #[clap(short, long)]
    iterations: Option<u64>,
    /// Continue fuzzing until N distinct findings have been reported.
    #[clap(short, long)]
    keep_going: Option<u32>,
    /// Comma-separated list of dedup tokens to ignore.
    #[clap(long, value_delimiter = ',')]
    ignore: Vec<String>,
    #[clap(short, long)]
    seed: Option<u64>,
    /// Directory crashing inputs are written to.
    #[clap(long)]
    artifact_dir: Option<PathBuf>,
}

fn init_logger() {
    let env = Env::default().filter_or("RUST_LOG", "info");

    Builder::from_env(env)
        .format(|buf, record| {
            let mut style = buf.style();
            match record.level() {
                Level::Error => {
                    style.set_color(fmt::Color::Red).set_bold(true);
                }
                Level::Warn => {
                    style.set_color(fmt::Color::Yellow).set_bold(true);
                }
                Level::Info => {
                    style.set_color(fmt::Color::Blue).set_bold(true);
                }
                Level::Debug | Level::Trace => {}
            };

            let timestamp = buf.timestamp();

            writeln!(buf, "{} {}", timestamp, style.value(record.args()))
        })
        .init();
}

/// Stands in for a hook placed on a sensitive library call: it reports a
/// finding whenever the request reaches the admin area.
fn admin_access_hook(request: &str) {
    guide_towards_containment(request, "/admin", 0x2d1f);
    if request.contains("/admin") {
        report_finding_from_hook(Finding::new(format!(
            "Unauthorized admin access: {request:?}"
        )));
    }
}

fn demo_harness(data: &[u8]) {
    let request = String::from_utf8_lossy(data);
    let method: String = request.chars().take(4).collect();
    if method != "FUZZ" {
        guide_towards_equality(&method, "FUZZ", 0x5a11);
        return;
    }

    // The target tolerates failures of its dependencies, including the hooked one.
    let _ = catch_unwind(|| admin_access_hook(&request));
}

fn load_config(cli: &Cli) -> Result<NudgeConfig, anyhow::Error> {
    match &cli.config_file {
        Some(config_path) => {
            log::info!("Loading configuration from specified path: {config_path:?}");
            Ok(NudgeConfig::load_from_file(config_path)?)
        }
        None => {
            let default_config_path = PathBuf::from("config.toml");
            if default_config_path.exists() {
                log::info!(
                    "No config file specified via CLI, loading default: {default_config_path:?}"
                );
                Ok(NudgeConfig::load_from_file(&default_config_path)?)
            } else {
                log::info!(
                    "No config file specified and default 'config.toml' not found, using built-in defaults."
                );
                Ok(NudgeConfig::default())
            }
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    init_logger();
    let cli = Cli::parse();

    let mut config = load_config(&cli)?;
    if let Some(iterations) = cli.iterations {
        config.fuzzer.max_iterations = iterations;
    }
    if let Some(keep_going) = cli.keep_going {
        config.fuzzer.keep_going = keep_going;
    }
    if !cli.ignore.is_empty() {
        config.fuzzer.ignore = cli.ignore;
    }
    if let Some(seed) = cli.seed {
        config.fuzzer.seed = seed;
    }
    if let Some(artifact_dir) = cli.artifact_dir {
        config.fuzzer.artifact_dir = Some(artifact_dir);
    }
    config.validate()?;
    log::debug!("Effective configuration: {config:#?}");

    runtime::install()?;

    let mut fuzzer = Fuzzer::new(&config, demo_harness)?;
    let stats = fuzzer.run()?;
    if stats.findings > 0 {
        std::process::exit(1);
    }
    Ok(())
}
