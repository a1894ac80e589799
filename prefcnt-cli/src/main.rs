//! prefcnt CLI - report debug-info types that no live function references.
//!
//! Reads a debug-info graph dump, reference-counts every type reachable from
//! the non-inlined functions and prints the declared types left at zero.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use prefcnt_core::{
    init_structured_logging, load_config, log_error, log_info, log_warn, print_json, print_plain,
    Prefcnt, PrefcntConfig, PrefcntError,
};

#[derive(Parser, Debug)]
#[command(name = "prefcnt", about = "Report debug-info types no live function references")]
pub struct Cli {
    /// Debug-info graph dump to analyze
    file_name: PathBuf,
}

fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// `--help` is a successful run; every other parse error is a failure.
fn is_help_request(err: &clap::Error) -> bool {
    matches!(err.kind(), ErrorKind::DisplayHelp)
}

/// Load prefcnt.toml from the working directory; config errors fall back to defaults.
fn load_settings(dir: &Path) -> PrefcntConfig {
    match load_config(dir) {
        Ok(Some(cfg)) => cfg,
        Ok(None) => PrefcntConfig::default(),
        Err(e) => {
            log_warn(&format!("config load failed: {:#}", e));
            eprintln!("[WARN] config load failed: {:#}", e);
            PrefcntConfig::default()
        }
    }
}

/// Diagnostic line for a fatal error.
fn diagnostic(file_name: &Path, err: &anyhow::Error) -> String {
    match err.downcast_ref::<PrefcntError>() {
        Some(PrefcntError::Setup) => "prefcnt: insufficient memory".to_string(),
        Some(e) if e.is_load_failure() => format!(
            "prefcnt: couldn't load debug info from {}",
            file_name.display()
        ),
        _ => format!("prefcnt: {:#}", err),
    }
}

fn run(cli: &Cli, config: &PrefcntConfig) -> Result<()> {
    let analysis = Prefcnt::new(&cli.file_name).with_config(config).analyze()?;

    if config.wants_json() {
        print_json(&analysis.report);
    } else {
        print_plain(&analysis.debug_info, &analysis.report)
            .context("failed to write report")?;
    }

    log_info(&format!(
        "{} lost type(s) in {}",
        analysis.report.stats.lost,
        cli.file_name.display()
    ));
    Ok(())
}

fn main() -> ExitCode {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if is_help_request(&e) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    // Structured logging (JSON to stderr, respects RUST_LOG)
    init_structured_logging();

    let config = load_settings(Path::new("."));

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_error(&format!("{:#}", e));
            eprintln!("{}", diagnostic(&cli.file_name, &e));
            ExitCode::FAILURE
        }
    }
}
