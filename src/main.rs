use clap::Parser;
use sorting_hat::cli::{Args, run_cli};
use sorting_hat::output::OutputFormatter;
use sorting_hat::prompt::{ConsoleAnswers, StopFlag};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // VIDEO_PATH / OTHER_PATH may live in a .env next to the media.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.verbose);

    let stop = StopFlag::new();
    if let Err(e) = stop.install_handler() {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }

    let mut answers = ConsoleAnswers::new(stop.clone());
    match run_cli(&args, &mut answers, stop) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
