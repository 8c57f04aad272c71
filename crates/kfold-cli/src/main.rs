//! K-fold Evaluator - Main Entry Point

use kfold_cli::{evaluate, init_logging, load_windows, render_report, AppConfig, Args};
use tracing::info;
use window_data::TrainingSetInfo;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = Args::parse(&args)?;
    let config = AppConfig::load(args.config.as_deref())?;
    init_logging(&config.log_level)?;

    info!("=== K-fold Evaluator v{} ===", env!("CARGO_PKG_VERSION"));

    let windows = load_windows(&args.windows)?;
    let summary = TrainingSetInfo::scan(windows.iter());
    let matrix = evaluate(&config, windows)?;

    println!("{}", render_report(&summary, &matrix, &config.normalization)?);
    Ok(())
}
