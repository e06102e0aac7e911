// src/main.rs

use std::path::PathBuf;

use watchcmd::config::load_and_validate;
use watchcmd::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("watchcmd error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    colored::control::set_override(args.color);

    // Config first: its `verbosity` feeds the log filter.
    let cfg = match load_and_validate(PathBuf::from(&args.config)) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    logging::init_logging(args.log_level, cfg.verbosity, args.color)?;
    run(args, cfg).await
}
