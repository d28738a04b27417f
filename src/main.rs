// src/main.rs

use respawner::{cli, config, logging, print_dry_run, run};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("respawner error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    let cfg = config::load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    logging::init_logging(args.log_level, &cfg.supervisor)?;
    run(args, cfg).await
}
