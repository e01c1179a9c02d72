// src/main.rs

use taskseq::engine::RunStatus;
use taskseq::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(RunStatus::Success) => {}
        Ok(_) => std::process::exit(1),
        Err(err) => {
            eprintln!("taskseq error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<RunStatus> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
