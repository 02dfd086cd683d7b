// src/main.rs

use sitepipe::{cli, logging, run};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("sitepipe error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await.map_err(|err| {
        if err.is_configuration() {
            anyhow::Error::new(err).context("nothing was run; see `sitepipe --list` for what is registered")
        } else {
            err.into()
        }
    })
}
