use std::process::exit;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tabula::{
    cli::{commands::Args, TabulaCli},
    config::{context::build_metastore, schema::load_config},
};

fn prepare_tracing(json_logs: bool) {
    // Logs go to stderr, stdout is reserved for command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false);

    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    prepare_tracing(args.json_logs);

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading the config: {e}");
            exit(1);
        }
    };
    debug!(?config, "Loaded config");

    let metastore = match build_metastore(&config).await {
        Ok(metastore) => metastore,
        Err(e) => {
            eprintln!("Error connecting to the catalog: {e}");
            exit(1);
        }
    };

    match TabulaCli::new(metastore).handle_command(args.command).await {
        Ok(output) if output.is_empty() => {}
        Ok(output) if output.ends_with('\n') => print!("{output}"),
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    }
}
