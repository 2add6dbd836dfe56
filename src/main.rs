use anyhow::Context;
use clap::Parser;
use pup::Document;
use std::io::{self, BufWriter, Read, Write};
use tracing::debug;

mod cli;

fn main() {
    if let Err(error) = run() {
        eprintln!("pup: {error:#}");
        std::process::exit(2);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose)?;

    let config = cli.config();
    let tokens = cli.tokens();
    debug!(?tokens, "selector tokens");

    let mut input = vec![];
    match &cli.file {
        Some(path) => {
            std::fs::File::open(path)
                .and_then(|mut file| file.read_to_end(&mut input))
                .with_context(|| format!("failed to read {}", path.display()))?;
        }
        None => {
            io::stdin()
                .lock()
                .read_to_end(&mut input)
                .context("failed to read stdin")?;
        }
    }

    let mut document = Document::from_bytes(&input, config.charset.as_deref())
        .context("failed to decode input")?;
    let output = pup::run(&mut document, &tokens, config.invert)?;
    let display = output.display.unwrap_or_else(|| config.display.clone());

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    display.render(&mut out, &document, &output.nodes, &config)?;
    out.flush().context("failed to write output")?;

    Ok(())
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_env("PUP_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
