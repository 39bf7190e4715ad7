use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod chunker;
mod cli;
mod config;
mod embeddings;
mod index;
mod llm;
mod qa;
mod scrape;
#[cfg(test)]
mod tests;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsqa=info")),
        )
        .init();

    let args = cli::Args::parse();
    cli::run(args)
}
