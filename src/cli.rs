//! Command-line shell around the QA pipeline.
//!
//! All user interaction lives here: URL validation, progress display, and
//! rendering of answers, sources and error messages. The pipeline itself is
//! driven through [`App::build_index`] and [`App::answer_question`].

use anyhow::bail;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::app::{App, AskError, BuildOutcome};
use crate::config::Config;
use crate::embeddings;
use crate::index::storage::{IndexStorage, StorageError};

#[derive(Parser, Debug)]
#[command(version, about = "Question answering over a small set of web articles", long_about = None)]
pub struct Args {
    /// Alternative config file (default: newsqa.yaml)
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch three article URLs and (re)build the index
    Build {
        /// Article URLs (exactly three)
        #[clap(num_args = 3, required = true)]
        urls: Vec<String>,
    },
    /// Answer a question from the current index
    Ask {
        /// The question to answer
        question: String,
    },
    /// Show whether an index exists and what is in it
    Status {},
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }?;

    match args.command {
        Command::Build { urls } => build(config, urls),
        Command::Ask { question } => ask(config, &question),
        Command::Status {} => status(config),
    }
}

fn build(config: Config, urls: Vec<String>) -> anyhow::Result<()> {
    let urls = validate_urls(urls)?;
    let app = App::new(config)?;

    let progress = spinner("Building index...");
    let outcome = app.build_index(&urls);
    progress.finish_and_clear();

    match outcome? {
        BuildOutcome::Indexed(report) => {
            println!(
                "Index built: {} chunks from {} articles ({} dimensions) -> {}",
                report.chunks,
                report.articles,
                report.dimensions,
                app.config().index_path.display()
            );
            Ok(())
        }
        BuildOutcome::NoArticles => {
            bail!("No data found. Please check the provided URLs.")
        }
        BuildOutcome::NoChunks => {
            bail!("No text found to split. Please check the content of the URLs.")
        }
    }
}

fn ask(config: Config, question: &str) -> anyhow::Result<()> {
    let question = question.trim();
    if question.is_empty() {
        bail!("Please enter a question.");
    }

    let app = App::new(config)?;

    let progress = spinner("Thinking...");
    let result = app.answer_question(question);
    progress.finish_and_clear();

    match result {
        Ok(answer) => {
            println!("Answer:\n{}", answer.text);
            if !answer.sources.is_empty() {
                println!("\nSources:");
                for source in &answer.sources {
                    println!("{source}");
                }
            }
            Ok(())
        }
        Err(AskError::IndexMissing) => {
            bail!("No index has been built yet. Run `newsqa build` first.")
        }
        Err(err) => Err(err.into()),
    }
}

fn status(config: Config) -> anyhow::Result<()> {
    let model_id = embeddings::model_id_hash(&config.openai.embedding_model);
    let storage = IndexStorage::new(config.index_path.clone());

    match storage.stat(&model_id) {
        Ok(stats) => {
            println!("Index: {}", config.index_path.display());
            println!("Entries: {}", stats.entry_count);
            println!("Dimensions: {}", stats.dimensions);
            if stats.model_matches {
                println!("Embedding model: {}", config.openai.embedding_model);
            } else {
                println!(
                    "Embedding model: MISMATCH (file was built with a different model; rebuild)"
                );
            }
            Ok(())
        }
        Err(StorageError::NotFound(_)) => {
            println!("No index has been built yet.");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// The shell-side precondition from the input form: all three URL slots
/// must be non-empty and parse as URLs.
fn validate_urls(urls: Vec<String>) -> anyhow::Result<[String; 3]> {
    let urls: [String; 3] = urls
        .try_into()
        .map_err(|_| anyhow::anyhow!("Please enter all URLs."))?;

    for url in &urls {
        if url.trim().is_empty() {
            bail!("Please enter all URLs.");
        }
        if let Err(e) = url::Url::parse(url) {
            bail!("invalid URL '{url}': {e}");
        }
    }

    Ok(urls)
}

fn spinner(message: &'static str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::default_spinner());
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_urls_accepts_three() {
        let urls = vec![
            "http://a.com/one".to_string(),
            "https://b.com/two".to_string(),
            "https://c.com/three".to_string(),
        ];
        assert!(validate_urls(urls).is_ok());
    }

    #[test]
    fn test_validate_urls_rejects_blank_slot() {
        let urls = vec![
            "http://a.com/one".to_string(),
            "   ".to_string(),
            "https://c.com/three".to_string(),
        ];
        assert!(validate_urls(urls).is_err());
    }

    #[test]
    fn test_validate_urls_rejects_wrong_count() {
        let urls = vec!["http://a.com/one".to_string()];
        assert!(validate_urls(urls).is_err());
    }

    #[test]
    fn test_validate_urls_rejects_garbage() {
        let urls = vec![
            "http://a.com/one".to_string(),
            "not a url".to_string(),
            "https://c.com/three".to_string(),
        ];
        assert!(validate_urls(urls).is_err());
    }
}
