use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

mod catalog;
mod cli;
mod config;
mod display;
mod recommend;
mod semantic;
#[cfg(test)]
mod tests;
mod web;

use catalog::Catalog;
use config::Config;
use recommend::{RecommendOpts, Recommender, Tone, ALL};
use semantic::{corpus, SemanticSearchService};

/// Load the catalog, initialize the embedding index, and wire both into
/// an engine. This is the single startup path for the daemon and the
/// one-shot CLI commands.
pub fn build_recommender(config: &Config) -> anyhow::Result<Recommender> {
    let books_path = config.books_path();
    let catalog = Catalog::load(&books_path)
        .with_context(|| format!("loading catalog from {books_path:?}"))?;
    ensure_corpus(config, &catalog)?;

    let service = Arc::new(SemanticSearchService::new(
        config.embedding.clone(),
        config.base_path().to_path_buf(),
        config.corpus_path(),
    ));
    service.initialize().context("building embedding index")?;

    let opts = RecommendOpts {
        initial_k: config.recommend.initial_top_k,
        final_k: config.recommend.final_top_k,
    };

    Ok(Recommender::new(Arc::new(catalog), service, opts))
}

/// Derive the tagged-description corpus from the catalog when the file is
/// absent. An existing file is left alone so hand-curated corpora survive.
fn ensure_corpus(config: &Config, catalog: &Catalog) -> anyhow::Result<()> {
    let corpus_path = config.corpus_path();
    if corpus_path.exists() {
        return Ok(());
    }

    corpus::write(
        &corpus_path,
        catalog.iter().map(|b| (b.isbn13, b.description.as_str())),
    )
    .with_context(|| format!("writing corpus to {corpus_path:?}"))?;
    Ok(())
}

fn data_dir(flag: Option<String>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(dir) = std::env::var("TOME_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let home = homedir::my_home()
        .context("couldnt look up home dir")?
        .context("couldnt find home dir")?;
    Ok(home.join(".local/share/tome"))
}

fn parse_tone(tone: &str) -> Tone {
    tone.parse::<Tone>().unwrap_or_else(|err| {
        log::warn!("{err}, treating as '{ALL}'");
        Tone::All
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = cli::Args::parse();
    let base_path = data_dir(args.data_dir)?;
    let config = Config::load_with(&base_path)?;

    match args.command {
        cli::Command::Daemon { host, port } => {
            web::start_daemon(config, format!("{host}:{port}"));
            Ok(())
        }

        cli::Command::Recommend {
            query,
            category,
            tone,
            final_k,
        } => {
            let recommender = build_recommender(&config)?;

            let mut opts = RecommendOpts {
                initial_k: config.recommend.initial_top_k,
                final_k: config.recommend.final_top_k,
            };
            if let Some(final_k) = final_k {
                opts.final_k = final_k;
                opts.initial_k = opts.initial_k.max(final_k);
            }

            let books = recommender.recommend_with(&query, &category, parse_tone(&tone), opts)?;
            let records: Vec<_> = books.iter().map(display::format_record).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }

        cli::Command::Categories {} => {
            let catalog = Catalog::load(&config.books_path())?;
            let mut categories = vec![ALL.to_string()];
            categories.extend(catalog.categories());

            let out = serde_json::json!({
                "categories": categories,
                "tones": Tone::NAMES,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }

        cli::Command::Index {} => {
            let catalog = Catalog::load(&config.books_path())?;
            ensure_corpus(&config, &catalog)?;

            let service = SemanticSearchService::new(
                config.embedding.clone(),
                config.base_path().to_path_buf(),
                config.corpus_path(),
            );
            let report = service.initialize()?;
            println!(
                "indexed {} books ({} embedded, {} reused, {} removed)",
                service.indexed_count(),
                report.embedded,
                report.reused,
                report.removed,
            );
            Ok(())
        }
    }
}
