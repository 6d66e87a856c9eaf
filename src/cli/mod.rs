//! quill-rag CLI command definitions and implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{has_api_key, Config};
use crate::embedding::DashScopeEmbedding;
use crate::index::{ChunkStore, LanceVectorIndex, SyncEngine, VectorIndex};
use crate::rag::{DashScopeGenerator, DashScopeReranker, RagPipeline};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "quill-rag")]
#[command(version, about = "Article indexing and retrieval-augmented Q&A", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index (or re-index) a published article from a markdown file
    Sync {
        /// Article id
        #[arg(long)]
        article_id: i64,

        /// Article title (defaults to the file stem)
        #[arg(short, long)]
        title: Option<String>,

        /// Markdown file with the article content
        file: PathBuf,
    },

    /// Remove an article's vectors from the index
    Remove {
        /// Article id
        article_id: i64,
    },

    /// Ask a question over the indexed articles
    Ask {
        /// The question
        question: String,
    },

    /// Show system status
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sync {
            article_id,
            title,
            file,
        } => cmd_sync(article_id, title, &file).await,
        Commands::Remove { article_id } => cmd_remove(article_id).await,
        Commands::Ask { question } => cmd_ask(&question).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn load_config() -> Result<Config> {
    if !has_api_key() {
        bail!(
            "API key not set.\n\n\
             Setup:\n  \
             export DASHSCOPE_API_KEY=your-api-key"
        );
    }
    Config::from_env().context("failed to load configuration")
}

fn open_sync_engine(config: &Config) -> Result<SyncEngine> {
    let store = Arc::new(
        ChunkStore::open(&config.chunk_db_path()).context("failed to open chunk store")?,
    );
    let index = Arc::new(LanceVectorIndex::new(
        &config.vector_index_path(),
        &config.collection,
        config.embedding_dimension,
    ));
    let embedder = Arc::new(
        DashScopeEmbedding::from_config(config).context("failed to create embedding client")?,
    );

    Ok(SyncEngine::new(store, index, embedder))
}

/// Sync command: chunk a markdown file and rebuild the article's index.
async fn cmd_sync(article_id: i64, title: Option<String>, file: &PathBuf) -> Result<()> {
    let config = load_config()?;

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string()
    });

    println!("[*] Indexing article #{} ({})...", article_id, title);

    let engine = open_sync_engine(&config)?;
    let report = engine
        .sync(article_id, &title, &content)
        .await
        .context("index sync failed")?;

    if report.chunks == 0 {
        println!("[!] No indexable content; article #{} left unindexed", article_id);
    } else {
        println!("[OK] Article #{} indexed ({} chunks)", article_id, report.chunks);
    }

    Ok(())
}

/// Remove command: drop the article's vector records.
async fn cmd_remove(article_id: i64) -> Result<()> {
    let config = load_config()?;

    let engine = open_sync_engine(&config)?;
    let removed = engine
        .remove(article_id)
        .await
        .context("vector removal failed")?;

    println!("[OK] Article #{}: {} vector records removed", article_id, removed);

    Ok(())
}

/// Ask command: run the full question-answering pipeline.
async fn cmd_ask(question: &str) -> Result<()> {
    let config = load_config()?;

    println!("[*] Answering: \"{}\"", truncate_text(question, 80));

    let embedder = Arc::new(
        DashScopeEmbedding::from_config(&config).context("failed to create embedding client")?,
    );
    let index = Arc::new(LanceVectorIndex::new(
        &config.vector_index_path(),
        &config.collection,
        config.embedding_dimension,
    ));
    let reranker = Arc::new(
        DashScopeReranker::from_config(&config).context("failed to create rerank client")?,
    );
    let generator = Arc::new(
        DashScopeGenerator::from_config(&config).context("failed to create generation client")?,
    );

    let pipeline = RagPipeline::new(
        embedder,
        index,
        reranker,
        generator,
        config.top_k,
        config.top_n,
    );

    let answer = pipeline.answer(question).await;

    println!();
    println!("{}", answer);

    Ok(())
}

/// Status command: version, storage paths, and index counts.
async fn cmd_status() -> Result<()> {
    println!("quill-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let data_dir = std::env::var("QUILL_RAG_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| crate::config::get_data_dir());
    println!("[*] Data directory: {}", data_dir.display());

    if has_api_key() {
        println!("[OK] API key: configured");
    } else {
        println!("[!] API key: not set");
        println!("    Setup: export DASHSCOPE_API_KEY=your-key");
    }

    match ChunkStore::open(&data_dir.join("chunks.db")) {
        Ok(store) => match store.count() {
            Ok(count) => println!("[OK] Chunk rows: {}", count),
            Err(e) => println!("[!] Chunk count failed: {}", e),
        },
        Err(e) => println!("[!] Chunk store unavailable: {}", e),
    }

    let index = LanceVectorIndex::new(
        &data_dir.join("vectors.lance"),
        crate::config::DEFAULT_COLLECTION,
        crate::config::DEFAULT_EMBEDDING_DIMENSION,
    );
    match index.count().await {
        Ok(count) => println!("[OK] Vector records: {}", count),
        Err(e) => tracing::debug!("vector count failed: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// UTF-8 safe truncation for display.
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_truncate_unicode() {
        let korean = "안녕하세요 세계";
        let truncated = truncate_text(korean, 5);
        assert_eq!(truncated, "안녕하세요...");
    }
}
