use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use penny::db::Database;
use penny::models::UploadedImage;
use penny::{ingest, OpenAiExtractor};

/// Scan a receipt or statement image and save its transactions.
#[derive(Parser)]
#[command(name = "penny", version)]
struct Args {
    /// Path to the image file to ingest
    image: PathBuf,

    /// Path to the SQLite database
    #[arg(long, default_value = "penny.sqlite")]
    db: PathBuf,

    /// Model to use for extraction
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| anyhow!("OPENAI_API_KEY is not set"))?;

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("read {}", args.image.display()))?;
    let image = UploadedImage {
        mime_type: mime_from_path(&args.image)?,
        file_name: args
            .image
            .file_name()
            .map(|n| n.to_string_lossy().to_string()),
        bytes,
    };

    let db = Arc::new(Mutex::new(Database::new(args.db)?));
    let extractor = OpenAiExtractor::with_model(api_key, args.model);

    let report = ingest(&db, &extractor, &image).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn mime_from_path(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        other => return Err(anyhow!("unsupported image extension: '{}'", other)),
    };
    Ok(mime.to_string())
}
