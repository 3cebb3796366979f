use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docusmart::{
    config,
    loader::DocumentFormat,
    logging,
    processing::{DocumentApi, DocumentService, Workspace},
    store::{StoreLocation, open_store},
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "docusmart-cli",
    about = "Ingest documents, ask questions, summarize, translate, and extract PDF images"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a file, or every supported file under a directory.
    Ingest { path: PathBuf },
    /// Answer a question from the ingested documents.
    Ask { question: String },
    /// Summarize the text of a document.
    Summarize { path: PathBuf },
    /// Translate text into a target language.
    Translate {
        #[arg(long = "to")]
        target_lang: String,
        text: String,
    },
    /// Write the images embedded in a PDF to a directory.
    Images {
        pdf: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();

    let location = StoreLocation::from_config(config)?;
    let store = open_store(&location)
        .await
        .context("Failed to open vector store")?;
    let service = DocumentService::from_config(config).context("Failed to build providers")?;
    let workspace = Workspace::new(service, store);

    match cli.command {
        Command::Ingest { path } => ingest(&workspace, &path).await,
        Command::Ask { question } => {
            if question.trim().is_empty() {
                bail!("question must not be empty");
            }
            let answer = workspace.ask(question).await?;
            println!("{}", answer.answer);
            for source in &answer.sources {
                println!(
                    "  [{:.3}] {} segment {}",
                    source.score,
                    source.source.as_deref().unwrap_or(&source.document_id),
                    source.chunk.segment
                );
            }
            Ok(())
        }
        Command::Summarize { path } => {
            let (bytes, filename) = read_file(&path)?;
            let document = workspace.read_document(bytes, filename).await?;
            let summary = workspace.summarize(document.raw_text()).await?;
            println!("{summary}");
            Ok(())
        }
        Command::Translate { target_lang, text } => {
            let translation = workspace.translate(text, target_lang).await?;
            println!("{}", translation.translation);
            Ok(())
        }
        Command::Images { pdf, out } => extract_images(&workspace, &pdf, &out).await,
    }
}

async fn ingest(workspace: &Workspace, path: &Path) -> Result<()> {
    let files = collect_documents(path)?;
    if files.is_empty() {
        bail!("no supported documents found under {}", path.display());
    }

    let mut failures = 0usize;
    for file in &files {
        let (bytes, filename) = read_file(file)?;
        match workspace.ingest(bytes, filename).await {
            Ok(processed) => println!(
                "{}: {} chunks, {} inserted, {} skipped, {} replaced",
                file.display(),
                processed.chunks.len(),
                processed.inserted,
                processed.skipped_duplicates,
                processed.replaced
            ),
            Err(err) => {
                failures += 1;
                tracing::warn!(path = %file.display(), error = %err, "Ingestion failed");
                eprintln!("{}: {err}", file.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} documents failed to ingest", files.len());
    }
    Ok(())
}

async fn extract_images(workspace: &Workspace, pdf: &Path, out: &Path) -> Result<()> {
    let (bytes, filename) = read_file(pdf)?;
    let images = workspace.extract_images(bytes, filename).await?;
    fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;

    for image in &images {
        let target = out.join(image.file_name());
        fs::write(&target, &image.data)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }
    println!("Wrote {} images to {}", images.len(), out.display());
    Ok(())
}

/// Files to ingest: `path` itself, or every supported file beneath it in sorted order.
fn collect_documents(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }

    let files = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DocumentFormat::SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

fn read_file(path: &Path) -> Result<(Vec<u8>, Option<String>)> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok((bytes, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_walk_keeps_supported_files_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("b.txt"), "b").expect("write");
        fs::write(dir.path().join("a.PDF"), "a").expect("write");
        fs::write(dir.path().join("skip.xlsx"), "x").expect("write");
        fs::create_dir(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("nested").join("c.docx"), "c").expect("write");

        let files = collect_documents(dir.path()).expect("walk");
        let names: Vec<String> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PDF", "b.txt", "c.docx"]);
    }

    #[test]
    fn single_file_is_returned_as_is() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("notes.md");
        fs::write(&file, "x").expect("write");
        assert_eq!(collect_documents(&file).expect("file"), vec![file]);
    }

    #[test]
    fn cli_parses_translate_flags() {
        let cli = Cli::try_parse_from(["docusmart-cli", "translate", "--to", "fr", "Hello"])
            .expect("parse");
        match cli.command {
            Command::Translate { target_lang, text } => {
                assert_eq!(target_lang, "fr");
                assert_eq!(text, "Hello");
            }
            _ => panic!("expected translate"),
        }
    }
}
