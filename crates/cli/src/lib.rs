use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_annotator_core::{
    from_json, to_json, AnnotatedDocument, EditorConfig, ImportStats, IoGate,
};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pdf-annotator")]
#[command(about = "Inspect, export, and apply PDF annotations")]
pub struct Cli {
    /// Editor configuration file (JSON).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document and annotation summary.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the annotations of a document, optionally for one page.
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// 1-based page number.
        #[arg(long)]
        page: Option<u32>,
    },
    /// Export every annotation as an annotation-set JSON file.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace a document's annotations with an annotation set and write a new PDF.
    Apply {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "JSON")]
        annotations: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSizeOutput>,
    annotation_count: usize,
    import: ImportStats,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { file } => run_info(&file, &config),
        Commands::List { file, page } => run_list(&file, page, &config),
        Commands::Export { file, output } => run_export(&file, output.as_deref(), &config),
        Commands::Apply { file, annotations, output } => run_apply(&file, &annotations, &output, &config),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let config = match path {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?
            .apply_env(|key| std::env::var(key).ok())
            .context("invalid config override in environment")?,
        None => EditorConfig::from_env().context("invalid config override in environment")?,
    };
    debug!(?config, "configuration loaded");
    Ok(config)
}

fn open_document(file: &Path, config: &EditorConfig) -> Result<AnnotatedDocument> {
    ensure_pdf_exists(file)?;

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    AnnotatedDocument::open(bytes, &IoGate::new(), config).context("failed to open PDF")
}

fn run_info(file: &Path, config: &EditorConfig) -> Result<()> {
    let document = open_document(file, config)?;

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: document.page_count(),
        pages: document
            .pages()
            .iter()
            .map(|size| PageSizeOutput { width: size.width_pt, height: size.height_pt })
            .collect(),
        annotation_count: document.store().len(),
        import: document.import_stats().clone(),
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_list(file: &Path, page: Option<u32>, config: &EditorConfig) -> Result<()> {
    let document = open_document(file, config)?;

    let json = match page {
        Some(page) => {
            if page == 0 || page > document.page_count() {
                anyhow::bail!("--page must be between 1 and {}", document.page_count());
            }
            to_json(document.store().page_annotations(page))?
        }
        None => to_json(document.store().iter())?,
    };

    println!("{json}");
    Ok(())
}

fn run_export(file: &Path, output: Option<&Path>, config: &EditorConfig) -> Result<()> {
    let document = open_document(file, config)?;
    let json = to_json(document.store().iter())?;

    let Some(output) = output else {
        println!("{json}");
        return Ok(());
    };

    write_output(output, json.as_bytes())?;
    info!(annotations = document.store().len(), path = %output.display(), "annotations exported");
    println!("{}", output.display());
    Ok(())
}

fn run_apply(file: &Path, annotations: &Path, output: &Path, config: &EditorConfig) -> Result<()> {
    let mut document = open_document(file, config)?;

    let json = fs::read_to_string(annotations)
        .with_context(|| format!("failed to read {}", annotations.display()))?;
    let set = from_json(&json).with_context(|| format!("failed to parse {}", annotations.display()))?;

    if let Some(annotation) = set.annotations.iter().find(|a| a.page() > document.page_count()) {
        anyhow::bail!(
            "annotation {} targets page {} but the document has {} pages",
            annotation.id(),
            annotation.page(),
            document.page_count()
        );
    }

    let count = set.len();
    document.replace_annotations(set.annotations);
    let bytes = document.save(&IoGate::new()).context("failed to save PDF")?;

    write_output(output, &bytes)?;
    info!(annotations = count, path = %output.display(), "annotations applied");
    println!("{}", output.display());
    Ok(())
}

fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
