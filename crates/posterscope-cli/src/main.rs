use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use posterscope_ai::{ConferenceSummarizer, ExtractionProtocol, OllamaClient, SummaryError};
use posterscope_core::error::ExitCode;
use posterscope_core::{
    AppConfig, Database, FileScanner, PaperRecord, PosterscopeError, list_conferences,
};
use posterscope_science::{
    AcquisitionResult, ArxivClient, DownloadService, LocalFileMatcher, RejectReason,
    RemoteAcquisition, UNKNOWN_CONFERENCE, ingest_posters, reconcile_local_pdfs,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "posterscope",
    about = "Turn conference posters into paper records and find their PDFs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting POSTERSCOPE_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List conference folders under the data root.
    Conferences,

    /// Create the folder layout for a conference.
    Init { conference: String },

    /// Extract paper metadata from a conference's poster images.
    Extract {
        conference: String,
        /// Process at most this many images.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Match papers to PDFs already in the conference's pdfs folder.
    Match { conference: String },

    /// List papers.
    List {
        conference: Option<String>,
        /// Only papers without a PDF.
        #[arg(long)]
        missing: bool,
    },

    /// Search papers by title, author or overview.
    Search {
        query: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Find and download the PDF for one paper.
    Download {
        /// Paper id or unique id prefix.
        paper_id: String,
        /// Download from this URL instead of searching arXiv.
        #[arg(long)]
        url: Option<String>,
    },

    /// Download PDFs for every paper that lacks one.
    DownloadAll { conference: Option<String> },

    /// Thematic summary of a conference.
    Summary {
        conference: String,
        /// Ignore the cached summary.
        #[arg(long)]
        regenerate: bool,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration.
    Show,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_tracing();

    let json_output = cli.json || std::env::var("POSTERSCOPE_JSON").as_deref() == Ok("1");
    let out = Output { json: json_output, start };
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => return out.fail(config_exit_code(&e), "invalid_config", &e.to_string()),
    };

    match cli.command {
        Commands::Conferences => {
            let db = open_db(&config)?;
            let names = list_conferences(&config.data_root())?;
            let mut items = Vec::with_capacity(names.len());
            for name in names {
                let papers = db.count_papers(Some(name.as_str()))?;
                items.push(serde_json::json!({ "name": name, "papers": papers }));
            }

            if out.json {
                out.ok(&items)?;
            } else if items.is_empty() {
                println!(
                    "No conferences under {}. Use `posterscope init <name>`.",
                    config.data_root().display()
                );
            } else {
                for item in &items {
                    println!("  {:<30} {} papers", item["name"].as_str().unwrap_or_default(), item["papers"]);
                }
            }
        }

        Commands::Init { conference } => {
            let folder = config.conference(Some(conference.as_str()));
            folder.create_missing()?;

            if out.json {
                out.ok(&serde_json::json!({
                    "name": folder.name,
                    "images": folder.images,
                    "pdfs": folder.pdfs,
                    "output": folder.output,
                }))?;
            } else {
                println!("Initialized {}", folder.root.display());
                println!("  Put poster images in {}", folder.images.display());
            }
        }

        Commands::Extract { conference, limit } => {
            let folder = config.conference(Some(conference.as_str()));
            if !folder.validate().images {
                out.fail(
                    ExitCode::NotFound,
                    "not_found",
                    &format!("No images folder: {}", folder.images.display()),
                )?;
            }

            let db = open_db(&config)?;
            let backend = OllamaClient::new(&config.model)?;
            let mut protocol = ExtractionProtocol::new(backend, &config.model);
            let mut scanner = FileScanner::default();

            let report = ingest_posters(&mut protocol, &mut scanner, &db, &folder, limit).await?;
            let stats = protocol.stats();

            if out.json {
                out.ok(&serde_json::json!({ "report": report, "stats": stats }))?;
            } else {
                println!(
                    "Processed {} posters: {} saved, {} failed.",
                    report.processed,
                    report.saved,
                    report.failed.len()
                );
                for (file, reason) in &report.failed {
                    println!("  ✗ {file}: {reason}");
                }
                println!(
                    "Backend calls: {}  retries: {}  malformed replies: {}",
                    stats.attempts, stats.retries, stats.malformed_json
                );
            }
        }

        Commands::Match { conference } => {
            let folder = config.conference(Some(conference.as_str()));
            let db = open_db(&config)?;
            let mut matcher = LocalFileMatcher::new(&config.matching);
            let mut scanner = FileScanner::default();

            let report = reconcile_local_pdfs(&mut matcher, &mut scanner, &db, &folder)?;

            if out.json {
                out.ok(&report)?;
            } else {
                println!(
                    "Checked {} papers against {} PDFs: {} matched, {} unmatched.",
                    report.stats.papers_checked,
                    report.pdfs_scanned,
                    report.stats.pdfs_matched,
                    report.stats.no_match
                );
                for m in &report.matches {
                    println!("  {:.2}  {}", m.score, m.path.display());
                }
            }
        }

        Commands::List { conference, missing } => {
            let db = open_db(&config)?;
            let papers = if missing {
                db.list_missing_pdf(conference.as_deref())?
            } else {
                db.list_papers(conference.as_deref())?
            };

            if out.json {
                out.ok(&serde_json::json!({ "items": papers, "total": papers.len() }))?;
            } else if papers.is_empty() {
                println!("No papers. Use `posterscope extract <conference>` to add some.");
            } else {
                for paper in &papers {
                    print_paper_line(paper);
                }
            }
        }

        Commands::Search { query, limit } => {
            let db = open_db(&config)?;
            let results = db.search_papers(&query, limit)?;

            if out.json {
                out.ok(&serde_json::json!({ "items": results, "total": results.len(), "query": query }))?;
            } else if results.is_empty() {
                println!("No results for: {query}");
            } else {
                println!("Found {} results:", results.len());
                for paper in &results {
                    print_paper_line(paper);
                }
            }
        }

        Commands::Download { paper_id, url } => {
            let db = open_db(&config)?;
            let paper = match db.find_paper_by_prefix(&paper_id) {
                Ok(p) => p,
                Err(PosterscopeError::PaperNotFound(_)) => {
                    return out.fail(
                        ExitCode::NotFound,
                        "not_found",
                        &format!("Paper {paper_id} not found"),
                    );
                }
                Err(e) => return Err(e.into()),
            };
            let conference = paper
                .conference_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_CONFERENCE.to_string());

            let service = download_service(&config)?;
            let result = match url {
                Some(url) => service.download_paper_from_url(&db, &paper, &conference, &url).await,
                None => service.download_paper(&db, &paper, &conference).await,
            };

            match &result {
                AcquisitionResult::Acquired { path, source_url, .. } => {
                    if out.json {
                        out.ok(&result)?;
                    } else {
                        println!("Downloaded \"{}\"", paper.title);
                        println!("  from {source_url}");
                        println!("  to   {}", path.display());
                    }
                }
                AcquisitionResult::Rejected(reason) => {
                    out.fail(reject_exit_code(reason), "rejected", &reason.to_string())?;
                }
            }
        }

        Commands::DownloadAll { conference } => {
            let db = open_db(&config)?;
            let service = download_service(&config)?;
            let report = service.download_all_missing(&db, conference.as_deref()).await?;

            if out.json {
                out.ok(&report)?;
            } else {
                println!(
                    "Attempted {}: {} downloaded, {} failed.",
                    report.attempted, report.succeeded, report.failed
                );
                for (title, reason) in &report.failures {
                    println!("  ✗ {title}: {reason}");
                }
            }
        }

        Commands::Summary { conference, regenerate } => {
            let db = open_db(&config)?;

            let cached = if regenerate {
                None
            } else {
                db.get_conference_summary(&conference)?
            };

            let summary = match cached {
                Some(summary) => summary,
                None => {
                    let papers = db.list_papers(Some(conference.as_str()))?;
                    let summarizer =
                        ConferenceSummarizer::new(OllamaClient::new(&config.model)?, &config.model);
                    let text = match summarizer.summarize(&papers).await {
                        Ok(text) => text,
                        Err(SummaryError::NoPapers) => {
                            return out.fail(
                                ExitCode::NotFound,
                                "not_found",
                                &format!("No papers for conference {conference}"),
                            );
                        }
                        Err(e) => {
                            return out.fail(ExitCode::AiError, "ai_error", &e.to_string());
                        }
                    };
                    db.save_conference_summary(&conference, &text, papers.len())?;
                    db.get_conference_summary(&conference)?
                        .ok_or_else(|| anyhow::anyhow!("summary for {conference} was not stored"))?
                }
            };

            if out.json {
                out.ok(&summary)?;
            } else {
                println!(
                    "{} ({} papers, generated {})\n",
                    summary.conference_name,
                    summary.paper_count,
                    summary.generated_at.format("%Y-%m-%d %H:%M")
                );
                println!("{}", summary.summary);
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                if out.json {
                    out.ok(&serde_json::json!({
                        "path": AppConfig::config_path(),
                        "config": config,
                    }))?;
                } else {
                    println!("# {}", AppConfig::config_path().display());
                    println!("{}", toml::to_string_pretty(&config)?);
                }
            }
        },
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct Output {
    json: bool,
    start: Instant,
}

impl Output {
    fn ok<T: Serialize>(&self, data: &T) -> Result<()> {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": data,
            "meta": { "duration_ms": self.start.elapsed().as_millis() }
        }))
    }

    /// Report a failure and exit with `code`.
    fn fail(&self, code: ExitCode, kind: &str, message: &str) -> Result<()> {
        if self.json {
            print_json(&serde_json::json!({
                "status": "error",
                "error": kind,
                "message": message,
                "meta": { "duration_ms": self.start.elapsed().as_millis() }
            }))?;
        } else {
            eprintln!("{message}");
        }
        std::process::exit(code as i32);
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn print_paper_line(paper: &PaperRecord) {
    let pdf = if paper.pdf_found { "✓" } else { "·" };
    println!(
        "{id}  {pdf}  {title:<50}  {authors}",
        id = paper.short_id(),
        title = paper.title,
        authors = paper.authors_display(2),
    );
}

fn open_db(config: &AppConfig) -> Result<Database> {
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(&db_path)?)
}

fn download_service(config: &AppConfig) -> Result<DownloadService<ArxivClient, OllamaClient>> {
    let index = ArxivClient::new(&config.acquisition)?;
    let backend = OllamaClient::new(&config.model)?;
    let acquisition =
        RemoteAcquisition::new(index, backend, &config.model, config.acquisition.clone())?;
    info!(
        "acquisition: min similarity {:.2}, {}s between downloads",
        config.acquisition.min_similarity, config.acquisition.download_delay_secs
    );
    Ok(DownloadService::new(acquisition, config))
}

fn config_exit_code(err: &PosterscopeError) -> ExitCode {
    match err {
        PosterscopeError::ValidationError(_) | PosterscopeError::TomlParse(_) => {
            ExitCode::InvalidArgs
        }
        PosterscopeError::Io(_) => ExitCode::FileSystemError,
        _ => ExitCode::GeneralError,
    }
}

fn reject_exit_code(reason: &RejectReason) -> ExitCode {
    match reason {
        RejectReason::NotFound | RejectReason::LowConfidence { .. } => ExitCode::NotFound,
        RejectReason::SearchFailed(_) | RejectReason::DownloadFailed(_) => ExitCode::NetworkError,
        RejectReason::SummaryFailed(_) => ExitCode::AiError,
        RejectReason::Filesystem(_) => ExitCode::FileSystemError,
        RejectReason::AlreadyExists(_) => ExitCode::Conflict,
        RejectReason::Store(_) => ExitCode::GeneralError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_exits_with_invalid_args() {
        let err = PosterscopeError::ValidationError("bad delay".into());
        assert_eq!(config_exit_code(&err) as i32, 3);

        let io = PosterscopeError::Io(std::io::Error::other("denied"));
        assert_eq!(config_exit_code(&io) as i32, 4);
    }

    #[test]
    fn rejections_map_to_distinct_exit_codes() {
        assert_eq!(reject_exit_code(&RejectReason::NotFound) as i32, 2);
        assert_eq!(
            reject_exit_code(&RejectReason::DownloadFailed("timed out".into())) as i32,
            6
        );
        assert_eq!(
            reject_exit_code(&RejectReason::AlreadyExists("x.pdf".into())) as i32,
            7
        );
    }
}
