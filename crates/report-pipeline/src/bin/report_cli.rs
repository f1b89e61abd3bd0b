//! Report pipeline CLI
//!
//! `interactive` walks one report through the pipeline API step by step.
//! `convert` is the job body the orchestrator runs for the layout parser.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use report_pipeline::client::{ApiClient, Session};
use report_pipeline::config::PipelineConfig;
use report_pipeline::conversion::{ConversionService, PdfSource};
use report_pipeline::server::state::AppState;
use report_pipeline::types::ReportPeriod;

#[derive(Parser, Debug)]
#[command(name = "report-cli", about = "Process and question quarterly report PDFs", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Step through discovery, conversion, chunking, indexing and questions
    Interactive {
        /// Base URL of the pipeline API
        #[arg(long, env = "REPORT_API_URL", default_value = "http://127.0.0.1:8000")]
        api_url: String,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },
    /// Convert one stored report to markdown and upload the result
    Convert {
        /// Parser to convert with
        #[arg(long, default_value = "layout")]
        parser: String,

        #[arg(long)]
        year: String,

        #[arg(long)]
        quarter: String,

        /// TOML configuration file (defaults to REPORT_CONFIG)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "report_pipeline=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match Cli::parse().command {
        Command::Interactive {
            api_url,
            timeout_secs,
        } => {
            let client = ApiClient::new(api_url, Duration::from_secs(timeout_secs))?;
            Interactive::new(client).run().await
        }
        Command::Convert {
            parser,
            year,
            quarter,
            config,
        } => run_conversion(&parser, &year, &quarter, config).await,
    }
}

/// Download the raw PDF to scratch space, convert it and upload the markdown
async fn run_conversion(
    parser: &str,
    year: &str,
    quarter: &str,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = PipelineConfig::load(config.as_deref())?;
    let period = ReportPeriod::new(year, quarter)?;

    let state = AppState::new(config).await?;
    let converter = state.converters().get(parser)?;
    let store = state.store();

    let key = period.raw_pdf_key();
    if !store.exists(&key).await? {
        bail!("PDF not found for {}", period);
    }

    let scratch = tempfile::tempdir().context("creating scratch directory")?;
    let local = store.download(&key, scratch.path()).await?;
    tracing::info!("Downloaded {} to {}", key, local.display());

    let service = ConversionService::new(store.clone(), state.presign_ttl());
    let result = service
        .convert_source(converter.as_ref(), PdfSource::Path(local), &period)
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Outcome of one menu prompt
enum Choice {
    Picked(String),
    Back,
}

struct Interactive {
    client: ApiClient,
    term: Term,
    session: Session,
}

impl Interactive {
    fn new(client: ApiClient) -> Self {
        Self {
            client,
            term: Term::stdout(),
            session: Session::new(),
        }
    }

    async fn run(mut self) -> Result<()> {
        self.term.write_line(&format!(
            "{} {}",
            style("Quarterly report pipeline").bold().cyan(),
            style(self.client.base_url()).dim()
        ))?;

        let options = with_spinner("Loading options", self.client.options())
            .await
            .context("Could not reach the pipeline API")?;

        // Year and quarter
        let years = with_spinner("Loading years", self.client.years()).await?;
        if years.is_empty() {
            bail!("No reports found in the object store");
        }
        let Choice::Picked(year) = self.choose("Year", &years)? else {
            return Ok(());
        };
        self.session.select_year(year.as_str());

        let quarters = with_spinner("Loading quarters", self.client.quarters(&year)).await?;
        let Choice::Picked(quarter) = self.choose("Quarter", &quarters)? else {
            return Ok(());
        };
        self.session.select_quarter(quarter);

        let period = self.session.period_request()?;
        match with_spinner("Fetching report link", self.client.pdf_url(&period)).await {
            Ok(url) => self.term.write_line(&format!("Report PDF: {}", style(url).underlined()))?,
            Err(e) => self.banner("Could not fetch the report link", &e)?,
        }

        // Conversion
        let Choice::Picked(parser) = self.choose("Parser", &options.parsers)? else {
            return Ok(());
        };
        self.session.select_parser(parser.as_str());
        let orchestrated = options
            .orchestrated_parsers
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&parser));
        self.process(&parser, orchestrated).await?;

        // Chunking
        let Choice::Picked(strategy) = self.choose("Chunking strategy", &options.strategies)? else {
            return Ok(());
        };
        self.session.select_strategy(strategy);

        let chunk_set = self.session.chunk_set_request()?;
        match with_spinner("Chunking", self.client.chunks(&chunk_set)).await {
            Ok(chunks) => {
                self.term
                    .write_line(&format!("{} chunks", style(chunks.len()).bold()))?;
                for (i, chunk) in chunks.iter().take(3).enumerate() {
                    self.term
                        .write_line(&format!("  [{}] {}", i + 1, preview(chunk, 100)))?;
                }
            }
            Err(e) => {
                self.banner("Chunking failed", &e)?;
                return Ok(());
            }
        }

        // Indexing
        let Choice::Picked(backend) = self.choose("Vector backend", &options.backends)? else {
            return Ok(());
        };
        self.session.select_backend(backend);
        let backend = self.session.require_backend()?.to_string();

        match with_spinner("Uploading chunks", self.client.upload(&backend, &chunk_set)).await {
            Ok(count) => self.term.write_line(&format!(
                "{} Uploaded {} chunks to {}",
                style("✓").green(),
                count,
                backend
            ))?,
            Err(e) => {
                self.banner("Upload failed", &e)?;
                return Ok(());
            }
        }

        self.ask_loop(&backend).await
    }

    /// Run the selected parser, through the orchestrator when the API says so
    async fn process(&self, parser: &str, orchestrated: bool) -> Result<()> {
        let period = self.session.period_request()?;

        if orchestrated {
            match with_spinner("Triggering conversion job", self.client.trigger(&period)).await {
                Ok(run) => {
                    self.term.write_line(&format!(
                        "{} {} (run {})",
                        style("✓").green(),
                        run.message,
                        style(run.run_id).bold()
                    ))?;
                    self.term.write_line(
                        "The job runs in the orchestrator; chunking fails until it has finished.",
                    )?;
                }
                Err(e) => self.banner("Processing failed", &e)?,
            }
            return Ok(());
        }

        match with_spinner("Converting", self.client.convert(parser, &period)).await {
            Ok(result) => self.term.write_line(&format!(
                "{} Markdown stored at {}\n  Preview: {}",
                style("✓").green(),
                result.markdown_key,
                style(result.preview_url).underlined()
            ))?,
            Err(e) => self.banner("Processing failed", &e)?,
        }
        Ok(())
    }

    async fn ask_loop(&self, backend: &str) -> Result<()> {
        loop {
            self.term.write_line(&format!(
                "\n{} (question, {} or empty line to quit)",
                style("Ask").bold(),
                style(":summary").cyan()
            ))?;
            let line = self.term.read_line()?;
            let line = line.trim();

            if line.is_empty() {
                return Ok(());
            }

            if line == ":summary" {
                let chunk_set = self.session.chunk_set_request()?;
                match with_spinner("Summarizing", self.client.summarize(backend, &chunk_set)).await {
                    Ok(summary) => self.term.write_line(&summary)?,
                    Err(e) => self.banner("Summary failed", &e)?,
                }
                continue;
            }

            let request = self.session.query_request(line)?;
            match with_spinner("Thinking", self.client.query(backend, &request)).await {
                Ok(response) => {
                    self.term.write_line(&response.answer)?;
                    self.term.write_line(&format!("\n{}", style("Sources").dim()))?;
                    for (i, source) in response.sources.iter().enumerate() {
                        self.term
                            .write_line(&format!("  [{}] {}", i + 1, preview(source, 120)))?;
                    }
                }
                Err(e) => self.banner("Query failed", &e)?,
            }
        }
    }

    /// Numbered menu; an empty line goes back
    fn choose(&self, label: &str, items: &[String]) -> Result<Choice> {
        if items.is_empty() {
            bail!("No {} available", label.to_lowercase());
        }

        self.term.write_line(&format!("\n{}", style(label).bold()))?;
        for (i, item) in items.iter().enumerate() {
            self.term.write_line(&format!("  {}) {}", i + 1, item))?;
        }

        loop {
            self.term.write_str("> ")?;
            let line = self.term.read_line()?;
            let line = line.trim();
            if line.is_empty() {
                return Ok(Choice::Back);
            }
            match line.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => {
                    return Ok(Choice::Picked(items[n - 1].clone()))
                }
                _ => {
                    if let Some(item) = items.iter().find(|item| item.eq_ignore_ascii_case(line)) {
                        return Ok(Choice::Picked(item.clone()));
                    }
                    self.term
                        .write_line(&format!("Pick 1-{} or a name", items.len()))?;
                }
            }
        }
    }

    /// One generic failure line per stage; details go to the log
    fn banner(&self, headline: &str, error: &report_pipeline::Error) -> Result<()> {
        tracing::warn!("{}: {}", headline, error);
        self.term.write_line(&format!(
            "{} {}. {}",
            style("✗").red(),
            style(headline).red().bold(),
            error
        ))?;
        Ok(())
    }
}

async fn with_spinner<T>(
    message: &str,
    task: impl Future<Output = report_pipeline::Result<T>>,
) -> report_pipeline::Result<T> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));

    let result = task.await;
    spinner.finish_and_clear();
    result
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}
