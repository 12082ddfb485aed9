use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use konspekt_core::{
    Config, ExportRenderer, FileStore, GeminiClient, HistoryStore, Orchestrator, PipelineError,
    PipelineSnapshot, PipelineStage, Section, StudyMaterials, TextExporter, format_history_line,
    ingest,
};
use tracing_subscriber::EnvFilter;

use crate::view::ViewState;

mod view;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "konspekt")]
#[command(about = "Turn recorded lectures into transcripts, study guides and detailed notes")]
struct Cli {
    /// Gemini model used for every stage
    #[arg(long, global = true)]
    model: Option<String>,

    /// Directory holding the run history
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log pipeline internals to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe a lecture recording and generate study materials
    Run {
        /// Audio or video file
        file: PathBuf,

        /// Section to show when the run completes
        #[arg(short, long, default_value = "summary")]
        section: Section,
    },

    /// Browse or prune past runs
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Write one section of a saved run to a paginated text document
    Export {
        id: u64,

        #[arg(short, long, default_value = "summary")]
        section: Section,

        /// Output path. Defaults to <file>-<section>.txt
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List saved runs, most recent first
    List,
    /// Print one section of a saved run
    Show {
        id: u64,
        #[arg(short, long, default_value = "summary")]
        section: Section,
    },
    /// Delete a saved run
    Delete { id: u64 },
}

fn init_tracing(verbose: bool) {
    // the `konspekt` target prefix also covers `konspekt_core`
    let default = if verbose {
        "konspekt=debug"
    } else {
        "konspekt=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn create_stage_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} {msg:<28} [{bar:30.cyan/blue}] {pos:>3}%")
            .unwrap()
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn stage_message(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Transcribing => "Transcribing lecture...",
        PipelineStage::SummarizingStructured => "Building study guide...",
        PipelineStage::ComposingDetailedNotes => "Writing detailed notes...",
        _ => "",
    }
}

fn stage_done(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Transcribing => "Transcribed",
        PipelineStage::SummarizingStructured => "Study guide ready",
        PipelineStage::ComposingDetailedNotes => "Detailed notes ready",
        _ => "",
    }
}

fn print_error(message: impl std::fmt::Display) {
    eprintln!("{} {}", style("Error:").red().bold(), message);
}

fn open_history(config: &Config) -> HistoryStore {
    HistoryStore::load(Box::new(FileStore::new(&config.data_dir)))
}

/// Ask on the terminal; anything but `y` (or no terminal) means no.
fn confirm(question: &str) -> bool {
    let term = Term::stderr();
    if term.write_str(&format!("{} [y/N] ", question)).is_err() {
        return false;
    }
    term.read_line()
        .map(|answer| answer.trim().eq_ignore_ascii_case("y"))
        .unwrap_or(false)
}

/// Drive one attempt while mirroring the orchestrator's state on a progress bar
async fn drive(orchestrator: &Orchestrator, retry: bool) -> Result<Arc<StudyMaterials>, PipelineError> {
    let bar = create_stage_bar();
    let mut updates = orchestrator.subscribe();
    let mut current = PipelineStage::Idle;
    let mut stage_start = Instant::now();

    let mut on_update = |snapshot: &PipelineSnapshot| {
        if snapshot.stage != current {
            if current.is_in_flight() && snapshot.stage != PipelineStage::Failed {
                bar.println(format!(
                    "{} {} {}",
                    style("✓").green().bold(),
                    stage_done(current),
                    style(format!("[{}]", format_duration(stage_start.elapsed()))).dim()
                ));
            }
            current = snapshot.stage;
            stage_start = Instant::now();
            bar.set_message(stage_message(current));
        }
        bar.set_position(snapshot.progress as u64);
    };

    let attempt = async {
        if retry {
            orchestrator.retry_run().await
        } else {
            orchestrator.start_run().await
        }
    };
    tokio::pin!(attempt);

    let result = loop {
        tokio::select! {
            result = &mut attempt => break result,
            Ok(()) = updates.changed() => {
                let snapshot = updates.borrow_and_update().clone();
                on_update(&snapshot);
            }
        }
    };
    on_update(&orchestrator.snapshot());
    bar.finish_and_clear();

    result
}

async fn run(config: Config, file: &Path, section: Section) -> Result<()> {
    // Validate API key early
    if let Err(e) = config.require_api_key() {
        print_error(e);
        std::process::exit(1);
    }

    let backend = Arc::new(GeminiClient::new(&config)?);
    let history = open_history(&config);
    let orchestrator = Orchestrator::new(backend, config, history);
    let mut view = ViewState::default();

    println!(
        "\n{}  {}\n",
        style("konspekt").cyan().bold(),
        style("Lecture Notes").dim()
    );

    let spinner = create_spinner("Reading recording...");
    let media = match ingest(file).await {
        Ok(media) => media,
        Err(e) => {
            spinner.finish_and_clear();
            print_error(e);
            std::process::exit(1);
        }
    };
    spinner.finish_with_message(format!(
        "{} Loaded: {} {}",
        style("✓").green().bold(),
        media.filename,
        style(format!(
            "({}, {:.1} MB)",
            media.content_type,
            media.payload.len() as f64 / 1_048_576.0
        ))
        .dim()
    ));
    orchestrator.load_media(media)?;
    view.select_file(file);

    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let mut retry = false;
    let materials = loop {
        match drive(&orchestrator, retry).await {
            Ok(materials) => break materials,
            Err(error) => {
                print_error(&error.message);
                if error.retryable && confirm("Retry from the start?") {
                    retry = true;
                    continue;
                }
                std::process::exit(1);
            }
        }
    };

    println!(
        "\n{} {}",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    match orchestrator.snapshot().saved_entry {
        Some(id) => println!("{} {}\n", style("Saved as entry:").dim(), style(id).cyan()),
        None => println!("{}\n", style("Not saved to history").yellow()),
    }
    println!("{}", style("─".repeat(60)).dim());

    view.reset();
    view.show(section);
    println!("{}", view.render(&materials));

    Ok(())
}

fn history(config: &Config, action: HistoryAction) -> Result<()> {
    let mut history = open_history(config);

    match action {
        HistoryAction::List => {
            if history.list().is_empty() {
                println!("{}", style("No saved runs yet").dim());
            }
            for entry in history.list() {
                println!("{}", format_history_line(entry));
            }
        }
        HistoryAction::Show { id, section } => {
            let Some(entry) = history.get(id) else {
                anyhow::bail!("no saved run with id {id}");
            };
            let mut view = ViewState::default();
            view.show(section);
            println!("{}\n", style(&entry.filename).dim());
            println!("{}", view.render(&entry.materials));
        }
        HistoryAction::Delete { id } => {
            if history.remove(id)? {
                println!("{} Deleted {}", style("✓").green().bold(), id);
            } else {
                anyhow::bail!("no saved run with id {id}");
            }
        }
    }

    Ok(())
}

fn export(config: &Config, id: u64, section: Section, out: Option<PathBuf>) -> Result<()> {
    let history = open_history(config);
    let Some(entry) = history.get(id) else {
        anyhow::bail!("no saved run with id {id}");
    };

    let out = out.unwrap_or_else(|| {
        let stem = Path::new(&entry.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| id.to_string());
        PathBuf::from(format!("{stem}-{section}.txt"))
    });

    let pages = TextExporter::default().export(entry, section, &out)?;
    println!(
        "{} Exported {} ({} page{}) to {}",
        style("✓").green().bold(),
        section.title(),
        pages,
        if pages == 1 { "" } else { "s" },
        style(out.display()).cyan()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::from_env();
    if let Some(model) = cli.model {
        config = config.with_model(model);
    }
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    tracing::debug!(
        model = %config.model,
        data_dir = %config.data_dir.display(),
        "configuration loaded"
    );

    match cli.command {
        Command::Run { file, section } => run(config, &file, section).await,
        Command::History { action } => history(&config, action),
        Command::Export { id, section, out } => export(&config, id, section, out),
    }
}
