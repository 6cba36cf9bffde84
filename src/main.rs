use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use devtool_assistant::analysis::{estimate_tokens, AnalysisEvent, AnalysisSettings, Strategy};
use devtool_assistant::config::{setup_api_key_interactive, Config, API_KEY_ENV};
use devtool_assistant::ingest::IngestOptions;
use devtool_assistant::llm::{AnalysisResult, GroqClient, LlmError};
use devtool_assistant::logging::init_logging;
use devtool_assistant::prompts::PromptLibrary;
use devtool_assistant::tasks::{
    list_branches, load_code, load_diff, run_task, CodeSource, DiffSource, Loaded, Task,
    TaskOutcome,
};
use devtool_assistant::util::{format_count, preview};
use std::fs;
use std::path::PathBuf;

const PREVIEW_CHARS: usize = 3000;

#[derive(Parser, Debug)]
#[command(
    name = "devtool",
    about = "Audit, review and describe code with Groq-hosted models",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Model to use (defaults to the configured model)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Inputs estimated at or above this many tokens are analysed in chunks
    #[arg(long, global = true)]
    threshold: Option<usize>,

    /// Token budget for each chunk in map-reduce mode
    #[arg(long, global = true)]
    chunk_tokens: Option<usize>,

    /// Also write the response to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Print the first 3000 characters of the input before analysing it
    #[arg(long, global = true)]
    preview: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recruitment-style audit of a repository
    Audit(CodeArgs),
    /// Senior code review
    Review(CodeArgs),
    /// Generate a merge request description from a diff
    Mr(MrArgs),
    /// List the remote branches of a repository
    Branches {
        /// Repository URL
        url: String,
    },
    /// List the text-generation models available to your API key
    Models,
    /// Store your Groq API key
    Setup,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct CodeArgs {
    /// A text file holding the code (for example a digest)
    #[arg(long)]
    file: Option<PathBuf>,

    /// A local directory to ingest
    #[arg(long)]
    path: Option<PathBuf>,

    /// A public repository URL to clone and ingest
    #[arg(long)]
    repo: Option<String>,
}

impl CodeArgs {
    fn into_source(self) -> Result<CodeSource> {
        match (self.file, self.path, self.repo) {
            (Some(file), _, _) => Ok(CodeSource::File(file)),
            (_, Some(path), _) => Ok(CodeSource::Directory(path)),
            (_, _, Some(repo)) => Ok(CodeSource::Repository(repo)),
            _ => bail!("Provide one of --file, --path or --repo"),
        }
    }
}

#[derive(Args, Debug)]
struct MrArgs {
    /// A file holding the diff
    #[arg(long, conflicts_with = "repo")]
    diff_file: Option<PathBuf>,

    /// Repository URL to diff branches of
    #[arg(long, requires_all = ["source", "target"])]
    repo: Option<String>,

    /// Branch with the changes
    #[arg(long, requires = "repo")]
    source: Option<String>,

    /// Branch the changes would merge into
    #[arg(long, requires = "repo")]
    target: Option<String>,
}

impl MrArgs {
    fn into_source(self) -> Result<DiffSource> {
        match (self.diff_file, self.repo, self.source, self.target) {
            (Some(path), _, _, _) => Ok(DiffSource::File(path)),
            (None, Some(url), Some(source), Some(target)) => {
                Ok(DiffSource::Branches { url, source, target })
            }
            _ => bail!("Provide --diff-file, or --repo with --source and --target"),
        }
    }
}

/// Flags that shape how results are shown
struct OutputOptions {
    output: Option<PathBuf>,
    preview: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load();
    let settings = settings_from(&cli, &config);
    let output = OutputOptions {
        output: cli.output.clone(),
        preview: cli.preview,
    };

    match cli.command {
        Commands::Audit(args) => {
            run_code_task(Task::Audit, args, settings, &config, &output).await
        }
        Commands::Review(args) => {
            run_code_task(Task::Review, args, settings, &config, &output).await
        }
        Commands::Mr(args) => {
            let source = args.into_source()?;
            let client = client_from(&config)?;

            eprintln!("📥 Loading diff...");
            let loaded = tokio::task::spawn_blocking(move || load_diff(&source))
                .await
                .context("Loading task panicked")??;

            analyse(Task::MergeRequest, loaded, settings, &client, &config, &output).await
        }
        Commands::Branches { url } => {
            eprintln!("📥 Cloning repository and fetching branches...");
            let branches = tokio::task::spawn_blocking(move || list_branches(&url))
                .await
                .context("Branch listing task panicked")??;
            for branch in branches {
                println!("{}", branch);
            }
            Ok(())
        }
        Commands::Models => {
            let client = client_from(&config)?;
            let models = client.list_models().await?;
            for model in models {
                let marker = if model == settings.model { "*" } else { " " };
                println!("{} {}", marker, model);
            }
            Ok(())
        }
        Commands::Setup => {
            setup_api_key_interactive().map_err(|e| anyhow!(e))?;
            Ok(())
        }
    }
}

async fn run_code_task(
    task: Task,
    args: CodeArgs,
    settings: AnalysisSettings,
    config: &Config,
    output: &OutputOptions,
) -> Result<()> {
    let source = args.into_source()?;
    // Fail on a missing key before spending time on a clone
    let client = client_from(config)?;

    eprintln!("📥 Loading code...");
    let options = IngestOptions::default();
    let loaded = tokio::task::spawn_blocking(move || load_code(&source, &options))
        .await
        .context("Loading task panicked")??;

    analyse(task, loaded, settings, &client, config, output).await
}

/// Config values with command-line overrides applied
fn settings_from(cli: &Cli, config: &Config) -> AnalysisSettings {
    let mut settings = config.analysis_settings();
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }
    if let Some(threshold) = cli.threshold {
        settings.single_pass_threshold = threshold;
    }
    if let Some(chunk_tokens) = cli.chunk_tokens {
        settings.chunk_max_tokens = chunk_tokens;
    }
    settings
}

fn client_from(config: &Config) -> Result<GroqClient> {
    GroqClient::from_config(config).map_err(|err| match err {
        LlmError::MissingApiKey => anyhow!(
            "No Groq API key found. Run `devtool setup` or set {}.",
            API_KEY_ENV
        ),
        other => anyhow!(other),
    })
}

async fn analyse(
    task: Task,
    loaded: Loaded,
    settings: AnalysisSettings,
    client: &GroqClient,
    config: &Config,
    output: &OutputOptions,
) -> Result<()> {
    eprintln!(
        "  ✅ Loaded ~{} tokens · {} lines · {} chars",
        format_count(estimate_tokens(&loaded.content)),
        format_count(loaded.content.lines().count()),
        format_count(loaded.content.chars().count())
    );
    if output.preview {
        eprintln!("{}", preview(&loaded.content, PREVIEW_CHARS));
    }

    eprintln!("🔍 {} with {}...", task.title(), settings.model);
    let prompts = PromptLibrary::new(config.prompts_dir.clone());
    let outcome = run_task(task, &loaded, settings, client, &prompts, print_event).await?;

    match outcome {
        TaskOutcome::NothingToAnalyze(message) => {
            eprintln!("  {}", message);
            Ok(())
        }
        TaskOutcome::Completed(result) => {
            println!("{}", result.content);
            if let Some(path) = &output.output {
                fs::write(path, &result.content)
                    .with_context(|| format!("Failed to write '{}'", path.display()))?;
                eprintln!("  💾 Saved to {}", path.display());
            }
            print_usage(&result);
            Ok(())
        }
    }
}

fn print_event(event: &AnalysisEvent) {
    match event {
        AnalysisEvent::StrategyChosen {
            strategy: Strategy::SinglePass,
            estimated_tokens,
        } => eprintln!(
            "  Input is ~{} tokens, analysing in a single pass...",
            format_count(*estimated_tokens)
        ),
        AnalysisEvent::StrategyChosen {
            strategy: Strategy::MapReduce,
            estimated_tokens,
        } => eprintln!(
            "  Input is ~{} tokens, switching to map-reduce...",
            format_count(*estimated_tokens)
        ),
        AnalysisEvent::ChunksPlanned {
            files,
            chunks,
            max_tokens,
        } => eprintln!(
            "  {} files packed into {} chunks of up to {} tokens",
            files,
            chunks,
            format_count(*max_tokens)
        ),
        AnalysisEvent::ChunkStarted { index, total } => {
            eprintln!("  Analysing chunk {}/{}...", index, total)
        }
        AnalysisEvent::ChunkFailed {
            index,
            total,
            error,
        } => eprintln!("  ⚠️  Chunk {}/{} failed: {}", index, total, error),
        AnalysisEvent::Synthesizing { partials } => eprintln!(
            "  Synthesizing the final report from {} partial findings...",
            partials
        ),
    }
}

fn print_usage(result: &AnalysisResult) {
    eprintln!(
        "\n  {} · {} prompt + {} completion = {} tokens · {:.1}s",
        result.model,
        format_count(result.usage.prompt_tokens as usize),
        format_count(result.usage.completion_tokens as usize),
        format_count(result.usage.total_tokens as usize),
        result.elapsed_seconds
    );
}
