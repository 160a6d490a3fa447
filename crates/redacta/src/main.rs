use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use redacta::commands::{self, AngleSelection, Context, GenerateRequest, OptionArgs, SourceArgs};

#[derive(Parser)]
#[command(name = "redacta")]
#[command(
  about = "Redacta - Source-grounded writing assistant\n\
           Drafts essays and reports from your documents, with critic and humanizer passes"
)]
#[command(version)]
struct Cli {
  /// Configuration file (defaults to <data dir>/config.json)
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Show debug diagnostics
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate a text from sources and an instruction
  Generate {
    /// What to write
    instruction: Option<String>,
    #[command(flatten)]
    sources: SourceArgs,
    #[command(flatten)]
    options: OptionArgs,
    /// Propose angles first and pick one interactively
    #[arg(long, conflicts_with = "angle")]
    angles: bool,
    /// Propose angles first and take this one (1-based)
    #[arg(long, value_name = "N")]
    angle: Option<usize>,
    /// Also write the final text to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Do not record the result in history
    #[arg(long)]
    no_history: bool,
  },
  /// Write an optimized master prompt for the task instead of the text
  Prompt {
    instruction: Option<String>,
    #[command(flatten)]
    sources: SourceArgs,
    #[command(flatten)]
    options: OptionArgs,
    /// Do not record the result in history
    #[arg(long)]
    no_history: bool,
  },
  /// Propose strategic angles for a task
  Angles {
    instruction: Option<String>,
    #[command(flatten)]
    sources: SourceArgs,
    #[command(flatten)]
    options: OptionArgs,
  },
  /// Personal style guides
  Style {
    #[command(subcommand)]
    action: StyleAction,
  },
  /// Past generations
  History {
    #[command(subcommand)]
    action: HistoryAction,
  },
}

#[derive(Subcommand)]
enum StyleAction {
  /// Derive a style guide from writing samples
  Analyze {
    /// Sample files
    #[arg(required = true)]
    samples: Vec<PathBuf>,
    /// Save as the default guide for humanizing
    #[arg(long)]
    save: bool,
  },
  /// Print the saved style guide
  Show,
}

#[derive(Subcommand)]
enum HistoryAction {
  /// List records, newest first
  List {
    #[arg(short = 'n', long)]
    limit: Option<usize>,
  },
  /// Print one record
  Show { id: String },
  /// Delete one record
  Delete {
    id: String,
    /// Skip confirmation prompt
    #[arg(short, long)]
    force: bool,
  },
  /// Delete every record
  Clear {
    /// Skip confirmation prompt
    #[arg(short, long)]
    force: bool,
  },
}

#[tokio::main]
async fn main() {
  let cli = Cli::parse();
  bentley::init_tracing(cli.verbose);

  if let Err(e) = run(cli).await {
    bentley::error!(&format!("{e:#}"));
    std::process::exit(1);
  }
}

async fn run(cli: Cli) -> Result<()> {
  let ctx = Context::load(cli.config.as_deref())?;

  match cli.command {
    Commands::Generate { instruction, sources, options, angles, angle, output, no_history } => {
      let angle = match (angles, angle) {
        (_, Some(n)) => AngleSelection::Index(n),
        (true, None) => AngleSelection::Interactive,
        (false, None) => AngleSelection::None,
      };
      let request = GenerateRequest {
        instruction: instruction.unwrap_or_default(),
        sources,
        options,
        angle,
        output,
        save: !no_history,
      };
      commands::generate(&ctx, request).await?;
    }
    Commands::Prompt { instruction, sources, options, no_history } => {
      commands::prompt(&ctx, &instruction.unwrap_or_default(), &sources, &options, !no_history)
        .await?;
    }
    Commands::Angles { instruction, sources, options } => {
      commands::angles(&ctx, &instruction.unwrap_or_default(), &sources, &options).await?;
    }
    Commands::Style { action } => match action {
      StyleAction::Analyze { samples, save } => {
        commands::style_analyze(&ctx, &samples, save).await?;
      }
      StyleAction::Show => commands::style_show(&ctx)?,
    },
    Commands::History { action } => match action {
      HistoryAction::List { limit } => commands::history_list(&ctx, limit)?,
      HistoryAction::Show { id } => commands::history_show(&ctx, &id)?,
      HistoryAction::Delete { id, force } => commands::history_delete(&ctx, &id, force)?,
      HistoryAction::Clear { force } => commands::history_clear(&ctx, force)?,
    },
  }

  Ok(())
}
