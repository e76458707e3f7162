pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use triage_core::config::{AppConfig, LoadOptions};

use crate::commands::{walk::WalkArgs, TreeSource};

#[derive(Debug, Parser)]
#[command(
    name = "triage",
    about = "Escalate-or-handle decision tree CLI",
    long_about = "Walk decision trees in the terminal, record the path taken, and operate the tree store.",
    after_help = "Examples:\n  triage walk --builtin\n  triage walk --answer 4 --answer No --builtin\n  triage seed\n  triage validate --file trees/escalation_v1.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct TreeArgs {
    #[arg(long, help = "Tree id to load (defaults to session.default_tree_id)")]
    tree: Option<String>,
    #[arg(long, conflicts_with = "file", help = "Use the tree shipped with the binary")]
    builtin: bool,
    #[arg(long, help = "Read the tree from a JSON file instead of the store")]
    file: Option<PathBuf>,
}

impl TreeArgs {
    fn source(&self) -> TreeSource {
        match (&self.file, self.builtin) {
            (Some(path), _) => TreeSource::File(path.clone()),
            (None, true) => TreeSource::Builtin,
            (None, false) => TreeSource::Store,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the shipped decision trees into the store and verify them")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Check a decision tree for structural errors")]
    Validate {
        #[command(flatten)]
        tree: TreeArgs,
    },
    #[command(about = "Answer a decision tree question by question in the terminal")]
    Walk {
        #[command(flatten)]
        tree: TreeArgs,
        #[arg(long = "answer", help = "Pre-supplied answer (option number or label); repeatable")]
        answers: Vec<String>,
        #[arg(long, help = "Owner id attached to the submitted path")]
        owner: Option<String>,
        #[arg(long, help = "Submit the path to the store once a result is reached")]
        submit: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        if let Err(error) = logging::init(&config.logging) {
            eprintln!("{error}");
        }
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Validate { tree } => commands::validate::run(tree.source(), tree.tree),
        Command::Walk { tree, answers, owner, submit } => commands::walk::run(WalkArgs {
            source: tree.source(),
            tree_id: tree.tree,
            answers,
            owner,
            submit,
        }),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
