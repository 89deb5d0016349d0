pub mod cli;
pub mod config;
pub mod git;
pub mod stage;
pub mod workflow;
pub mod workspace;

#[cfg(test)]
mod testutil;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::{EditorOpener, TerminalPresenter, TerminalPrompt};
use crate::config::Config;
use crate::git::{Git2Resolver, GitCli};
use crate::stage::CancellationToken;
use crate::workflow::{CompareRequest, Host, OpenTiming, Orchestrator};
use crate::workspace::TempProvisioner;

#[derive(Parser)]
#[command(
    name = "cmpbranch",
    about = "Compare with Branch - open another branch of this project side by side"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone the project into a temporary workspace, check out a branch and open it
    Compare {
        /// Branch to compare with (prompted for when omitted)
        branch: Option<String>,

        /// Project directory (defaults to the current directory)
        #[arg(long)]
        project: Option<PathBuf>,

        /// Open the window right away instead of after checkout
        #[arg(long)]
        open_immediately: bool,

        /// Editor command, e.g. "code --new-window"
        #[arg(long)]
        editor: Option<String>,
    },

    /// List available actions
    Actions,

    /// Check dependencies
    Doctor,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare {
            branch,
            project,
            open_immediately,
            editor,
        } => cmd_compare(branch, project, open_immediately, editor),
        Commands::Actions => {
            cli::print_actions();
            Ok(())
        }
        Commands::Doctor => cmd_doctor(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_compare(
    branch: Option<String>,
    project: Option<PathBuf>,
    open_immediately: bool,
    editor: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let project = project.or_else(|| std::env::current_dir().ok());
    let editor = editor
        .map(|cmd| cmd.split_whitespace().map(str::to_string).collect())
        .unwrap_or_else(|| config.editor.clone());
    let open_timing = if open_immediately {
        OpenTiming::Immediate
    } else {
        config.open_timing
    };

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        log::info!("Cancellation requested");
        handler_token.cancel();
    })?;

    let prompt = TerminalPrompt::default();
    let presenter = TerminalPresenter::new();
    let opener = EditorOpener::new(editor);
    let host = Host {
        prompt: &prompt,
        presenter: &presenter,
        opener: &opener,
    };

    let resolver = Git2Resolver::new(config.remote.clone());
    let provisioner = TempProvisioner::new(config.temp_root.clone());
    let git = GitCli::with_path(config.git_path.clone());

    let mut orchestrator = Orchestrator::new(host, &resolver, &provisioner, &git, token)
        .with_open_timing(open_timing);

    match orchestrator.run(CompareRequest { project, branch }) {
        Ok(path) => {
            println!("  Workspace: {}", path.display());
            Ok(())
        }
        // Already reported by the presenter.
        Err(_) => std::process::exit(1),
    }
}

fn cmd_doctor() -> Result<(), Box<dyn std::error::Error>> {
    println!("cmpbranch System Check\n");

    let config = Config::load()?;

    let git_ok = git::git_available(&config.git_path);
    println!(
        "[{}] git: {}",
        if git_ok { "OK" } else { "FAIL" },
        if git_ok { "available" } else { "not found" }
    );

    let editor_ok = config
        .editor
        .first()
        .map(|program| program_on_path(program))
        .unwrap_or(false);
    println!(
        "[{}] Editor: {}",
        if editor_ok { "OK" } else { "WARN" },
        if config.editor.is_empty() {
            "not configured".to_string()
        } else {
            config.editor.join(" ")
        }
    );

    let config_path = config::config_path();
    let config_exists = config_path.as_ref().map(|p| p.exists()).unwrap_or(false);
    println!(
        "[{}] Config: {}",
        if config_exists { "OK" } else { "INFO" },
        config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or("unknown".into())
    );

    let temp_root = config.temp_root.clone().unwrap_or_else(std::env::temp_dir);
    let temp_ok = temp_root.is_dir();
    println!(
        "[{}] Temp dir: {}",
        if temp_ok { "OK" } else { "FAIL" },
        temp_root.display()
    );

    if !git_ok || !temp_ok {
        std::process::exit(1);
    }

    Ok(())
}

/// Whether `program` is a path to an existing file or found on `PATH`.
fn program_on_path(program: &str) -> bool {
    let candidate = std::path::Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
        .unwrap_or(false)
}
