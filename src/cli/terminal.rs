//! Terminal implementations of the host capabilities.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;

use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::stage::ProgressUpdate;
use crate::workflow::{BranchPrompt, Presenter, WindowOpener};

/// Draws progress as a titled bar on stderr.
///
/// The bar restarts for every (method, phase) label and its message line
/// is the replacing log line. Appended log lines are printed above it.
/// Without a terminal the bar is hidden and replaced lines are printed one
/// per line instead.
pub struct TerminalPresenter {
    bar: ProgressBar,
    /// Label the bar is currently filling for.
    label: Mutex<String>,
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(100), target).with_style(bar_style());
        Self {
            bar,
            label: Mutex::new(String::new()),
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(concat!(
            "  Cloning repository and checking out branch...\n",
            "    {bar:40.cyan/dim} {pos:>3}%  {wide_msg}",
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━─")
}

impl Presenter for TerminalPresenter {
    fn report_progress(&self, update: &ProgressUpdate) {
        if let Ok(mut label) = self.label.lock() {
            if *label != update.label {
                label.clone_from(&update.label);
                self.bar.set_position(0);
            }
        }
        self.bar.inc(u64::from(update.increment));
    }

    fn log_line(&self, text: &str) {
        self.bar.suspend(|| eprintln!("{}", text));
    }

    fn log_replace(&self, text: &str) {
        self.bar.set_message(text.to_string());
        if self.bar.is_hidden() {
            eprintln!("{}", text);
        }
    }

    fn notify_info(&self, message: &str) {
        self.bar.finish_and_clear();
        println!("{}", message);
    }

    /// On a terminal the log is stderr too, and the error was just logged
    /// there, so only the bar is taken down.
    fn notify_error(&self, _message: &str) {
        self.bar.finish_and_clear();
    }
}

/// Asks for the branch name on the terminal.
pub struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl BranchPrompt for TerminalPrompt {
    fn ask(&self) -> Option<String> {
        if !io::stdin().is_terminal() {
            log::debug!("stdin is not a terminal, not prompting for a branch");
            return None;
        }
        match Input::<String>::with_theme(&self.theme)
            .with_prompt("Enter the branch name to compare with")
            .allow_empty(true)
            .interact_text()
        {
            Ok(branch) => Some(branch),
            Err(e) => {
                log::warn!("Branch prompt failed: {}", e);
                None
            }
        }
    }
}

/// Opens a directory by spawning an editor command with the path appended.
pub struct EditorOpener {
    argv: Vec<String>,
}

impl EditorOpener {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl WindowOpener for EditorOpener {
    fn open(&self, dir: &Path) -> io::Result<()> {
        let (program, args) = self.argv.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no editor command configured")
        })?;

        log::debug!("Opening {} with {:?}", dir.display(), self.argv);
        let mut child = Command::new(program)
            .args(args)
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // The window lives on its own; only reap the launcher.
        thread::Builder::new()
            .name("editor-reaper".to_string())
            .spawn(move || {
                let _ = child.wait();
            })?;
        Ok(())
    }
}
