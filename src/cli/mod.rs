mod actions;
mod terminal;

pub use actions::print_actions;
pub use terminal::{EditorOpener, TerminalPresenter, TerminalPrompt};
