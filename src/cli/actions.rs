//! The entries offered in the action list.

/// One invocable entry: what the user sees and what it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionItem {
    pub label: &'static str,
    pub command: &'static str,
}

/// The "Compare with Branch" action.
pub const COMPARE_WITH_BRANCH: ActionItem = ActionItem {
    label: "Compare with Branch",
    command: "cmpbranch compare",
};

/// Every action exposed by this tool.
pub fn actions() -> Vec<ActionItem> {
    vec![COMPARE_WITH_BRANCH]
}

/// Print the action list.
pub fn print_actions() {
    for item in actions() {
        println!("{:<24} {}", item.label, item.command);
    }
}
