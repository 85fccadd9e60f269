//! Interactive vs. plain output detection

use std::io::IsTerminal;

/// Environment variables set by common CI systems
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Decides how commands render their output
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
}

impl UiContext {
    /// Interactive only with a terminal on both ends and no CI marker
    pub fn detect() -> Self {
        let terminal = std::io::stdout().is_terminal() && std::io::stdin().is_terminal();
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: terminal && !ci,
            auto_yes: false,
        }
    }

    /// Plain output, prompts take their default
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    /// Answer yes to every confirmation (`--yes`)
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    /// Spinners, progress bars and cliclack logs
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}
