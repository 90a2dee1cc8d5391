//! Scripted [`CommandRunner`] for tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pushci_core::CommandOutcome;

use crate::runner::CommandRunner;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub cwd: PathBuf,
    pub argv: Vec<String>,
    pub timeout: Duration,
}

struct Rule {
    prefix: Vec<String>,
    outcome: CommandOutcome,
}

/// Returns scripted outcomes matched on an argv prefix and records every call.
///
/// Unmatched commands succeed with an empty log. A successful `git clone`
/// creates its destination directory with a `.git` marker, so the workspace
/// manager sees a real-looking checkout.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `outcome` for commands starting with `prefix`. First match wins.
    pub fn on(mut self, prefix: &[&str], outcome: CommandOutcome) -> Self {
        self.rules.push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            outcome,
        });
        self
    }

    /// Every call, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether any call started with `prefix`.
    pub fn ran(&self, prefix: &[&str]) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|call| starts_with(&call.argv, prefix))
    }

    fn outcome_for(&self, argv: &[String]) -> CommandOutcome {
        self.rules
            .iter()
            .find(|rule| rule.prefix.len() <= argv.len() && rule.prefix[..] == argv[..rule.prefix.len()])
            .map(|rule| rule.outcome.clone())
            .unwrap_or_else(|| CommandOutcome::success(""))
    }
}

fn starts_with(argv: &[String], prefix: &[&str]) -> bool {
    prefix.len() <= argv.len() && argv.iter().zip(prefix).all(|(a, p)| a == p)
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cwd: &Path, argv: &[String], timeout: Duration) -> CommandOutcome {
        self.calls.lock().unwrap().push(Invocation {
            cwd: cwd.to_path_buf(),
            argv: argv.to_vec(),
            timeout,
        });

        let outcome = self.outcome_for(argv);
        if outcome.passed() && starts_with(argv, &["git", "clone"]) {
            if let Some(dest) = argv.last() {
                let dest = cwd.join(dest);
                if let Err(e) = std::fs::create_dir_all(dest.join(".git")) {
                    return CommandOutcome::error(format!("simulated clone failed: {e}"), String::new(), 0);
                }
            }
        }
        outcome
    }
}
