use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Mutex;

use async_trait::async_trait;

/// Only an exact `y` accepts. Surrounding line endings are ignored.
pub fn is_acceptance(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == "y"
}

/// Asks the operator whether to go ahead with a trade.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, summary: &str) -> bool;
}

/// Prompts on stdout and reads one line from stdin.
#[derive(Debug, Default)]
pub struct StdinConfirmer;

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, summary: &str) -> bool {
        let prompt = format!("{}\nConfirm [y/N]: ", summary);
        let answer = tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(prompt.as_bytes());
            let _ = stdout.flush();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;
        matches!(answer, Ok(Ok(line)) if is_acceptance(&line))
    }
}

/// Answers from a fixed list of input lines; an exhausted script declines.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Summaries shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, summary: &str) -> bool {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(summary.to_string());
        }
        let answer = self.answers.lock().ok().and_then(|mut a| a.pop_front());
        answer.is_some_and(|line| is_acceptance(&line))
    }
}
