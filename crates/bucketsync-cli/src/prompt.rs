//! Interactive confirmation on the terminal

use std::io::{BufRead, Write};

use anyhow::Context;

use bucketsync_core::ports::confirmation::IConfirmation;

/// Asks on stderr and reads the answer from stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmation;

/// Only an explicit yes counts
fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait::async_trait]
impl IConfirmation for StdinConfirmation {
    async fn confirm(&self, question: &str) -> anyhow::Result<bool> {
        let question = question.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            write!(stderr, "{question} (y/N) ")?;
            stderr.flush()?;

            let mut answer = String::new();
            std::io::stdin().lock().read_line(&mut answer)?;
            Ok::<_, std::io::Error>(is_yes(&answer))
        })
        .await
        .context("Confirmation prompt panicked")?
        .context("Failed to read confirmation from stdin")
    }
}
