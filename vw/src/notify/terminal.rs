//! Terminal update prompt

use std::io::Write;

use async_trait::async_trait;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{NotifyError, PromptHandle, PromptOutcome, UpdateNotifier, UpdatePrompt};

/// Renders update prompts on the terminal and reads the decision from stdin.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl TerminalNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UpdateNotifier for TerminalNotifier {
    async fn show(
        &self,
        prompt: UpdatePrompt,
        outcome_tx: oneshot::Sender<PromptOutcome>,
    ) -> Result<Box<dyn PromptHandle>, NotifyError> {
        println!();
        println!("{}", prompt.title.bold().yellow());
        println!("{}", prompt.body);
        println!(
            "  [{}] {}   [{}] {}",
            "y".green().bold(),
            prompt.confirm_label,
            "N".red().bold(),
            prompt.cancel_label,
        );
        print!("> ");
        std::io::stdout().flush()?;

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let outcome = loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match line.trim().to_lowercase().as_str() {
                        "y" | "yes" => break PromptOutcome::Confirmed,
                        "" | "n" | "no" => break PromptOutcome::Cancelled,
                        other => {
                            println!("Unrecognized answer '{other}'. Use y or n.");
                            print!("> ");
                            let _ = std::io::stdout().flush();
                        }
                    },
                    // Stdin closed: nobody can answer, treat as a decline.
                    Ok(None) | Err(_) => break PromptOutcome::Cancelled,
                }
            };
            let _ = outcome_tx.send(outcome);
        });

        Ok(Box::new(TerminalPrompt {
            reader: Some(reader),
        }))
    }
}

struct TerminalPrompt {
    reader: Option<JoinHandle<()>>,
}

impl PromptHandle for TerminalPrompt {
    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            debug!("dismissing terminal prompt");
            reader.abort();
        }
    }
}

impl Drop for TerminalPrompt {
    fn drop(&mut self) {
        self.close();
    }
}
