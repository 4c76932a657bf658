use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::pipeline::ChatSink;

/// Chat sink for the terminal: status goes to a spinner, deliveries are copied to a directory
pub struct ConsoleSink {
    output_dir: PathBuf,
    quiet: bool,
    spinner: Mutex<Option<ProgressBar>>,
    delivered: Mutex<Vec<PathBuf>>,
}

impl ConsoleSink {
    pub fn new(output_dir: impl Into<PathBuf>, quiet: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            quiet,
            spinner: Mutex::new(None),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Files copied out so far
    pub fn delivered(&self) -> Vec<PathBuf> {
        self.delivered
            .lock()
            .map(|files| files.clone())
            .unwrap_or_default()
    }

    fn set_spinner_message(&self, text: &str) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let mut spinner = self
            .spinner
            .lock()
            .map_err(|_| anyhow::anyhow!("spinner lock poisoned"))?;

        match spinner.as_ref() {
            Some(progress) => progress.set_message(plain(text)),
            None => {
                let progress = ProgressBar::new_spinner();
                progress.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
                );
                progress.enable_steady_tick(Duration::from_millis(120));
                progress.set_message(plain(text));
                *spinner = Some(progress);
            }
        }
        Ok(())
    }

    fn clear_spinner(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(progress) = spinner.take() {
                progress.finish_and_clear();
            }
        }
    }
}

impl Drop for ConsoleSink {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

/// Drop chat markdown emphasis for terminal output
fn plain(text: &str) -> String {
    text.replace("**", "")
}

#[async_trait]
impl ChatSink for ConsoleSink {
    async fn acknowledge(&self, text: &str) -> Result<()> {
        self.set_spinner_message(text)
    }

    async fn update_status(&self, text: &str) -> Result<()> {
        self.set_spinner_message(text)
    }

    async fn deliver(&self, text: &str, files: &[PathBuf]) -> Result<()> {
        self.clear_spinner();

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;

        for file in files {
            let name = file
                .file_name()
                .context("Delivered path has no file name")?;
            let target = self.output_dir.join(name);
            tokio::fs::copy(file, &target)
                .await
                .with_context(|| format!("Failed to copy video to {}", target.display()))?;

            println!("{} {}", style(plain(text)).green().bold(), target.display());
            if let Ok(mut delivered) = self.delivered.lock() {
                delivered.push(target);
            }
        }
        Ok(())
    }

    async fn report_failure(&self, text: &str) -> Result<()> {
        self.clear_spinner();
        eprintln!("{}", style(plain(text)).red());
        Ok(())
    }

    async fn notify_special(&self, text: &str) -> Result<()> {
        println!("{}", style(plain(text)).cyan());
        Ok(())
    }
}
