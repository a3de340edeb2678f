// UI layer: credential prompts via `dialoguer`, progress via `indicatif`
// and colored phase banners via `crossterm`.
//
// Every bar is registered with one shared `MultiProgress`, so the batch bar
// and a bundle download bar draw on separate lines. Log lines emitted while
// bars are visible go through `suspend`.

use crate::api::Credential;
use crate::migrate::CredentialPrompt;
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Input;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::OnceLock;

/// Asks for a bearer token on the terminal. Empty input is rejected.
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn ask(&self, message: &str) -> Result<Credential> {
        let token: String = Input::new()
            .with_prompt(message.yellow().to_string())
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Auth token cannot be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        Ok(Credential::new(token.trim()))
    }
}

/// Section header, e.g. "Downloading Proxies from acme-dev...".
pub fn banner(msg: &str) {
    println!("{}", msg.bold().blue());
}

pub fn success(msg: &str) {
    println!("{}", msg.bold().green());
}

fn bars() -> &'static MultiProgress {
    static BARS: OnceLock<MultiProgress> = OnceLock::new();
    BARS.get_or_init(MultiProgress::new)
}

/// Hide every bar while `f` writes to the terminal.
pub fn suspend<R>(f: impl FnOnce() -> R) -> R {
    bars().suspend(f)
}

/// Clear `bar` and drop it from the shared set.
pub fn finish(bar: &ProgressBar) {
    bar.finish_and_clear();
    bars().remove(bar);
}

/// Byte progress for a bundle download; a spinner when the size is unknown.
pub fn download_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::with_template("  downloading [{bar:40}] {percent}% {eta}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("= "),
            );
            bars().add(bar)
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} downloading {bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bars().add(spinner)
        }
    }
}

/// Item counter for a batch of resources of one type.
pub fn batch_bar(len: usize, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let template = format!("[{{bar:40}}] {{pos}}/{{len}} {label}");
    bar.set_style(
        ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("= "),
    );
    bars().add(bar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_and_download_bars_share_one_set() {
        let batch = batch_bar(3, "Proxies");
        let download = download_bar(Some(10));
        let logged = suspend(|| 42);
        assert_eq!(logged, 42);
        download.inc(10);
        finish(&download);
        assert!(download.is_finished());
        batch.inc(1);
        assert_eq!(batch.position(), 1);
        finish(&batch);
        assert!(batch.is_finished());
    }
}
