//! Operator prompts.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::io::{BufRead, Write};

/// Interactive questions asked during a release.
pub trait Prompter {
    /// Pick one of `options`; returns its index.
    fn select(&mut self, message: &str, options: &[String]) -> Result<usize>;

    /// Free-form answer, asked again until `validate` accepts it.
    fn input(
        &mut self,
        message: &str,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> Result<String>;

    /// Yes/no question; anything but an explicit yes is a no.
    fn confirm(&mut self, message: &str) -> Result<bool>;
}

/// Line-based prompts over a reader/writer pair, usually stdin/stdout.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompter<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, message: &str, hint: &str) -> Result<String> {
        write!(self.output, "{} {} {}", "?".cyan().bold(), message.bold(), hint.dimmed())?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("Failed to read operator input")?;
        if read == 0 {
            bail!("Input closed while waiting for an answer to: {}", message);
        }
        Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn select(&mut self, message: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            bail!("Nothing to select for: {}", message);
        }

        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {} {}", format!("{})", i + 1).cyan(), option)?;
        }

        loop {
            let answer = self.ask(message, &format!("[1-{}]", options.len()))?;
            match answer.trim().parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => writeln!(
                    self.output,
                    "  {}",
                    format!("Enter a number between 1 and {}", options.len()).red()
                )?,
            }
        }
    }

    fn input(
        &mut self,
        message: &str,
        validate: &dyn Fn(&str) -> std::result::Result<(), String>,
    ) -> Result<String> {
        loop {
            let answer = self.ask(message, "")?;
            match validate(&answer) {
                Ok(()) => return Ok(answer),
                Err(reason) => writeln!(self.output, "  {}", reason.red())?,
            }
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        let answer = self.ask(message, "(y/N)")?;
        Ok(matches!(
            answer.trim().to_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
