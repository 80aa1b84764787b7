//! Terminal and JSON rendering for CLI results.

use colored::Colorize;
use gateway_core::GatewayError;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Pick the format from the `--json` flag.
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }

    /// Whether output is JSON.
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Severity of a one-line notice.
#[derive(Debug, Clone, Copy)]
pub enum Level {
    Ok,
    Warn,
    Fail,
}

/// Print a one-line notice; warnings and failures go to stderr.
pub fn notice(level: Level, message: &str) {
    match level {
        Level::Ok => println!("{} {message}", "✓".green().bold()),
        Level::Warn => eprintln!("{} {message}", "⚠".yellow().bold()),
        Level::Fail => eprintln!("{} {message}", "✗".red().bold()),
    }
}

/// Print an indented `key: value` line.
pub fn field(key: &str, value: impl std::fmt::Display) {
    println!("  {}: {value}", key.bold());
}

/// Print an underlined heading preceded by a blank line.
pub fn heading(title: &str) {
    println!("\n{}", title.bold().underline());
}

/// Print a capability line with a filled marker when it is declared.
pub fn capability_line(name: &str, declared: bool) {
    let marker = if declared { "●".green() } else { "○".dimmed() };
    println!("  {marker} {name}");
}

/// Serialize `value` to stdout, pretty or one object per line.
pub fn emit_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

/// Spinner shown while a provider call is in flight; cleared when dropped.
pub struct Busy(Option<indicatif::ProgressBar>);

impl Busy {
    /// Start a spinner, unless output is JSON.
    pub fn start(format: OutputFormat, message: &str) -> Self {
        if format.is_json() {
            return Self(None);
        }

        let bar = indicatif::ProgressBar::new_spinner();
        if let Ok(style) = indicatif::ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg}")
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self(Some(bar))
    }
}

impl Drop for Busy {
    fn drop(&mut self) {
        if let Some(bar) = self.0.take() {
            bar.finish_and_clear();
        }
    }
}

/// Render rows as a rounded table.
pub fn render_table<T: tabled::Tabled>(rows: &[T]) {
    use tabled::{settings::Style, Table};

    if rows.is_empty() {
        println!("  (none)");
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Writes streamed text as it arrives and ends the line once.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    wrote: bool,
}

impl StreamPrinter {
    /// Append a fragment and flush.
    pub fn push(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        io::stdout().flush().ok();
        self.wrote = true;
    }

    /// Terminate the line if anything was written.
    pub fn finish(&mut self) {
        if std::mem::take(&mut self.wrote) {
            println!();
        }
    }
}

/// Human-readable byte size.
pub fn human_size(bytes: u64) -> String {
    bytesize::ByteSize(bytes).to_string()
}

/// The `--json` envelope every command prints.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    /// Whether the command succeeded.
    pub success: bool,
    /// Result data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error kind tag if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl<T: Serialize> Envelope<T> {
    /// Wrap successful data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    /// Print as pretty JSON.
    pub fn print(&self) -> anyhow::Result<()> {
        emit_json(self, true)
    }
}

impl Envelope<()> {
    /// Describe a gateway failure.
    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            kind: Some(err.kind()),
        }
    }
}

/// Turn a gateway error into a process failure. In JSON mode the envelope is
/// written to stdout first; anyhow prints the message to stderr either way.
pub fn report_failure<T>(err: GatewayError, format: OutputFormat) -> anyhow::Result<T> {
    if format.is_json() {
        Envelope::from_error(&err).print()?;
    }
    Err(err.into())
}
