//! Terminal and JSON renderers for agent messages

use std::io::{stdout, Write};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use taskpilot_core::{AgentMessage, AgentSink};

// ANSI escape codes
const CYAN: &str = "\x1b[96m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Colored line output with a spinner while the model is thinking
pub struct TerminalSink {
    spinner: Mutex<Option<ProgressBar>>,
    use_unicode: bool,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
            use_unicode: supports_unicode(),
        }
    }

    fn start_spinner(&self) {
        let mut slot = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Thinking...");
        pb.enable_steady_tick(Duration::from_millis(80));
        *slot = Some(pb);
    }

    fn clear_spinner(&self) {
        let mut slot = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pb) = slot.take() {
            pb.finish_and_clear();
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentSink for TerminalSink {
    fn render(&self, message: AgentMessage) {
        if matches!(message, AgentMessage::Thinking) {
            self.start_spinner();
            return;
        }

        self.clear_spinner();
        if let Some(line) = format_message(&message, self.use_unicode) {
            println!("{line}");
            let _ = stdout().flush();
        }
    }

    fn shutdown(&self) {
        self.clear_spinner();
        println!("{DIM}Shutting down.{RESET}");
    }
}

/// Human-readable form of a message; `None` for spinner-only messages
pub fn format_message(message: &AgentMessage, use_unicode: bool) -> Option<String> {
    let line = match message {
        AgentMessage::Thinking => return None,
        AgentMessage::Goal { value } => {
            let icon = if use_unicode { "🎯" } else { "*" };
            format!("{BOLD}{CYAN}{icon} Embarking on a new goal:{RESET} {value}")
        }
        AgentMessage::Task { value } => {
            let icon = if use_unicode { "→" } else { ">" };
            format!("{DIM}{icon} Added task:{RESET} {value}")
        }
        AgentMessage::Action { info, value } if value.is_empty() => {
            let check = if use_unicode { "✓" } else { "+" };
            format!("{GREEN}{check} {info}{RESET}")
        }
        AgentMessage::Action { info, value } => {
            format!("{BOLD}{info}{RESET}\n{value}\n")
        }
        AgentMessage::System { value } => {
            let warn = if use_unicode { "⚠" } else { "!" };
            format!("{YELLOW}{warn} {value}{RESET}")
        }
    };
    Some(line)
}

/// One JSON object per line, for piping into other tools
#[derive(Debug, Default)]
pub struct JsonSink;

impl JsonSink {
    fn write_line(&self, line: &str) {
        let mut out = stdout().lock();
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

impl AgentSink for JsonSink {
    fn render(&self, message: AgentMessage) {
        match serde_json::to_string(&message) {
            Ok(line) => self.write_line(&line),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize message"),
        }
    }

    fn shutdown(&self) {
        self.write_line(&serde_json::json!({ "type": "shutdown" }).to_string());
    }
}

fn supports_unicode() -> bool {
    let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()));
    glyphs_enabled(std::env::var("TERM").ok().as_deref(), locale.as_deref())
}

/// Glyphs need a UTF-8 locale or a terminal known to render them.
/// `locale` is the first non-empty of LC_ALL, LC_CTYPE and LANG.
fn glyphs_enabled(term: Option<&str>, locale: Option<&str>) -> bool {
    if term == Some("dumb") {
        return false;
    }
    if let Some(locale) = locale {
        let locale = locale.to_ascii_lowercase();
        return locale.contains("utf-8") || locale.contains("utf8");
    }
    term.is_some_and(|t| t.starts_with("xterm") || t.ends_with("256color") || t.contains("kitty"))
}
