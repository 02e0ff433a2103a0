//! Terminal panels for escalation events.

use owo_colors::{OwoColorize, Rgb};

use super::{EscalationEvent, EscalationLevel};

const CRITICAL: Rgb = Rgb(239, 68, 68);
const ESCALATION: Rgb = Rgb(234, 179, 8);
const WARNING: Rgb = Rgb(59, 130, 246);
const MUTED: Rgb = Rgb(107, 114, 128);

/// Renders escalation events as bordered text panels.
#[derive(Debug, Clone)]
pub struct EscalationRenderer {
    /// Panel width (characters)
    width: usize,
    use_color: bool,
}

impl Default for EscalationRenderer {
    fn default() -> Self {
        Self {
            width: 64,
            use_color: true,
        }
    }
}

impl EscalationRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer that emits no ANSI escapes.
    pub fn plain() -> Self {
        Self {
            use_color: false,
            ..Self::default()
        }
    }

    /// Sets the panel width. Widths below 20 are raised to 20.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(20);
        self
    }

    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    fn level_color(level: EscalationLevel) -> Rgb {
        match level {
            EscalationLevel::Critical => CRITICAL,
            EscalationLevel::Escalation => ESCALATION,
            EscalationLevel::Warning => WARNING,
        }
    }

    fn paint(&self, text: &str, color: Rgb, bold: bool) -> String {
        match (self.use_color, bold) {
            (false, _) => text.to_string(),
            (true, false) => text.color(color).to_string(),
            (true, true) => text.color(color).bold().to_string(),
        }
    }

    /// Truncates to `max_chars` characters, UTF-8 safe.
    fn safe_truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars {
            s.to_string()
        } else {
            let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", truncated)
        }
    }

    /// Renders the full panel: header, error details, recovery note,
    /// cause chain and numbered suggestions.
    pub fn render(&self, event: &EscalationEvent) -> String {
        let color = Self::level_color(event.level);
        let inner_width = self.width - 2;
        let text_width = inner_width.saturating_sub(2);
        let border = "─".repeat(inner_width);
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.paint(&border, color, false)));

        let header = format!(
            "{} · {}",
            event.level,
            event.context_label.as_deref().unwrap_or("operation")
        );
        output.push_str(&format!(
            " {}\n",
            self.paint(&Self::safe_truncate(&header, text_width), color, true)
        ));
        output.push_str(&format!("{}\n", self.paint(&border, color, false)));

        output.push_str(&format!(
            " {}\n",
            Self::safe_truncate(&event.error.to_string(), text_width)
        ));
        let details = format!(
            "code {} · {} · {} attempt{} · {}",
            event.error.code(),
            event.error.classification(),
            event.attempts,
            if event.attempts == 1 { "" } else { "s" },
            event.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        output.push_str(&format!(
            " {}\n",
            self.paint(&Self::safe_truncate(&details, text_width), MUTED, false)
        ));

        if let Some(note) = &event.recovery_note {
            output.push_str(&format!(
                " {}\n",
                Self::safe_truncate(&format!("Recovery: {}", note), text_width)
            ));
        }

        for cause in event.error.chain().iter().skip(1) {
            let line = format!("caused by: {}", cause);
            output.push_str(&format!(
                " {}\n",
                self.paint(&Self::safe_truncate(&line, text_width), MUTED, false)
            ));
        }

        if !event.suggested_actions.is_empty() {
            output.push('\n');
            output.push_str(&format!(" {}\n", self.paint("Suggested actions:", color, true)));
            for (index, action) in event.suggested_actions.iter().enumerate() {
                let line = format!("{}. {}", index + 1, action);
                output.push_str(&format!(" {}\n", Self::safe_truncate(&line, text_width)));
            }
        }

        output.push_str(&self.paint(&border, color, false));
        output
    }
}
