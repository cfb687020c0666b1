use std::io::IsTerminal;

pub use console::{Style, Term};

pub struct Styles {
    pub style_finding_heading: Style,
    pub style_heading: Style,
    pub style_rule: Style,
    pub style_metadata: Style,
    pub style_high_confidence: Style,
}

impl Styles {
    pub fn new(use_color: bool) -> Self {
        let stdout_is_tty = std::io::stdout().is_terminal();
        let is_term = Term::stdout().is_term();

        // Enable color only when explicitly requested and stdout is a terminal.
        let styles_enabled = use_color && stdout_is_tty && is_term;
        let style_finding_heading = Style::new().bright().white().force_styling(styles_enabled);
        let style_heading = Style::new().bold().force_styling(styles_enabled);
        let style_rule = Style::new().bright().bold().blue().force_styling(styles_enabled);
        let style_metadata = Style::new().bright().blue().force_styling(styles_enabled);
        let style_high_confidence =
            Style::new().bold().bright().yellow().force_styling(styles_enabled);
        Self {
            style_finding_heading,
            style_heading,
            style_rule,
            style_metadata,
            style_high_confidence,
        }
    }
}
