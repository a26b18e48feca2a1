//! Shared CLI output formatting with colors, symbols, and structured display.

use std::io::IsTerminal;

/// Check if color output is enabled.
pub fn color_enabled() -> bool {
    // Respect NO_COLOR env (https://no-color.org/)
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    // Respect --no-color flag via our global flag
    if std::env::var("ISOHASH_NO_COLOR").is_ok() {
        return false;
    }
    // Progress and status lines go to stderr
    std::io::stderr().is_terminal()
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Colored string builder.
pub struct Styled {
    use_color: bool,
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

impl Styled {
    pub fn new() -> Self {
        Self {
            use_color: color_enabled(),
        }
    }

    /// Builder that never emits escape codes.
    pub fn plain() -> Self {
        Self { use_color: false }
    }

    /// Green checkmark symbol.
    pub fn ok_sym(&self) -> &str {
        if self.use_color {
            "\x1b[32m\u{2713}\x1b[0m"
        } else {
            "OK"
        }
    }

    /// Red X symbol.
    pub fn fail_sym(&self) -> &str {
        if self.use_color {
            "\x1b[31m\u{2717}\x1b[0m"
        } else {
            "!!"
        }
    }

    /// Yellow warning symbol.
    pub fn warn_sym(&self) -> &str {
        if self.use_color {
            "\x1b[33m\u{26a0}\x1b[0m"
        } else {
            "??"
        }
    }

    /// Blue circle (info/neutral) symbol.
    pub fn info_sym(&self) -> &str {
        if self.use_color {
            "\x1b[34m\u{25cb}\x1b[0m"
        } else {
            "--"
        }
    }

    fn paint(&self, code: &str, s: &str) -> String {
        if self.use_color {
            format!("{code}{s}{RESET}")
        } else {
            s.to_string()
        }
    }

    pub fn green(&self, s: &str) -> String {
        self.paint(GREEN, s)
    }

    pub fn red(&self, s: &str) -> String {
        self.paint(RED, s)
    }

    pub fn yellow(&self, s: &str) -> String {
        self.paint(YELLOW, s)
    }

    pub fn cyan(&self, s: &str) -> String {
        self.paint(CYAN, s)
    }

    pub fn dim(&self, s: &str) -> String {
        self.paint(DIM, s)
    }

    pub fn bold(&self, s: &str) -> String {
        self.paint(BOLD, s)
    }
}

/// Print a branded header for CLI output.
pub fn print_header(s: &Styled) {
    eprintln!(
        "  {} {}",
        s.bold("isohash"),
        s.dim(&format!("v{}", env!("CARGO_PKG_VERSION")))
    );
    eprintln!();
}

/// Print a progress or result line with a leading symbol.
pub fn print_step(symbol: &str, msg: &str) {
    eprintln!("  {symbol} {msg}");
}

/// Print an indented detail line under a step.
pub fn print_detail(msg: &str) {
    eprintln!("      {msg}");
}

/// Print a status summary line at the bottom.
pub fn print_status(s: &Styled, status: &str, msg: &str) {
    eprintln!();
    eprintln!("  {}: {status} ({msg})", s.bold("Status"));
}

/// Horizontal rule separating lookup results.
pub fn rule(s: &Styled) -> String {
    s.dim(&format!("  {}", "-".repeat(74)))
}

/// Check if --quiet mode is active.
pub fn is_quiet() -> bool {
    std::env::var("ISOHASH_QUIET").is_ok()
}

/// Check if --verbose mode is active.
pub fn is_verbose() -> bool {
    std::env::var("ISOHASH_VERBOSE").is_ok()
}

/// Check if --json mode is active.
pub fn is_json() -> bool {
    std::env::var("ISOHASH_JSON").is_ok()
}

/// Print JSON output to stdout and return.
pub fn print_json(value: &serde_json::Value) {
    if let Ok(s) = serde_json::to_string_pretty(value) {
        println!("{s}");
    }
}
