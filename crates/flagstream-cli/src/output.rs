//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use flagstream_core::{AllFlags, FeatureFlag};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print every flag, sorted by key
    pub fn print_flags(&self, flags: &AllFlags) {
        let sorted = sorted_by_key(flags);

        match self.format {
            OutputFormat::Human => {
                if sorted.is_empty() {
                    println!("No flags.");
                    return;
                }
                println!("{:<40} {:>8}", "KEY", "VERSION");
                for (key, flag) in sorted {
                    println!("{:<40} {:>8}", truncate(key, 40), flag.version);
                }
            }
            OutputFormat::Json => match serde_json::to_string_pretty(flags) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize flags: {}", e),
            },
            OutputFormat::Quiet => {
                for (key, _) in sorted {
                    println!("{}", key);
                }
            }
        }
    }

    /// Print a status message (suppressed in quiet and JSON modes)
    pub fn message(&self, msg: &str) {
        if self.format == OutputFormat::Human {
            println!("{}", msg);
        }
    }

    /// Print a success message
    pub fn success(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", msg),
            OutputFormat::Json => println!("{}", serde_json::json!({ "status": "ok", "message": msg })),
            OutputFormat::Quiet => {}
        }
    }
}

/// Flags paired with the key they are stored under, in key order
fn sorted_by_key(flags: &AllFlags) -> Vec<(&str, &FeatureFlag)> {
    let mut sorted: Vec<(&str, &FeatureFlag)> =
        flags.iter().map(|(k, f)| (k.as_str(), f)).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
