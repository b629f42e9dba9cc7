use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable one-line summary.
    Human,
    /// JSON output for scripting.
    Json,
}

impl OutputFormat {
    /// Print `human` as-is in [`Self::Human`] mode, or `json` (already
    /// serialized) in [`Self::Json`] mode.
    pub fn print(self, human: &str, json: &serde_json::Value) {
        match self {
            Self::Human => println!("{human}"),
            Self::Json => println!("{json:#}"),
        }
    }
}
