use crate::config::Platform;
use anyhow::Result;
use clap::{Args, Parser};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "commitpulse")]
#[command(about = "Collect and generate commit metrics for GitHub or Gerrit repositories")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[arg(long, value_enum, help = "Platform to read commits from")]
    pub platform: Platform,

    #[arg(long, help = "Start date in YYYY-MM-DD format (inclusive)")]
    pub start_date: String,

    #[arg(long, help = "End date in YYYY-MM-DD format (exclusive)")]
    pub end_date: String,

    #[arg(long, default_value = "metrics_output.csv", help = "Output CSV file name")]
    pub output_file: PathBuf,

    #[arg(long, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Contributor to affiliation JSON mapping (overrides config)")]
    pub affiliations: Option<PathBuf>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, help = "GitHub access token")]
    pub github_token: Option<String>,

    #[arg(long, help = "Also print the report as JSON on stdout")]
    pub json: bool,

    #[arg(long, short, help = "Suppress the progress bar and summary table")]
    pub quiet: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        crate::pipeline::exec(self.run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn output_file_defaults() {
        let cli = Cli::try_parse_from([
            "commitpulse",
            "--platform",
            "gerrit",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-06-30",
        ])
        .unwrap();
        assert_eq!(cli.run.platform, Platform::Gerrit);
        assert_eq!(cli.run.output_file, PathBuf::from("metrics_output.csv"));
        assert!(!cli.run.json);
    }

    #[test]
    fn platform_is_restricted() {
        assert!(Cli::try_parse_from([
            "commitpulse",
            "--platform",
            "gitlab",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-06-30",
        ])
        .is_err());
    }

    #[test]
    fn dates_are_required() {
        assert!(Cli::try_parse_from(["commitpulse", "--platform", "github"]).is_err());
    }
}
