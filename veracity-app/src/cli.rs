use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use veracity_check::ANONYMOUS_USER;

pub const DEFAULT_CONFIG_FILE: &str = "veracity.yaml";

#[derive(Parser, Debug)]
#[command(name = "veracity", version, about = "Multi-modal fact-check CLI")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "VERACITY_CONFIG",
        default_value = DEFAULT_CONFIG_FILE,
        help = "YAML config file; missing files are ignored"
    )]
    pub config: PathBuf,
    #[arg(long, global = true, help = "Print compact instead of pretty JSON")]
    pub compact: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyse text, an image or an audio clip and print the report.
    Check(CheckArgs),
    /// List a user's past reports, newest first. Reports live in
    /// `store.database_url`, `sqlite://veracity.db` by default.
    History {
        #[arg(long, default_value = ANONYMOUS_USER)]
        user: String,
    },
    /// Print one stored report.
    Show { id: String },
    /// Score the reliability of one or more source URLs.
    Sources {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, default_value = "medium")]
        expertise: String,
        #[arg(long, help = "Also suggest up to N trusted sources")]
        suggest: Option<usize>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct CheckArgs {
    #[arg(long, group = "content")]
    pub text: Option<String>,
    #[arg(long, group = "content")]
    pub image: Option<PathBuf>,
    #[arg(long, requires = "image", help = "Use this text instead of running OCR")]
    pub ocr_text: Option<PathBuf>,
    #[arg(long, group = "content", help = "WAV file")]
    pub audio: Option<PathBuf>,
    #[arg(long, requires = "audio", help = "Use this transcript instead of running ASR")]
    pub transcript: Option<PathBuf>,
    #[arg(long, group = "content", help = "Not supported from the command line")]
    pub video: Option<PathBuf>,
    #[arg(long, default_value = "medium")]
    pub expertise: String,
    #[arg(long, default_value = "standard")]
    pub length: String,
    #[arg(long, default_value = "cs")]
    pub language: String,
    #[arg(long, default_value = ANONYMOUS_USER)]
    pub user: String,
    #[arg(long, help = "Special category: misleading, insufficient_evidence, unverifiable or satire")]
    pub signal: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_with_settings() {
        let cli = Cli::try_parse_from([
            "veracity",
            "check",
            "--text",
            "Praha je hlavní město.",
            "--expertise",
            "expert",
            "--length",
            "brief",
            "--user",
            "alice",
        ])
        .unwrap();
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.text.as_deref(), Some("Praha je hlavní město."));
        assert_eq!(args.expertise, "expert");
        assert_eq!(args.length, "brief");
        assert_eq!(args.language, "cs");
        assert_eq!(args.user, "alice");
    }

    #[test]
    fn content_flags_are_exclusive() {
        assert!(
            Cli::try_parse_from(["veracity", "check", "--text", "a", "--audio", "b.wav"]).is_err()
        );
        assert!(Cli::try_parse_from(["veracity", "check", "--ocr-text", "x.txt"]).is_err());
    }

    #[test]
    fn sources_needs_a_url() {
        assert!(Cli::try_parse_from(["veracity", "sources"]).is_err());
        let cli =
            Cli::try_parse_from(["veracity", "sources", "https://www.czso.cz/", "--suggest", "3"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sources { ref urls, suggest: Some(3), .. } if urls.len() == 1
        ));
    }
}
