//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Resumable HTTP download manager.
///
/// Streams a URL to disk with live progress; Ctrl-C cancels and removes the
/// partial file.
#[derive(Parser, Debug)]
#[command(name = "downman")]
#[command(author, version, about)]
pub struct Args {
    /// URL to download
    #[arg(required_unless_present = "net_info")]
    pub url: Option<String>,

    /// Save under this filename instead of the server-provided name
    #[arg(short = 'n', long)]
    pub filename: Option<String>,

    /// Directory to save into
    #[arg(short = 'o', long, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Print public network information as JSON and exit
    #[arg(long)]
    pub net_info: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_url_with_defaults() {
        let args = Args::try_parse_from(["downman", "http://example.com/f.bin"]).unwrap();
        assert_eq!(args.url.as_deref(), Some("http://example.com/f.bin"));
        assert_eq!(args.output_dir, PathBuf::from("downloads"));
        assert!(args.filename.is_none());
        assert!(!args.quiet);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_cli_requires_url_unless_net_info() {
        assert!(Args::try_parse_from(["downman"]).is_err());
        let args = Args::try_parse_from(["downman", "--net-info"]).unwrap();
        assert!(args.net_info);
        assert!(args.url.is_none());
    }

    #[test]
    fn test_cli_filename_and_output_dir() {
        let args = Args::try_parse_from([
            "downman",
            "http://example.com/f.bin",
            "-n",
            "renamed.bin",
            "-o",
            "/tmp/dl",
        ])
        .unwrap();
        assert_eq!(args.filename.as_deref(), Some("renamed.bin"));
        assert_eq!(args.output_dir, PathBuf::from("/tmp/dl"));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["downman", "-vv", "http://example.com/f"]).unwrap();
        assert_eq!(args.verbose, 2);
    }
}
