use clap::Parser;
use isohash::cli::harvest_cmd::{self, EXIT_FAILURE};
use std::path::PathBuf;
use std::process::ExitCode;

/// Extract Windows 11 ISO hashes from the official download page.
#[derive(Debug, Parser)]
#[command(name = "isohash", version, about, long_about = None)]
struct Cli {
    /// Language to find the hash for (e.g. 'english', 'french').
    lang: Option<String>,

    /// Print a single JSON document instead of progress lines.
    #[arg(long)]
    json: bool,

    /// Only print lookup results.
    #[arg(long, short)]
    quiet: bool,

    /// Show extra detail and debug logs.
    #[arg(long, short)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Replay a saved copy of the download page instead of launching a browser.
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Flags are read back through the environment by cli::output and config.
    if cli.json {
        std::env::set_var("ISOHASH_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("ISOHASH_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("ISOHASH_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("ISOHASH_NO_COLOR", "1");
    }
    if cli.headed {
        std::env::set_var("ISOHASH_HEADED", "1");
    }

    if let Err(e) = isohash::logging::init(cli.verbose, cli.quiet || cli.json) {
        eprintln!("  warning: logging disabled: {e:#}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("  error: failed to start async runtime: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let code = runtime.block_on(harvest_cmd::run(cli.lang.as_deref(), cli.snapshot.as_deref()));
    ExitCode::from(code)
}
