//! rsc-harvest command-line entry point.

mod doctor;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use rsc_harvest::{
    ChromiumLauncher, Credentials, HarvestConfig, HarvestError, Harvester, OutputBundle,
};

#[derive(Parser)]
#[command(
    name = "rsc-harvest",
    about = "Harvest full text, figures and supplementary files of RSC journal articles",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest one or more articles, one browser session each.
    ///
    /// Examples:
    ///   rsc-harvest fetch 10.1039/c9sc01234a
    ///   rsc-harvest fetch 10.1039/c9sc01234a 10.1039/d0dt00001a --json
    Fetch {
        /// Article identifiers (DOIs).
        #[arg(required = true)]
        identifiers: Vec<String>,

        /// Root directory for per-article output.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Portal account name.
        #[arg(long, env = "RSC_USERNAME")]
        username: Option<String>,

        /// Portal account password.
        #[arg(long, env = "RSC_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Show the browser window.
        #[arg(long)]
        headed: bool,

        /// Chromium/Chrome executable.
        #[arg(long)]
        chrome: Option<PathBuf>,

        /// Print one JSON bundle per article instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Check that a browser and the output root are usable.
    Doctor {
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   rsc-harvest completions bash > ~/.local/share/bash-completion/completions/rsc-harvest
    ///   rsc-harvest completions zsh > ~/.zfunc/_rsc-harvest
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

struct FetchArgs {
    identifiers: Vec<String>,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    headed: bool,
    chrome: Option<PathBuf>,
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch {
            identifiers,
            output_dir,
            config,
            username,
            password,
            headed,
            chrome,
            json,
        } => {
            let code = fetch(FetchArgs {
                identifiers,
                output_dir,
                config,
                username,
                password,
                headed,
                chrome,
                json,
            })
            .await?;
            if code != 0 {
                std::process::exit(code);
            }
        }

        Commands::Doctor { config } => {
            doctor::run(config.as_deref())?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "rsc-harvest", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Harvest every identifier in order. Returns the process exit code: `0`
/// when all succeeded, otherwise the code of the first failure.
async fn fetch(args: FetchArgs) -> anyhow::Result<i32> {
    let mut config = match HarvestConfig::resolve(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return Ok(e.exit_code());
        }
    };
    if let Some(dir) = args.output_dir {
        config.output_root = dir;
    }
    if args.headed {
        config.headless = false;
    }
    if args.chrome.is_some() {
        config.chrome_executable = args.chrome;
    }

    let credentials = match (args.username, args.password) {
        (Some(user), Some(pass)) => Some(Credentials::new(user, pass)),
        (None, None) => None,
        _ => {
            let err = HarvestError::Credential(
                "--username and --password must be given together".into(),
            );
            eprintln!("{err}");
            return Ok(err.exit_code());
        }
    };

    tracing::info!("Output root: {}", config.output_root.display());
    if credentials.is_some() {
        tracing::info!("Credentials: supplied");
    }
    let harvester = Harvester::new(config, ChromiumLauncher::new());

    let total = args.identifiers.len();
    let mut exit_code = 0;
    for (n, identifier) in args.identifiers.iter().enumerate() {
        tracing::info!("Article {}/{total}: {identifier}", n + 1);
        match harvester.run(identifier, credentials.as_ref()).await {
            Ok(bundle) => {
                if args.json {
                    println!("{}", serde_json::to_string(&bundle)?);
                } else {
                    print_summary(&bundle);
                }
            }
            Err(e) => {
                eprintln!("{identifier}: {e}");
                if n + 1 < total {
                    tracing::warn!("Continuing with the remaining identifiers");
                }
                if exit_code == 0 {
                    exit_code = e.exit_code();
                }
            }
        }
    }
    Ok(exit_code)
}

fn print_summary(bundle: &OutputBundle) {
    let status = if bundle.is_partial() { "PARTIAL" } else { "OK" };
    println!("[{status}] {} -> {}", bundle.identifier, bundle.base_path.display());
    println!("  Figures:       {}", bundle.figure_paths.len());
    println!("  Supplementary: {}", bundle.supplementary.len());
    for warning in &bundle.warnings {
        println!("  Warning: {warning}");
    }
}
