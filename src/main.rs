use altpy::builder::BuildOptions;
use altpy::commands::{self, Config, InstallRequest, Settings};
use altpy::orchestrator::InstallOptions;
use altpy::runtime::{RealRuntime, Runtime};
use altpy::Result;
use clap::Parser;
use std::path::PathBuf;

/// altpy - install several Python versions side by side
///
/// Builds CPython from the official source releases into a private root and
/// exposes each version as `altpy-python<version>`, without touching the
/// system `python` or `python3`.
///
/// Examples:
///   altpy install 3.8.2      # Build and link Python 3.8.2
///   altpy-python3.8.2 -V     # Run it
///   altpy remove 3.8.2       # Remove it again
#[derive(Parser, Debug)]
#[command(author, version = env!("ALTPY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory for installs (defaults to ~/.altpy; also via ALTPY_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "ALTPY_ROOT",
        value_name = "PATH",
        global = true
    )]
    root: Option<PathBuf>,

    /// Directory that receives the altpy-python<version> links (defaults to <root>/bin)
    #[arg(long = "bin-dir", env = "ALTPY_BIN_DIR", value_name = "PATH", global = true)]
    bin_dir: Option<PathBuf>,

    /// Base URL of the source release index (defaults to https://www.python.org/ftp/python)
    #[arg(
        long = "source-url",
        env = "ALTPY_SOURCE_URL",
        value_name = "URL",
        global = true
    )]
    source_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Download, build and link a Python version
    Install(InstallArgs),

    /// Remove an installed Python version and its link
    #[command(alias = "uninstall")]
    Remove(RemoveArgs),

    /// Remove every installed Python version
    Clean(CleanArgs),

    /// List installed Python versions
    #[command(alias = "ls")]
    List(ListArgs),

    /// List Python versions available upstream
    Available,
}

#[derive(clap::Args, Debug)]
struct InstallArgs {
    /// Exact version, e.g. 3.8.2
    #[arg(value_name = "VERSION")]
    version: String,

    /// Rebuild the version even if it is already installed
    #[arg(long)]
    reinstall: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Parallel make jobs (defaults to the number of CPUs)
    #[arg(short = 'j', long, value_name = "N")]
    jobs: Option<usize>,

    /// Skip --enable-optimizations for a faster, slower-running build
    #[arg(long)]
    no_optimizations: bool,

    /// Extra argument for ./configure (repeatable)
    #[arg(long = "configure-arg", value_name = "ARG", allow_hyphen_values = true)]
    configure_args: Vec<String>,

    /// Show configure and make output while building
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct RemoveArgs {
    /// Exact version, e.g. 3.8.2
    #[arg(value_name = "VERSION")]
    version: String,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(clap::Args, Debug)]
struct CleanArgs {
    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    /// Also show failed installs
    #[arg(short = 'a', long)]
    all: bool,
}

impl InstallArgs {
    fn into_request<R: Runtime>(self, runtime: &R) -> InstallRequest {
        InstallRequest {
            version: self.version,
            options: InstallOptions {
                reinstall: self.reinstall,
                build: BuildOptions {
                    jobs: self.jobs.unwrap_or_else(|| runtime.available_parallelism()),
                    optimizations: !self.no_optimizations,
                    configure_args: self.configure_args,
                    verbose: self.verbose,
                },
            },
            yes: self.yes,
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let runtime = RealRuntime;
    let settings = Settings {
        root: cli.root,
        bin_dir: cli.bin_dir,
        source_url: cli.source_url,
    };

    match cli.command {
        Commands::Install(args) => {
            let request = args.into_request(&runtime);
            let config = Config::new(runtime, settings)?;
            commands::install(&config, request).await
        }
        Commands::Remove(args) => {
            let config = Config::new(runtime, settings)?;
            commands::remove(&config, &args.version, args.yes)
        }
        Commands::Clean(args) => {
            let config = Config::new(runtime, settings)?;
            commands::clean(&config, args.yes)
        }
        Commands::List(args) => {
            let config = Config::new(runtime, settings)?;
            commands::list(&config, args.all)
        }
        Commands::Available => {
            let config = Config::new(runtime, settings)?;
            commands::available(&config).await
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        let kind = e.kind();
        eprintln!("error[{}]: {}", kind, e);
        if let Some(output) = e.diagnostics() {
            eprintln!("{}", output);
        }
        std::process::exit(kind.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(["altpy", "install", "3.8.2"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.version, "3.8.2");
                assert!(!args.reinstall);
                assert!(!args.yes);
                assert_eq!(args.jobs, None);
            }
            _ => panic!("Expected Install command"),
        }
        assert_eq!(cli.root, None);
    }

    #[test]
    fn test_cli_install_build_flags() {
        let cli = Cli::try_parse_from([
            "altpy",
            "install",
            "3.9.1",
            "--reinstall",
            "-y",
            "-j",
            "4",
            "--no-optimizations",
            "--configure-arg",
            "--with-lto",
            "--configure-arg=--enable-shared",
        ])
        .unwrap();
        let Commands::Install(args) = cli.command else {
            panic!("Expected Install command");
        };

        let request = args.into_request(&RealRuntime);

        assert_eq!(request.version, "3.9.1");
        assert!(request.yes);
        assert!(request.options.reinstall);
        assert_eq!(request.options.build.jobs, 4);
        assert!(!request.options.build.optimizations);
        assert_eq!(
            request.options.build.configure_args,
            vec!["--with-lto", "--enable-shared"]
        );
    }

    #[test]
    fn test_cli_jobs_default_to_cpu_count() {
        let cli = Cli::try_parse_from(["altpy", "install", "3.8.2"]).unwrap();
        let Commands::Install(args) = cli.command else {
            panic!("Expected Install command");
        };
        let request = args.into_request(&RealRuntime);

        assert_eq!(
            request.options.build.jobs,
            RealRuntime.available_parallelism()
        );
        assert!(request.options.build.optimizations);
    }

    #[test]
    fn test_cli_global_root_parsing() {
        let cli = Cli::try_parse_from(["altpy", "--root", "/tmp/py", "list", "--all"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/py")));
        match cli.command {
            Commands::List(args) => assert!(args.all),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_remove_and_clean_parsing() {
        let cli = Cli::try_parse_from(["altpy", "remove", "3.8.2", "-y"]).unwrap();
        match cli.command {
            Commands::Remove(args) => {
                assert_eq!(args.version, "3.8.2");
                assert!(args.yes);
            }
            _ => panic!("Expected Remove command"),
        }

        let cli = Cli::try_parse_from(["altpy", "clean"]).unwrap();
        assert!(matches!(cli.command, Commands::Clean(CleanArgs { yes: false })));
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["altpy", "3.8.2"]).is_err());
    }
}
