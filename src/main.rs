use anyhow::Result;
use bpkg::application::{InstallOutcome, InstallUseCase, ListUseCase, UninstallUseCase};
use bpkg::config::{Config, Options};
use bpkg::runtime::RealRuntime;
use clap::Parser;
use std::path::PathBuf;

/// bpkg - manifest-driven package installer
///
/// Installs packages published as GitHub release tags. Each package ships a
/// package.json declaring the files to install and the scripts to link into
/// the shared bin directory.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
///
/// Examples:
///   bpkg install acme/cli:v1.2.3
///   bpkg install acme/cli:latest
///   bpkg uninstall acme/cli
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (default ./deps; also via BPKG_ROOT)
    #[arg(long = "root", short = 'r', value_name = "PATH", global = true)]
    pub install_root: Option<PathBuf>,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Base URL of release source archives (defaults to https://github.com)
    #[arg(long = "archive-url", value_name = "URL", global = true)]
    pub archive_url: Option<String>,

    /// GitHub token (overrides GITHUB_TOKEN)
    #[arg(long = "token", value_name = "TOKEN", global = true)]
    pub token: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a package release
    Install(InstallArgs),

    /// Remove an installed package
    Uninstall(UninstallArgs),

    /// List installed packages
    List,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// The package as organization/name:version (version may be "latest")
    #[arg(value_name = "PACKAGE")]
    pub package: String,

    /// Manifest JSON used instead of the package.json shipped in the release
    #[arg(long = "manifest-json", value_name = "JSON")]
    pub manifest_json: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    /// The package as organization/name[:version]
    #[arg(value_name = "PACKAGE")]
    pub package: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = Config::new(
        RealRuntime,
        Options {
            root: cli.install_root,
            api_url: cli.api_url,
            archive_url: cli.archive_url,
            token: cli.token,
        },
    )?;
    let runtime = config.runtime.as_ref();

    match cli.command {
        Commands::Install(args) => {
            let use_case = InstallUseCase::new(
                runtime,
                &config.provider,
                &config.provider,
                &config.extractor,
                &config.root,
                &config.manifest_file_name,
            );
            match use_case
                .install(&args.package, args.manifest_json.as_deref())
                .await?
            {
                InstallOutcome::Installed { release, manifest } => {
                    println!("Installed {} as {}", release, manifest.name())
                }
                InstallOutcome::AlreadyInstalled(release) => {
                    println!("{} is already installed", release)
                }
            }
        }
        Commands::Uninstall(args) => {
            let release = UninstallUseCase::new(runtime, &config.root, &config.manifest_file_name)
                .uninstall(&args.package)?;
            println!("Uninstalled {}", release);
        }
        Commands::List => {
            for manifest in ListUseCase::new(runtime, &config.root).list()? {
                if manifest.version().is_empty() {
                    println!("{}", manifest.name());
                } else {
                    println!("{} {}", manifest.name(), manifest.version());
                }
            }
        }
    }
    Ok(())
}
