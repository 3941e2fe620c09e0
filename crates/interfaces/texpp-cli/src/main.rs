use std::path::PathBuf;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use texpp_cli::{commands, CliEnv, InstallArgs, SettingsOverrides};
use texpp_pipeline::AccessTokens;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about = "Installs and repairs Texture++ texture packs")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Directory holding settings.json instead of the platform config dir
    #[arg(long, global = true, env = "TEXPP_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Talk to this hub for both primary and mirror traffic
    #[arg(long, global = true, env = "TEXPP_ENDPOINT", hide = true)]
    endpoint: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct SelectionArgs {
    #[arg(long)]
    mods_folder: Option<Utf8PathBuf>,
    #[arg(long)]
    variant: Option<String>,
    #[arg(long, overrides_with = "no_mirror")]
    mirror: bool,
    #[arg(long, overrides_with = "mirror")]
    no_mirror: bool,
    #[arg(short, long)]
    threads: Option<usize>,
}

impl From<SelectionArgs> for SettingsOverrides {
    fn from(a: SelectionArgs) -> Self {
        let use_mirror = match (a.mirror, a.no_mirror) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        SettingsOverrides {
            mods_folder: a.mods_folder,
            variant: a.variant,
            use_mirror,
            threads: a.threads,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the installable variants
    Variants,
    /// Show the expected download time for a variant
    Estimate {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, value_delimiter = ',')]
        folders: Vec<String>,
        #[arg(long, help = "Use this bandwidth instead of measuring it")]
        mbps: Option<f64>,
    },
    /// Download a variant and remove textures nothing references
    Install {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, value_delimiter = ',', help = "Folders for the Custom variant")]
        folders: Vec<String>,
        #[arg(long, env = "TEXPP_REPO_TOKEN", hide_env_values = true)]
        repo_token: Option<String>,
        #[arg(long, env = "TEXPP_LOG_TOKEN", hide_env_values = true)]
        log_token: Option<String>,
        #[arg(long)]
        limit_mb: Option<u64>,
        #[arg(long)]
        skip_speed_test: bool,
    },
    #[command(name = "speed-test")]
    SpeedTest {
        #[arg(long)]
        mirror: bool,
    },
    /// Check whether the mirror should be used
    #[command(name = "mirror-check")]
    MirrorCheck,
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    Set {
        #[command(flatten)]
        selection: SelectionArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("default subscriber");

    let env = CliEnv::new(cli.endpoint, cli.config_dir)?;

    match cli.command {
        Commands::Variants => commands::cmd_variants(),
        Commands::Estimate {
            selection,
            folders,
            mbps,
        } => {
            commands::cmd_estimate(&env, selection.into(), folders, mbps).await?;
        }
        Commands::Install {
            selection,
            folders,
            repo_token,
            log_token,
            limit_mb,
            skip_speed_test,
        } => {
            let args = InstallArgs {
                overrides: selection.into(),
                folders,
                tokens: AccessTokens {
                    content: repo_token,
                    logs: log_token,
                },
                limit_mb,
                skip_speed_test,
            };
            commands::cmd_install(&env, args).await?;
        }
        Commands::SpeedTest { mirror } => {
            commands::cmd_speed_test(&env, mirror).await?;
        }
        Commands::MirrorCheck => {
            commands::cmd_mirror_check(&env).await?;
        }
        Commands::Settings { command } => match command {
            SettingsCommands::Show => {
                commands::cmd_settings_show(&env)?;
            }
            SettingsCommands::Set { selection } => {
                commands::cmd_settings_set(&env, selection.into())?;
            }
        },
    }

    Ok(())
}
