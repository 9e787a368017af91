use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tmx_cli::{init_tracing, App, CliConfig, DEFAULT_CONFIG_FILE, VERSION};
use tmx_content::Interface;
use tmx_core::{MigrationId, MigrationStatus};

fn cli() -> Command {
    let interface = || {
        Arg::new("interface")
            .required(true)
            .value_parser(value_parser!(Interface))
            .help("Client interface: mobile, web_financer or web_beneficiary")
    };

    Command::new("tmx")
        .version(VERSION)
        .about("Apply and roll back translation migrations")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .default_value(DEFAULT_CONFIG_FILE)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file; defaults apply when it does not exist"),
        )
        .subcommand(
            Command::new("apply")
                .about("Make migrations the live content of their interface")
                .arg(
                    Arg::new("ids")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(MigrationId))
                        .help("Migration ids; several ids are applied as one batch"),
                )
                .arg(
                    Arg::new("no-backup")
                        .long("no-backup")
                        .action(ArgAction::SetTrue)
                        .help("Skip the pre-apply snapshot (rollback becomes impossible)"),
                )
                .arg(
                    Arg::new("skip-checksum")
                        .long("skip-checksum")
                        .action(ArgAction::SetTrue)
                        .help("Do not re-verify the payload checksum"),
                ),
        )
        .subcommand(
            Command::new("rollback")
                .about("Restore the content replaced by an applied migration")
                .arg(
                    Arg::new("id")
                        .required(true)
                        .value_parser(value_parser!(MigrationId)),
                )
                .arg(
                    Arg::new("reason")
                        .long("reason")
                        .required(true)
                        .help("Why the migration is rolled back (10-500 characters)"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print a migration record as JSON")
                .arg(
                    Arg::new("id")
                        .required(true)
                        .value_parser(value_parser!(MigrationId)),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List migration records")
                .arg(
                    Arg::new("interface")
                        .long("interface")
                        .value_parser(value_parser!(Interface)),
                )
                .arg(
                    Arg::new("status")
                        .long("status")
                        .value_parser(value_parser!(MigrationStatus)),
                ),
        )
        .subcommand(
            Command::new("track")
                .about("Start tracking a migration file already in the store")
                .arg(interface())
                .arg(Arg::new("filename").required(true))
                .arg(
                    Arg::new("version")
                        .long("version")
                        .help("Version label; read from the file name when omitted"),
                ),
        )
        .subcommand(
            Command::new("backups")
                .about("List backup snapshots of an interface")
                .arg(interface()),
        )
}

async fn run(matches: ArgMatches) -> Result<bool> {
    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = CliConfig::load(&config_path)?;
    init_tracing(&config.log)?;
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    let app = App::open(&config).await?;

    match matches.subcommand() {
        Some(("apply", args)) => {
            let ids: Vec<MigrationId> = args
                .get_many::<MigrationId>("ids")
                .map(|ids| ids.copied().collect())
                .unwrap_or_default();
            app.apply(
                &ids,
                !args.get_flag("no-backup"),
                !args.get_flag("skip-checksum"),
            )
            .await
        }
        Some(("rollback", args)) => {
            let id = required::<MigrationId>(args, "id")?;
            let reason = required::<String>(args, "reason")?;
            app.rollback(id, &reason).await
        }
        Some(("show", args)) => app.show(required::<MigrationId>(args, "id")?).await,
        Some(("list", args)) => {
            app.list(
                args.get_one::<Interface>("interface").copied(),
                args.get_one::<MigrationStatus>("status").copied(),
            )
            .await
        }
        Some(("track", args)) => {
            let interface = required::<Interface>(args, "interface")?;
            let filename = required::<String>(args, "filename")?;
            app.track(
                interface,
                &filename,
                args.get_one::<String>("version").map(String::as_str),
            )
            .await
        }
        Some(("backups", args)) => app.backups(required::<Interface>(args, "interface")?).await,
        Some((other, _)) => anyhow::bail!("unknown command '{other}'"),
        None => anyhow::bail!("no command given"),
    }
}

fn required<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing argument '{name}'"))
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(cli().get_matches()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(error) => {
            tracing::error!(error = %error, "command failed");
            eprintln!("error: {error:#}");
            ExitCode::from(2)
        }
    }
}
