//! `pantry` - manage the pantry inventory from a terminal

mod render;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use pantry_core::prelude::*;
use pantry_core::{Affordance, MediaStream};
use pantry_firebase::FirebaseBackend;
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "pantry=info,pantry_core=info,pantry_firebase=info";

/// Terminals have no camera; capture intents fail with a device error.
struct NoCamera;

#[async_trait]
impl CameraDevice for NoCamera {
    async fn open_stream(&self) -> Result<Box<dyn MediaStream>, PantryError> {
        Err(PantryError::DeviceAccess("no camera on this terminal".to_string()))
    }
}

fn cli() -> Command {
    let name_arg = Arg::new("name").required(true).help("Item name");

    Command::new("pantry")
        .version(pantry_core::VERSION)
        .about("Track what is in the pantry")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file; PANTRY_* variables override it"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("list")
                .about("Show the inventory")
                .arg(
                    Arg::new("search")
                        .long("search")
                        .help("Case-insensitive match on name or category"),
                )
                .arg(
                    Arg::new("category")
                        .long("category")
                        .conflicts_with("search")
                        .value_parser(|s: &str| s.parse::<Category>())
                        .help("Quick filter: Produce, Meat & Poultry, Condiments, Pharma"),
                ),
        )
        .subcommand(
            Command::new("add")
                .about("Add an item, or add to an existing item's quantity")
                .arg(name_arg.clone())
                .arg(Arg::new("quantity").required(true).help("Quantity to add"))
                .arg(
                    Arg::new("unit")
                        .long("unit")
                        .value_parser(|s: &str| s.parse::<Unit>())
                        .help("kilograms, pounds, liters or dozen"),
                )
                .arg(Arg::new("expiry").long("expiry").help("Expiry date, YYYY-MM-DD"))
                .arg(
                    Arg::new("category")
                        .long("category")
                        .value_parser(|s: &str| s.parse::<Category>()),
                )
                .arg(
                    Arg::new("image")
                        .long("image")
                        .value_parser(value_parser!(PathBuf))
                        .help("Image file to attach"),
                ),
        )
        .subcommand(
            Command::new("inc")
                .about("Add one to an item's quantity")
                .arg(name_arg.clone()),
        )
        .subcommand(
            Command::new("dec")
                .about("Remove one from an item's quantity; deletes at zero")
                .arg(name_arg.clone()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete an item")
                .arg(name_arg)
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Skip the confirmation prompt"),
                ),
        )
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"));

    match run(&matches).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let config_path = matches.get_one::<PathBuf>("config");
    let config = PantryConfig::load(config_path.map(PathBuf::as_path))
        .context("loading configuration")?;
    config.validate().context("checking configuration")?;

    let backend = FirebaseBackend::connect(&config).context("connecting to firebase")?;

    let affordance = Arc::new(Affordance::new());
    let on_interrupt = Arc::clone(&affordance);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling remote calls");
            on_interrupt.cancel();
        }
    });

    let mut app = PantryApp::from_config(
        &config,
        backend.documents,
        backend.blobs,
        NoCamera,
        affordance.token(),
    );

    match matches.subcommand() {
        Some(("list", args)) => {
            app.dispatch(Intent::Refresh).await?;
            if let Some(term) = args.get_one::<String>("search") {
                app.dispatch(Intent::SetSearch(term.clone())).await?;
            }
            if let Some(category) = args.get_one::<Category>("category") {
                app.dispatch(Intent::QuickFilter(*category)).await?;
            }
            let today = chrono::Local::now().date_naive();
            let color = std::io::stdout().is_terminal();
            print!(
                "{}",
                render::inventory_table(&app.state().visible_items(), today, color)
            );
        }
        Some(("add", args)) => {
            fill_add_form(&mut app, args).await?;
            let outcome = app.submit().await?;
            println!("{}", render::submit_summary(&outcome));
        }
        Some(("inc", args)) => {
            app.dispatch(Intent::Increment(item_name(args)?)).await?;
            report_quantity(&app, args);
        }
        Some(("dec", args)) => {
            app.dispatch(Intent::Decrement(item_name(args)?)).await?;
            report_quantity(&app, args);
        }
        Some(("delete", args)) => {
            let name = item_name(args)?;
            app.dispatch(Intent::RequestDelete(name.clone())).await?;
            if !args.get_flag("yes") && !confirm(&format!("Delete {name}?"))? {
                app.dispatch(Intent::CancelDelete).await?;
                println!("Kept {name}.");
                return Ok(ExitCode::SUCCESS);
            }
            app.dispatch(Intent::ConfirmDelete).await?;
            println!("Deleted {name}.");
        }
        Some((other, _)) => bail!("unknown command: {other}"),
        None => bail!("no command given"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn fill_add_form(app: &mut PantryApp<NoCamera>, args: &ArgMatches) -> anyhow::Result<()> {
    let text = |id: &str| args.get_one::<String>(id).cloned().unwrap_or_default();

    app.dispatch(Intent::OpenAddForm).await?;
    app.dispatch(Intent::EditForm(FormEdit::Name(text("name")))).await?;
    app.dispatch(Intent::EditForm(FormEdit::Quantity(text("quantity"))))
        .await?;
    if let Some(unit) = args.get_one::<Unit>("unit") {
        app.dispatch(Intent::EditForm(FormEdit::Unit(*unit))).await?;
    }
    app.dispatch(Intent::EditForm(FormEdit::ExpiryDate(text("expiry"))))
        .await?;
    app.dispatch(Intent::EditForm(FormEdit::Category(
        args.get_one::<Category>("category").copied(),
    )))
    .await?;
    if let Some(path) = args.get_one::<PathBuf>("image") {
        let blob = ImageBlob::from_path(path)?;
        app.dispatch(Intent::AttachFile(blob)).await?;
    }
    Ok(())
}

fn item_name(args: &ArgMatches) -> anyhow::Result<ItemName> {
    let raw = args
        .get_one::<String>("name")
        .map(String::as_str)
        .unwrap_or_default();
    Ok(ItemName::parse(raw)?)
}

fn report_quantity(app: &PantryApp<NoCamera>, args: &ArgMatches) {
    let Some(raw) = args.get_one::<String>("name") else {
        return;
    };
    let wanted = raw.trim();
    match app
        .state()
        .inventory
        .iter()
        .find(|i| i.name.as_str() == wanted)
    {
        Some(item) => println!("{}: {} {}", item.name, item.quantity, item.unit),
        None => println!("{wanted}: not in the pantry"),
    }
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt} [y/N] ")?;
    stdout.flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn add_parses_typed_options() {
        let matches = cli()
            .try_get_matches_from([
                "pantry", "add", "Steak", "2", "--unit", "Pounds", "--category", "meat-and-poultry",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_one::<Unit>("unit"), Some(&Unit::Pounds));
        assert_eq!(
            args.get_one::<Category>("category"),
            Some(&Category::MeatAndPoultry)
        );
    }

    #[test]
    fn unknown_unit_is_rejected() {
        assert!(cli()
            .try_get_matches_from(["pantry", "add", "Milk", "1", "--unit", "gallons"])
            .is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["pantry", "list", "--log-json", "--config", "pantry.toml"])
            .unwrap();
        assert!(matches.get_flag("log-json"));
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("pantry.toml"))
        );
    }

    #[tokio::test]
    async fn no_camera_reports_device_error() {
        let err = NoCamera.open_stream().await.err().unwrap();
        assert!(matches!(err, PantryError::DeviceAccess(_)));
    }
}
