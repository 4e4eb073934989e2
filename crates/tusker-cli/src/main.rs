//! `tusker` — queue Mastodon favourites, boosts, and posts while offline,
//! then send them in order with `sync`.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use tusker_core::accounts::{ACCOUNT_DIRECTORY, AccountRegistry};
use tusker_core::engine::{Reporter, SendEngine};
use tusker_core::options::UserOption;
use tusker_core::queues::{self, QueueKind};
use tusker_net::HttpClient;

#[derive(Parser, Debug)]
#[command(name = "tusker", version)]
#[command(about = "Queue favourites, boosts, and posts for Mastodon accounts; send them later")]
struct Cli {
    /// Account name, or any unambiguous prefix of one.
    #[arg(short, long, default_value = "")]
    account: String,

    /// Max attempts per network call during sync; values below 1 mean 3.
    #[arg(long, default_value_t = 3)]
    retries: i32,

    /// Configuration root (default: $TUSKER_CONFIG_HOME, then the platform
    /// configuration directory).
    #[arg(long)]
    config_home: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new account directory (username@instance.tld).
    New { name: String },
    /// Show or set an account option; `config showall` prints everything.
    Config {
        key: String,
        value: Option<String>,
    },
    /// Add to, remove from, inspect, or clear one of the queues.
    Queue {
        #[arg(value_enum)]
        kind: QueueKindArg,
        #[arg(value_enum)]
        op: QueueOp,
        /// Status ids (trailing `-` means remove) or draft post files.
        items: Vec<String>,
    },
    /// Send one account's queued items.
    Sync,
    /// Send every account's queued items.
    SyncAll,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum QueueKindArg {
    Fav,
    Boost,
    Post,
}

impl From<QueueKindArg> for QueueKind {
    fn from(kind: QueueKindArg) -> Self {
        match kind {
            QueueKindArg::Fav => QueueKind::Fav,
            QueueKindArg::Boost => QueueKind::Boost,
            QueueKindArg::Post => QueueKind::Post,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum QueueOp {
    Add,
    Remove,
    Clear,
    Show,
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = accounts_root(cli.config_home.clone())?;
    let mut registry = AccountRegistry::open(&root)?;
    let mut reporter = CliReporter;

    match cli.cmd {
        Commands::New { name } => {
            registry.add(&name)?;
            println!("created {name}; set access_token and friends with `tusker config`");
        }
        Commands::Config { key, value } => {
            run_config(&mut registry, &cli.account, &key, value)?;
        }
        Commands::Queue { kind, op, items } => {
            run_queue(&mut registry, &cli.account, kind.into(), op, &items)?;
        }
        Commands::Sync => {
            let (name, instance_url, access_token) = {
                let (name, settings) = registry.select(&cli.account)?;
                let instance_url = settings.get(UserOption::InstanceUrl).map(str::to_string);
                let access_token = settings.get(UserOption::AccessToken).map(str::to_string);
                (name, instance_url, access_token)
            };
            let instance_url = instance_url.with_context(|| {
                format!("{name}: instance_url is not set; `tusker config instance_url <url>`")
            })?;
            let access_token = access_token.with_context(|| {
                format!("{name}: access_token is not set; `tusker config access_token <token>`")
            })?;
            let account_dir = registry.account_dir(&name);

            let mut net = HttpClient::new()?;
            let mut engine = SendEngine::new(&mut net);
            engine.retries = cli.retries;
            let done = engine.send(&name, &account_dir, &instance_url, &access_token, &mut reporter)?;
            if !done {
                bail!("{name}: some queued items could not be sent and were kept");
            }
        }
        Commands::SyncAll => {
            let mut net = HttpClient::new()?;
            let mut engine = SendEngine::new(&mut net);
            engine.retries = cli.retries;
            let done = engine.send_all(&registry, &mut reporter)?;
            if !done {
                bail!("not every account finished sending; queued items were kept");
            }
        }
    }

    Ok(())
}

fn run_config(
    registry: &mut AccountRegistry,
    prefix: &str,
    key: &str,
    value: Option<String>,
) -> Result<()> {
    if key == "showall" {
        return show_all(registry, prefix);
    }
    let (name, settings) = registry.select(prefix)?;
    let option = UserOption::from_key(key).with_context(|| format!("for account {name}"))?;
    match value {
        Some(value) => {
            settings
                .set(option, &value)
                .with_context(|| format!("for account {name}"))?;
            settings.save()?;
        }
        None => {
            if option.is_sync() {
                println!("{}", settings.sync_setting(option)?.name());
            } else {
                match settings.get(option) {
                    Some(value) => println!("{value}"),
                    None => println!("[not set]"),
                }
            }
        }
    }
    Ok(())
}

fn show_all(registry: &mut AccountRegistry, prefix: &str) -> Result<()> {
    let (name, settings) = registry.select(prefix)?;
    println!("options for {name}:");
    for option in UserOption::ALL {
        if option.is_sync() {
            println!("{}: {}", option.key(), settings.sync_setting(option)?.name());
        } else {
            match settings.get(option) {
                Some(value) => println!("{}: {value}", option.key()),
                None => println!("{}: [not set]", option.key()),
            }
        }
    }
    let names: Vec<&str> = registry.names().collect();
    println!("accounts registered: {}", names.join(", "));
    Ok(())
}

fn run_queue(
    registry: &mut AccountRegistry,
    prefix: &str,
    kind: QueueKind,
    op: QueueOp,
    items: &[String],
) -> Result<()> {
    let (name, _) = registry.select(prefix)?;
    let account_dir = registry.account_dir(&name);
    match op {
        QueueOp::Add => queues::enqueue(kind, &account_dir, items)?,
        QueueOp::Remove => queues::dequeue(kind, &account_dir, items)?,
        QueueOp::Clear => queues::clear(kind, &account_dir)?,
        QueueOp::Show => {
            for entry in queues::list(kind, &account_dir)? {
                println!("{entry}");
            }
        }
    }
    Ok(())
}

/// The accounts directory under the configuration root.
///
/// The root comes from the `--config-home` flag, the `TUSKER_CONFIG_HOME`
/// environment variable, or the platform configuration directory
/// (XDG-style on Linux), in that order.
fn accounts_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    let base = match flag {
        Some(path) => path,
        None => match env::var_os("TUSKER_CONFIG_HOME") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => dirs::config_dir()
                .context("could not determine the user configuration directory")?,
        },
    };
    Ok(base.join(ACCOUNT_DIRECTORY))
}
