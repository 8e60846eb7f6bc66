mod config;
mod error;

use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand, ValueEnum};
use policy::{Address, CallPath};
use runtime::plugins::{COUNTER_PLUGIN, SINGLE_OWNER_INTERFACE, SUBSCRIPTION_PLUGIN};
use runtime::{
    Account, Call, Clock, CounterPlugin, LoggingSink, ManualClock, Request, SingleOwnerPlugin,
    SubscriptionPlugin, SystemClock,
};
use storage::{Event, EventKind, LedgerStore};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "plugboard.toml";
const LOG_ENV: &str = "PLUGBOARD_LOG";

#[derive(Parser)]
#[command(name = "plugboard")]
#[command(about = "Drive a plugin-based programmable account", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Identity making the call (defaults to the account owner)
    #[arg(long = "as", global = true)]
    caller: Option<String>,

    /// Call path to use instead of the operation's usual one
    #[arg(long, global = true, value_enum)]
    path: Option<PathArg>,

    /// Evaluate at this epoch second instead of the wall clock
    #[arg(long, global = true)]
    at: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PathArg {
    UserOp,
    Runtime,
}

impl From<PathArg> for CallPath {
    fn from(arg: PathArg) -> Self {
        match arg {
            PathArg::UserOp => CallPath::UserOperation,
            PathArg::Runtime => CallPath::Runtime,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print installed plugin manifests as JSON
    Manifest {
        /// Only this plugin
        plugin: Option<String>,
    },
    /// Authorize a payee to collect a fixed amount every period
    Subscribe {
        #[arg(long)]
        payee: String,
        #[arg(long)]
        amount: u64,
    },
    /// Collect a subscription payment as the payee
    Collect {
        #[arg(long)]
        payer: String,
        #[arg(long)]
        amount: u64,
    },
    /// Increment the caller's counter
    Increment,
    /// Transfer account ownership
    TransferOwner {
        #[arg(long)]
        to: String,
    },
    /// Show a subscription record
    Show {
        #[arg(long)]
        payee: String,
        #[arg(long)]
        payer: String,
    },
    /// Show a counter value
    Count {
        /// Counter owner (defaults to the caller)
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show the audit log
    Logs {
        /// Filter by event kind (denied, collected, ...)
        #[arg(short, long)]
        kind: Option<String>,
    },
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let account = open_account(&config, cli.at)?;

    let caller = match &cli.caller {
        Some(name) => Address::new(name.as_str())?,
        None => account.owner()?.unwrap_or_else(|| config.account.owner.clone()),
    };
    let path = cli.path.map(CallPath::from);

    match cli.command {
        Commands::Manifest { plugin } => cmd_manifest(&account, plugin.as_deref()),
        Commands::Subscribe { payee, amount } => {
            let call = Call::Subscribe {
                payee: Address::new(payee)?,
                amount,
            };
            cmd_call(&account, caller, path.unwrap_or(CallPath::UserOperation), call)
        }
        Commands::Collect { payer, amount } => {
            let call = Call::Collect {
                payer: Address::new(payer)?,
                amount,
            };
            cmd_call(&account, caller, path.unwrap_or(CallPath::Runtime), call)
        }
        Commands::Increment => {
            cmd_call(&account, caller, path.unwrap_or(CallPath::UserOperation), Call::Increment)
        }
        Commands::TransferOwner { to } => {
            let call = Call::TransferOwnership {
                new_owner: Address::new(to)?,
            };
            cmd_call(&account, caller, path.unwrap_or(CallPath::UserOperation), call)
        }
        Commands::Show { payee, payer } => {
            let record = account.subscription(&Address::new(payee)?, &Address::new(payer)?)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Count { owner } => {
            let owner = match owner {
                Some(owner) => Address::new(owner)?,
                None => caller,
            };
            println!("{owner}: {}", account.count(&owner)?);
            Ok(())
        }
        Commands::Logs { kind } => cmd_logs(&account, kind.as_deref()),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(Config::load(path)?)
}

fn open_account(config: &Config, at: Option<i64>) -> Result<Account> {
    let db_path = match &config.account.database {
        Some(path) => path.clone(),
        None => {
            let data_dir = dirs_data_dir().unwrap_or_else(|| ".plugboard".into());
            std::fs::create_dir_all(&data_dir)?;
            data_dir.join("ledger.db")
        }
    };
    tracing::debug!(path = %db_path.display(), "opening ledger");
    let store = LedgerStore::open(&db_path)?;

    let clock: Box<dyn Clock> = match at {
        Some(at) => Box::new(ManualClock::at(at)),
        None => Box::new(SystemClock),
    };

    let mut account = Account::new(
        Address::new(config.account.address.as_str())?,
        store,
        clock,
        LoggingSink,
    );
    account.install(
        SingleOwnerPlugin::new(),
        &[],
        config.account.owner.as_str().as_bytes(),
    )?;
    account.install(
        SubscriptionPlugin::with_period(config.subscription.period_secs),
        &[SINGLE_OWNER_INTERFACE],
        &[],
    )?;
    account.install(CounterPlugin, &[SINGLE_OWNER_INTERFACE], &[])?;
    Ok(account)
}

fn cmd_manifest(account: &Account, plugin: Option<&str>) -> Result<()> {
    let names: Vec<&str> = match plugin {
        Some(name) => vec![name],
        None => vec![SINGLE_OWNER_INTERFACE, SUBSCRIPTION_PLUGIN, COUNTER_PLUGIN],
    };
    let mut manifests = Vec::with_capacity(names.len());
    for name in names {
        let manifest = account
            .manifest(name)
            .ok_or_else(|| Error::UnknownPlugin(name.to_string()))?;
        manifests.push(manifest);
    }
    println!("{}", serde_json::to_string_pretty(&manifests)?);
    Ok(())
}

fn cmd_call(account: &Account, caller: Address, path: CallPath, call: Call) -> Result<()> {
    let request = Request {
        caller,
        path,
        call,
    };
    let outcome = account.dispatch(&request)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn cmd_logs(account: &Account, kind_filter: Option<&str>) -> Result<()> {
    let events = account.events(kind_filter)?;

    if events.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    for event in events {
        print_event(&event);
    }

    Ok(())
}

fn print_event(event: &Event) {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%Y-%m-%d %H:%M:%S");

    match &event.kind {
        EventKind::PluginInstalled { name, version } => {
            println!("[{time}] INSTALL {name} v{version}");
        }
        EventKind::PluginUninstalled { name } => {
            println!("[{time}] UNINSTALL {name}");
        }
        EventKind::Authorized {
            module,
            selector,
            caller,
            path,
        } => {
            println!("[{time}] ALLOW {module} {selector} caller={caller} path={path}");
        }
        EventKind::Denied {
            selector,
            caller,
            path,
            reason,
        } => {
            println!("[{time}] DENY {selector} caller={caller} path={path}: {reason}");
        }
        EventKind::Subscribed {
            payee,
            payer,
            amount,
        } => {
            println!("[{time}] SUBSCRIBE {payer} -> {payee} amount={amount}");
        }
        EventKind::Collected {
            payee,
            payer,
            amount,
            at,
        } => {
            println!("[{time}] COLLECT {payer} -> {payee} amount={amount} at={at}");
        }
        EventKind::Incremented { owner, value } => {
            println!("[{time}] INCREMENT {owner} = {value}");
        }
        EventKind::OwnershipTransferred { previous, owner } => {
            println!("[{time}] OWNER {previous} -> {owner}");
        }
    }
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/plugboard"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("plugboard"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("plugboard"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
