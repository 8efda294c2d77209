#![deny(unsafe_code)]

//! tabshim CLI — drive the tab API against a simulated browser.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tabshim_config::AppConfig;
use tabshim_core::bridge::{QuickJsEvaluator, loader_from_config};
use tabshim_core::build_info;
use tabshim_core::sim::SimBrowser;
use tabshim_core::{CreateProperties, HostModel, QueryInfo, ScriptDetails, Tabs};

/// tabshim — one tab API over promise, callback, and message-passing hosts.
#[derive(Parser)]
#[command(name = "tabshim", version = build_info::VERSION, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "tabshim.toml")]
    config: PathBuf,

    /// Host model the simulated browser exposes.
    #[arg(long, value_enum, default_value_t = HostArg::Message)]
    host: HostArg,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HostArg {
    Promise,
    Callback,
    Message,
}

impl From<HostArg> for HostModel {
    fn from(arg: HostArg) -> Self {
        match arg {
            HostArg::Promise => HostModel::PromiseNative,
            HostArg::Callback => HostModel::CallbackWithLastError,
            HostArg::Message => HostModel::MessagePassingOnly,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },

    /// Open pages, then run a script in the active one.
    Eval {
        /// Inline script source.
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        code: Option<String>,

        /// Script path under the agent resource root, starting with `/`.
        #[arg(long)]
        file: Option<String>,

        /// Page to open first.
        #[arg(long, default_value = "about:blank")]
        url: String,
    },

    /// Open one tab per URL and print each as JSON.
    Open {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Open tabs, then print the tabs matching a query.
    Query {
        /// Tabs to open before querying.
        #[arg(long = "open")]
        open: Vec<String>,

        /// URL match pattern.
        #[arg(long)]
        url: Option<String>,

        /// Only the active tab of the current window.
        #[arg(long)]
        active: bool,
    },

    /// Print version and build metadata.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
        Commands::Eval { code, file, url } => {
            let session = Session::start(&config, cli.host.into())?;
            cmd_eval(&session, code, file, &url).await?;
        }
        Commands::Open { urls } => {
            let session = Session::start(&config, cli.host.into())?;
            cmd_open(&session, &urls).await?;
        }
        Commands::Query { open, url, active } => {
            let session = Session::start(&config, cli.host.into())?;
            cmd_query(&session, &open, url, active).await?;
        }
        Commands::Version => println!("tabshim {}", build_info::version_string()),
    }

    Ok(())
}

/// A simulated browser with the tab API bound to one of its hosts.
struct Session {
    browser: SimBrowser,
    tabs: Tabs,
}

impl Session {
    fn start(config: &AppConfig, model: HostModel) -> Result<Self> {
        let loader = loader_from_config(&config.agent).context("invalid agent resource root")?;
        let mut evaluator = QuickJsEvaluator::new();
        if let Some(limit) = config.agent.memory_limit() {
            evaluator = evaluator.with_memory_limit(limit);
        }
        let browser = SimBrowser::new()
            .with_evaluator(Arc::new(evaluator))
            .with_resources(Arc::clone(&loader));
        let tabs = Tabs::new(&browser.environment(model), config)?;
        info!(host = %model, "Session started");
        Ok(Self { browser, tabs })
    }
}

async fn cmd_eval(
    session: &Session,
    code: Option<String>,
    file: Option<String>,
    url: &str,
) -> Result<()> {
    let details = match (code, file) {
        (Some(code), _) => ScriptDetails::code(code),
        (None, Some(file)) => ScriptDetails::file(file),
        (None, None) => anyhow::bail!("either a script or --file is required"),
    };

    let tab_id = session.browser.open(url)?;
    debug!(tab_id, url, "Page opened");

    let results = session.tabs.execute_script(Some(tab_id), details)?.await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn cmd_open(session: &Session, urls: &[String]) -> Result<()> {
    for url in urls {
        let tab = session.tabs.create(CreateProperties::url(url.as_str())).await?;
        println!("{}", serde_json::to_string(&tab)?);
    }
    Ok(())
}

async fn cmd_query(
    session: &Session,
    open: &[String],
    url: Option<String>,
    active: bool,
) -> Result<()> {
    for page in open {
        session.browser.open(page)?;
    }

    let mut info = if active {
        QueryInfo::active_in_current_window()
    } else {
        QueryInfo::default()
    };
    info.url = url.map(tabshim_core::tab::UrlFilter::One);

    let tabs = session.tabs.query(info).await?;
    println!("{}", serde_json::to_string_pretty(&tabs)?);
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        debug!(path = %path.display(), "Config file not found, using defaults");
        Ok(AppConfig::default())
    }
}
