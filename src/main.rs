use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use typeassist::config::{format_duration, parse_duration};
use typeassist::updater::{default_download_dir, open_download, CURRENT_VERSION};
use typeassist::{
    injector, Config, Controller, EchoInjector, EnigoInjector, HotkeyAction, HotkeyManager,
    RunState, StatusReporter, StatusUpdate, Updater,
};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "typeassist.json";

#[derive(Parser)]
#[command(name = "typeassist", version, about = "Types text into the focused window, with pause and stop control")]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Type text into whatever window has focus
    Type(TypeArgs),
    /// Check GitHub for a newer release
    CheckUpdate {
        /// Download the release asset if an update is found
        #[arg(long)]
        download: bool,
        /// Directory to download into (defaults to ~/Downloads)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// After downloading, launch the installer or open its folder
        #[arg(long, requires = "download")]
        open: bool,
    },
    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct TypeArgs {
    /// Text to type; read from --file, --clipboard or stdin when omitted
    text: Option<String>,

    /// Read the text from a file
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Type the current clipboard contents
    #[arg(long, conflicts_with_all = ["text", "file"])]
    clipboard: bool,

    /// Typing speed from 1 (slow) to 100 (fast)
    #[arg(short, long, value_parser = clap::value_parser!(i32).range(1..=100))]
    speed: Option<i32>,

    /// Delay before typing starts, e.g. "2s" or "1500ms"
    #[arg(short, long, value_parser = parse_delay)]
    delay: Option<Duration>,

    /// Register the global start/pause/stop hotkeys
    #[arg(long)]
    hotkeys: bool,

    /// Print the characters to stdout instead of sending key events
    #[arg(long)]
    dry_run: bool,
}

fn parse_delay(value: &str) -> std::result::Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

struct ConsoleReporter;

impl StatusReporter for ConsoleReporter {
    fn report(&self, update: &StatusUpdate) {
        let message = match &update.state {
            RunState::Finished => update.message.green().bold(),
            RunState::Stopped | RunState::Cancelled => update.message.yellow(),
            RunState::Errored(_) => update.message.red().bold(),
            RunState::Paused => update.message.cyan(),
            _ => update.message.normal(),
        };
        eprintln!("{} {}", format!("[{}]", update.run).dimmed(), message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(cli.verbose || config.verbose);

    match cli.command {
        Command::Type(args) => run_type(args, config).await,
        Command::CheckUpdate { download, dir, open } => {
            run_check_update(&config, download, dir, open).await
        }
        Command::InitConfig { path, force } => run_init_config(&path, force),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "typeassist=debug" } else { "typeassist=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE)?,
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

fn read_text(args: &TypeArgs) -> Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    if args.clipboard {
        let text = typeassist::clipboard::read_text()?;
        eprintln!("Pasted from clipboard.");
        return Ok(text);
    }

    let mut text = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read text from stdin")?;
            buf
        }
    };

    // Files and pipes end with a newline the user did not mean to type.
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    Ok(text)
}

async fn run_type(args: TypeArgs, config: Config) -> Result<()> {
    let text = read_text(&args)?;
    let speed = args.speed.unwrap_or(config.speed);
    let delay = args.delay.unwrap_or(config.start_delay);
    let hotkeys_enabled = args.hotkeys || config.hotkeys_enabled;

    let injector = if args.dry_run {
        injector::shared(EchoInjector)
    } else {
        injector::shared(EnigoInjector::new()?)
    };
    let controller = Arc::new(
        Controller::new(injector, Arc::new(ConsoleReporter))?.with_start_delay(delay),
    );

    if config.check_updates_on_start {
        let repo = config.update_repo.clone();
        tokio::spawn(async move {
            match Updater::new(&repo) {
                Ok(updater) => match updater.check().await {
                    Ok(Some(release)) => eprintln!(
                        "{} A new version ({}) is available. You have {}.",
                        "⬆".blue(),
                        release.tag,
                        CURRENT_VERSION
                    ),
                    Ok(None) => debug!("No updates found"),
                    Err(e) => warn!("Update check failed: {}", e),
                },
                Err(e) => warn!("Update check failed: {}", e),
            }
        });
    }

    // Kept alive for the rest of the run; dropping it unregisters the hotkeys.
    let _hotkeys = if hotkeys_enabled {
        Some(register_hotkeys(&config, controller.clone(), text.clone(), speed)?)
    } else {
        None
    };

    controller.start(&text, speed)?;
    eprintln!(
        "{} Focus the target window. Typing {} characters at speed {} after {}.",
        "⌨".bold(),
        text.chars().count(),
        speed,
        format_duration(delay)
    );

    let outcome = if hotkeys_enabled {
        eprintln!(
            "Hotkeys: {} restart, {} pause/resume, {} stop. Press Ctrl-C to quit.",
            config.start_hotkey.bold(),
            config.pause_hotkey.bold(),
            config.stop_hotkey.bold()
        );
        tokio::signal::ctrl_c().await?;
        controller.stop();
        controller.wait_until_idle().await
    } else {
        tokio::select! {
            state = controller.wait_until_idle() => state,
            _ = tokio::signal::ctrl_c() => {
                controller.stop();
                controller.wait_until_idle().await
            }
        }
    };

    if args.dry_run {
        println!();
    }
    if let RunState::Errored(reason) = outcome {
        bail!("Typing failed: {reason}");
    }
    Ok(())
}

fn register_hotkeys(
    config: &Config,
    controller: Arc<Controller>,
    text: String,
    speed: i32,
) -> Result<HotkeyManager> {
    let mut manager = HotkeyManager::new()?;
    manager.register(HotkeyAction::Start, &config.start_hotkey)?;
    manager.register(HotkeyAction::TogglePause, &config.pause_hotkey)?;
    manager.register(HotkeyAction::Stop, &config.stop_hotkey)?;

    manager.start_listener(move |action| match action {
        HotkeyAction::Start => {
            if let Err(e) = controller.start(&text, speed) {
                warn!("Could not start typing: {}", e);
            }
        }
        HotkeyAction::TogglePause => {
            controller.toggle_pause();
        }
        HotkeyAction::Stop => controller.stop(),
    })?;

    Ok(manager)
}

async fn run_check_update(
    config: &Config,
    download: bool,
    dir: Option<PathBuf>,
    open: bool,
) -> Result<()> {
    let updater = Updater::new(&config.update_repo)?;
    eprintln!("Checking for updates (running {CURRENT_VERSION})...");

    let Some(release) = updater.check().await.context("Update check failed")? else {
        println!("{}", "No updates found.".green());
        return Ok(());
    };

    println!(
        "A new version ({}) is available. You have {}.",
        release.tag.bold(),
        CURRENT_VERSION
    );
    if let Some(url) = &release.html_url {
        println!("Release notes: {url}");
    }

    if !download {
        println!("Run with --download to fetch it.");
        return Ok(());
    }

    let dir = dir
        .or_else(default_download_dir)
        .context("Could not determine a download directory; pass --dir")?;

    let mut last_percent = None;
    let path = updater
        .download(&release, &dir, |done, total| {
            if let Some(total) = total.filter(|total| *total > 0) {
                let percent = done * 100 / total;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    eprint!("\rDownloading update... {percent}%");
                }
            }
        })
        .await
        .context("Download failed")?;

    eprintln!();
    println!("{} {}", "Download complete:".green(), path.display());

    if open {
        let opened = open_download(&path)
            .with_context(|| format!("Could not open {}", path.display()))?;
        println!("Opened {}", opened.display());
    } else {
        println!("Run with --open to launch it.");
    }
    Ok(())
}

fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    Config::default().save_to_file(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
