mod app;
mod catalog;
mod config;
mod constants;
mod input;
mod ranker;
mod scheduler;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use catalog::EmbyClient;
use config::Config;
use constants::constants;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Base URL of the media server, e.g. http://media.local:8096
  #[arg(short, long, env = "EMSEARCH_SERVER")]
  server: Option<String>,

  /// User id the catalog is queried as
  #[arg(short, long, env = "EMSEARCH_USER")]
  user: Option<String>,

  /// Access token sent with every request
  #[arg(short, long, env = "EMSEARCH_TOKEN", hide_env_values = true)]
  token: Option<String>,

  /// Directory for log files (default: the platform data dir)
  #[arg(long)]
  log_dir: Option<PathBuf>,

  /// Store the given connection settings in prefs.toml
  #[arg(long)]
  save: bool,

  /// Print a shell completion script and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<Shell>,
}

impl Args {
  fn overrides(&self) -> Config {
    Config {
      server_url: self.server.clone(),
      user_id: self.user.clone(),
      access_token: self.token.clone(),
      theme_name: None,
    }
  }
}

// --- Logging ---

/// Log to a daily rolling file; the terminal belongs to the UI.
fn init_logging(log_dir: Option<PathBuf>) -> Result<WorkerGuard> {
  let dir = log_dir
    .or_else(|| ProjectDirs::from("", "", "emsearch").map(|dirs| dirs.data_dir().join("logs")))
    .context("No data directory available; pass --log-dir")?;
  std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

  let appender = tracing_appender::rolling::daily(&dir, &constants().log_file_prefix);
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let filter = EnvFilter::try_from_env("EMSEARCH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Ok(guard)
}

/// Host part of the server URL for the header, falling back to the raw string.
fn server_label(server_url: &str) -> String {
  Url::parse(server_url)
    .ok()
    .and_then(|url| url.host_str().map(|host| match url.port() {
      Some(port) => format!("{host}:{port}"),
      None => host.to_string(),
    }))
    .unwrap_or_else(|| server_url.to_string())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "emsearch", &mut std::io::stdout());
    return Ok(());
  }

  let _guard = init_logging(args.log_dir.clone())?;

  let overrides = args.overrides();
  if args.save {
    let path = Config::load().merged(overrides.clone()).save()?;
    println!("Saved settings to {}", path.display());
  }
  let config = Config::load().merged(overrides);
  let settings = config.connection()?;
  let client = EmbyClient::new(&settings)?;
  info!(server = %settings.server_url, "emsearch starting");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut app = App::new(Arc::new(client), server_label(&settings.server_url), config.theme_name.as_deref());
  let mut terminal = ratatui::init();
  let result = run(&mut terminal, &mut app);
  app.shutdown();
  ratatui::restore();
  info!("emsearch exiting");
  result
}

fn run(terminal: &mut DefaultTerminal, app: &mut App<EmbyClient>) -> Result<()> {
  loop {
    app.check_pending();
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(app, key);
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }
  Ok(())
}
