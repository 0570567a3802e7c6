use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::catalog::{Candidate, Catalog, TypeTag};
use crate::config::Config;
use crate::scheduler::QueryScheduler;
use crate::theme::{THEMES, Theme, theme_index};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Input,
  Results,
}

pub struct App<C: Catalog> {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub theme_index: usize,
  pub list_state: ListState,
  pub search: QueryScheduler<C>,
  /// Shown in the header, e.g. the server host.
  pub server_label: String,
  pub last_error: Option<String>,
  /// Informational message, lower priority than errors.
  pub info_message: Option<String>,
  pub should_quit: bool,
  /// Drives the loading spinner.
  pub started_at: Instant,
  /// When the last error was set, for auto-dismiss.
  error_time: Option<Instant>,
  /// Last publication seen by the UI.
  seen_publication: u64,
}

impl<C: Catalog> App<C> {
  pub fn new(catalog: Arc<C>, server_label: String, theme_name: Option<&str>) -> Self {
    Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      mode: AppMode::Input,
      theme_index: theme_index(theme_name),
      list_state: ListState::default(),
      search: QueryScheduler::new(catalog),
      server_label,
      last_error: None,
      info_message: None,
      should_quit: false,
      started_at: Instant::now(),
      error_time: None,
      seen_publication: 0,
    }
  }

  pub fn theme(&self) -> &'static Theme {
    // Safety: theme_index only ever comes from theme_index() or modular arithmetic in next_theme().
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    if let Err(e) = Config::save_theme(self.theme().name) {
      warn!(err = %e, "config: failed to save theme");
      self.set_error(format!("Theme not saved: {:#}", e));
    }
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.clear_error();
    }
  }

  pub fn results(&self) -> &[Candidate] {
    self.search.results()
  }

  pub fn selected(&self) -> Option<&Candidate> {
    self.list_state.selected().and_then(|i| self.results().get(i))
  }

  /// Push the edited input text to the scheduler.
  pub fn sync_query(&mut self) {
    self.info_message = None;
    self.search.set_query_text(self.input.as_str());
    self.check_pending();
  }

  pub fn toggle_type(&mut self, tag: TypeTag) {
    if self.search.toggle_type(tag) {
      self.info_message = None;
    } else if self.search.types().contains(tag) {
      self.info_message = Some(format!("{} is the only active filter.", tag.label()));
    }
  }

  pub fn clear_input(&mut self) {
    self.input.clear();
    self.cursor_position = 0;
    self.input_scroll = 0;
    self.mode = AppMode::Input;
    self.sync_query();
  }

  /// Apply finished background work and keep the selection in range.
  pub fn check_pending(&mut self) {
    self.search.handle_pending();
    let published = self.search.publications();
    if published == self.seen_publication {
      return;
    }
    self.seen_publication = published;

    if self.results().is_empty() {
      self.list_state.select(None);
      self.mode = AppMode::Input;
    } else {
      self.list_state.select(Some(0));
    }
  }

  /// Resolve the selected result to the id a details view would open.
  /// Routing lives outside this client, so the target is reported and the
  /// search is reset.
  pub fn open_selected(&mut self) {
    let Some(candidate) = self.selected() else { return };
    let target = candidate.navigation_target().to_string();
    let name = candidate.display_name().to_string();
    info!(id = %candidate.id, target = %target, "result opened");
    self.clear_input();
    self.info_message = Some(format!("Open details: {} ({})", name, target));
  }

  pub fn shutdown(&mut self) {
    self.search.shutdown();
  }
}
