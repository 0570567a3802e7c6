//! Incremental query scheduling.
//!
//! Turns keystrokes and filter toggles into as few catalog lookups as
//! possible. Every text or filter change restarts a single debounce timer;
//! when it fires a new generation is minted and a lookup is spawned. Only the
//! response for the latest generation is ranked and published, everything
//! else is dropped on arrival.
//!
//! The scheduler is owned by the UI loop and mutated only there. Timer and
//! lookup tasks report back over a channel, drained once per tick by
//! [`QueryScheduler::handle_pending`].

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{Candidate, Catalog, TypeFilter, TypeTag};
use crate::constants::constants;
use crate::ranker;

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// No query text.
  Idle,
  /// Waiting for the input to go quiet.
  Debouncing,
  /// Lookup for the latest generation in flight.
  Awaiting,
  /// Latest results published.
  Settled,
}

/// Effect of applying one background signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
  /// The debounce timer fired and a lookup was issued.
  Dispatched,
  /// Ranked results for the latest generation were published.
  Published,
  /// The latest lookup failed and an empty result set was published.
  Failed,
  /// A superseded timer fire or response was dropped.
  Discarded,
}

enum Signal {
  TimerFired { seq: u64 },
  Response { generation: u64, query: String, outcome: Result<Vec<Candidate>> },
}

pub struct QueryScheduler<C: Catalog> {
  catalog: Arc<C>,
  debounce: Duration,
  fetch_limit: usize,
  text: String,
  types: TypeFilter,
  phase: Phase,
  results: Vec<Candidate>,
  loading: bool,
  /// Count of result sets published so far, including empty ones.
  publications: u64,
  timer: Option<JoinHandle<()>>,
  timer_seq: u64,
  generation: u64,
  /// Generation whose response is still wanted.
  latest: Option<u64>,
  tx: mpsc::UnboundedSender<Signal>,
  rx: mpsc::UnboundedReceiver<Signal>,
}

impl<C: Catalog> QueryScheduler<C> {
  pub fn new(catalog: Arc<C>) -> Self {
    Self::with_types(catalog, TypeFilter::default())
  }

  pub fn with_types(catalog: Arc<C>, types: TypeFilter) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      catalog,
      debounce: constants().debounce(),
      fetch_limit: constants().fetch_limit,
      text: String::new(),
      types,
      phase: Phase::Idle,
      results: Vec::new(),
      loading: false,
      publications: 0,
      timer: None,
      timer_seq: 0,
      generation: 0,
      latest: None,
      tx,
      rx,
    }
  }

  // --- Accessors ---

  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn types(&self) -> &TypeFilter {
    &self.types
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  /// True exactly while a lookup for the latest generation is outstanding.
  pub fn is_loading(&self) -> bool {
    self.loading
  }

  /// The most recently published result set.
  pub fn results(&self) -> &[Candidate] {
    &self.results
  }

  pub fn publications(&self) -> u64 {
    self.publications
  }

  // --- Input ---

  /// Record new query text. Blank text clears results immediately; anything
  /// else (re)starts the debounce timer.
  pub fn set_query_text(&mut self, text: impl Into<String>) {
    let text = text.into();
    if text == self.text {
      return;
    }
    self.text = text;

    if self.text.trim().is_empty() {
      self.clear();
    } else {
      self.restart_debounce();
    }
  }

  /// Flip `tag` in the filter set. Refuses to remove the last active tag.
  /// A change with query text present schedules a new lookup.
  pub fn toggle_type(&mut self, tag: TypeTag) -> bool {
    if !self.types.toggle(tag) {
      debug!(tag = %tag, "scheduler: toggle ignored");
      return false;
    }
    info!(types = %self.types.to_param(), "scheduler: filter changed");
    if !self.text.trim().is_empty() {
      self.restart_debounce();
    }
    true
  }

  /// Cancel the timer and make any in-flight response inert.
  pub fn shutdown(&mut self) {
    self.cancel_timer();
    self.latest = None;
    self.loading = false;
  }

  // --- Signals ---

  /// Apply every signal that is already waiting. Returns whether a result
  /// set was published.
  pub fn handle_pending(&mut self) -> bool {
    let mut published = false;
    while let Ok(signal) = self.rx.try_recv() {
      published |= matches!(self.apply(signal), Update::Published | Update::Failed);
    }
    published
  }

  /// Wait for the next signal and apply it.
  #[cfg(test)]
  pub async fn next_update(&mut self) -> Option<Update> {
    let signal = self.rx.recv().await?;
    Some(self.apply(signal))
  }

  fn apply(&mut self, signal: Signal) -> Update {
    match signal {
      Signal::TimerFired { seq } => self.fire(seq),
      Signal::Response { generation, query, outcome } => self.receive(generation, &query, outcome),
    }
  }

  // --- Internals ---

  fn clear(&mut self) {
    debug!("scheduler: query cleared");
    self.cancel_timer();
    self.latest = None;
    self.loading = false;
    self.phase = Phase::Idle;
    self.publish(Vec::new());
  }

  fn cancel_timer(&mut self) {
    if let Some(handle) = self.timer.take() {
      handle.abort();
    }
  }

  fn restart_debounce(&mut self) {
    self.cancel_timer();
    // Whatever is in flight no longer matches the input.
    self.latest = None;
    self.loading = false;

    self.timer_seq += 1;
    let seq = self.timer_seq;
    let delay = self.debounce;
    let tx = self.tx.clone();
    self.timer = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(Signal::TimerFired { seq });
    }));
    self.phase = Phase::Debouncing;
  }

  fn fire(&mut self, seq: u64) -> Update {
    // A fire queued before its timer was replaced or cancelled.
    if seq != self.timer_seq || self.timer.is_none() {
      return Update::Discarded;
    }
    self.timer = None;

    self.generation += 1;
    let generation = self.generation;
    self.latest = Some(generation);
    self.loading = true;
    self.phase = Phase::Awaiting;

    let query = self.text.clone();
    let types = self.types.clone();
    let limit = self.fetch_limit;
    let catalog = Arc::clone(&self.catalog);
    let tx = self.tx.clone();
    info!(query = %query, types = %types.to_param(), generation, "search dispatched");

    tokio::spawn(async move {
      let outcome = catalog.search(&query, &types, limit).await;
      let _ = tx.send(Signal::Response { generation, query, outcome });
    });
    Update::Dispatched
  }

  fn receive(&mut self, generation: u64, query: &str, outcome: Result<Vec<Candidate>>) -> Update {
    if self.latest != Some(generation) {
      debug!(generation, latest = ?self.latest, "scheduler: stale response discarded");
      return Update::Discarded;
    }
    self.latest = None;
    self.loading = false;
    self.phase = Phase::Settled;

    match outcome {
      Ok(candidates) => {
        let fetched = candidates.len();
        let ranked = ranker::rank(candidates, query);
        info!(query = %query, fetched, shown = ranked.len(), generation, "search settled");
        self.publish(ranked);
        Update::Published
      }
      Err(e) => {
        warn!(err = %format!("{e:#}"), query = %query, generation, "search failed");
        self.publish(Vec::new());
        Update::Failed
      }
    }
  }

  fn publish(&mut self, results: Vec<Candidate>) {
    self.results = results;
    self.publications += 1;
  }
}

impl<C: Catalog> Drop for QueryScheduler<C> {
  fn drop(&mut self) {
    self.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::anyhow;
  use std::collections::{HashMap, HashSet};
  use std::sync::Mutex;

  // --- Fake catalog ---

  #[derive(Default)]
  struct FakeCatalog {
    items: HashMap<String, Vec<Candidate>>,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, String, usize)>>,
  }

  impl FakeCatalog {
    fn with(mut self, term: &str, names: &[&str]) -> Self {
      self.items.insert(term.to_string(), names.iter().map(|n| item(n)).collect());
      self
    }

    fn delayed(mut self, term: &str, millis: u64) -> Self {
      self.delays.insert(term.to_string(), Duration::from_millis(millis));
      self
    }

    fn failing(mut self, term: &str) -> Self {
      self.failing.insert(term.to_string());
      self
    }

    fn calls(&self) -> Vec<(String, String, usize)> {
      self.calls.lock().unwrap().clone()
    }
  }

  impl Catalog for FakeCatalog {
    async fn search(&self, term: &str, types: &TypeFilter, limit: usize) -> Result<Vec<Candidate>> {
      self.calls.lock().unwrap().push((term.to_string(), types.to_param(), limit));
      if let Some(delay) = self.delays.get(term).copied() {
        tokio::time::sleep(delay).await;
      }
      if self.failing.contains(term) {
        return Err(anyhow!("connection refused"));
      }
      Ok(self.items.get(term).cloned().unwrap_or_default())
    }
  }

  fn item(name: &str) -> Candidate {
    Candidate {
      id: name.to_lowercase(),
      name: Some(name.to_string()),
      kind: TypeTag::Movie,
      production_year: None,
      series_id: None,
      series_name: None,
      parent_index_number: None,
      index_number: None,
      child_count: None,
      community_rating: None,
      official_rating: None,
      run_time_ticks: None,
      user_data: None,
    }
  }

  fn shown<C: Catalog>(s: &QueryScheduler<C>) -> Vec<&str> {
    s.results().iter().map(Candidate::display_name).collect()
  }

  fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
  }

  // --- Debounce ---

  #[tokio::test(start_paused = true)]
  async fn rapid_typing_issues_one_lookup() {
    let catalog = Arc::new(FakeCatalog::default().with("bat", &["Batman", "Batman Returns"]));
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("b");
    tokio::time::sleep(ms(100)).await;
    s.set_query_text("ba");
    tokio::time::sleep(ms(100)).await;
    s.set_query_text("bat");
    assert_eq!(s.phase(), Phase::Debouncing);
    assert!(!s.is_loading());

    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert!(s.is_loading());
    assert_eq!(s.next_update().await, Some(Update::Published));
    assert!(!s.is_loading());
    assert_eq!(s.phase(), Phase::Settled);

    assert_eq!(catalog.calls(), vec![("bat".to_string(), "Movie,Series".to_string(), 50)]);
    assert_eq!(shown(&s), vec!["Batman", "Batman Returns"]);
  }

  #[tokio::test(start_paused = true)]
  async fn each_keystroke_restarts_the_delay() {
    let catalog = Arc::new(FakeCatalog::default());
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("h");
    tokio::time::sleep(ms(250)).await;
    s.set_query_text("he");
    tokio::time::sleep(ms(250)).await;
    assert!(!s.handle_pending());
    assert_eq!(s.phase(), Phase::Debouncing);
    assert!(catalog.calls().is_empty());

    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Published));
    assert_eq!(catalog.calls().len(), 1);
    assert_eq!(catalog.calls()[0].0, "he");
  }

  #[tokio::test(start_paused = true)]
  async fn blank_text_never_queries() {
    let catalog = Arc::new(FakeCatalog::default());
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("   ");
    assert_eq!(s.phase(), Phase::Idle);
    assert!(!s.is_loading());
    assert_eq!(s.publications(), 1);
    tokio::time::sleep(ms(1_000)).await;
    assert!(!s.handle_pending());
    assert!(catalog.calls().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn handle_pending_drains_ready_signals() {
    let catalog = Arc::new(FakeCatalog::default().with("up", &["Up"]));
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("up");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    tokio::time::sleep(ms(10)).await;
    assert!(s.handle_pending());
    assert_eq!(shown(&s), vec!["Up"]);
  }

  // --- Stale responses ---

  #[tokio::test(start_paused = true)]
  async fn late_response_for_old_query_is_discarded() {
    let catalog = Arc::new(
      FakeCatalog::default()
        .with("cat", &["Cat People"])
        .delayed("cat", 1_000)
        .with("dog", &["Dog Day Afternoon"])
        .delayed("dog", 100),
    );
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("cat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    s.set_query_text("dog");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Published));
    assert_eq!(shown(&s), vec!["Dog Day Afternoon"]);

    assert_eq!(s.next_update().await, Some(Update::Discarded));
    assert_eq!(shown(&s), vec!["Dog Day Afternoon"]);
    assert_eq!(s.phase(), Phase::Settled);
    assert!(!s.is_loading());
    assert_eq!(catalog.calls().len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn stale_response_leaves_loading_indicator_alone() {
    let catalog = Arc::new(
      FakeCatalog::default()
        .with("cat", &["Cat People"])
        .delayed("cat", 500)
        .with("dog", &["Dogville"])
        .delayed("dog", 1_000),
    );
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("cat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    s.set_query_text("dog");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert!(s.is_loading());

    assert_eq!(s.next_update().await, Some(Update::Discarded));
    assert!(s.is_loading());
    assert_eq!(s.phase(), Phase::Awaiting);
    assert!(s.results().is_empty());

    assert_eq!(s.next_update().await, Some(Update::Published));
    assert_eq!(shown(&s), vec!["Dogville"]);
  }

  #[tokio::test(start_paused = true)]
  async fn clearing_text_mid_flight_empties_immediately() {
    let catalog = Arc::new(FakeCatalog::default().with("cat", &["Cat People"]).delayed("cat", 500));
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("cat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    let before = s.publications();

    s.set_query_text("");
    assert_eq!(s.phase(), Phase::Idle);
    assert!(!s.is_loading());
    assert!(s.results().is_empty());
    assert_eq!(s.publications(), before + 1);

    assert_eq!(s.next_update().await, Some(Update::Discarded));
    assert!(s.results().is_empty());
    assert_eq!(s.phase(), Phase::Idle);
  }

  #[tokio::test(start_paused = true)]
  async fn previous_results_stay_visible_while_debouncing() {
    let catalog = Arc::new(FakeCatalog::default().with("heat", &["Heat"]));
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("heat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Published));

    s.set_query_text("heat w");
    assert_eq!(s.phase(), Phase::Debouncing);
    assert_eq!(shown(&s), vec!["Heat"]);
  }

  // --- Filters ---

  #[tokio::test(start_paused = true)]
  async fn removing_the_only_filter_is_a_noop() {
    let catalog = Arc::new(FakeCatalog::default());
    let mut s = QueryScheduler::with_types(catalog, TypeFilter::new([TypeTag::Series]).unwrap());

    assert!(!s.toggle_type(TypeTag::Series));
    assert_eq!(s.types().iter().collect::<Vec<_>>(), vec![TypeTag::Series]);
    assert_eq!(s.phase(), Phase::Idle);
  }

  #[tokio::test(start_paused = true)]
  async fn filter_change_without_text_does_not_query() {
    let catalog = Arc::new(FakeCatalog::default());
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    assert!(s.toggle_type(TypeTag::Episode));
    tokio::time::sleep(ms(1_000)).await;
    assert!(!s.handle_pending());
    assert!(catalog.calls().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn filter_change_after_settle_requeries() {
    let catalog = Arc::new(FakeCatalog::default().with("heat", &["Heat"]));
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("heat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Published));

    assert!(s.toggle_type(TypeTag::Episode));
    assert_eq!(s.phase(), Phase::Debouncing);
    assert_eq!(shown(&s), vec!["Heat"]);

    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Published));
    let calls = catalog.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].1, "Movie,Series,Episode");
  }

  #[tokio::test(start_paused = true)]
  async fn filter_change_while_awaiting_discards_in_flight() {
    let catalog = Arc::new(FakeCatalog::default().with("cat", &["Cat People"]).delayed("cat", 1000));
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("cat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.phase(), Phase::Awaiting);

    assert!(s.toggle_type(TypeTag::Episode));
    assert_eq!(s.phase(), Phase::Debouncing);
    assert!(!s.is_loading());

    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Discarded));
    assert_eq!(s.publications(), 0);
    assert!(s.is_loading());
    assert_eq!(s.next_update().await, Some(Update::Published));
    assert_eq!(shown(&s), vec!["Cat People"]);

    let calls = catalog.calls();
    assert_eq!(
      calls,
      vec![
        ("cat".to_string(), "Movie,Series".to_string(), 50),
        ("cat".to_string(), "Movie,Series,Episode".to_string(), 50),
      ]
    );
  }

  // --- Failures and teardown ---

  #[tokio::test(start_paused = true)]
  async fn catalog_failure_publishes_empty() {
    let catalog = Arc::new(FakeCatalog::default().failing("boom").with("heat", &["Heat"]));
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("heat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Published));

    s.set_query_text("boom");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Failed));
    assert!(s.results().is_empty());
    assert!(!s.is_loading());
    assert_eq!(s.phase(), Phase::Settled);

    // Not retried, and later queries still work.
    s.set_query_text("heat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    assert_eq!(s.next_update().await, Some(Update::Published));
    assert_eq!(catalog.calls().iter().filter(|c| c.0 == "boom").count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn shutdown_makes_in_flight_response_inert() {
    let catalog = Arc::new(FakeCatalog::default().with("cat", &["Cat People"]).delayed("cat", 500));
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("cat");
    assert_eq!(s.next_update().await, Some(Update::Dispatched));
    s.shutdown();
    assert!(!s.is_loading());

    assert_eq!(s.next_update().await, Some(Update::Discarded));
    assert!(s.results().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn shutdown_cancels_pending_timer() {
    let catalog = Arc::new(FakeCatalog::default());
    let mut s = QueryScheduler::new(Arc::clone(&catalog));

    s.set_query_text("cat");
    s.shutdown();
    tokio::time::sleep(ms(1_000)).await;
    assert!(!s.handle_pending());
    assert!(catalog.calls().is_empty());
  }
}
