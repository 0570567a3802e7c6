use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::config::ConnectionSettings;
use crate::constants::constants;

// --- Types ---

/// Catalog item category, as reported by the server's `Type` field.
///
/// Only `Movie`, `Series` and `Episode` can be used as search filters. Records
/// of any other type deserialize as `Other` so a mixed response never fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum TypeTag {
  Movie,
  Series,
  Episode,
  #[default]
  #[serde(other)]
  Other,
}

impl TypeTag {
  pub const FILTERABLE: [TypeTag; 3] = [TypeTag::Movie, TypeTag::Series, TypeTag::Episode];

  /// Name used in the server's `IncludeItemTypes` parameter.
  pub fn as_str(self) -> &'static str {
    match self {
      TypeTag::Movie => "Movie",
      TypeTag::Series => "Series",
      TypeTag::Episode => "Episode",
      TypeTag::Other => "Other",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      TypeTag::Movie => "Movies",
      TypeTag::Series => "Series",
      TypeTag::Episode => "Episodes",
      TypeTag::Other => "Other",
    }
  }

  pub fn is_filterable(self) -> bool {
    self != TypeTag::Other
  }
}

impl fmt::Display for TypeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The active set of type filters. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFilter {
  tags: BTreeSet<TypeTag>,
}

impl TypeFilter {
  /// Build a filter from `tags`, ignoring non-filterable ones.
  /// Returns `None` when nothing filterable is left.
  pub fn new(tags: impl IntoIterator<Item = TypeTag>) -> Option<Self> {
    let tags: BTreeSet<TypeTag> = tags.into_iter().filter(|t| t.is_filterable()).collect();
    if tags.is_empty() { None } else { Some(Self { tags }) }
  }

  /// Flip membership of `tag`. Removing the last member is refused.
  /// Returns whether the set changed.
  pub fn toggle(&mut self, tag: TypeTag) -> bool {
    if !tag.is_filterable() {
      return false;
    }
    if self.tags.contains(&tag) {
      if self.tags.len() == 1 {
        return false;
      }
      self.tags.remove(&tag)
    } else {
      self.tags.insert(tag)
    }
  }

  pub fn contains(&self, tag: TypeTag) -> bool {
    self.tags.contains(&tag)
  }

  pub fn iter(&self) -> impl Iterator<Item = TypeTag> + '_ {
    self.tags.iter().copied()
  }

  /// Comma-joined tag names, e.g. `Movie,Series`.
  pub fn to_param(&self) -> String {
    self.iter().map(TypeTag::as_str).collect::<Vec<_>>().join(",")
  }
}

impl Default for TypeFilter {
  fn default() -> Self {
    Self::new(constants().default_types.iter().copied())
      .unwrap_or_else(|| Self { tags: BTreeSet::from([TypeTag::Movie, TypeTag::Series]) })
  }
}

/// A single catalog record returned by a search. Never mutated after decoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Candidate {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(rename = "Type", default)]
  pub kind: TypeTag,
  #[serde(default)]
  pub production_year: Option<i32>,
  #[serde(default)]
  pub series_id: Option<String>,
  #[serde(default)]
  pub series_name: Option<String>,
  #[serde(default)]
  pub parent_index_number: Option<u32>,
  #[serde(default)]
  pub index_number: Option<u32>,
  #[serde(default)]
  pub child_count: Option<u32>,
  #[serde(default)]
  pub community_rating: Option<f32>,
  #[serde(default)]
  pub official_rating: Option<String>,
  #[serde(default)]
  pub run_time_ticks: Option<u64>,
  #[serde(default)]
  pub user_data: Option<UserData>,
}

/// Per-user playback state attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserData {
  #[serde(default)]
  pub playback_position_ticks: Option<u64>,
}

impl Candidate {
  /// Name shown to the user and matched against the query: the parent series
  /// name for an episode that has a non-empty one, the record's own name otherwise.
  pub fn display_name(&self) -> &str {
    if self.kind == TypeTag::Episode
      && let Some(series) = self.series_name.as_deref().filter(|s| !s.is_empty())
    {
      return series;
    }
    self.name.as_deref().unwrap_or("")
  }

  /// Id the details view should open: episodes route to their series.
  pub fn navigation_target(&self) -> &str {
    if self.kind == TypeTag::Episode
      && let Some(ref series_id) = self.series_id
    {
      return series_id;
    }
    &self.id
  }

  /// `S2E5` style label for episodes. Missing indices show as 1.
  pub fn episode_label(&self) -> Option<String> {
    if self.kind != TypeTag::Episode {
      return None;
    }
    Some(format!("S{}E{}", self.parent_index_number.unwrap_or(1), self.index_number.unwrap_or(1)))
  }

  /// Watched share of the runtime, 0 to 100. `None` until playback has started.
  pub fn progress_percent(&self) -> Option<u8> {
    let position = self.user_data.as_ref()?.playback_position_ticks.filter(|&p| p > 0)?;
    let runtime = self.run_time_ticks.filter(|&r| r > 0)?;
    Some((position.saturating_mul(100) / runtime).min(100) as u8)
  }

  /// `1 Season` / `N Seasons` for series with a known child count.
  pub fn season_label(&self) -> Option<String> {
    if self.kind != TypeTag::Series {
      return None;
    }
    match self.child_count {
      Some(0) | None => None,
      Some(1) => Some("1 Season".to_string()),
      Some(n) => Some(format!("{} Seasons", n)),
    }
  }
}

// --- Catalog ---

/// Remote catalog lookup. Returns an unordered list of candidates.
pub trait Catalog: Send + Sync + 'static {
  fn search(&self, term: &str, types: &TypeFilter, limit: usize) -> impl Future<Output = Result<Vec<Candidate>>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
  #[serde(default)]
  items: Vec<Candidate>,
}

/// Build the query string for a `/Users/{id}/Items` search request.
fn search_params(term: &str, types: &TypeFilter, limit: usize) -> Vec<(&'static str, String)> {
  vec![
    ("SearchTerm", term.to_string()),
    ("Recursive", "true".to_string()),
    ("IncludeItemTypes", types.to_param()),
    ("Limit", limit.to_string()),
    ("Fields", constants().request_fields.clone()),
  ]
}

/// Decode an items response body. A body without `Items` yields an empty list.
fn decode_items(body: &str) -> Result<Vec<Candidate>> {
  let response: ItemsResponse = serde_json::from_str(body).context("Failed to decode catalog items response")?;
  Ok(response.items)
}

/// Catalog backed by an Emby-compatible HTTP API.
pub struct EmbyClient {
  http: Client,
  server_url: String,
  user_id: String,
  access_token: String,
}

impl EmbyClient {
  pub fn new(settings: &ConnectionSettings) -> Result<Self> {
    let http = Client::builder()
      .timeout(constants().request_timeout())
      .user_agent(concat!("emsearch/", env!("CARGO_PKG_VERSION")))
      .build()
      .context("Failed to build HTTP client")?;
    Ok(Self {
      http,
      server_url: settings.server_url.trim_end_matches('/').to_string(),
      user_id: settings.user_id.clone(),
      access_token: settings.access_token.clone(),
    })
  }

  fn items_url(&self, term: &str, types: &TypeFilter, limit: usize) -> Result<Url> {
    let base = format!("{}/Users/{}/Items", self.server_url, self.user_id);
    Url::parse_with_params(&base, search_params(term, types, limit))
      .with_context(|| format!("Invalid server URL: {}", self.server_url))
  }
}

impl Catalog for EmbyClient {
  async fn search(&self, term: &str, types: &TypeFilter, limit: usize) -> Result<Vec<Candidate>> {
    let url = self.items_url(term, types, limit)?;
    debug!(term = %term, types = %types.to_param(), limit, "catalog: search request");

    let response = self
      .http
      .get(url)
      .header("X-Emby-Token", &self.access_token)
      .header("Accept", "application/json")
      .send()
      .await
      .context("Catalog request failed")?;

    let status = response.status();
    let body = response.text().await.context("Failed to read catalog response body")?;
    if !status.is_success() {
      return Err(anyhow!("Catalog search failed with {}: {}", status, body.trim()));
    }

    let items = decode_items(&body)?;
    debug!(count = items.len(), "catalog: search response");
    Ok(items)
  }
}
