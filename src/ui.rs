use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, AppMode};
use crate::catalog::{Candidate, Catalog, TypeTag};
use crate::scheduler::Phase;
use crate::theme::Theme;

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` columns, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.width() <= max_width {
    return s.to_string();
  }
  let budget = max_width.saturating_sub(1);
  let mut used = 0;
  let truncated: String = s
    .chars()
    .take_while(|c| {
      used += c.width().unwrap_or(0);
      used <= budget
    })
    .collect();
  format!("{}…", truncated)
}

/// Right-hand metadata for a result row: episode/season info, year, rating, score, progress.
fn result_meta(candidate: &Candidate) -> String {
  let mut parts = Vec::new();
  if let Some(label) = candidate.episode_label() {
    parts.push(label);
  }
  if let Some(label) = candidate.season_label() {
    parts.push(label);
  }
  if let Some(year) = candidate.production_year {
    parts.push(year.to_string());
  }
  if let Some(ref rating) = candidate.official_rating {
    parts.push(rating.clone());
  }
  if let Some(score) = candidate.community_rating {
    parts.push(format!("★ {:.1}", score));
  }
  if let Some(percent) = candidate.progress_percent() {
    parts.push(format!("{}%", percent));
  }
  parts.join("  ")
}

fn kind_badge(kind: TypeTag) -> &'static str {
  match kind {
    TypeTag::Movie => "🎬",
    TypeTag::Series => "📺",
    TypeTag::Episode => "▸ ",
    TypeTag::Other => "  ",
  }
}

fn rounded(theme: &Theme) -> Block<'static> {
  Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border))
}

// --- UI Rendering ---

pub fn ui<C: Catalog>(frame: &mut Frame, app: &mut App<C>) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, input_area, filter_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_input(frame, app, input_area);
  render_filters(frame, app, filter_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header<C: Catalog>(frame: &mut Frame, app: &App<C>, area: Rect) {
  let theme = app.theme();
  let left = Line::from(vec![
    Span::styled(" ⌕ emsearch ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(app.server_label.as_str(), Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_input<C: Catalog>(frame: &mut Frame, app: &mut App<C>, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Input { theme.accent } else { theme.border };
  let mut title = vec![Span::styled(" Search movies and TV shows ", Style::default().fg(border_color))];
  if app.search.is_loading() {
    let tick = (app.started_at.elapsed().as_millis() / 100) as usize % SPINNER.len();
    title.push(Span::styled(format!("{} ", SPINNER[tick]), Style::default().fg(theme.status)));
  }
  let input_block = rounded(theme)
    .title(Line::from(title))
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if inner_w == 0 {
    app.input_scroll = 0;
  } else if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = c.width().unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input && inner_w > 0 {
    let cursor_x = area.x + 2 + cursor_col.saturating_sub(app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_filters<C: Catalog>(frame: &mut Frame, app: &App<C>, area: Rect) {
  let theme = app.theme();
  let types = app.search.types();
  let mut spans = vec![Span::styled(" Filter: ", Style::default().fg(theme.muted))];
  for (i, tag) in TypeTag::FILTERABLE.iter().enumerate() {
    let checked = types.contains(*tag);
    let (mark, color) = if checked { ("[x]", theme.checked) } else { ("[ ]", theme.muted) };
    spans.push(Span::styled(format!("F{} ", i + 1), Style::default().fg(theme.muted)));
    spans.push(Span::styled(mark, Style::default().fg(color).add_modifier(Modifier::BOLD)));
    spans.push(Span::styled(format!(" {}   ", tag.label()), Style::default().fg(theme.fg)));
  }
  frame.render_widget(Line::from(spans), area);
}

fn render_main<C: Catalog>(frame: &mut Frame, app: &mut App<C>, area: Rect) {
  if !app.results().is_empty() {
    render_results(frame, app, area);
    return;
  }

  let theme = app.theme();
  let text = if app.input.trim().is_empty() {
    vec![
      Line::from(""),
      Line::from(Span::styled("⌕  Start typing to search...", Style::default().fg(theme.accent))),
      Line::from(""),
      Line::from(Span::styled("F1–F3 toggle what kinds of items are searched.", Style::default().fg(theme.muted))),
    ]
  } else if matches!(app.search.phase(), Phase::Debouncing | Phase::Awaiting) {
    vec![Line::from(""), Line::from(Span::styled("Searching...", Style::default().fg(theme.status)))]
  } else {
    vec![
      Line::from(""),
      Line::from(Span::styled(format!("No results found for \"{}\"", app.input), Style::default().fg(theme.fg))),
      Line::from(Span::styled("Try a different search term", Style::default().fg(theme.muted))),
    ]
  };
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(rounded(theme));
  frame.render_widget(paragraph, area);
}

fn render_results<C: Catalog>(frame: &mut Frame, app: &mut App<C>, area: Rect) {
  let theme = app.theme();

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ") minus badge
  let inner_w = area.width.saturating_sub(7) as usize;

  let items: Vec<ListItem> = app
    .results()
    .iter()
    .enumerate()
    .map(|(i, candidate)| {
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      let right = result_meta(candidate);
      let right_w = right.width();
      let title_max = if right.is_empty() { inner_w } else { inner_w.saturating_sub(right_w + 2) };
      let title = truncate_str(candidate.display_name(), title_max);
      let gap = inner_w.saturating_sub(title.width() + right_w);

      let line = Line::from(vec![
        Span::raw(format!("{} ", kind_badge(candidate.kind))),
        Span::styled(title, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(right, Style::default().fg(theme.muted)),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = format!(" Results ({}) ", app.results().len());
  let list = List::new(items)
    .block(rounded(theme).title(title).title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_status<C: Catalog>(frame: &mut Frame, app: &App<C>, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if app.search.is_loading() {
    (format!(" ⏳ Searching '{}'…", app.search.text().trim()), Style::default().fg(theme.status))
  } else if let Some(msg) = &app.info_message {
    (format!(" ℹ  {}", msg), Style::default().fg(theme.status))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_footer<C: Catalog>(frame: &mut Frame, app: &App<C>, area: Rect) {
  let theme = app.theme();
  let has_results = !app.results().is_empty();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input => {
      let mut k = vec![("F1-F3", "Filter"), ("^t", "Theme")];
      if has_results {
        k.push(("↓", "Results"));
      }
      if app.input.is_empty() {
        k.push(("Esc", "Quit"));
      } else {
        k.push(("Esc", "Clear"));
      }
      k
    }
    AppMode::Results => vec![("Enter", "Open"), ("j/k", "Navigate"), ("F1-F3", "Filter"), ("Esc", "Back")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
