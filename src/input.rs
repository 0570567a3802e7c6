use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, AppMode};
use crate::catalog::{Catalog, TypeTag};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Filter toggled by a function key: F1 movies, F2 series, F3 episodes.
fn filter_key(code: KeyCode) -> Option<TypeTag> {
  match code {
    KeyCode::F(n) => TypeTag::FILTERABLE.get(usize::from(n).checked_sub(1)?).copied(),
    _ => None,
  }
}

// --- Event Handling ---

pub fn handle_key_event<C: Catalog>(app: &mut App<C>, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  if let Some(tag) = filter_key(key.code) {
    app.toggle_type(tag);
    return;
  }

  match app.mode {
    AppMode::Input => handle_input_key(app, key),
    AppMode::Results => handle_results_key(app, key),
  }
}

fn handle_input_key<C: Catalog>(app: &mut App<C>, key: KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
      app.sync_query();
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.sync_query();
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.sync_query();
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.clear_input();
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Enter | KeyCode::Down => {
      if !app.results().is_empty() {
        app.mode = AppMode::Results;
        if app.list_state.selected().is_none() {
          app.list_state.select(Some(0));
        }
      }
    }
    _ => {}
  }
}

fn handle_results_key<C: Catalog>(app: &mut App<C>, key: KeyEvent) {
  let count = app.results().len();
  match key.code {
    KeyCode::Enter => {
      app.open_selected();
    }
    KeyCode::Down | KeyCode::Char('j') => {
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| (i + 1) % count);
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Up | KeyCode::Char('k') => {
      if count > 0 {
        let i =
          app.list_state.selected().map_or(0, |i| if i == 0 { count.saturating_sub(1) } else { i.saturating_sub(1) });
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Esc | KeyCode::Char('/') => {
      app.mode = AppMode::Input;
    }
    _ => {}
  }
}
