use ratatui::style::Color;

/// Color palette for the whole UI.
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub muted: Color,
  pub accent: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
  /// Checked filter boxes.
  pub checked: Color,
}

pub const THEMES: [Theme; 3] = [
  Theme {
    name: "midnight",
    bg: Color::Rgb(14, 16, 24),
    fg: Color::Rgb(220, 223, 232),
    muted: Color::Rgb(120, 126, 145),
    accent: Color::Rgb(96, 165, 250),
    border: Color::Rgb(55, 60, 78),
    highlight_fg: Color::Rgb(255, 255, 255),
    highlight_bg: Color::Rgb(40, 52, 88),
    stripe_bg: Color::Rgb(20, 23, 33),
    status: Color::Rgb(147, 197, 253),
    error: Color::Rgb(248, 113, 113),
    key_fg: Color::Rgb(14, 16, 24),
    key_bg: Color::Rgb(120, 126, 145),
    checked: Color::Rgb(167, 139, 250),
  },
  Theme {
    name: "cinema",
    bg: Color::Rgb(8, 8, 8),
    fg: Color::Rgb(235, 235, 235),
    muted: Color::Rgb(140, 140, 140),
    accent: Color::Rgb(229, 9, 20),
    border: Color::Rgb(60, 60, 60),
    highlight_fg: Color::Rgb(255, 255, 255),
    highlight_bg: Color::Rgb(70, 20, 22),
    stripe_bg: Color::Rgb(18, 18, 18),
    status: Color::Rgb(250, 204, 21),
    error: Color::Rgb(248, 113, 113),
    key_fg: Color::Rgb(8, 8, 8),
    key_bg: Color::Rgb(140, 140, 140),
    checked: Color::Rgb(229, 9, 20),
  },
  Theme {
    name: "paper",
    bg: Color::Rgb(250, 248, 242),
    fg: Color::Rgb(40, 40, 46),
    muted: Color::Rgb(130, 128, 120),
    accent: Color::Rgb(37, 99, 235),
    border: Color::Rgb(205, 200, 188),
    highlight_fg: Color::Rgb(20, 20, 24),
    highlight_bg: Color::Rgb(219, 234, 254),
    stripe_bg: Color::Rgb(243, 240, 232),
    status: Color::Rgb(29, 78, 216),
    error: Color::Rgb(185, 28, 28),
    key_fg: Color::Rgb(250, 248, 242),
    key_bg: Color::Rgb(130, 128, 120),
    checked: Color::Rgb(37, 99, 235),
  },
];

/// Index of the theme called `name`, falling back to the first one.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name.eq_ignore_ascii_case(n))).unwrap_or(0)
}
