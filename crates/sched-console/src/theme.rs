use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const MUTED: Color = Color::Rgb(146, 131, 116);
pub const ACCENT: Color = Color::Rgb(131, 165, 152);
pub const WARN: Color = Color::Rgb(250, 189, 47);
pub const ERROR: Color = Color::Rgb(251, 73, 52);
pub const OK: Color = Color::Rgb(184, 187, 38);

pub fn zebra_row_style(index: usize) -> Style {
    let bg = if index % 2 == 0 {
        Color::Rgb(18, 20, 26)
    } else {
        Color::Rgb(24, 27, 34)
    };
    Style::new().bg(bg)
}

pub mod icons {
    pub const ENABLED: &str = "on";
    pub const DISABLED: &str = "off";
    pub const LOADING: &str = "...";
    pub const STALE: &str = "*";
}

pub fn enabled_color(enabled: bool) -> Color {
    if enabled {
        OK
    } else {
        MUTED
    }
}

/// Backend-reported run status.
pub fn status_color(status: &str) -> Color {
    match status.to_lowercase().as_str() {
        "running" | "enabled" | "ok" => OK,
        "stopped" | "disabled" => MUTED,
        "" => MUTED,
        _ => WARN,
    }
}
