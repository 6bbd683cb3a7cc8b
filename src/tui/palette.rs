use ratatui::style::{Color, Modifier, Style};

use crate::theme::ThemeMode;

/// Colours for one theme
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub user: Color,
    pub assistant: Color,
    pub error: Color,
    pub code: Color,
    pub selection: Color,
}

impl Palette {
    pub fn for_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self {
                background: Color::Rgb(26, 26, 26),
                text: Color::Gray,
                muted: Color::DarkGray,
                accent: Color::Rgb(16, 185, 129),
                user: Color::Cyan,
                assistant: Color::Rgb(16, 185, 129),
                error: Color::LightRed,
                code: Color::Yellow,
                selection: Color::Rgb(55, 65, 81),
            },
            ThemeMode::Light => Self {
                background: Color::White,
                text: Color::Black,
                muted: Color::Gray,
                accent: Color::Rgb(5, 150, 105),
                user: Color::Blue,
                assistant: Color::Rgb(5, 150, 105),
                error: Color::Red,
                code: Color::Magenta,
                selection: Color::Rgb(229, 231, 235),
            },
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.text).bg(self.background)
    }

    pub fn heading(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn code(&self) -> Style {
        Style::default().fg(self.code)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.muted)
    }
}
