use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::chat::{DeliveryStatus, Message, Role};
use crate::tui::{
    app::{AalimApp, InputMode},
    markdown,
    palette::Palette,
};

const SIDEBAR_WIDTH: u16 = 30;

/// Render the main UI
pub fn render_ui(f: &mut Frame, app: &AalimApp) {
    let palette = Palette::for_mode(app.theme_mode());
    f.render_widget(Block::default().style(palette.base()), f.size());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Sidebar and conversation
            Constraint::Length(1), // Status line
            Constraint::Length(3), // Input box
        ])
        .split(f.size());

    render_header(f, app, &palette, chunks[0]);

    if app.sidebar_open() {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(10)])
            .split(chunks[1]);
        render_sidebar(f, app, &palette, body[0]);
        render_messages(f, app, &palette, body[1]);
    } else {
        render_messages(f, app, &palette, chunks[1]);
    }

    render_status_line(f, app, &palette, chunks[2]);
    render_input_box(f, app, &palette, chunks[3]);
}

fn render_header(f: &mut Frame, app: &AalimApp, palette: &Palette, area: Rect) {
    let account = match app.current_user() {
        Some(user) => Span::styled(user.label().to_string(), Style::default().fg(palette.user)),
        None => Span::styled("Guest", palette.dim()),
    };
    let theme = if app.is_dark_mode() { "dark" } else { "light" };

    let header = Line::from(vec![
        Span::styled("Aalim AI", palette.heading()),
        Span::styled(" | ", palette.dim()),
        account,
        Span::styled(" | Theme: ", palette.dim()),
        Span::raw(theme),
        Span::styled(" | Storage: ", palette.dim()),
        Span::raw(app.backend_name().to_string()),
    ]);

    let title = app
        .active_chat()
        .map(|c| c.display_title().to_string())
        .unwrap_or_default();

    let widget = Paragraph::new(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(palette.dim())
            .title(title),
    );
    f.render_widget(widget, area);
}

fn render_sidebar(f: &mut Frame, app: &AalimApp, palette: &Palette, area: Rect) {
    let active = app.active_chat_id();
    let items: Vec<ListItem> = app
        .chats()
        .iter()
        .map(|chat| {
            let marker = if Some(chat.id.as_str()) == active { "● " } else { "  " };
            let style = if Some(chat.id.as_str()) == active {
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.text)
            };
            let mut spans = vec![Span::styled(marker, style)];
            spans.push(Span::styled(chat.display_title().to_string(), style));
            if app.loading_chat_id() == Some(chat.id.as_str()) {
                spans.push(Span::styled(" …", palette.dim()));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let focused = app.input_mode() == InputMode::Normal;
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if focused {
                    Style::default().fg(palette.accent)
                } else {
                    palette.dim()
                })
                .title("Chats"),
        )
        .highlight_style(Style::default().bg(palette.selection));

    let mut state = ListState::default();
    if focused {
        state.select(Some(app.sidebar_cursor()));
    }
    f.render_stateful_widget(list, area, &mut state);
}

/// Lines for one message: a role line and the rendered body
fn message_lines(message: &Message, palette: &Palette) -> Vec<Line<'static>> {
    let (name, color) = match message.role {
        Role::User => ("You", palette.user),
        Role::Assistant => ("Aalim", palette.assistant),
    };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M").to_string();

    let mut header = vec![
        Span::styled(name, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}", time), palette.dim()),
    ];
    match message.status {
        DeliveryStatus::Pending => header.push(Span::styled("  sending…", palette.dim())),
        DeliveryStatus::Failed => {
            header.push(Span::styled("  not delivered", Style::default().fg(palette.error)))
        }
        DeliveryStatus::Confirmed => {}
    }

    let mut lines = vec![Line::from(header)];
    match message.role {
        Role::Assistant => lines.extend(markdown::render(&message.content, palette)),
        Role::User => lines.extend(
            message
                .content
                .lines()
                .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(palette.text)))),
        ),
    }
    lines.push(Line::default());
    lines
}

/// Rows the lines occupy once wrapped to `width`
fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|line| (line.width().max(1) + width - 1) / width)
        .sum();
    rows.min(u16::MAX as usize) as u16
}

fn render_messages(f: &mut Frame, app: &AalimApp, palette: &Palette, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    if let Some(chat) = app.active_chat() {
        for message in &chat.messages {
            lines.extend(message_lines(message, palette));
        }
        if app.loading_chat_id() == Some(chat.id.as_str()) {
            lines.push(Line::from(Span::styled(
                "Aalim is thinking…",
                palette.dim().add_modifier(Modifier::ITALIC),
            )));
        }
    }

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let total = wrapped_height(&lines, inner_width);
    let bottom = total.saturating_sub(inner_height);
    let offset = bottom.saturating_sub(app.scroll_back());

    let widget = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(palette.dim())
                .title("Conversation"),
        )
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    f.render_widget(widget, area);
}

fn render_status_line(f: &mut Frame, app: &AalimApp, palette: &Palette, area: Rect) {
    let line = if let Some(notice) = app.notice() {
        Line::from(Span::styled(notice.to_string(), Style::default().fg(palette.accent)))
    } else {
        let help = match app.input_mode() {
            InputMode::Editing => "Enter send · Esc menu · ↑/↓ history · PgUp/PgDn scroll",
            InputMode::Normal => {
                "e edit · n new · j/k move · Enter open · t theme · b sidebar · o sign out · q quit"
            }
        };
        Line::from(Span::styled(help, palette.dim()))
    };
    f.render_widget(Paragraph::new(line), area);
}

/// Render the input box
fn render_input_box(f: &mut Frame, app: &AalimApp, palette: &Palette, area: Rect) {
    let editing = app.input_mode() == InputMode::Editing;
    let title = if app.is_loading() {
        "Waiting for answer…"
    } else {
        "Ask about Islam"
    };

    let input = Paragraph::new(app.input().to_string())
        .style(Style::default().fg(palette.text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(if app.is_loading() || !editing {
                    palette.dim()
                } else {
                    Style::default().fg(palette.accent)
                }),
        );

    f.render_widget(input, area);

    // Show cursor only when typing is possible
    if editing && !app.is_loading() {
        f.set_cursor(
            area.x + Line::from(app.input()).width() as u16 + 1,
            area.y + 1,
        );
    }
}
