use pulldown_cmark::{Event, Parser, Tag};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::tui::palette::Palette;

/// Turns a markdown message body into styled terminal lines.
pub fn render(text: &str, palette: &Palette) -> Vec<Line<'static>> {
    let mut renderer = Renderer::new(palette);
    for event in Parser::new(text) {
        renderer.handle(event);
    }
    renderer.finish()
}

struct Renderer<'p> {
    palette: &'p Palette,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
}

impl<'p> Renderer<'p> {
    fn new(palette: &'p Palette) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            current: Vec::new(),
            styles: vec![Style::default()],
            lists: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: Style) {
        let merged = self.style().patch(style);
        self.styles.push(merged);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.current.len() + 1);
        if self.quote_depth > 0 {
            spans.push(Span::styled("│ ".repeat(self.quote_depth), self.palette.dim()));
        }
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        let last_is_blank = self.lines.last().map_or(true, |l| l.spans.is_empty());
        if !last_is_blank {
            self.lines.push(Line::default());
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    for line in text.lines() {
                        self.current
                            .push(Span::styled(format!("  {}", line), self.palette.code()));
                        self.flush();
                    }
                } else {
                    self.current.push(Span::styled(text.to_string(), self.style()));
                }
            }
            Event::Code(code) => {
                let style = self.style().patch(self.palette.code());
                self.current.push(Span::styled(code.to_string(), style));
            }
            Event::SoftBreak => self.current.push(Span::raw(" ")),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines
                    .push(Line::from(Span::styled("─".repeat(24), self.palette.dim())));
                self.blank();
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading(..) => {
                self.flush();
                self.push_style(self.palette.heading());
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth += 1;
                self.push_style(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                let style = Style::default().fg(self.palette.accent);
                self.current.push(Span::styled(marker, style));
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link(..) => self.push_style(Style::default().add_modifier(Modifier::UNDERLINED)),
            _ => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Tag::Heading(..) => {
                self.flush();
                self.pop_style();
                self.blank();
            }
            Tag::BlockQuote => {
                self.flush();
                self.pop_style();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.blank();
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.in_code_block = false;
                self.blank();
            }
            Tag::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Tag::Item => self.flush(),
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough => self.pop_style(),
            Tag::Link(_, url, _) => {
                self.pop_style();
                self.current
                    .push(Span::styled(format!(" ({})", url), self.palette.dim()));
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}
