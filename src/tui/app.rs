use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::api::{AskError, AskResponse};
use crate::auth::User;
use crate::chat::{Chat, SessionStore};
use crate::context::AppContext;
use crate::exchange::{self, PendingTurn};
use crate::tui::ui::render_ui;

type Answer = (PendingTurn, Result<AskResponse, AskError>);

/// Input mode for the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// TUI application state
pub struct AalimApp {
    ctx: AppContext,
    store: SessionStore,

    // Input state
    input: String,
    input_history: Vec<String>,
    input_history_index: usize,
    input_mode: InputMode,

    // Sidebar state
    sidebar_open: bool,
    sidebar_cursor: usize,

    // Lines scrolled up from the bottom of the conversation
    scroll_back: u16,

    // Question waiting for its answer, if any
    in_flight: Option<PendingTurn>,
    answers_tx: mpsc::UnboundedSender<Answer>,
    answers_rx: mpsc::UnboundedReceiver<Answer>,

    user_rx: watch::Receiver<Option<User>>,
    current_user: Option<User>,

    notice: Option<String>,
    should_quit: bool,
}

impl AalimApp {
    pub fn new(ctx: AppContext, store: SessionStore) -> Self {
        let (answers_tx, answers_rx) = mpsc::unbounded_channel();
        let user_rx = ctx.auth.subscribe();
        let current_user = ctx.auth.current_user().cloned();

        let mut app = Self {
            ctx,
            store,
            input: String::new(),
            input_history: Vec::new(),
            input_history_index: 0,
            input_mode: InputMode::Editing,
            sidebar_open: true,
            sidebar_cursor: 0,
            scroll_back: 0,
            in_flight: None,
            answers_tx,
            answers_rx,
            user_rx,
            current_user,
            notice: None,
            should_quit: false,
        };
        app.sync_cursor();
        app
    }

    pub fn chats(&self) -> &[Chat] {
        self.store.chats()
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.store.active_chat()
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.store.active_chat_id()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Chat that the outstanding question belongs to
    pub fn loading_chat_id(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|t| t.chat_id.as_str())
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn sidebar_cursor(&self) -> usize {
        self.sidebar_cursor
    }

    pub fn scroll_back(&self) -> u16 {
        self.scroll_back
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn is_dark_mode(&self) -> bool {
        self.ctx.theme.is_dark_mode()
    }

    pub fn theme_mode(&self) -> crate::theme::ThemeMode {
        self.ctx.theme.mode()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn backend_name(&self) -> &str {
        self.store.backend_name()
    }

    fn handle_input(&mut self, c: char) {
        self.input.push(c);
    }

    fn backspace(&mut self) {
        self.input.pop();
    }

    /// Go to the previous input in history
    fn previous_input(&mut self) {
        if self.input_history.is_empty() {
            return;
        }

        if self.input_history_index > 0 {
            self.input_history_index -= 1;
            self.input = self.input_history[self.input_history_index].clone();
        }
    }

    /// Go to the next input in history
    fn next_input(&mut self) {
        if self.input_history.is_empty() {
            return;
        }

        if self.input_history_index < self.input_history.len() - 1 {
            self.input_history_index += 1;
            self.input = self.input_history[self.input_history_index].clone();
        } else {
            self.input_history_index = self.input_history.len();
            self.input.clear();
        }
    }

    /// Records the question and sends it in the background
    async fn submit_message(&mut self) {
        if self.input.trim().is_empty() || self.is_loading() {
            return;
        }

        let question = std::mem::take(&mut self.input);
        self.input_history.push(question.clone());
        self.input_history_index = self.input_history.len();

        let Some(turn) = exchange::begin(&mut self.store, &question).await else {
            return;
        };
        self.scroll_back = 0;
        self.notice = None;

        let exchange = self.ctx.exchange.clone();
        let token = self.ctx.auth_token();
        let tx = self.answers_tx.clone();
        let sent = turn.clone();
        tokio::spawn(async move {
            let result = exchange.send(&sent, token).await;
            let _ = tx.send((sent, result));
        });

        debug!(chat_id = %turn.chat_id, "question in flight");
        self.in_flight = Some(turn);
    }

    /// Applies any answers that have arrived
    async fn drain_answers(&mut self) {
        while let Ok((turn, result)) = self.answers_rx.try_recv() {
            exchange::complete(&mut self.store, &turn, result).await;
            if self.in_flight.as_ref() == Some(&turn) {
                self.in_flight = None;
            }
        }
    }

    fn sync_user(&mut self) {
        if self.user_rx.has_changed().unwrap_or(false) {
            self.current_user = self.user_rx.borrow_and_update().clone();
        }
    }

    fn sync_cursor(&mut self) {
        if let Some(id) = self.store.active_chat_id() {
            if let Some(index) = self.store.chats().iter().position(|c| c.id == id) {
                self.sidebar_cursor = index;
            }
        }
    }

    async fn new_chat(&mut self) {
        self.store.new_chat().await;
        self.sync_cursor();
        self.scroll_back = 0;
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.store.chats().len();
        if len == 0 {
            return;
        }
        let next = self.sidebar_cursor as isize + delta;
        self.sidebar_cursor = next.clamp(0, len as isize - 1) as usize;
    }

    async fn select_at_cursor(&mut self) {
        let Some(id) = self.store.chats().get(self.sidebar_cursor).map(|c| c.id.clone()) else {
            return;
        };
        if self.store.select_chat(&id).await {
            self.scroll_back = 0;
        }
    }

    async fn toggle_theme(&mut self) {
        let mode = self.ctx.theme.toggle().await;
        info!(theme = mode.as_str(), "theme toggled");
    }

    async fn sign_out(&mut self) {
        if self.ctx.auth.current_user().is_none() {
            self.notice = Some("Not signed in".to_string());
            return;
        }
        if self.is_loading() {
            self.notice = Some("Wait for the current answer before signing out".to_string());
            return;
        }
        self.ctx.auth.logout().await;
        self.store = self.ctx.open_store().await;
        self.sync_cursor();
        self.notice = Some("Signed out".to_string());
    }

    async fn handle_key(&mut self, code: KeyCode) {
        match self.input_mode {
            InputMode::Normal => match code {
                KeyCode::Char('e') | KeyCode::Char('i') => self.input_mode = InputMode::Editing,
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('n') => self.new_chat().await,
                KeyCode::Char('t') => self.toggle_theme().await,
                KeyCode::Char('b') => self.sidebar_open = !self.sidebar_open,
                KeyCode::Char('o') => self.sign_out().await,
                KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1),
                KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1),
                KeyCode::Enter => self.select_at_cursor().await,
                KeyCode::PageUp => self.scroll_back = self.scroll_back.saturating_add(5),
                KeyCode::PageDown => self.scroll_back = self.scroll_back.saturating_sub(5),
                _ => {}
            },
            InputMode::Editing => match code {
                KeyCode::Enter => self.submit_message().await,
                KeyCode::Esc => self.input_mode = InputMode::Normal,
                KeyCode::Char(c) => self.handle_input(c),
                KeyCode::Backspace => self.backspace(),
                KeyCode::Up => self.previous_input(),
                KeyCode::Down => self.next_input(),
                KeyCode::PageUp => self.scroll_back = self.scroll_back.saturating_add(5),
                KeyCode::PageDown => self.scroll_back = self.scroll_back.saturating_sub(5),
                _ => {}
            },
        }
    }
}

/// Run the TUI application
pub async fn run(ctx: AppContext) -> Result<()> {
    let tick_rate = ctx.config.tick_rate();
    let store = ctx.open_store().await;
    let mut app = AalimApp::new(ctx, store);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, tick_rate).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AalimApp,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();
    loop {
        app.drain_answers().await;
        app.sync_user();

        terminal.draw(|f| render_ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code).await;
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}
