// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acadmin_app::{
    AppCommand, AppEvent, AppMode, AppState, ApplyOutcome, Audited, ChatPanel, ChatReply,
    ChatRole, ChatSession, ChatSessionDetail, ChatSessionId, ChatVisibility, ConfirmDialog,
    DEFAULT_PAGE_SIZE, DeleteRequest, EntityKind, FetchTicket, FieldKind, FormDraft, FormModal,
    ListController, ListQuery, Notification, Page, REVEAL_INTERVAL, ReceiveOutcome, Record,
    RecordId, SEARCH_DEBOUNCE, SendRejected, SendRequest, SubmitBlocked, SubmitOutcome,
    Submission, TYPING_INTERVAL, field_specs, save_notification,
};
use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use time::{Date, OffsetDateTime};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const MAX_TABLE_COLUMNS: usize = 6;
const CHAT_SCROLLBACK: usize = 12;
const FLAG_CHOICES: &[&str] = &["yes", "no"];

/// Front-end tunables, filled from the `[api]` and `[ui]` config sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuiOptions {
    pub page_size: u32,
    pub search_debounce: Duration,
    pub reveal_interval: Duration,
    pub typing_interval: Duration,
    pub chat_topic: Option<String>,
}

impl Default for TuiOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: SEARCH_DEBOUNCE,
            reveal_interval: REVEAL_INTERVAL,
            typing_interval: TYPING_INTERVAL,
            chat_topic: None,
        }
    }
}

/// Everything the front end needs from the outside world. The `spawn_*`
/// methods default to running the call inline and posting the result; real
/// runtimes move the call to a worker thread.
pub trait AppRuntime {
    fn fetch_page(&mut self, kind: EntityKind, query: &ListQuery) -> Result<Page<Record>>;
    fn submit_form(&mut self, submission: &Submission) -> Result<()>;
    fn delete_record(&mut self, kind: EntityKind, id: &RecordId) -> Result<()>;
    fn send_chat(&mut self, request: &SendRequest) -> Result<ChatReply>;
    fn load_chat_session(&mut self, id: &ChatSessionId) -> Result<ChatSessionDetail>;
    fn list_chat_sessions(&mut self, page_number: u32) -> Result<Page<ChatSession>>;
    fn delete_chat_session(&mut self, id: &ChatSessionId) -> Result<()>;

    fn today(&self) -> Date {
        OffsetDateTime::now_utc().date()
    }

    fn spawn_fetch(
        &mut self,
        kind: EntityKind,
        ticket: FetchTicket,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = self.fetch_page(kind, &ticket.query).map_err(error_text);
        tx.send(InternalEvent::PageLoaded {
            kind,
            seq: ticket.seq,
            result,
        })
        .map_err(|_| anyhow!("list event channel closed"))?;
        Ok(())
    }

    fn spawn_submit(&mut self, submission: Submission, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.submit_form(&submission).map_err(error_text);
        tx.send(InternalEvent::Submitted {
            kind: submission.kind(),
            update: submission.is_update(),
            result,
        })
        .map_err(|_| anyhow!("form event channel closed"))?;
        Ok(())
    }

    fn spawn_delete(&mut self, request: DeleteRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .delete_record(request.kind, &request.id)
            .map_err(error_text);
        tx.send(InternalEvent::Deleted { request, result })
            .map_err(|_| anyhow!("delete event channel closed"))?;
        Ok(())
    }

    fn spawn_chat(&mut self, request: SendRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.send_chat(&request).map_err(error_text);
        tx.send(InternalEvent::ChatReplied {
            request_id: request.request_id,
            result,
        })
        .map_err(|_| anyhow!("chat event channel closed"))?;
        Ok(())
    }

    fn spawn_list_sessions(&mut self, page_number: u32, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.list_chat_sessions(page_number).map_err(error_text);
        tx.send(InternalEvent::SessionsListed { result })
            .map_err(|_| anyhow!("session list event channel closed"))?;
        Ok(())
    }

    fn spawn_load_session(&mut self, id: ChatSessionId, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.load_chat_session(&id).map_err(error_text);
        tx.send(InternalEvent::SessionLoaded { id, result })
            .map_err(|_| anyhow!("session load event channel closed"))?;
        Ok(())
    }

    fn spawn_delete_session(&mut self, id: ChatSessionId, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.delete_chat_session(&id).map_err(error_text);
        tx.send(InternalEvent::SessionDeleted { id, result })
            .map_err(|_| anyhow!("session delete event channel closed"))?;
        Ok(())
    }
}

/// Flattens an error chain for transport over the internal channel.
pub fn error_text(error: anyhow::Error) -> String {
    format!("{error:#}")
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    PageLoaded {
        kind: EntityKind,
        seq: u64,
        result: Result<Page<Record>, String>,
    },
    Submitted {
        kind: EntityKind,
        update: bool,
        result: Result<(), String>,
    },
    Deleted {
        request: DeleteRequest,
        result: Result<(), String>,
    },
    ChatReplied {
        request_id: u64,
        result: Result<ChatReply, String>,
    },
    SessionsListed {
        result: Result<Page<ChatSession>, String>,
    },
    SessionLoaded {
        id: ChatSessionId,
        result: Result<ChatSessionDetail, String>,
    },
    SessionDeleted {
        id: ChatSessionId,
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct SessionPickerUiState {
    visible: bool,
    loading: bool,
    sessions: Vec<ChatSession>,
    cursor: usize,
    opening: Option<ChatSessionId>,
}

#[derive(Debug)]
struct ViewData {
    lists: HashMap<EntityKind, ListController<Record>>,
    page_size: u32,
    search_debounce: Duration,
    reveal_interval: Duration,
    last_reveal: Option<Instant>,
    form: Option<FormModal>,
    confirm: ConfirmDialog,
    chat: ChatPanel,
    sessions: SessionPickerUiState,
    help_visible: bool,
    status_token: u64,
}

impl ViewData {
    fn new(options: &TuiOptions) -> Self {
        Self {
            lists: HashMap::new(),
            page_size: options.page_size,
            search_debounce: options.search_debounce,
            reveal_interval: options.reveal_interval,
            last_reveal: None,
            form: None,
            confirm: ConfirmDialog::default(),
            chat: ChatPanel::new(options.chat_topic.clone(), options.typing_interval),
            sessions: SessionPickerUiState::default(),
            help_visible: false,
            status_token: 0,
        }
    }

    fn list(&self, kind: EntityKind) -> Option<&ListController<Record>> {
        self.lists.get(&kind)
    }

    fn list_mut(&mut self, kind: EntityKind) -> &mut ListController<Record> {
        let (page_size, debounce) = (self.page_size, self.search_debounce);
        self.lists
            .entry(kind)
            .or_insert_with(|| ListController::new(page_size, debounce))
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: &TuiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let result = match Terminal::new(backend).context("create terminal") {
        Ok(mut terminal) => event_loop(&mut terminal, state, runtime, options),
        Err(error) => Err(error),
    };

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn event_loop<R: AppRuntime>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    runtime: &mut R,
    options: &TuiOptions,
) -> Result<()> {
    let mut view_data = ViewData::new(options);
    let (internal_tx, internal_rx) = mpsc::channel();

    let first_tab = state.active_tab;
    reload_list(state, runtime, &mut view_data, &internal_tx, first_tab);

    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);
        advance_timers(state, runtime, &mut view_data, &internal_tx, Instant::now());

        terminal
            .draw(|frame| render(frame, state, &view_data))
            .context("draw frame")?;

        if event::poll(POLL_INTERVAL).context("poll event")?
            && let Event::Key(key) = event::read().context("read event")?
            && handle_key_event(state, runtime, &mut view_data, &internal_tx, key)
        {
            return Ok(());
        }
    }
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::PageLoaded { kind, seq, result } => {
                let outcome = view_data
                    .list_mut(kind)
                    .apply(seq, result.map_err(anyhow::Error::msg));
                if let ApplyOutcome::Failed(error) = outcome {
                    emit_status(
                        state,
                        view_data,
                        tx,
                        Notification::failure(format!("{} load failed: {error}", kind.noun())),
                    );
                }
            }
            InternalEvent::Submitted {
                kind,
                update,
                result,
            } => {
                handle_submit_result(state, runtime, view_data, tx, kind, update, result);
            }
            InternalEvent::Deleted { request, result } => {
                let result = result.map_err(anyhow::Error::msg);
                let notification = request.outcome(&result);
                if result.is_ok() {
                    reload_list(state, runtime, view_data, tx, request.kind);
                }
                emit_status(state, view_data, tx, notification);
            }
            InternalEvent::ChatReplied { request_id, result } => {
                let outcome = view_data
                    .chat
                    .receive(request_id, result.map_err(anyhow::Error::msg));
                if let ReceiveOutcome::Failed(error) = outcome {
                    emit_status(
                        state,
                        view_data,
                        tx,
                        Notification::failure(format!("chat failed: {error}")),
                    );
                }
            }
            InternalEvent::SessionsListed { result } => {
                let picker = &mut view_data.sessions;
                if !picker.loading {
                    continue;
                }
                picker.loading = false;
                match result {
                    Ok(page) => {
                        picker.sessions = page.items;
                        picker.cursor = 0;
                    }
                    Err(error) => {
                        picker.visible = false;
                        emit_status(
                            state,
                            view_data,
                            tx,
                            Notification::failure(format!("chat sessions failed to load: {error}")),
                        );
                    }
                }
            }
            InternalEvent::SessionLoaded { id, result } => {
                if view_data.sessions.opening.as_ref() != Some(&id) {
                    continue;
                }
                view_data.sessions.opening = None;
                match result {
                    Ok(detail) => {
                        view_data.chat.load(detail);
                        view_data.sessions.visible = false;
                    }
                    Err(error) => emit_status(
                        state,
                        view_data,
                        tx,
                        Notification::failure(format!("chat session failed to load: {error}")),
                    ),
                }
            }
            InternalEvent::SessionDeleted { id, result } => {
                let notification = match result {
                    Ok(()) => {
                        let picker = &mut view_data.sessions;
                        picker.sessions.retain(|session| session.id != id);
                        picker.cursor = picker.cursor.min(picker.sessions.len().saturating_sub(1));
                        view_data.chat.forget_session(&id);
                        Notification::success("chat session deleted")
                    }
                    Err(error) => {
                        Notification::failure(format!("chat session delete failed: {error}"))
                    }
                };
                emit_status(state, view_data, tx, notification);
            }
        }
    }
}

fn handle_submit_result<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    kind: EntityKind,
    update: bool,
    result: Result<(), String>,
) {
    let result = result.map_err(anyhow::Error::msg);
    let Some(form) = view_data
        .form
        .as_mut()
        .filter(|form| form.is_pending() && form.draft.kind() == kind)
    else {
        // The modal was dismissed while the call was in flight.
        let notification = save_notification(kind, update, &result);
        if result.is_ok() {
            reload_list(state, runtime, view_data, tx, kind);
        }
        emit_status(state, view_data, tx, notification);
        return;
    };

    let mut refresh = false;
    let outcome = form.finish_submit(result, || refresh = true);
    if refresh {
        reload_list(state, runtime, view_data, tx, kind);
    }
    match outcome {
        SubmitOutcome::Saved(notification) => {
            view_data.form = None;
            dispatch_and_refresh(state, runtime, view_data, tx, AppCommand::ExitToNav);
            emit_status(state, view_data, tx, notification);
        }
        SubmitOutcome::Failed(notification) => emit_status(state, view_data, tx, notification),
    }
}

fn advance_timers<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    now: Instant,
) {
    let due = view_data
        .lists
        .iter_mut()
        .filter_map(|(kind, list)| list.poll(now).map(|ticket| (*kind, ticket)))
        .collect::<Vec<_>>();
    for (kind, ticket) in due {
        request_page(state, runtime, view_data, tx, kind, ticket);
    }

    let interval = view_data.reveal_interval;
    let due = view_data
        .last_reveal
        .is_none_or(|last| now.saturating_duration_since(last) >= interval);
    if due && view_data.chat.tick() {
        view_data.last_reveal = Some(now);
    }
}

fn request_page<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    kind: EntityKind,
    ticket: FetchTicket,
) {
    tracing::debug!(
        kind = kind.collection(),
        seq = ticket.seq,
        page = ticket.query.page_number,
        "requesting page"
    );
    if let Err(error) = runtime.spawn_fetch(kind, ticket, tx.clone()) {
        emit_status(
            state,
            view_data,
            tx,
            Notification::failure(format!("{} load failed: {error:#}", kind.noun())),
        );
    }
}

/// Refetches `kind` with the current deleted filter applied.
fn reload_list<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    kind: EntityKind,
) {
    let show_deleted = state.show_deleted;
    let list = view_data.list_mut(kind);
    let ticket = match list.set_show_deleted(show_deleted) {
        Some(ticket) => ticket,
        None => list.refresh(),
    };
    request_page(state, runtime, view_data, tx, kind, ticket);
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    notification: Notification,
) {
    state.dispatch(AppCommand::Notify(notification));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn dispatch_and_refresh<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    for event in &events {
        match event {
            AppEvent::TabChanged(kind) => {
                reload_list(state, runtime, view_data, internal_tx, *kind);
            }
            AppEvent::DeletedFilterChanged(_) => {
                let kind = state.active_tab;
                reload_list(state, runtime, view_data, internal_tx, kind);
            }
            AppEvent::AccessDenied(kind) => {
                tracing::debug!(kind = kind.collection(), "navigation denied for role");
            }
            _ => {}
        }
    }
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('q') {
        return true;
    }

    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }

    if state.chat == ChatVisibility::Visible {
        handle_chat_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    match state.mode {
        AppMode::Nav => return handle_nav_key(state, runtime, view_data, internal_tx, key),
        AppMode::Search => handle_search_key(state, runtime, view_data, internal_tx, key),
        AppMode::Form(_) => handle_form_key(state, runtime, view_data, internal_tx, key),
        AppMode::Confirm => handle_confirm_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let kind = state.active_tab;
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Tab => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::NextTab);
        }
        KeyCode::BackTab => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::PrevTab);
        }
        KeyCode::Char('j') | KeyCode::Down => view_data.list_mut(kind).move_selection(1),
        KeyCode::Char('k') | KeyCode::Up => view_data.list_mut(kind).move_selection(-1),
        KeyCode::Char('n') | KeyCode::PageDown => {
            let ticket = view_data.list_mut(kind).next_page();
            follow_ticket(state, runtime, view_data, internal_tx, kind, ticket);
        }
        KeyCode::Char('p') | KeyCode::PageUp => {
            let ticket = view_data.list_mut(kind).prev_page();
            follow_ticket(state, runtime, view_data, internal_tx, kind, ticket);
        }
        KeyCode::Char('g') | KeyCode::Home => {
            let ticket = view_data.list_mut(kind).go_to_page(1);
            follow_ticket(state, runtime, view_data, internal_tx, kind, ticket);
        }
        KeyCode::Char('G') | KeyCode::End => {
            let list = view_data.list_mut(kind);
            let last = list.total_pages();
            let ticket = list.go_to_page(last);
            follow_ticket(state, runtime, view_data, internal_tx, kind, ticket);
        }
        KeyCode::Char('/') => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::EnterSearch);
        }
        KeyCode::Char('s') => {
            let ticket = view_data.list_mut(kind).cycle_sort_field(kind.sort_fields());
            follow_ticket(state, runtime, view_data, internal_tx, kind, ticket);
        }
        KeyCode::Char('S') => {
            let ticket = view_data.list_mut(kind).toggle_sort_direction();
            request_page(state, runtime, view_data, internal_tx, kind, ticket);
        }
        KeyCode::Char('x') => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::ToggleDeleted);
        }
        KeyCode::Char('r') => reload_list(state, runtime, view_data, internal_tx, kind),
        KeyCode::Char('a') => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::OpenForm(kind));
            if state.mode == AppMode::Form(kind) {
                view_data.form = Some(FormModal::create(kind));
            }
        }
        KeyCode::Char('e') | KeyCode::Enter => {
            open_edit_form(state, runtime, view_data, internal_tx, kind);
        }
        KeyCode::Char('d') => open_delete_confirm(state, runtime, view_data, internal_tx, kind),
        KeyCode::Char('c') | KeyCode::Char('@') => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::OpenChat);
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        _ => {}
    }
    false
}

fn follow_ticket<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: EntityKind,
    ticket: Option<FetchTicket>,
) {
    if let Some(ticket) = ticket {
        request_page(state, runtime, view_data, internal_tx, kind, ticket);
    }
}

fn open_edit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: EntityKind,
) {
    let Some(record) = view_data.list_mut(kind).selected_item().cloned() else {
        emit_status(
            state,
            view_data,
            internal_tx,
            Notification::failure(format!("no {} selected", kind.noun())),
        );
        return;
    };
    dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::OpenForm(kind));
    if state.mode == AppMode::Form(kind) {
        view_data.form = Some(FormModal::edit(&record));
    }
}

fn open_delete_confirm<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: EntityKind,
) {
    let Some(record) = view_data.list_mut(kind).selected_item() else {
        emit_status(
            state,
            view_data,
            internal_tx,
            Notification::failure(format!("no {} selected", kind.noun())),
        );
        return;
    };
    if record.is_deleted() {
        let message = format!("{} {} is already deleted", kind.noun(), record.label());
        emit_status(state, view_data, internal_tx, Notification::failure(message));
        return;
    }
    let request = DeleteRequest {
        kind,
        id: record.id(),
        label: record.label(),
    };
    view_data.confirm.open(request);
    dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::OpenConfirm);
}

fn handle_search_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let kind = state.active_tab;
    let now = Instant::now();
    match key.code {
        KeyCode::Enter => {
            let ticket = view_data.list_mut(kind).commit_search();
            follow_ticket(state, runtime, view_data, internal_tx, kind, ticket);
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::ExitToNav);
        }
        KeyCode::Esc => {
            let list = view_data.list_mut(kind);
            list.type_search("", now);
            let ticket = list.commit_search();
            follow_ticket(state, runtime, view_data, internal_tx, kind, ticket);
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::ExitToNav);
        }
        KeyCode::Backspace => {
            let list = view_data.list_mut(kind);
            let mut text = list.search_input().to_owned();
            text.pop();
            list.type_search(text, now);
        }
        KeyCode::Char(ch) => {
            let list = view_data.list_mut(kind);
            let mut text = list.search_input().to_owned();
            text.push(ch);
            list.type_search(text, now);
        }
        _ => {}
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if key.code == KeyCode::Esc {
        view_data.form = None;
        dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::ExitToNav);
        return;
    }
    if key.code == KeyCode::Enter
        || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s'))
    {
        submit_form(state, runtime, view_data, internal_tx);
        return;
    }

    let Some(form) = view_data.form.as_mut() else {
        dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::ExitToNav);
        return;
    };
    match key.code {
        KeyCode::Tab | KeyCode::Down => form.move_cursor(1),
        KeyCode::BackTab | KeyCode::Up => form.move_cursor(-1),
        KeyCode::Left => cycle_choice(form, -1),
        KeyCode::Right => cycle_choice(form, 1),
        KeyCode::Backspace => {
            if let Some(value) = form.current_value_mut() {
                value.pop();
            }
        }
        KeyCode::Char(ch) => {
            if let Some(value) = form.current_value_mut() {
                value.push(ch);
            }
        }
        _ => {}
    }
}

/// Steps a flag or choice field through its allowed values.
fn cycle_choice(form: &mut FormModal, delta: isize) {
    let Some(spec) = form.draft.specs().get(form.cursor) else {
        return;
    };
    let options = match spec.kind {
        FieldKind::Flag => FLAG_CHOICES,
        FieldKind::Choice(options) => options,
        _ => return,
    };
    let Some(value) = form.current_value_mut() else {
        return;
    };
    let len = options.len() as isize;
    let next = match options
        .iter()
        .position(|option| option.eq_ignore_ascii_case(value.trim()))
    {
        Some(index) => (index as isize + delta).rem_euclid(len),
        None => 0,
    };
    *value = options[next as usize].to_owned();
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let today = runtime.today();
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    let notification = match form.begin_submit(today) {
        Ok(submission) => match runtime.spawn_submit(submission, internal_tx.clone()) {
            Ok(()) => None,
            Err(error) => match form.finish_submit(Err(error), || {}) {
                SubmitOutcome::Saved(notification) | SubmitOutcome::Failed(notification) => {
                    Some(notification)
                }
            },
        },
        Err(SubmitBlocked::InFlight) => Some(Notification::failure("still saving")),
        Err(SubmitBlocked::Invalid(errors)) => Some(Notification::failure(format!(
            "{} field(s) need attention",
            errors.len()
        ))),
    };
    if let Some(notification) = notification {
        emit_status(state, view_data, internal_tx, notification);
    }
}

fn handle_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            let request = view_data.confirm.confirm();
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::ExitToNav);
            if let Some(request) = request {
                tracing::info!(
                    kind = request.kind.collection(),
                    id = %request.id,
                    "deleting record"
                );
                if let Err(error) = runtime.spawn_delete(request, internal_tx.clone()) {
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        Notification::failure(format!("delete failed: {error:#}")),
                    );
                }
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_data.confirm.cancel();
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::ExitToNav);
        }
        _ => {}
    }
}

fn handle_chat_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if view_data.sessions.visible {
        handle_session_picker_key(state, runtime, view_data, internal_tx, key);
        return;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            dispatch_and_refresh(state, runtime, view_data, internal_tx, AppCommand::CloseChat);
        }
        KeyCode::Enter => send_chat_input(state, runtime, view_data, internal_tx),
        KeyCode::Char('n') if ctrl => {
            view_data.chat.reset();
            emit_status(
                state,
                view_data,
                internal_tx,
                Notification::success("new chat"),
            );
        }
        KeyCode::Char('l') if ctrl => open_session_picker(state, runtime, view_data, internal_tx),
        KeyCode::Backspace => {
            view_data.chat.input.pop();
        }
        KeyCode::Char(ch) if !ctrl => view_data.chat.input.push(ch),
        _ => {}
    }
}

fn send_chat_input<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match view_data.chat.send_input(Instant::now()) {
        Ok(request) => {
            let request_id = request.request_id;
            if let Err(error) = runtime.spawn_chat(request, internal_tx.clone())
                && let ReceiveOutcome::Failed(error) = view_data.chat.receive(request_id, Err(error))
            {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    Notification::failure(format!("chat failed: {error}")),
                );
            }
        }
        Err(SendRejected::Blank) => {}
        Err(SendRejected::Busy) => emit_status(
            state,
            view_data,
            internal_tx,
            Notification::failure("waiting for the current reply"),
        ),
    }
}

fn open_session_picker<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    view_data.sessions = SessionPickerUiState {
        visible: true,
        loading: true,
        ..SessionPickerUiState::default()
    };
    if let Err(error) = runtime.spawn_list_sessions(1, internal_tx.clone()) {
        view_data.sessions = SessionPickerUiState::default();
        emit_status(
            state,
            view_data,
            internal_tx,
            Notification::failure(format!("chat sessions failed to load: {error:#}")),
        );
    }
}

fn handle_session_picker_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let picker = &mut view_data.sessions;
    match key.code {
        KeyCode::Esc => *picker = SessionPickerUiState::default(),
        KeyCode::Char('j') | KeyCode::Down => {
            picker.cursor = (picker.cursor + 1).min(picker.sessions.len().saturating_sub(1));
        }
        KeyCode::Char('k') | KeyCode::Up => picker.cursor = picker.cursor.saturating_sub(1),
        KeyCode::Enter => {
            let Some(id) = picker.sessions.get(picker.cursor).map(|s| s.id.clone()) else {
                return;
            };
            picker.opening = Some(id.clone());
            if let Err(error) = runtime.spawn_load_session(id, internal_tx.clone()) {
                view_data.sessions.opening = None;
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    Notification::failure(format!("chat session failed to load: {error:#}")),
                );
            }
        }
        KeyCode::Char('d') => {
            let Some(id) = picker.sessions.get(picker.cursor).map(|s| s.id.clone()) else {
                return;
            };
            tracing::info!(session = %id, "deleting chat session");
            if let Err(error) = runtime.spawn_delete_session(id, internal_tx.clone()) {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    Notification::failure(format!("chat session delete failed: {error:#}")),
                );
            }
        }
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let tabs = state.tabs();
    let selected = tabs
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let tab_titles = tabs.iter().map(|tab| tab.label()).collect::<Vec<_>>();
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().title("acadmin").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    render_table(frame, layout[1], state, view_data);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[2]);

    if matches!(state.mode, AppMode::Form(_))
        && let Some(form) = &view_data.form
    {
        let area = centered_rect(70, 80, frame.area());
        frame.render_widget(Clear, area);
        let title = if form.draft.target().is_some() {
            format!("edit {}", form.draft.kind().noun())
        } else {
            format!("new {}", form.draft.kind().noun())
        };
        let overlay = Paragraph::new(render_form_text(form))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(overlay, area);
    }

    if let Some(request) = view_data.confirm.request() {
        let area = centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, area);
        let overlay = Paragraph::new(render_confirm_text(request)).block(
            Block::default()
                .title("confirm")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Red)),
        );
        frame.render_widget(overlay, area);
    }

    if state.chat == ChatVisibility::Visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let chat = Paragraph::new(render_chat_overlay_text(
            &view_data.chat,
            &view_data.sessions,
            Instant::now(),
        ))
        .block(Block::default().title("assistant").borders(Borders::ALL));
        frame.render_widget(chat, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let kind = state.active_tab;
    let Some(list) = view_data.list(kind) else {
        let empty = Paragraph::new("loading...")
            .block(Block::default().borders(Borders::ALL).title(kind.label()));
        frame.render_widget(empty, area);
        return;
    };

    let columns = table_columns(kind);
    let widths = vec![Constraint::Min(8); columns.len().max(1)];
    let header = Row::new(columns.iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = list.items().iter().enumerate().map(|(index, record)| {
        let mut style = Style::default();
        if record.is_deleted() {
            style = style
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT);
        }
        if index == list.selected() {
            style = style.bg(Color::DarkGray);
        }
        Row::new(table_cells(record).into_iter().map(Cell::from)).style(style)
    });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(kind, list))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn table_columns(kind: EntityKind) -> Vec<&'static str> {
    field_specs(kind)
        .iter()
        .take(MAX_TABLE_COLUMNS)
        .map(|spec| spec.label)
        .collect()
}

fn table_cells(record: &Record) -> Vec<String> {
    let draft = FormDraft::from_record(record);
    (0..draft.specs().len().min(MAX_TABLE_COLUMNS))
        .map(|index| draft.value(index).to_owned())
        .collect()
}

fn table_title(kind: EntityKind, list: &ListController<Record>) -> String {
    let query = list.query();
    let mut title = format!(
        "{} | page {}/{} | sort {} {}",
        kind.label(),
        list.page_number(),
        list.total_pages(),
        query.sort_by,
        query.sort_type.arrow()
    );
    if !query.search.is_empty() {
        title.push_str(&format!(" | search \"{}\"", query.search));
    }
    if query.is_delete {
        title.push_str(" | deleted");
    }
    if list.search_pending() {
        title.push_str(" | typing");
    }
    if list.is_loading() {
        title.push_str(" | loading");
    }
    title
}

fn render_form_text(form: &FormModal) -> String {
    let mut lines = Vec::new();
    for (index, spec) in form.draft.specs().iter().enumerate() {
        let prefix = if index == form.cursor { "> " } else { "  " };
        let marker = if spec.required { "*" } else { "" };
        let hint = match spec.kind {
            FieldKind::Date => " (YYYY-MM-DD)".to_owned(),
            FieldKind::Flag => " (yes/no)".to_owned(),
            FieldKind::Choice(options) => format!(" ({})", options.join("/")),
            _ => String::new(),
        };
        lines.push(format!(
            "{prefix}{}{marker}{hint}: {}",
            spec.label,
            form.draft.value(index)
        ));
        if let Some(error) = form.errors.for_field(spec.key) {
            lines.push(format!("    ! {error}"));
        }
    }
    lines.push(String::new());
    if form.is_pending() {
        lines.push("saving...".to_owned());
    } else {
        lines.push(
            "tab/shift+tab field | left/right choose | enter or ctrl+s save | esc cancel"
                .to_owned(),
        );
    }
    lines.join("\n")
}

fn render_confirm_text(request: &DeleteRequest) -> String {
    format!("{}\n\ny delete | n cancel", request.prompt())
}

fn render_chat_overlay_text(
    chat: &ChatPanel,
    sessions: &SessionPickerUiState,
    now: Instant,
) -> String {
    let mut lines = vec![format!(
        "topic: {} | session: {}",
        chat.topic().unwrap_or("-"),
        chat.session_id().map_or("new", |id| id.as_str())
    )];
    lines.push(String::new());

    if sessions.visible {
        if sessions.loading {
            lines.push("(loading sessions...)".to_owned());
        } else if sessions.sessions.is_empty() {
            lines.push("(no saved sessions)".to_owned());
        }
        for (index, session) in sessions.sessions.iter().enumerate() {
            let prefix = if index == sessions.cursor { "> " } else { "  " };
            lines.push(format!(
                "{prefix}{} {} {}",
                session.audit.created_at.date(),
                session.topic.as_deref().unwrap_or("-"),
                session.id
            ));
        }
        lines.push(String::new());
        lines.push("j/k pick | enter open | d delete | esc back".to_owned());
        return lines.join("\n");
    }

    let keep = chat.messages().len().saturating_sub(CHAT_SCROLLBACK);
    for message in chat.messages().iter().skip(keep) {
        let label = match message.role {
            ChatRole::User => "you",
            ChatRole::Assistant => "ai",
        };
        lines.push(format!("{label}: {}", message.content));
    }
    if let Some(dots) = chat.typing_indicator(now) {
        lines.push(format!("ai: {dots}"));
    }
    if chat.messages().is_empty() {
        lines.push("Ask about programs, majors or subjects.".to_owned());
    }
    if let Some(error) = chat.last_error() {
        lines.push(format!("error: {error}"));
    }

    lines.push(String::new());
    lines.push(format!("> {}", chat.input));
    lines.push("enter send | ctrl+n new | ctrl+l sessions | esc close".to_owned());
    lines.join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }

    let (mode, hints) = match state.mode {
        AppMode::Nav => (
            "NAV",
            "j/k row | n/p page | / search | s/S sort | x deleted | a add | e edit | d delete | c chat | ? help | q quit"
                .to_owned(),
        ),
        AppMode::Search => {
            let text = view_data
                .list(state.active_tab)
                .map_or("", |list| list.search_input());
            ("SEARCH", format!("search: {text}_ | enter apply | esc clear"))
        }
        AppMode::Form(_) => ("FORM", "enter save | esc cancel".to_owned()),
        AppMode::Confirm => ("CONFIRM", "y delete | n cancel".to_owned()),
    };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
nav: tab/shift+tab switch table | j/k row | n/p page | g/G first/last page | r reload\n\
nav: / search | s sort field | S sort direction | x active/deleted\n\
edit: a add | e or enter edit | d delete (asks y/n)\n\
form: tab/shift+tab field | left/right choose | enter or ctrl+s save | esc cancel\n\
chat: c open | enter send | ctrl+n new | ctrl+l sessions | esc close\n\
sessions: j/k pick | enter open | d delete | esc back"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, SessionPickerUiState, TuiOptions, ViewData, handle_key_event,
        help_overlay_text, render_chat_overlay_text, render_form_text, status_text, table_cells,
        table_columns,
    };
    use acadmin_app::{
        AppMode, AppState, ChatPhase, ChatReply, ChatSession, ChatSessionDetail, ChatSessionId,
        ChatVisibility, Entity, EntityKind, FormModal, ListQuery, Page, Record, RecordId,
        SEARCH_DEBOUNCE, SendRequest, Submission,
    };
    use acadmin_testkit::{
        fixture_audit, fixture_today, sample_chat_detail, sample_major, sample_student,
        soft_deleted,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::mpsc;
    use std::time::Instant;
    use time::{Date, Duration as DateDuration};

    #[derive(Debug, Default)]
    struct TestRuntime {
        records: Vec<Record>,
        fetches: Vec<(EntityKind, ListQuery)>,
        submissions: Vec<Submission>,
        fail_next_submit: Option<String>,
        deletes: Vec<(EntityKind, RecordId)>,
        chat_requests: Vec<SendRequest>,
        sessions: Vec<ChatSession>,
        deleted_sessions: Vec<ChatSessionId>,
    }

    impl TestRuntime {
        fn with_majors() -> Self {
            Self {
                records: vec![
                    sample_major("abc-123", "MA01", fixture_today()).into_record(),
                    sample_major("def-456", "MA02", fixture_today()).into_record(),
                    soft_deleted(sample_major("ghi-789", "MA03", fixture_today())).into_record(),
                    sample_student("st-1", "SE001").into_record(),
                ],
                ..Self::default()
            }
        }

        fn fetch_count(&self, kind: EntityKind) -> usize {
            self.fetches.iter().filter(|(k, _)| *k == kind).count()
        }
    }

    impl AppRuntime for TestRuntime {
        fn fetch_page(&mut self, kind: EntityKind, query: &ListQuery) -> Result<Page<Record>> {
            self.fetches.push((kind, query.clone()));
            let needle = query.search.to_lowercase();
            let items = self
                .records
                .iter()
                .filter(|record| record.kind() == kind)
                .filter(|record| record.label().to_lowercase().contains(&needle))
                .cloned()
                .collect();
            Ok(Page::new(items, 3))
        }

        fn submit_form(&mut self, submission: &Submission) -> Result<()> {
            self.submissions.push(submission.clone());
            match self.fail_next_submit.take() {
                Some(message) => Err(anyhow!(message)),
                None => Ok(()),
            }
        }

        fn delete_record(&mut self, kind: EntityKind, id: &RecordId) -> Result<()> {
            self.deletes.push((kind, id.clone()));
            Ok(())
        }

        fn send_chat(&mut self, request: &SendRequest) -> Result<ChatReply> {
            self.chat_requests.push(request.clone());
            Ok(ChatReply {
                ai_chat_log: ChatSession {
                    id: ChatSessionId::new("s-9"),
                    topic: request.topic.clone(),
                    audit: fixture_audit(),
                },
                message_ai: "Three majors.".to_owned(),
            })
        }

        fn load_chat_session(&mut self, id: &ChatSessionId) -> Result<ChatSessionDetail> {
            Ok(sample_chat_detail(id.as_str(), &["hi", "hello"]))
        }

        fn list_chat_sessions(&mut self, _page_number: u32) -> Result<Page<ChatSession>> {
            Ok(Page::new(self.sessions.clone(), 1))
        }

        fn delete_chat_session(&mut self, id: &ChatSessionId) -> Result<()> {
            self.deleted_sessions.push(id.clone());
            Ok(())
        }

        fn today(&self) -> Date {
            fixture_today()
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: mpsc::Sender<InternalEvent>,
        rx: mpsc::Receiver<InternalEvent>,
    }

    impl Harness {
        fn admin_on(tab: EntityKind) -> Self {
            let (tx, rx) = mpsc::channel();
            let mut harness = Self {
                state: AppState {
                    active_tab: tab,
                    ..AppState::for_role(true)
                },
                runtime: TestRuntime::with_majors(),
                view_data: ViewData::new(&TuiOptions::default()),
                tx,
                rx,
            };
            super::reload_list(
                &mut harness.state,
                &mut harness.runtime,
                &mut harness.view_data,
                &harness.tx,
                tab,
            );
            harness.pump();
            harness
        }

        fn pump(&mut self) {
            super::process_internal_events(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn press(&mut self, key: KeyEvent) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                key,
            );
            self.pump();
            quit
        }

        fn keys(&mut self, codes: &[KeyCode]) {
            for code in codes {
                self.press(KeyEvent::new(*code, KeyModifiers::NONE));
            }
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE));
            }
        }

        /// Handles a key but leaves results queued, as if the worker had
        /// not answered yet.
        fn press_queued(&mut self, key: KeyEvent) {
            handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                key,
            );
        }

        fn form(&mut self) -> &mut FormModal {
            self.view_data.form.as_mut().expect("form is open")
        }
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    #[test]
    fn tab_key_moves_to_the_next_table_and_fetches_it() {
        let mut harness = Harness::admin_on(EntityKind::Curriculums);
        harness.keys(&[KeyCode::Tab]);
        assert_eq!(harness.state.active_tab, EntityKind::Subjects);
        assert_eq!(harness.runtime.fetch_count(EntityKind::Subjects), 1);

        harness.keys(&[KeyCode::BackTab]);
        assert_eq!(harness.state.active_tab, EntityKind::Curriculums);
        assert_eq!(harness.runtime.fetch_count(EntityKind::Curriculums), 2);
    }

    #[test]
    fn non_admin_only_sees_the_student_directory() {
        let (tx, rx) = mpsc::channel();
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_majors();
        let mut view_data = ViewData::new(&TuiOptions::default());

        handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE),
        );
        super::process_internal_events(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert_eq!(state.active_tab, EntityKind::Students);
        assert_eq!(state.tabs(), vec![EntityKind::Students]);
        assert!(runtime.fetches.is_empty());
    }

    #[test]
    fn search_fetches_once_for_the_final_text() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        let before = harness.runtime.fetch_count(EntityKind::Majors);

        harness.keys(&[KeyCode::Char('/')]);
        assert_eq!(harness.state.mode, AppMode::Search);
        harness.type_text("ma02");
        assert_eq!(harness.runtime.fetch_count(EntityKind::Majors), before);
        let list = harness.view_data.list(EntityKind::Majors).expect("list");
        assert!(super::table_title(EntityKind::Majors, list).contains(" | typing"));

        harness.keys(&[KeyCode::Enter]);
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(harness.runtime.fetch_count(EntityKind::Majors), before + 1);
        let (_, query) = harness.runtime.fetches.last().expect("fetch recorded");
        assert_eq!(query.search, "ma02");
        let list = harness.view_data.list(EntityKind::Majors).expect("list");
        assert_eq!(list.items().len(), 1);
        assert_eq!(list.items()[0].label(), "MA02");
    }

    #[test]
    fn settled_search_is_fetched_by_the_timer() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        let before = harness.runtime.fetch_count(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('/')]);
        harness.type_text("ma");

        let later = Instant::now() + std::time::Duration::from_secs(2);
        super::advance_timers(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
            &harness.tx,
            later,
        );
        harness.pump();
        assert_eq!(harness.runtime.fetch_count(EntityKind::Majors), before + 1);
    }

    #[test]
    fn deleted_rows_stay_out_of_the_active_table() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        let list = harness.view_data.list(EntityKind::Majors).expect("list");
        assert_eq!(list.items().len(), 2);

        harness.keys(&[KeyCode::Char('x')]);
        assert!(harness.state.show_deleted);
        let (_, query) = harness.runtime.fetches.last().expect("fetch recorded");
        assert!(query.is_delete);
        let list = harness.view_data.list(EntityKind::Majors).expect("list");
        assert_eq!(list.items().len(), 1);
        assert_eq!(list.items()[0].label(), "MA03");
    }

    #[test]
    fn paging_keys_request_the_next_page() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('n')]);
        let (_, query) = harness.runtime.fetches.last().expect("fetch recorded");
        assert_eq!(query.page_number, 2);

        harness.keys(&[KeyCode::Char('G')]);
        let (_, query) = harness.runtime.fetches.last().expect("fetch recorded");
        assert_eq!(query.page_number, 3);

        let before = harness.runtime.fetches.len();
        harness.keys(&[KeyCode::Char('n')]);
        assert_eq!(harness.runtime.fetches.len(), before);
    }

    #[test]
    fn sort_keys_cycle_field_and_direction() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('s')]);
        let (_, query) = harness.runtime.fetches.last().expect("fetch recorded");
        assert_eq!(query.sort_by, EntityKind::Majors.sort_fields()[1]);

        harness.keys(&[KeyCode::Char('S')]);
        let (_, query) = harness.runtime.fetches.last().expect("fetch recorded");
        assert_eq!(query.sort_type.as_query(), "desc");
    }

    #[test]
    fn past_start_date_keeps_the_major_form_open_without_a_request() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('a')]);
        assert_eq!(harness.state.mode, AppMode::Form(EntityKind::Majors));

        let yesterday = fixture_today() - DateDuration::days(1);
        let form = harness.form();
        form.draft.set("majorCode", "MA01");
        form.draft.set("majorName", "Software");
        form.draft.set("startAt", yesterday.to_string());
        harness.keys(&[KeyCode::Enter]);

        assert!(harness.runtime.submissions.is_empty());
        assert!(harness.form().errors.for_field("startAt").is_some());
        assert_eq!(harness.state.mode, AppMode::Form(EntityKind::Majors));
        let status = harness.state.status_line.clone().unwrap_or_default();
        assert!(status.contains("need attention"), "{status}");
    }

    #[test]
    fn saved_form_closes_and_refetches_once() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        let before = harness.runtime.fetch_count(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('a')]);
        let form = harness.form();
        form.draft.set("majorCode", "MA04");
        form.draft.set("majorName", "Data Science");
        form.draft.set("startAt", fixture_today().to_string());
        harness.press(ctrl('s'));

        assert_eq!(harness.runtime.submissions.len(), 1);
        assert!(!harness.runtime.submissions[0].is_update());
        assert!(harness.view_data.form.is_none());
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert_eq!(harness.runtime.fetch_count(EntityKind::Majors), before + 1);
        assert_eq!(harness.state.status_line.as_deref(), Some("major created"));
    }

    #[test]
    fn failed_save_keeps_the_draft() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.runtime.fail_next_submit =
            Some("server error (409): majorCode already exists".to_owned());
        let before = harness.runtime.fetch_count(EntityKind::Majors);

        harness.keys(&[KeyCode::Char('e')]);
        assert_eq!(harness.form().draft.get("majorCode"), "MA01");
        harness.keys(&[KeyCode::Enter]);

        assert_eq!(harness.runtime.submissions.len(), 1);
        assert!(harness.runtime.submissions[0].is_update());
        let form = harness.form();
        assert!(!form.is_pending());
        assert_eq!(form.draft.get("majorCode"), "MA01");
        assert_eq!(harness.runtime.fetch_count(EntityKind::Majors), before);
        let status = harness.state.status_line.clone().unwrap_or_default();
        assert!(status.contains("already exists"), "{status}");
    }

    #[test]
    fn flag_fields_cycle_with_arrow_keys() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('a')]);
        let index = harness
            .form()
            .draft
            .specs()
            .iter()
            .position(|spec| spec.key == "isActive")
            .expect("isActive field");
        harness.form().cursor = index;
        let before = harness.form().draft.get("isActive").to_owned();
        harness.keys(&[KeyCode::Right]);
        assert_ne!(harness.form().draft.get("isActive"), before);
        harness.keys(&[KeyCode::Right]);
        assert_eq!(harness.form().draft.get("isActive"), before);
    }

    #[test]
    fn delete_runs_only_after_confirmation() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        let before = harness.runtime.fetch_count(EntityKind::Majors);

        harness.keys(&[KeyCode::Char('d')]);
        assert_eq!(harness.state.mode, AppMode::Confirm);
        harness.keys(&[KeyCode::Char('n')]);
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(harness.runtime.deletes.is_empty());

        harness.keys(&[KeyCode::Char('d'), KeyCode::Char('y')]);
        assert_eq!(
            harness.runtime.deletes,
            vec![(EntityKind::Majors, RecordId::new("abc-123"))]
        );
        assert_eq!(harness.runtime.fetch_count(EntityKind::Majors), before + 1);
        assert_eq!(harness.state.status_line.as_deref(), Some("major MA01 deleted"));
    }

    #[test]
    fn stale_page_never_replaces_a_newer_one() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        let list = harness.view_data.list_mut(EntityKind::Majors);
        let older = list.refresh();
        let newer = list.refresh();
        let newest_rows = vec![sample_major("zzz-1", "MA99", fixture_today()).into_record()];

        harness
            .tx
            .send(InternalEvent::PageLoaded {
                kind: EntityKind::Majors,
                seq: newer.seq,
                result: Ok(Page::new(newest_rows, 1)),
            })
            .expect("send");
        harness
            .tx
            .send(InternalEvent::PageLoaded {
                kind: EntityKind::Majors,
                seq: older.seq,
                result: Ok(Page::new(Vec::new(), 1)),
            })
            .expect("send");
        harness.pump();

        let list = harness.view_data.list(EntityKind::Majors).expect("list");
        assert_eq!(list.items().len(), 1);
        assert_eq!(list.items()[0].label(), "MA99");
    }

    #[test]
    fn fetch_failure_keeps_rows_and_reports_status() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        let seq = harness.view_data.list_mut(EntityKind::Majors).refresh().seq;
        harness
            .tx
            .send(InternalEvent::PageLoaded {
                kind: EntityKind::Majors,
                seq,
                result: Err("cannot reach http://localhost:5000".to_owned()),
            })
            .expect("send");
        harness.pump();

        let list = harness.view_data.list(EntityKind::Majors).expect("list");
        assert_eq!(list.items().len(), 2);
        let status = harness.state.status_line.clone().unwrap_or_default();
        assert!(status.starts_with("major load failed"), "{status}");
    }

    #[test]
    fn status_clears_only_for_the_latest_token() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('x')]);
        let stale = harness.view_data.status_token;
        harness.keys(&[KeyCode::Char('x')]);
        let current = harness.view_data.status_token;
        assert!(current > stale);

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: stale })
            .expect("send");
        harness.pump();
        assert!(harness.state.status_line.is_some());

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: current })
            .expect("send");
        harness.pump();
        assert!(harness.state.status_line.is_none());
    }

    #[test]
    fn chat_reply_is_revealed_one_character_per_tick() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('c')]);
        assert_eq!(harness.state.chat, ChatVisibility::Visible);

        harness.type_text("how many majors?");
        harness.keys(&[KeyCode::Enter]);
        assert_eq!(harness.runtime.chat_requests.len(), 1);
        assert_eq!(harness.runtime.chat_requests[0].content, "how many majors?");
        assert!(matches!(
            harness.view_data.chat.phase(),
            ChatPhase::Revealing { .. }
        ));
        assert_eq!(
            harness.view_data.chat.session_id(),
            Some(&ChatSessionId::new("s-9"))
        );

        let reply = "Three majors.";
        for expected in 1..=reply.chars().count() {
            harness.keys(&[KeyCode::Tab]);
            assert!(harness.view_data.chat.tick());
            let last = harness.view_data.chat.messages().last().expect("reply");
            assert_eq!(last.content.chars().count(), expected);
        }
        assert!(harness.view_data.chat.is_idle());
        let last = harness.view_data.chat.messages().last().expect("reply");
        assert_eq!(last.content, reply);

        harness.keys(&[KeyCode::Esc]);
        assert_eq!(harness.state.chat, ChatVisibility::Hidden);
    }

    #[test]
    fn chat_keys_do_not_leak_into_the_table() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('c')]);
        harness.type_text("dq");
        assert_eq!(harness.view_data.chat.input, "dq");
        assert_eq!(harness.state.mode, AppMode::Nav);
        assert!(harness.runtime.deletes.is_empty());
        assert!(harness.press(ctrl('q')));
    }

    #[test]
    fn session_picker_loads_and_deletes_sessions() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.runtime.sessions = vec![
            sample_chat_detail("s-1", &["hi"]).session,
            sample_chat_detail("s-2", &["hello"]).session,
        ];
        harness.keys(&[KeyCode::Char('c')]);
        harness.press(ctrl('l'));
        assert!(harness.view_data.sessions.visible);
        assert_eq!(harness.view_data.sessions.sessions.len(), 2);

        harness.keys(&[KeyCode::Enter]);
        assert!(!harness.view_data.sessions.visible);
        assert_eq!(
            harness.view_data.chat.session_id(),
            Some(&ChatSessionId::new("s-1"))
        );
        let contents = harness
            .view_data
            .chat
            .messages()
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["hi", "hello"]);

        harness.press(ctrl('l'));
        harness.keys(&[KeyCode::Char('d')]);
        assert_eq!(
            harness.runtime.deleted_sessions,
            vec![ChatSessionId::new("s-1")]
        );
        assert!(harness.view_data.chat.session_id().is_none());
        assert!(harness.view_data.chat.messages().is_empty());
        assert_eq!(harness.view_data.sessions.sessions.len(), 1);
    }

    #[test]
    fn form_text_lists_fields_and_errors() {
        let mut modal = FormModal::create(EntityKind::Majors);
        modal.draft.set("majorCode", "MA01");
        let _ = modal.begin_submit(fixture_today());
        let text = render_form_text(&modal);
        let focused = text
            .lines()
            .filter(|line| line.starts_with("> "))
            .collect::<Vec<_>>();
        assert_eq!(focused, vec!["> name*: "]);
        assert!(text.contains("code*: MA01"));
        assert!(text.contains("(YYYY-MM-DD)"));
        assert!(text.contains("! is required"));
    }

    #[test]
    fn chat_overlay_shows_typing_dots_while_sending() {
        let mut chat = acadmin_app::ChatPanel::new(Some("advising".to_owned()), super::TYPING_INTERVAL);
        let started = Instant::now();
        chat.begin_send("hello", started).expect("send accepted");
        let text = render_chat_overlay_text(
            &chat,
            &SessionPickerUiState::default(),
            started + std::time::Duration::from_millis(1100),
        );
        assert!(text.contains("topic: advising | session: new"));
        assert!(text.contains("you: hello"));
        assert!(text.contains("ai: ..."));
    }

    #[test]
    fn status_text_shows_mode_and_hides_under_help() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        assert!(status_text(&harness.state, &harness.view_data).starts_with("NAV | "));
        harness.keys(&[KeyCode::Char('/')]);
        harness.type_text("so");
        let text = status_text(&harness.state, &harness.view_data);
        assert!(text.starts_with("SEARCH | search: so_"), "{text}");

        harness.view_data.help_visible = true;
        assert!(status_text(&harness.state, &harness.view_data).is_empty());
        assert!(help_overlay_text().contains("ctrl+q quit"));
    }

    #[test]
    fn table_cells_follow_the_form_fields() {
        let columns = table_columns(EntityKind::Majors);
        let cells = table_cells(&sample_major("abc-123", "MA01", fixture_today()).into_record());
        assert_eq!(columns.len(), cells.len());
        assert_eq!(cells[0], "MA01");
    }

    #[test]
    fn session_picker_waits_for_the_worker() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.runtime.sessions = vec![sample_chat_detail("s-1", &["hi"]).session];
        harness.keys(&[KeyCode::Char('c')]);

        harness.press_queued(ctrl('l'));
        assert!(harness.view_data.sessions.visible);
        assert!(harness.view_data.sessions.loading);
        let text = render_chat_overlay_text(
            &harness.view_data.chat,
            &harness.view_data.sessions,
            Instant::now(),
        );
        assert!(text.contains("(loading sessions...)"), "{text}");

        harness.pump();
        assert!(!harness.view_data.sessions.loading);
        assert_eq!(harness.view_data.sessions.sessions.len(), 1);

        harness.press_queued(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(
            harness.view_data.sessions.opening,
            Some(ChatSessionId::new("s-1"))
        );
        assert!(harness.view_data.chat.session_id().is_none());
        harness.pump();
        assert_eq!(
            harness.view_data.chat.session_id(),
            Some(&ChatSessionId::new("s-1"))
        );
        assert!(!harness.view_data.sessions.visible);
    }

    #[test]
    fn late_session_results_are_dropped_after_closing_the_picker() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.runtime.sessions = vec![sample_chat_detail("s-1", &["hi"]).session];
        harness.keys(&[KeyCode::Char('c')]);
        harness.press_queued(ctrl('l'));
        harness.press_queued(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        harness.pump();
        assert_eq!(harness.view_data.sessions, SessionPickerUiState::default());

        harness
            .tx
            .send(InternalEvent::SessionLoaded {
                id: ChatSessionId::new("s-1"),
                result: Ok(sample_chat_detail("s-1", &["hi"])),
            })
            .expect("send");
        harness.pump();
        assert!(harness.view_data.chat.session_id().is_none());
    }

    #[test]
    fn dismissed_form_reports_the_same_wording_as_an_open_one() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        harness.keys(&[KeyCode::Char('e')]);
        harness.press_queued(ctrl('s'));
        harness.keys(&[KeyCode::Esc]);
        assert!(harness.view_data.form.is_none());
        assert_eq!(harness.state.status_line.as_deref(), Some("major updated"));

        harness.keys(&[KeyCode::Char('a')]);
        let form = harness.form();
        form.draft.set("majorCode", "MA05");
        form.draft.set("majorName", "Networks");
        form.draft.set("startAt", fixture_today().to_string());
        harness.press_queued(ctrl('s'));
        harness.keys(&[KeyCode::Esc]);
        assert_eq!(harness.state.status_line.as_deref(), Some("major created"));
    }

    #[test]
    fn pending_search_on_another_tab_still_fires() {
        let mut harness = Harness::admin_on(EntityKind::Majors);
        let before = harness.runtime.fetch_count(EntityKind::Majors);
        let typed = Instant::now();
        harness
            .view_data
            .list_mut(EntityKind::Majors)
            .type_search("ma0", typed);
        harness.state.active_tab = EntityKind::Students;

        super::advance_timers(
            &mut harness.state,
            &mut harness.runtime,
            &mut harness.view_data,
            &harness.tx,
            typed + SEARCH_DEBOUNCE,
        );
        harness.pump();
        assert_eq!(harness.runtime.fetch_count(EntityKind::Majors), before + 1);
        let (_, query) = harness.runtime.fetches.last().expect("fetch recorded");
        assert_eq!(query.search, "ma0");
    }
}
