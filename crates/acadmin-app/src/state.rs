// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::model::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Search,
    Form(EntityKind),
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatVisibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Failure,
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.level == NotificationLevel::Failure
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_tab: EntityKind,
    pub show_deleted: bool,
    pub chat: ChatVisibility,
    pub status_line: Option<String>,
    pub admin: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::for_role(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    SelectTab(EntityKind),
    EnterSearch,
    ExitToNav,
    OpenForm(EntityKind),
    OpenConfirm,
    ToggleDeleted,
    OpenChat,
    CloseChat,
    SetAdmin(bool),
    Notify(Notification),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(EntityKind),
    AccessDenied(EntityKind),
    ChatVisibilityChanged(ChatVisibility),
    DeletedFilterChanged(bool),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn for_role(admin: bool) -> Self {
        let tabs = Self::tabs_for(admin);
        Self {
            mode: AppMode::Nav,
            active_tab: tabs[0],
            show_deleted: false,
            chat: ChatVisibility::Hidden,
            status_line: None,
            admin,
        }
    }

    /// Tabs reachable with the given role, in display order.
    pub fn tabs_for(admin: bool) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|kind| admin || !kind.requires_admin())
            .collect()
    }

    pub fn tabs(&self) -> Vec<EntityKind> {
        Self::tabs_for(self.admin)
    }

    pub fn can_open(&self, kind: EntityKind) -> bool {
        self.admin || !kind.requires_admin()
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SelectTab(kind) => {
                if !self.can_open(kind) {
                    return vec![
                        AppEvent::AccessDenied(kind),
                        self.set_status(&format!("{} requires an admin account", kind.label())),
                    ];
                }
                if kind == self.active_tab {
                    return Vec::new();
                }
                self.active_tab = kind;
                vec![AppEvent::TabChanged(kind)]
            }
            AppCommand::EnterSearch => self.set_mode(AppMode::Search),
            AppCommand::ExitToNav => self.set_mode(AppMode::Nav),
            AppCommand::OpenForm(kind) => {
                if !self.can_open(kind) {
                    return vec![AppEvent::AccessDenied(kind)];
                }
                self.set_mode(AppMode::Form(kind))
            }
            AppCommand::OpenConfirm => self.set_mode(AppMode::Confirm),
            AppCommand::ToggleDeleted => {
                self.show_deleted = !self.show_deleted;
                let label = if self.show_deleted {
                    "showing deleted"
                } else {
                    "showing active"
                };
                vec![
                    AppEvent::DeletedFilterChanged(self.show_deleted),
                    self.set_status(label),
                ]
            }
            AppCommand::OpenChat => {
                self.chat = ChatVisibility::Visible;
                vec![AppEvent::ChatVisibilityChanged(self.chat)]
            }
            AppCommand::CloseChat => {
                self.chat = ChatVisibility::Hidden;
                vec![AppEvent::ChatVisibilityChanged(self.chat)]
            }
            AppCommand::SetAdmin(admin) => {
                self.admin = admin;
                if self.can_open(self.active_tab) {
                    return Vec::new();
                }
                self.active_tab = self.tabs()[0];
                self.mode = AppMode::Nav;
                vec![AppEvent::TabChanged(self.active_tab)]
            }
            AppCommand::Notify(notification) => vec![self.set_status(&notification.message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn set_mode(&mut self, mode: AppMode) -> Vec<AppEvent> {
        if self.mode == mode {
            return Vec::new();
        }
        self.mode = mode;
        vec![AppEvent::ModeChanged(mode)]
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = self.tabs();
        if tabs.len() < 2 {
            return Vec::new();
        }
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
