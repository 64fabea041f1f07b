// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::ids::RecordId;
use crate::model::{Audited, EntityKind, SortDirection};
use crate::state::Notification;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_SORT_FIELD: &str = "default";
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Parameters of one paginated list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page_number: u32,
    pub page_size: u32,
    pub search: String,
    pub sort_by: String,
    pub sort_type: SortDirection,
    pub is_delete: bool,
}

impl ListQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
            search: String::new(),
            sort_by: DEFAULT_SORT_FIELD.to_owned(),
            sort_type: SortDirection::Ascending,
            is_delete: false,
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pageNumber", self.page_number.to_string()),
            ("pageSize", self.page_size.to_string()),
            ("search", self.search.clone()),
            ("sortBy", self.sort_by.clone()),
            ("sortType", self.sort_type.as_query().to_owned()),
            ("isDelete", self.is_delete.to_string()),
        ]
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_pages: u32) -> Self {
        Self { items, total_pages }.normalized()
    }

    /// Servers report zero pages for an empty result; the UI always has at
    /// least one.
    pub fn normalized(mut self) -> Self {
        self.total_pages = self.total_pages.max(1);
        self
    }
}

/// Holds the latest value until the input has been quiet for `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn input(&mut self, value: impl Into<String>, now: Instant) {
        self.pending = Some((value.into(), now + self.delay));
    }

    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    pub fn flush(&mut self) -> Option<String> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// A fetch the controller has issued. Only the ticket with the latest `seq`
/// may update the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub seq: u64,
    pub query: ListQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { dropped: usize },
    Stale,
    Failed(String),
}

/// One REST collection: paginated reads plus create, update and delete.
pub trait Resource {
    type Record: Audited;
    type Input;

    fn fetch_page(&self, query: &ListQuery) -> Result<Page<Self::Record>>;
    fn create(&self, input: &Self::Input) -> Result<()>;
    fn update(&self, id: &RecordId, input: &Self::Input) -> Result<()>;
    fn delete(&self, id: &RecordId) -> Result<()>;
}

/// Search, sort, partition and paging state for one entity table.
#[derive(Debug, Clone)]
pub struct ListController<T> {
    query: ListQuery,
    search_input: String,
    debouncer: Debouncer,
    items: Vec<T>,
    total_pages: u32,
    selected: usize,
    loading: bool,
    issued_seq: u64,
    last_error: Option<String>,
}

impl<T: Audited> ListController<T> {
    pub fn new(page_size: u32, debounce: Duration) -> Self {
        Self {
            query: ListQuery::new(page_size),
            search_input: String::new(),
            debouncer: Debouncer::new(debounce),
            items: Vec::new(),
            total_pages: 1,
            selected: 0,
            loading: false,
            issued_seq: 0,
            last_error: None,
        }
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn page_number(&self) -> u32 {
        self.query.page_number
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn search_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.items.is_empty() {
            self.selected = 0;
            return;
        }
        let last = self.items.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    /// Records a keystroke in the search box. Nothing is fetched until the
    /// debounce window passes.
    pub fn type_search(&mut self, text: impl Into<String>, now: Instant) {
        self.search_input = text.into();
        self.debouncer.input(self.search_input.clone(), now);
    }

    /// Issues a fetch once the search input has settled.
    pub fn poll(&mut self, now: Instant) -> Option<FetchTicket> {
        let value = self.debouncer.poll(now)?;
        self.apply_search(value)
    }

    /// Applies the pending search immediately.
    pub fn commit_search(&mut self) -> Option<FetchTicket> {
        let value = self.debouncer.flush()?;
        self.apply_search(value)
    }

    fn apply_search(&mut self, value: String) -> Option<FetchTicket> {
        let value = value.trim().to_owned();
        if value == self.query.search {
            return None;
        }
        self.query.search = value;
        Some(self.reset_to_first_page())
    }

    pub fn set_sort_field(&mut self, field: &str) -> Option<FetchTicket> {
        if self.query.sort_by == field {
            return None;
        }
        self.query.sort_by = field.to_owned();
        Some(self.reset_to_first_page())
    }

    /// Advances to the next sort key in `fields`, wrapping around.
    pub fn cycle_sort_field(&mut self, fields: &[&str]) -> Option<FetchTicket> {
        if fields.is_empty() {
            return None;
        }
        let next = fields
            .iter()
            .position(|field| *field == self.query.sort_by)
            .map_or(0, |index| (index + 1) % fields.len());
        self.set_sort_field(fields[next])
    }

    pub fn toggle_sort_direction(&mut self) -> FetchTicket {
        self.query.sort_type = self.query.sort_type.toggled();
        self.reset_to_first_page()
    }

    pub fn set_show_deleted(&mut self, show_deleted: bool) -> Option<FetchTicket> {
        if self.query.is_delete == show_deleted {
            return None;
        }
        self.query.is_delete = show_deleted;
        Some(self.reset_to_first_page())
    }

    pub fn next_page(&mut self) -> Option<FetchTicket> {
        self.go_to_page(self.query.page_number.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> Option<FetchTicket> {
        self.go_to_page(self.query.page_number.saturating_sub(1))
    }

    pub fn go_to_page(&mut self, page: u32) -> Option<FetchTicket> {
        let page = page.clamp(1, self.total_pages.max(1));
        if page == self.query.page_number {
            return None;
        }
        self.query.page_number = page;
        Some(self.refresh())
    }

    fn reset_to_first_page(&mut self) -> FetchTicket {
        self.query.page_number = 1;
        self.refresh()
    }

    /// Issues a fetch for the current query. Earlier tickets become stale.
    pub fn refresh(&mut self) -> FetchTicket {
        self.issued_seq += 1;
        self.loading = true;
        FetchTicket {
            seq: self.issued_seq,
            query: self.query.clone(),
        }
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.issued_seq
    }

    /// Stores a fetch result unless a newer fetch has been issued since.
    /// Failures keep the previous rows.
    pub fn apply(&mut self, seq: u64, result: Result<Page<T>>) -> ApplyOutcome {
        if !self.is_current(seq) {
            tracing::debug!(seq, latest = self.issued_seq, "discarding stale page");
            return ApplyOutcome::Stale;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                let page = page.normalized();
                let before = page.items.len();
                let show_deleted = self.query.is_delete;
                self.items = page
                    .items
                    .into_iter()
                    .filter(|item| item.is_deleted() == show_deleted)
                    .collect();
                let dropped = before - self.items.len();
                if dropped > 0 {
                    tracing::debug!(dropped, show_deleted, "dropped rows from the other partition");
                }
                self.total_pages = page.total_pages;
                self.selected = self.selected.min(self.items.len().saturating_sub(1));
                self.last_error = None;
                ApplyOutcome::Applied { dropped }
            }
            Err(error) => {
                let message = format!("{error:#}");
                tracing::warn!(seq, error = %message, "list fetch failed");
                self.last_error = Some(message.clone());
                ApplyOutcome::Failed(message)
            }
        }
    }

    pub fn fetch<R>(resource: &R, ticket: &FetchTicket) -> Result<Page<T>>
    where
        R: Resource<Record = T> + ?Sized,
    {
        resource.fetch_page(&ticket.query)
    }

    /// Refreshes and applies in one step, for synchronous callers.
    pub fn load<R>(&mut self, resource: &R) -> ApplyOutcome
    where
        R: Resource<Record = T> + ?Sized,
    {
        let ticket = self.refresh();
        let result = Self::fetch(resource, &ticket);
        self.apply(ticket.seq, result)
    }
}

/// A pending destructive call for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub kind: EntityKind,
    pub id: RecordId,
    pub label: String,
}

impl DeleteRequest {
    pub fn prompt(&self) -> String {
        format!("delete {} {}?", self.kind.noun(), self.label)
    }

    pub fn outcome(&self, result: &Result<()>) -> Notification {
        match result {
            Ok(()) => Notification::success(format!("{} {} deleted", self.kind.noun(), self.label)),
            Err(error) => Notification::failure(format!(
                "{} delete failed: {error:#}",
                self.kind.noun()
            )),
        }
    }
}

/// Holds at most one delete request until the user confirms or cancels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmDialog {
    request: Option<DeleteRequest>,
}

impl ConfirmDialog {
    pub fn open(&mut self, request: DeleteRequest) {
        self.request = Some(request);
    }

    pub fn request(&self) -> Option<&DeleteRequest> {
        self.request.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.request.is_some()
    }

    pub fn cancel(&mut self) {
        self.request = None;
    }

    pub fn confirm(&mut self) -> Option<DeleteRequest> {
        self.request.take()
    }

    /// Confirms and runs the delete. `refresh` runs once, only on success.
    pub fn confirm_with(
        &mut self,
        delete: impl FnOnce(&RecordId) -> Result<()>,
        refresh: impl FnOnce(),
    ) -> Option<Notification> {
        let request = self.confirm()?;
        let result = delete(&request.id);
        if result.is_ok() {
            refresh();
        }
        Some(request.outcome(&result))
    }
}
