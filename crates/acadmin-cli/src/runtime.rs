// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acadmin_api::Client;
use acadmin_app::{
    ChatReply, ChatSession, ChatSessionDetail, ChatSessionId, DeleteRequest, EntityKind,
    FetchTicket, ListQuery, Page, Record, RecordId, SendRequest, Submission,
};
use acadmin_tui::{AppRuntime, InternalEvent, error_text};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

/// Runs every network call against the REST API on worker threads so the UI
/// keeps drawing.
pub struct ApiRuntime {
    client: Arc<Client>,
    session_page_size: u32,
}

impl ApiRuntime {
    pub fn new(client: Client, session_page_size: u32) -> Self {
        Self {
            client: Arc::new(client),
            session_page_size,
        }
    }

    fn spawn_worker<F>(&self, name: &str, job: F) -> Result<()>
    where
        F: FnOnce(&Client) + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        thread::Builder::new()
            .name(format!("acadmin-{name}"))
            .spawn(move || job(&client))
            .with_context(|| format!("spawn {name} worker"))?;
        Ok(())
    }
}

impl AppRuntime for ApiRuntime {
    fn fetch_page(&mut self, kind: EntityKind, query: &ListQuery) -> Result<Page<Record>> {
        self.client.fetch_records(kind, query)
    }

    fn submit_form(&mut self, submission: &Submission) -> Result<()> {
        self.client.submit(submission)
    }

    fn delete_record(&mut self, kind: EntityKind, id: &RecordId) -> Result<()> {
        self.client.delete_record(kind, id)
    }

    fn send_chat(&mut self, request: &SendRequest) -> Result<ChatReply> {
        self.client.send_message(
            &request.content,
            request.topic.as_deref(),
            request.session_id.as_ref(),
        )
    }

    fn load_chat_session(&mut self, id: &ChatSessionId) -> Result<ChatSessionDetail> {
        self.client.load_session(id)
    }

    fn list_chat_sessions(&mut self, page_number: u32) -> Result<Page<ChatSession>> {
        self.client
            .list_sessions(page_number, self.session_page_size)
    }

    fn delete_chat_session(&mut self, id: &ChatSessionId) -> Result<()> {
        self.client.delete_session(id)
    }

    fn spawn_fetch(
        &mut self,
        kind: EntityKind,
        ticket: FetchTicket,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        self.spawn_worker("fetch", move |client| {
            let result = client
                .fetch_records(kind, &ticket.query)
                .map_err(error_text);
            let _ = tx.send(InternalEvent::PageLoaded {
                kind,
                seq: ticket.seq,
                result,
            });
        })
    }

    fn spawn_submit(&mut self, submission: Submission, tx: Sender<InternalEvent>) -> Result<()> {
        self.spawn_worker("submit", move |client| {
            let result = client.submit(&submission).map_err(error_text);
            let _ = tx.send(InternalEvent::Submitted {
                kind: submission.kind(),
                update: submission.is_update(),
                result,
            });
        })
    }

    fn spawn_delete(&mut self, request: DeleteRequest, tx: Sender<InternalEvent>) -> Result<()> {
        self.spawn_worker("delete", move |client| {
            let result = client.delete_record(request.kind, &request.id).map_err(error_text);
            let _ = tx.send(InternalEvent::Deleted { request, result });
        })
    }

    fn spawn_chat(&mut self, request: SendRequest, tx: Sender<InternalEvent>) -> Result<()> {
        self.spawn_worker("chat", move |client| {
            let result = client
                .send_message(
                    &request.content,
                    request.topic.as_deref(),
                    request.session_id.as_ref(),
                )
                .map_err(error_text);
            let _ = tx.send(InternalEvent::ChatReplied {
                request_id: request.request_id,
                result,
            });
        })
    }

    fn spawn_list_sessions(&mut self, page_number: u32, tx: Sender<InternalEvent>) -> Result<()> {
        let page_size = self.session_page_size;
        self.spawn_worker("sessions", move |client| {
            let result = client
                .list_sessions(page_number, page_size)
                .map_err(error_text);
            let _ = tx.send(InternalEvent::SessionsListed { result });
        })
    }

    fn spawn_load_session(&mut self, id: ChatSessionId, tx: Sender<InternalEvent>) -> Result<()> {
        self.spawn_worker("session-load", move |client| {
            let result = client.load_session(&id).map_err(error_text);
            let _ = tx.send(InternalEvent::SessionLoaded { id, result });
        })
    }

    fn spawn_delete_session(&mut self, id: ChatSessionId, tx: Sender<InternalEvent>) -> Result<()> {
        self.spawn_worker("session-delete", move |client| {
            let result = client.delete_session(&id).map_err(error_text);
            let _ = tx.send(InternalEvent::SessionDeleted { id, result });
        })
    }
}
