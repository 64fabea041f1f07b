// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

use crate::ids::ChatSessionId;
use crate::model::{ChatMessage, ChatReply, ChatRole, ChatSessionDetail};

pub const REVEAL_INTERVAL: Duration = Duration::from_millis(20);
pub const TYPING_INTERVAL: Duration = Duration::from_millis(500);

/// Reveals a finished reply one character per tick. Pure presentation: the
/// full text is known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typewriter {
    chars: Vec<char>,
    revealed: usize,
}

impl Typewriter {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            revealed: 0,
        }
    }

    pub fn tick(&mut self) -> Option<char> {
        let next = self.chars.get(self.revealed).copied()?;
        self.revealed += 1;
        Some(next)
    }

    pub fn revealed(&self) -> String {
        self.chars[..self.revealed].iter().collect()
    }

    pub fn is_done(&self) -> bool {
        self.revealed >= self.chars.len()
    }
}

/// Dot count for the typing indicator: 1, 2, 3, 1, ... advancing every
/// `interval`.
pub fn typing_dots(elapsed: Duration, interval: Duration) -> usize {
    let step = interval.as_millis().max(1);
    1 + (elapsed.as_millis() / step % 3) as usize
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    Sending { request_id: u64, started: Instant },
    Revealing { typewriter: Typewriter },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub request_id: u64,
    pub content: String,
    pub topic: Option<String>,
    pub session_id: Option<ChatSessionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    Blank,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Ignored,
    Revealing,
    Failed(String),
}

/// Message history and send/reveal state for one chat session.
#[derive(Debug, Clone)]
pub struct ChatPanel {
    session_id: Option<ChatSessionId>,
    topic: Option<String>,
    messages: Vec<ChatMessage>,
    phase: ChatPhase,
    next_request_id: u64,
    last_error: Option<String>,
    typing_interval: Duration,
    pub input: String,
}

impl ChatPanel {
    pub fn new(topic: Option<String>, typing_interval: Duration) -> Self {
        Self {
            session_id: None,
            topic,
            messages: Vec::new(),
            phase: ChatPhase::Idle,
            next_request_id: 0,
            last_error: None,
            typing_interval,
            input: String::new(),
        }
    }

    pub fn session_id(&self) -> Option<&ChatSessionId> {
        self.session_id.as_ref()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> &ChatPhase {
        &self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == ChatPhase::Idle
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Appends the user's message and moves to Sending. The caller performs
    /// the network call and reports back through `receive`.
    pub fn begin_send(
        &mut self,
        content: &str,
        now: Instant,
    ) -> std::result::Result<SendRequest, SendRejected> {
        if !self.is_idle() {
            return Err(SendRejected::Busy);
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(SendRejected::Blank);
        }

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.last_error = None;
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: content.to_owned(),
            timestamp: OffsetDateTime::now_utc(),
        });
        self.phase = ChatPhase::Sending {
            request_id,
            started: now,
        };
        Ok(SendRequest {
            request_id,
            content: content.to_owned(),
            topic: self.topic.clone(),
            session_id: self.session_id.clone(),
        })
    }

    /// Sends the current input box contents, clearing it on success.
    pub fn send_input(&mut self, now: Instant) -> std::result::Result<SendRequest, SendRejected> {
        let input = std::mem::take(&mut self.input);
        let result = self.begin_send(&input, now);
        if result.is_err() {
            self.input = input;
        }
        result
    }

    pub fn receive(&mut self, request_id: u64, result: Result<ChatReply>) -> ReceiveOutcome {
        let current = matches!(
            self.phase,
            ChatPhase::Sending { request_id: pending, .. } if pending == request_id
        );
        if !current {
            tracing::debug!(request_id, "ignoring chat reply for a superseded request");
            return ReceiveOutcome::Ignored;
        }

        match result {
            Ok(reply) => {
                self.session_id = Some(reply.ai_chat_log.id);
                if reply.ai_chat_log.topic.is_some() {
                    self.topic = reply.ai_chat_log.topic;
                }
                self.messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: String::new(),
                    timestamp: OffsetDateTime::now_utc(),
                });
                self.phase = ChatPhase::Revealing {
                    typewriter: Typewriter::new(&reply.message_ai),
                };
                ReceiveOutcome::Revealing
            }
            Err(error) => {
                let message = format!("{error:#}");
                tracing::warn!(request_id, error = %message, "chat send failed");
                self.last_error = Some(message.clone());
                self.phase = ChatPhase::Idle;
                ReceiveOutcome::Failed(message)
            }
        }
    }

    /// Reveals one more character of the assistant reply. Returns whether
    /// anything changed.
    pub fn tick(&mut self) -> bool {
        let ChatPhase::Revealing { typewriter } = &mut self.phase else {
            return false;
        };
        let next = typewriter.tick();
        let done = typewriter.is_done();
        if let (Some(ch), Some(last)) = (next, self.messages.last_mut()) {
            last.content.push(ch);
        }
        if done {
            self.phase = ChatPhase::Idle;
        }
        true
    }

    pub fn typing_indicator(&self, now: Instant) -> Option<String> {
        match self.phase {
            ChatPhase::Sending { started, .. } => Some(".".repeat(typing_dots(
                now.saturating_duration_since(started),
                self.typing_interval,
            ))),
            _ => None,
        }
    }

    /// Replaces the panel with a stored session. History arrives newest
    /// first and is shown oldest first.
    pub fn load(&mut self, detail: ChatSessionDetail) {
        self.reset();
        self.session_id = Some(detail.session.id);
        if detail.session.topic.is_some() {
            self.topic = detail.session.topic;
        }
        self.messages = detail.messages;
        self.messages.reverse();
    }

    /// Starts a fresh conversation. Replies still in flight are ignored.
    pub fn reset(&mut self) {
        self.session_id = None;
        self.messages.clear();
        self.phase = ChatPhase::Idle;
        self.last_error = None;
        self.input.clear();
    }

    /// Resets the panel when the open session was deleted elsewhere.
    pub fn forget_session(&mut self, id: &ChatSessionId) -> bool {
        if self.session_id.as_ref() == Some(id) {
            self.reset();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ChatPanel, ChatPhase, ReceiveOutcome, SendRejected, TYPING_INTERVAL, Typewriter,
        typing_dots,
    };
    use crate::{Audit, ChatMessage, ChatReply, ChatRole, ChatSession, ChatSessionDetail, ChatSessionId};
    use anyhow::anyhow;
    use std::time::{Duration, Instant};
    use time::macros::datetime;

    fn session(id: &str) -> ChatSession {
        ChatSession {
            id: ChatSessionId::new(id),
            topic: Some("advising".to_owned()),
            audit: Audit::created(datetime!(2026-02-01 08:00 UTC)),
        }
    }

    fn reply(text: &str) -> ChatReply {
        ChatReply {
            ai_chat_log: session("s-1"),
            message_ai: text.to_owned(),
        }
    }

    fn panel() -> ChatPanel {
        ChatPanel::new(Some("advising".to_owned()), TYPING_INTERVAL)
    }

    #[test]
    fn typewriter_handles_multibyte_text() {
        let mut typewriter = Typewriter::new("hé!");
        assert_eq!(typewriter.tick(), Some('h'));
        assert_eq!(typewriter.tick(), Some('é'));
        assert_eq!(typewriter.revealed(), "hé");
        assert_eq!(typewriter.tick(), Some('!'));
        assert!(typewriter.is_done());
        assert_eq!(typewriter.tick(), None);
    }

    #[test]
    fn typing_dots_cycle_one_to_three() {
        let interval = Duration::from_millis(500);
        let dots = [0, 499, 500, 1000, 1500, 2000]
            .map(|ms| typing_dots(Duration::from_millis(ms), interval));
        assert_eq!(dots, [1, 1, 2, 3, 1, 2]);
    }

    #[test]
    fn reveal_grows_one_character_per_tick() {
        let mut chat = panel();
        let request = chat.begin_send("What is SE?", Instant::now()).expect("send");
        assert_eq!(
            chat.receive(request.request_id, Ok(reply("Hello"))),
            ReceiveOutcome::Revealing
        );

        let mut lengths = vec![chat.messages().last().map_or(0, |m| m.content.len())];
        while chat.tick() {
            lengths.push(chat.messages().last().map_or(0, |m| m.content.len()));
        }
        assert_eq!(lengths, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(chat.messages().last().map(|m| m.content.as_str()), Some("Hello"));
        assert!(chat.is_idle());
        assert_eq!(chat.session_id().map(ChatSessionId::as_str), Some("s-1"));
    }

    #[test]
    fn send_requires_idle_and_text() {
        let mut chat = panel();
        let now = Instant::now();
        assert_eq!(chat.begin_send("   ", now), Err(SendRejected::Blank));
        let request = chat.begin_send("hi", now).expect("send");
        assert_eq!(request.topic.as_deref(), Some("advising"));
        assert!(request.session_id.is_none());
        assert_eq!(chat.begin_send("again", now), Err(SendRejected::Busy));
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].role, ChatRole::User);
    }

    #[test]
    fn typing_indicator_only_while_sending() {
        let mut chat = panel();
        let start = Instant::now();
        assert!(chat.typing_indicator(start).is_none());
        let request = chat.begin_send("hi", start).expect("send");
        assert_eq!(
            chat.typing_indicator(start + Duration::from_millis(1100)).as_deref(),
            Some("...")
        );
        chat.receive(request.request_id, Ok(reply("ok")));
        assert!(chat.typing_indicator(start).is_none());
    }

    #[test]
    fn failed_send_returns_to_idle_with_error() {
        let mut chat = panel();
        let request = chat.begin_send("hi", Instant::now()).expect("send");
        let outcome = chat.receive(request.request_id, Err(anyhow!("cannot reach server")));
        assert_eq!(outcome, ReceiveOutcome::Failed("cannot reach server".to_owned()));
        assert_eq!(chat.phase(), &ChatPhase::Idle);
        assert_eq!(chat.last_error(), Some("cannot reach server"));
        assert_eq!(chat.messages().len(), 1);
    }

    #[test]
    fn reply_after_session_switch_is_ignored() {
        let mut chat = panel();
        let request = chat.begin_send("hi", Instant::now()).expect("send");
        chat.load(ChatSessionDetail {
            session: session("s-9"),
            messages: Vec::new(),
        });
        assert_eq!(
            chat.receive(request.request_id, Ok(reply("late"))),
            ReceiveOutcome::Ignored
        );
        assert_eq!(chat.session_id().map(ChatSessionId::as_str), Some("s-9"));
        assert!(chat.messages().is_empty());
    }

    #[test]
    fn loaded_history_is_chronological() {
        let message = |role, content: &str, ts| ChatMessage {
            role,
            content: content.to_owned(),
            timestamp: ts,
        };
        let mut chat = panel();
        chat.load(ChatSessionDetail {
            session: session("s-2"),
            messages: vec![
                message(ChatRole::Assistant, "third", datetime!(2026-02-01 08:03 UTC)),
                message(ChatRole::User, "second", datetime!(2026-02-01 08:02 UTC)),
                message(ChatRole::Assistant, "first", datetime!(2026-02-01 08:01 UTC)),
            ],
        });
        let contents = chat
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn reveal_never_jumps_ahead() {
        let mut chat = panel();
        let request = chat.begin_send("hi", Instant::now()).expect("send");
        chat.receive(request.request_id, Ok(reply("abcdef")));
        assert!(chat.tick());
        assert_eq!(chat.messages().last().map(|m| m.content.as_str()), Some("a"));
        assert!(!chat.is_idle());

        // A new send is refused until the whole reply is shown.
        assert_eq!(
            chat.begin_send("next", Instant::now()),
            Err(SendRejected::Busy)
        );
        for _ in 0..5 {
            assert!(chat.tick());
        }
        assert_eq!(chat.messages().last().map(|m| m.content.as_str()), Some("abcdef"));
        assert!(chat.is_idle());
    }

    #[test]
    fn deleting_open_session_resets_panel() {
        let mut chat = panel();
        chat.load(ChatSessionDetail {
            session: session("s-3"),
            messages: Vec::new(),
        });
        assert!(!chat.forget_session(&ChatSessionId::new("other")));
        assert!(chat.forget_session(&ChatSessionId::new("s-3")));
        assert!(chat.session_id().is_none());
    }
}
