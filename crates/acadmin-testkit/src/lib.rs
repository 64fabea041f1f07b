// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acadmin_app::{
    Audit, AuthSession, ChatMessage, ChatRole, ChatSession, ChatSessionDetail, ChatSessionId,
    Entity, ListQuery, Major, MajorId, Page, Program, ProgramId, RecordId, Resource,
    SessionStore, SortDirection, Student, StudentId, Subject, SubjectId,
};
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::macros::{date, datetime};
use time::{Date, Duration, OffsetDateTime};

const PROGRAM_NAMES: [&str; 6] = [
    "Software Engineering",
    "Information Assurance",
    "Artificial Intelligence",
    "Digital Art and Design",
    "Business Administration",
    "Multimedia Communication",
];

const SUBJECT_NAMES: [&str; 10] = [
    "Programming Fundamentals",
    "Discrete Mathematics",
    "Data Structures and Algorithms",
    "Operating Systems",
    "Computer Networking",
    "Database Systems",
    "Software Requirements",
    "Software Testing",
    "Web Development",
    "Statistics and Probability",
];

const FIRST_NAMES: [&str; 12] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Quinn", "Parker", "Kai", "Robin",
    "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 12] = [
    "Nguyen", "Tran", "Le", "Pham", "Walker", "Martin", "Hill", "Evans", "Lopez", "Reed",
    "Turner", "Brooks",
];

pub fn fixture_today() -> Date {
    date!(2026 - 03 - 15)
}

pub fn fixture_datetime() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

pub fn fixture_audit() -> Audit {
    Audit::created(fixture_datetime())
}

pub fn deleted_audit() -> Audit {
    Audit {
        deleted_at: Some(fixture_datetime() + Duration::days(1)),
        is_delete: true,
        ..fixture_audit()
    }
}

pub fn sample_program(id: &str, code: &str) -> Program {
    Program {
        id: ProgramId::new(id),
        program_code: code.to_owned(),
        program_name: format!("{code} program"),
        description: None,
        is_active: true,
        audit: fixture_audit(),
    }
}

pub fn sample_major(id: &str, code: &str, start_at: Date) -> Major {
    Major {
        id: MajorId::new(id),
        major_code: code.to_owned(),
        major_name: format!("{code} major"),
        description: None,
        start_at,
        program_id: None,
        is_active: true,
        audit: fixture_audit(),
    }
}

pub fn sample_subject(id: &str, code: &str, credits: i32) -> Subject {
    Subject {
        id: SubjectId::new(id),
        subject_code: code.to_owned(),
        subject_name: format!("{code} subject"),
        description: None,
        no_credit: credits,
        curriculum_id: None,
        is_active: true,
        is_approved: false,
        audit: fixture_audit(),
    }
}

pub fn sample_student(id: &str, code: &str) -> Student {
    Student {
        id: StudentId::new(id),
        student_code: code.to_owned(),
        full_name: format!("Student {code}"),
        email: format!("{}@example.edu", code.to_ascii_lowercase()),
        major_id: None,
        combo_id: None,
        is_active: true,
        audit: fixture_audit(),
    }
}

pub fn soft_deleted<E: Entity>(mut record: E) -> E {
    *record.audit_mut() = deleted_audit();
    record
}

/// A stored session whose messages are newest first, as the server sends
/// them. `contents` is given oldest first.
pub fn sample_chat_detail(id: &str, contents: &[&str]) -> ChatSessionDetail {
    let mut messages = contents
        .iter()
        .enumerate()
        .map(|(index, content)| ChatMessage {
            role: if index % 2 == 0 {
                ChatRole::User
            } else {
                ChatRole::Assistant
            },
            content: (*content).to_owned(),
            timestamp: fixture_datetime() + Duration::minutes(index as i64),
        })
        .collect::<Vec<_>>();
    messages.reverse();
    ChatSessionDetail {
        session: ChatSession {
            id: ChatSessionId::new(id),
            topic: Some("advising".to_owned()),
            audit: fixture_audit(),
        },
        messages,
    }
}

pub fn temp_data_dir() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("session.json");
    Ok((dir, path))
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for realistic catalog rows.
#[derive(Debug, Clone)]
pub struct CatalogFaker {
    rng: DeterministicRng,
    serial: u32,
}

impl CatalogFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed.max(1)),
            serial: 0,
        }
    }

    /// A canonical version-4 style UUID string.
    pub fn uuid(&mut self) -> String {
        let high = self.rng.next_u64();
        let low = self.rng.next_u64();
        format!(
            "{:08x}-{:04x}-4{:03x}-{:x}{:03x}-{:012x}",
            high >> 32,
            (high >> 16) & 0xffff,
            high & 0x0fff,
            8 + (low >> 62),
            (low >> 48) & 0x0fff,
            low & 0xffff_ffff_ffff,
        )
    }

    fn next_serial(&mut self) -> u32 {
        self.serial += 1;
        self.serial
    }

    fn pick<'a>(&mut self, values: &'a [&'a str]) -> &'a str {
        values[self.rng.int_n(values.len())]
    }

    pub fn program(&mut self) -> Program {
        let serial = self.next_serial();
        let name = self.pick(&PROGRAM_NAMES);
        let code = name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .filter(char::is_ascii_uppercase)
            .collect::<String>();
        Program {
            id: ProgramId::new(self.uuid()),
            program_code: format!("{code}{serial:02}"),
            program_name: name.to_owned(),
            description: Some(format!("Undergraduate program in {}", name.to_lowercase())),
            is_active: true,
            audit: fixture_audit(),
        }
    }

    pub fn major(&mut self, program: Option<&Program>) -> Major {
        let serial = self.next_serial();
        let start_at = fixture_today() + Duration::days(30 * self.rng.int_n(12) as i64);
        let name = self.pick(&PROGRAM_NAMES);
        Major {
            id: MajorId::new(self.uuid()),
            major_code: format!("MA{serial:02}"),
            major_name: name.to_owned(),
            description: None,
            start_at,
            program_id: program.map(|program| program.id.clone()),
            is_active: true,
            audit: fixture_audit(),
        }
    }

    pub fn subject(&mut self) -> Subject {
        let serial = self.next_serial();
        let name = self.pick(&SUBJECT_NAMES);
        Subject {
            id: SubjectId::new(self.uuid()),
            subject_code: format!("SUB{serial:03}"),
            subject_name: name.to_owned(),
            description: None,
            no_credit: 1 + self.rng.int_n(5) as i32,
            curriculum_id: None,
            is_active: true,
            is_approved: self.rng.int_n(2) == 1,
            audit: fixture_audit(),
        }
    }

    pub fn student(&mut self, major: Option<&Major>) -> Student {
        let serial = self.next_serial();
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        Student {
            id: StudentId::new(self.uuid()),
            student_code: format!("SE{:05}", 10_000 + serial),
            full_name: format!("{first} {last}"),
            email: format!(
                "{}.{}{serial}@example.edu",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase()
            ),
            major_id: major.map(|major| major.id.clone()),
            combo_id: None,
            is_active: true,
            audit: fixture_audit(),
        }
    }
}

type Builder<E> = Box<dyn Fn(RecordId, &<E as Entity>::Input) -> E + Send + Sync>;

struct MemoryState<E: Entity> {
    records: Vec<E>,
    queries: Vec<ListQuery>,
    created: Vec<E::Input>,
    updated: Vec<(RecordId, E::Input)>,
    deleted: Vec<RecordId>,
    fail_next: Option<String>,
    ignore_partition: bool,
    next_id: u64,
}

/// In-memory stand-in for one REST collection. Deletes are soft, every call
/// is recorded, and failures can be injected.
pub struct MemoryResource<E: Entity> {
    state: Mutex<MemoryState<E>>,
    builder: Option<Builder<E>>,
}

impl<E: Entity> MemoryResource<E> {
    pub fn new(records: Vec<E>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                records,
                queries: Vec::new(),
                created: Vec::new(),
                updated: Vec::new(),
                deleted: Vec::new(),
                fail_next: None,
                ignore_partition: false,
                next_id: 0,
            }),
            builder: None,
        }
    }

    /// Lets create and update materialize rows from their inputs.
    pub fn with_builder(
        mut self,
        builder: impl Fn(RecordId, &E::Input) -> E + Send + Sync + 'static,
    ) -> Self {
        self.builder = Some(Box::new(builder));
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn records(&self) -> Vec<E> {
        self.lock().records.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.lock().queries.len()
    }

    pub fn queries(&self) -> Vec<ListQuery> {
        self.lock().queries.clone()
    }

    pub fn created(&self) -> Vec<E::Input> {
        self.lock().created.clone()
    }

    pub fn updated(&self) -> Vec<(RecordId, E::Input)> {
        self.lock().updated.clone()
    }

    pub fn deleted(&self) -> Vec<RecordId> {
        self.lock().deleted.clone()
    }

    pub fn write_calls(&self) -> usize {
        let state = self.lock();
        state.created.len() + state.updated.len() + state.deleted.len()
    }

    /// The next call of any kind fails with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().fail_next = Some(message.into());
    }

    /// Serve both partitions regardless of `isDelete`, like a server that
    /// ignores the filter.
    pub fn ignore_partition(&self) {
        self.lock().ignore_partition = true;
    }
}

fn take_failure<E: Entity>(state: &mut MemoryState<E>) -> Result<()> {
    if let Some(message) = state.fail_next.take() {
        bail!("{message}");
    }
    Ok(())
}

impl<E: Entity> Resource for MemoryResource<E> {
    type Record = E;
    type Input = E::Input;

    fn fetch_page(&self, query: &ListQuery) -> Result<Page<E>> {
        let mut state = self.lock();
        state.queries.push(query.clone());
        take_failure(&mut state)?;

        let needle = query.search.to_lowercase();
        let mut rows = state
            .records
            .iter()
            .filter(|row| state.ignore_partition || row.is_deleted() == query.is_delete)
            .filter(|row| needle.is_empty() || row.label().to_lowercase().contains(&needle))
            .cloned()
            .collect::<Vec<_>>();
        if query.sort_type == SortDirection::Descending {
            rows.reverse();
        }

        let size = query.page_size.max(1) as usize;
        let total_pages = rows.len().div_ceil(size) as u32;
        let skip = (query.page_number.max(1) as usize - 1) * size;
        let items = rows.into_iter().skip(skip).take(size).collect();
        Ok(Page::new(items, total_pages))
    }

    fn create(&self, input: &E::Input) -> Result<()> {
        let mut state = self.lock();
        state.created.push(input.clone());
        take_failure(&mut state)?;
        if let Some(builder) = &self.builder {
            state.next_id += 1;
            let id = RecordId::new(format!("mem-{}", state.next_id));
            let record = builder(id, input);
            state.records.push(record);
        }
        Ok(())
    }

    fn update(&self, id: &RecordId, input: &E::Input) -> Result<()> {
        let mut state = self.lock();
        state.updated.push((id.clone(), input.clone()));
        take_failure(&mut state)?;
        let Some(slot) = state.records.iter_mut().find(|row| &row.record_id() == id) else {
            bail!("server error (404): {} {id} not found", E::KIND.noun());
        };
        if let Some(builder) = &self.builder {
            let audit = slot.audit().clone();
            *slot = builder(id.clone(), input);
            *slot.audit_mut() = audit;
        }
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<()> {
        let mut state = self.lock();
        state.deleted.push(id.clone());
        take_failure(&mut state)?;
        let Some(slot) = state.records.iter_mut().find(|row| &row.record_id() == id) else {
            bail!("server error (404): {} {id} not found", E::KIND.noun());
        };
        let audit = slot.audit_mut();
        audit.is_delete = true;
        audit.deleted_at = Some(fixture_datetime());
        Ok(())
    }
}

/// `SessionStore` that keeps the session in memory and counts writes.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<AuthSession>>,
    saves: Mutex<usize>,
}

impl MemorySessionStore {
    pub fn with_session(session: AuthSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            saves: Mutex::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<AuthSession>> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &AuthSession) -> Result<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
