// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acadmin_app::{
    ApplyOutcome, ChatPanel, ConfirmDialog, DeleteRequest, Entity, EntityKind, FormModal,
    FormPayload, ListController, Major, MajorId, MajorInput, Program, RecordId, Resource,
    SEARCH_DEBOUNCE, SubmitBlocked, SubmitOutcome, Submission, TYPING_INTERVAL,
};
use acadmin_testkit::{
    MemoryResource, fixture_audit, fixture_today, sample_chat_detail, sample_major,
    sample_program, soft_deleted,
};
use anyhow::Result;
use std::cell::Cell;
use std::time::{Duration, Instant};
use time::Duration as DateDuration;

fn majors() -> MemoryResource<Major> {
    MemoryResource::new(vec![
        sample_major("abc-123", "MA01", fixture_today()),
        sample_major("def-456", "MA02", fixture_today()),
    ])
    .with_builder(|id, input: &MajorInput| Major {
        id: MajorId::new(id.as_str()),
        major_code: input.major_code.clone(),
        major_name: input.major_name.clone(),
        description: input.description.clone(),
        start_at: input.start_at,
        program_id: input.program_id.clone(),
        is_active: input.is_active,
        audit: fixture_audit(),
    })
}

fn send_major(resource: &MemoryResource<Major>) -> impl FnOnce(&Submission) -> Result<()> + '_ {
    move |submission: &Submission| match (&submission.payload, &submission.target) {
        (FormPayload::Major(input), None) => resource.create(input),
        (FormPayload::Major(input), Some(id)) => resource.update(id, input),
        (other, _) => anyhow::bail!("unexpected payload for {:?}", other.kind()),
    }
}

#[test]
fn typing_a_search_fetches_once_for_the_final_value() {
    let resource = majors();
    let mut list = ListController::new(10, SEARCH_DEBOUNCE);
    list.load(&resource);

    let start = Instant::now();
    for (step, text) in ["m", "ma", "ma0", "ma02"].into_iter().enumerate() {
        let now = start + Duration::from_millis(step as u64 * 120);
        list.type_search(text, now);
        assert!(list.poll(now).is_none());
    }
    let ticket = list
        .poll(start + Duration::from_secs(2))
        .expect("search settles");
    let result = ListController::fetch(&resource, &ticket);
    list.apply(ticket.seq, result);

    assert_eq!(resource.fetch_calls(), 2);
    assert_eq!(resource.queries()[1].search, "ma02");
    assert_eq!(list.items().len(), 1);
    assert_eq!(list.items()[0].major_code, "MA02");
}

#[test]
fn major_with_past_start_date_never_reaches_the_server() {
    let resource = majors();
    let mut modal = FormModal::create(EntityKind::Majors);
    modal.draft.set("majorCode", "MA01");
    modal.draft.set("majorName", "Software");
    let yesterday = fixture_today() - DateDuration::days(1);
    modal.draft.set("startAt", yesterday.to_string());

    let refreshed = Cell::new(0);
    let blocked = modal
        .submit_with(fixture_today(), send_major(&resource), || {
            refreshed.set(refreshed.get() + 1)
        })
        .expect_err("validation should block");

    let SubmitBlocked::Invalid(errors) = blocked else {
        panic!("expected validation errors");
    };
    assert!(errors.for_field("startAt").is_some());
    assert_eq!(resource.write_calls(), 0);
    assert_eq!(refreshed.get(), 0);
}

#[test]
fn create_then_refresh_shows_the_new_row() -> Result<()> {
    let resource = majors();
    let mut list = ListController::new(10, SEARCH_DEBOUNCE);
    list.load(&resource);
    assert_eq!(list.items().len(), 2);

    let mut modal = FormModal::create(EntityKind::Majors);
    modal.draft.set("majorCode", "MA03");
    modal.draft.set("majorName", "Data Science");
    modal.draft.set("startAt", fixture_today().to_string());

    let refreshes = Cell::new(0);
    let outcome = modal
        .submit_with(fixture_today(), send_major(&resource), || {
            refreshes.set(refreshes.get() + 1)
        })
        .map_err(|blocked| anyhow::anyhow!("blocked: {blocked:?}"))?;
    assert!(matches!(outcome, SubmitOutcome::Saved(_)));
    assert_eq!(refreshes.get(), 1);

    list.load(&resource);
    assert_eq!(list.items().len(), 3);
    assert_eq!(resource.created().len(), 1);
    Ok(())
}

#[test]
fn edit_updates_the_selected_record() -> Result<()> {
    let resource = majors();
    let record = resource.records()[0].clone().into_record();
    let mut modal = FormModal::edit(&record);
    assert_eq!(modal.draft.get("majorCode"), "MA01");
    modal.draft.set("majorName", "Software Engineering");

    modal
        .submit_with(fixture_today(), send_major(&resource), || {})
        .map_err(|blocked| anyhow::anyhow!("blocked: {blocked:?}"))?;

    let updated = resource.updated();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].0, RecordId::new("abc-123"));
    assert_eq!(resource.records()[0].major_name, "Software Engineering");
    Ok(())
}

#[test]
fn server_failure_keeps_the_modal_open() {
    let resource = majors();
    resource.fail_next("server error (409): majorCode already exists");
    let mut modal = FormModal::create(EntityKind::Majors);
    modal.draft.set("majorCode", "MA01");
    modal.draft.set("majorName", "Software");
    modal.draft.set("startAt", fixture_today().to_string());

    let refreshes = Cell::new(0);
    let outcome = modal
        .submit_with(fixture_today(), send_major(&resource), || {
            refreshes.set(refreshes.get() + 1)
        })
        .expect("valid form");

    let SubmitOutcome::Failed(notification) = outcome else {
        panic!("expected failure");
    };
    assert!(notification.is_failure());
    assert!(notification.message.contains("already exists"));
    assert_eq!(refreshes.get(), 0);
    assert!(!modal.is_pending());
}

#[test]
fn delete_requires_confirmation_then_refetches_once() {
    let resource = majors();
    let mut list = ListController::new(10, SEARCH_DEBOUNCE);
    list.load(&resource);
    let fetches_before = resource.fetch_calls();

    let request = DeleteRequest {
        kind: EntityKind::Majors,
        id: RecordId::new("abc-123"),
        label: "MA01".to_owned(),
    };
    let mut dialog = ConfirmDialog::default();
    dialog.open(request.clone());
    assert!(resource.deleted().is_empty());
    dialog.cancel();
    assert!(resource.deleted().is_empty());

    dialog.open(request);
    let notification = dialog
        .confirm_with(|id| resource.delete(id), || {
            list.load(&resource);
        })
        .expect("dialog had a request");

    assert!(!notification.is_failure());
    assert_eq!(resource.deleted(), vec![RecordId::new("abc-123")]);
    assert_eq!(resource.fetch_calls(), fetches_before + 1);
    assert_eq!(list.items().len(), 1);
    assert!(!dialog.is_open());
}

#[test]
fn active_and_deleted_partitions_never_mix() {
    let resource = MemoryResource::new(vec![
        sample_program("p-1", "SE"),
        soft_deleted(sample_program("p-2", "AI")),
    ]);
    resource.ignore_partition();

    let mut list: ListController<Program> = ListController::new(10, SEARCH_DEBOUNCE);
    assert_eq!(list.load(&resource), ApplyOutcome::Applied { dropped: 1 });
    assert!(list.items().iter().all(|row| !row.audit.is_delete));

    let ticket = list.set_show_deleted(true).expect("partition change");
    let result = ListController::fetch(&resource, &ticket);
    list.apply(ticket.seq, result);
    assert_eq!(list.items().len(), 1);
    assert!(list.items().iter().all(|row| row.audit.is_delete));
}

#[test]
fn stale_fetch_is_discarded_after_a_newer_one() {
    let resource = majors();
    let mut list = ListController::new(10, SEARCH_DEBOUNCE);
    let slow = list.refresh();
    let slow_result = ListController::fetch(&resource, &slow);

    list.type_search("MA02", Instant::now());
    let fast = list.commit_search().expect("search changed");
    let fast_result = ListController::fetch(&resource, &fast);

    list.apply(fast.seq, fast_result);
    assert_eq!(list.apply(slow.seq, slow_result), ApplyOutcome::Stale);
    assert_eq!(list.items().len(), 1);
    assert_eq!(list.items()[0].major_code, "MA02");
}

#[test]
fn fetch_failure_leaves_the_table_unchanged() {
    let resource = majors();
    let mut list = ListController::new(10, SEARCH_DEBOUNCE);
    list.load(&resource);
    resource.fail_next("cannot reach http://localhost:5000 -- is the API running?");

    let outcome = list.load(&resource);
    assert!(matches!(outcome, ApplyOutcome::Failed(_)));
    assert_eq!(list.items().len(), 2);
}

#[test]
fn loaded_session_history_reads_oldest_first() {
    let mut chat = ChatPanel::new(None, TYPING_INTERVAL);
    chat.load(sample_chat_detail("s-1", &["hi", "hello", "what majors exist?"]));
    let contents = chat
        .messages()
        .iter()
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>();
    assert_eq!(contents, vec!["hi", "hello", "what majors exist?"]);
    assert_eq!(chat.topic(), Some("advising"));
}
