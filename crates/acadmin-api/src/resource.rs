// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acadmin_app::{
    Assessment, Clo, Combo, Curriculum, Entity, EntityKind, FormPayload, ListQuery, Major,
    Material, Page, Plo, Po, Prerequisite, Program, Record, RecordId, Resource, Student, Subject,
    Submission, Tool,
};
use anyhow::Result;
use std::marker::PhantomData;

use crate::Client;

/// One entity collection served over HTTP.
pub struct ApiResource<'a, E> {
    client: &'a Client,
    entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> ApiResource<'a, E> {
    pub fn new(client: &'a Client) -> Self {
        Self {
            client,
            entity: PhantomData,
        }
    }
}

impl<E: Entity> Resource for ApiResource<'_, E> {
    type Record = E;
    type Input = E::Input;

    fn fetch_page(&self, query: &ListQuery) -> Result<Page<E>> {
        self.client.fetch_page(E::KIND, query)
    }

    fn create(&self, input: &E::Input) -> Result<()> {
        self.client.create(E::KIND, input)
    }

    fn update(&self, id: &RecordId, input: &E::Input) -> Result<()> {
        self.client.update(E::KIND, id, input)
    }

    fn delete(&self, id: &RecordId) -> Result<()> {
        self.client.delete(E::KIND, id)
    }
}

fn erase<E: Entity>(page: Page<E>) -> Page<Record> {
    Page {
        items: page.items.into_iter().map(Entity::into_record).collect(),
        total_pages: page.total_pages,
    }
}

impl Client {
    pub fn resource<E: Entity>(&self) -> ApiResource<'_, E> {
        ApiResource::new(self)
    }

    fn page_of<E: Entity>(&self, query: &ListQuery) -> Result<Page<Record>> {
        self.resource::<E>().fetch_page(query).map(erase)
    }

    /// A page of any entity kind, for callers that pick the kind at runtime.
    pub fn fetch_records(&self, kind: EntityKind, query: &ListQuery) -> Result<Page<Record>> {
        match kind {
            EntityKind::Curriculums => self.page_of::<Curriculum>(query),
            EntityKind::Subjects => self.page_of::<Subject>(query),
            EntityKind::Programs => self.page_of::<Program>(query),
            EntityKind::Majors => self.page_of::<Major>(query),
            EntityKind::Combos => self.page_of::<Combo>(query),
            EntityKind::Assessments => self.page_of::<Assessment>(query),
            EntityKind::Clos => self.page_of::<Clo>(query),
            EntityKind::Plos => self.page_of::<Plo>(query),
            EntityKind::Pos => self.page_of::<Po>(query),
            EntityKind::Prerequisites => self.page_of::<Prerequisite>(query),
            EntityKind::Materials => self.page_of::<Material>(query),
            EntityKind::Tools => self.page_of::<Tool>(query),
            EntityKind::Students => self.page_of::<Student>(query),
        }
    }

    fn write<E: Entity>(&self, target: Option<&RecordId>, input: &E::Input) -> Result<()> {
        let resource = self.resource::<E>();
        match target {
            Some(id) => resource.update(id, input),
            None => resource.create(input),
        }
    }

    /// Sends a validated form: create when it has no target, update
    /// otherwise.
    pub fn submit(&self, submission: &Submission) -> Result<()> {
        let target = submission.target.as_ref();
        match &submission.payload {
            FormPayload::Curriculum(input) => self.write::<Curriculum>(target, input),
            FormPayload::Subject(input) => self.write::<Subject>(target, input),
            FormPayload::Program(input) => self.write::<Program>(target, input),
            FormPayload::Major(input) => self.write::<Major>(target, input),
            FormPayload::Combo(input) => self.write::<Combo>(target, input),
            FormPayload::Assessment(input) => self.write::<Assessment>(target, input),
            FormPayload::Clo(input) => self.write::<Clo>(target, input),
            FormPayload::Plo(input) => self.write::<Plo>(target, input),
            FormPayload::Po(input) => self.write::<Po>(target, input),
            FormPayload::Prerequisite(input) => self.write::<Prerequisite>(target, input),
            FormPayload::Material(input) => self.write::<Material>(target, input),
            FormPayload::Tool(input) => self.write::<Tool>(target, input),
            FormPayload::Student(input) => self.write::<Student>(target, input),
        }
    }

    /// Deletes one record of any entity kind.
    pub fn delete_record(&self, kind: EntityKind, id: &RecordId) -> Result<()> {
        match kind {
            EntityKind::Curriculums => self.resource::<Curriculum>().delete(id),
            EntityKind::Subjects => self.resource::<Subject>().delete(id),
            EntityKind::Programs => self.resource::<Program>().delete(id),
            EntityKind::Majors => self.resource::<Major>().delete(id),
            EntityKind::Combos => self.resource::<Combo>().delete(id),
            EntityKind::Assessments => self.resource::<Assessment>().delete(id),
            EntityKind::Clos => self.resource::<Clo>().delete(id),
            EntityKind::Plos => self.resource::<Plo>().delete(id),
            EntityKind::Pos => self.resource::<Po>().delete(id),
            EntityKind::Prerequisites => self.resource::<Prerequisite>().delete(id),
            EntityKind::Materials => self.resource::<Material>().delete(id),
            EntityKind::Tools => self.resource::<Tool>().delete(id),
            EntityKind::Students => self.resource::<Student>().delete(id),
        }
    }
}
