// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use time::Date;
use time::macros::format_description;
use uuid::Uuid;

use crate::ids::*;
use crate::model::{ConditionType, EntityKind, Record, iso_date};
use crate::state::Notification;

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Date,
    Uuid,
    Flag,
    Email,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: &'static str,
}

const fn required(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        key,
        label,
        kind,
        required: true,
        default: "",
    }
}

const fn optional(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        key,
        label,
        kind,
        required: false,
        default: "",
    }
}

const fn flag(key: &'static str, label: &'static str, default: bool) -> FieldSpec {
    FieldSpec {
        key,
        label,
        kind: FieldKind::Flag,
        required: false,
        default: if default { "yes" } else { "no" },
    }
}

const CURRICULUM_FIELDS: [FieldSpec; 7] = [
    required("curriculumCode", "code", FieldKind::Text),
    required("curriculumName", "name", FieldKind::Text),
    optional("description", "description", FieldKind::Text),
    optional("decisionNo", "decision no", FieldKind::Text),
    optional("totalCredit", "total credit", FieldKind::Integer),
    flag("isActive", "active", true),
    flag("isApproved", "approved", false),
];

const SUBJECT_FIELDS: [FieldSpec; 7] = [
    required("subjectCode", "code", FieldKind::Text),
    required("subjectName", "name", FieldKind::Text),
    optional("description", "description", FieldKind::Text),
    required("noCredit", "credits", FieldKind::Integer),
    optional("curriculumId", "curriculum id", FieldKind::Uuid),
    flag("isActive", "active", true),
    flag("isApproved", "approved", false),
];

const PROGRAM_FIELDS: [FieldSpec; 4] = [
    required("programCode", "code", FieldKind::Text),
    required("programName", "name", FieldKind::Text),
    optional("description", "description", FieldKind::Text),
    flag("isActive", "active", true),
];

const MAJOR_FIELDS: [FieldSpec; 6] = [
    required("majorCode", "code", FieldKind::Text),
    required("majorName", "name", FieldKind::Text),
    optional("description", "description", FieldKind::Text),
    required("startAt", "start date", FieldKind::Date),
    optional("programId", "program id", FieldKind::Uuid),
    flag("isActive", "active", true),
];

const COMBO_FIELDS: [FieldSpec; 5] = [
    required("comboCode", "code", FieldKind::Text),
    required("comboName", "name", FieldKind::Text),
    optional("description", "description", FieldKind::Text),
    required("programId", "program id", FieldKind::Uuid),
    flag("isActive", "active", true),
];

const ASSESSMENT_FIELDS: [FieldSpec; 7] = [
    required("subjectId", "subject id", FieldKind::Uuid),
    required("category", "category", FieldKind::Text),
    required("assessmentType", "type", FieldKind::Text),
    required("part", "part", FieldKind::Integer),
    required("weight", "weight %", FieldKind::Decimal),
    optional("completionCriteria", "completion criteria", FieldKind::Text),
    optional("duration", "duration", FieldKind::Text),
];

const CLO_FIELDS: [FieldSpec; 4] = [
    required("cloName", "name", FieldKind::Text),
    required("cloDetails", "details", FieldKind::Text),
    required("subjectId", "subject id", FieldKind::Uuid),
    required("assessmentId", "assessment id", FieldKind::Uuid),
];

const PLO_FIELDS: [FieldSpec; 3] = [
    required("ploName", "name", FieldKind::Text),
    required("ploDescription", "description", FieldKind::Text),
    required("curriculumId", "curriculum id", FieldKind::Uuid),
];

const PO_FIELDS: [FieldSpec; 3] = [
    required("poName", "name", FieldKind::Text),
    required("poDescription", "description", FieldKind::Text),
    required("programId", "program id", FieldKind::Uuid),
];

const PREREQUISITE_FIELDS: [FieldSpec; 3] = [
    required("subjectId", "subject id", FieldKind::Uuid),
    required("prerequisiteSubjectId", "requires subject id", FieldKind::Uuid),
    FieldSpec {
        key: "conditionType",
        label: "condition",
        kind: FieldKind::Choice(&ConditionType::NAMES),
        required: true,
        default: "prerequisite",
    },
];

const MATERIAL_FIELDS: [FieldSpec; 11] = [
    required("materialName", "name", FieldKind::Text),
    optional("author", "author", FieldKind::Text),
    optional("publisher", "publisher", FieldKind::Text),
    optional("publishedDate", "published", FieldKind::Date),
    optional("edition", "edition", FieldKind::Text),
    optional("isbn", "ISBN", FieldKind::Text),
    flag("isMainMaterial", "main material", false),
    flag("isHardCopy", "hard copy", false),
    flag("isOnline", "online", false),
    optional("note", "note", FieldKind::Text),
    required("subjectId", "subject id", FieldKind::Uuid),
];

const TOOL_FIELDS: [FieldSpec; 6] = [
    required("toolName", "name", FieldKind::Text),
    optional("author", "author", FieldKind::Text),
    optional("publisher", "publisher", FieldKind::Text),
    optional("publishedDate", "published", FieldKind::Date),
    optional("description", "description", FieldKind::Text),
    optional("note", "note", FieldKind::Text),
];

const STUDENT_FIELDS: [FieldSpec; 6] = [
    required("studentCode", "code", FieldKind::Text),
    required("fullName", "full name", FieldKind::Text),
    required("email", "email", FieldKind::Email),
    optional("majorId", "major id", FieldKind::Uuid),
    optional("comboId", "combo id", FieldKind::Uuid),
    flag("isActive", "active", true),
];

pub fn field_specs(kind: EntityKind) -> &'static [FieldSpec] {
    match kind {
        EntityKind::Curriculums => &CURRICULUM_FIELDS,
        EntityKind::Subjects => &SUBJECT_FIELDS,
        EntityKind::Programs => &PROGRAM_FIELDS,
        EntityKind::Majors => &MAJOR_FIELDS,
        EntityKind::Combos => &COMBO_FIELDS,
        EntityKind::Assessments => &ASSESSMENT_FIELDS,
        EntityKind::Clos => &CLO_FIELDS,
        EntityKind::Plos => &PLO_FIELDS,
        EntityKind::Pos => &PO_FIELDS,
        EntityKind::Prerequisites => &PREREQUISITE_FIELDS,
        EntityKind::Materials => &MATERIAL_FIELDS,
        EntityKind::Tools => &TOOL_FIELDS,
        EntityKind::Students => &STUDENT_FIELDS,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Field-level validation failures. Never empty when returned as an error.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        if self.for_field(field).is_some() {
            return;
        }
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    fn into_result(self) -> std::result::Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumInput {
    pub curriculum_code: String,
    pub curriculum_name: String,
    pub description: Option<String>,
    pub decision_no: Option<String>,
    pub total_credit: Option<i32>,
    pub is_active: bool,
    pub is_approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInput {
    pub subject_code: String,
    pub subject_name: String,
    pub description: Option<String>,
    pub no_credit: i32,
    pub curriculum_id: Option<CurriculumId>,
    pub is_active: bool,
    pub is_approved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInput {
    pub program_code: String,
    pub program_name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorInput {
    pub major_code: String,
    pub major_name: String,
    pub description: Option<String>,
    #[serde(with = "iso_date")]
    pub start_at: Date,
    pub program_id: Option<ProgramId>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboInput {
    pub combo_code: String,
    pub combo_name: String,
    pub description: Option<String>,
    pub program_id: ProgramId,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentInput {
    pub subject_id: SubjectId,
    pub category: String,
    pub assessment_type: String,
    pub part: i32,
    pub weight: f64,
    pub completion_criteria: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloInput {
    pub clo_name: String,
    pub clo_details: String,
    pub subject_id: SubjectId,
    pub assessment_id: AssessmentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PloInput {
    pub plo_name: String,
    pub plo_description: String,
    pub curriculum_id: CurriculumId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoInput {
    pub po_name: String,
    pub po_description: String,
    pub program_id: ProgramId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteInput {
    pub subject_id: SubjectId,
    pub prerequisite_subject_id: SubjectId,
    pub condition_type: ConditionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialInput {
    pub material_name: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    #[serde(with = "iso_date::option")]
    pub published_date: Option<Date>,
    pub edition: Option<String>,
    pub isbn: Option<String>,
    pub is_main_material: bool,
    pub is_hard_copy: bool,
    pub is_online: bool,
    pub note: Option<String>,
    pub subject_id: SubjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInput {
    pub tool_name: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    #[serde(with = "iso_date::option")]
    pub published_date: Option<Date>,
    pub description: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub student_code: String,
    pub full_name: String,
    pub email: String,
    pub major_id: Option<MajorId>,
    pub combo_id: Option<ComboId>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormPayload {
    Curriculum(CurriculumInput),
    Subject(SubjectInput),
    Program(ProgramInput),
    Major(MajorInput),
    Combo(ComboInput),
    Assessment(AssessmentInput),
    Clo(CloInput),
    Plo(PloInput),
    Po(PoInput),
    Prerequisite(PrerequisiteInput),
    Material(MaterialInput),
    Tool(ToolInput),
    Student(StudentInput),
}

impl FormPayload {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Curriculum(_) => EntityKind::Curriculums,
            Self::Subject(_) => EntityKind::Subjects,
            Self::Program(_) => EntityKind::Programs,
            Self::Major(_) => EntityKind::Majors,
            Self::Combo(_) => EntityKind::Combos,
            Self::Assessment(_) => EntityKind::Assessments,
            Self::Clo(_) => EntityKind::Clos,
            Self::Plo(_) => EntityKind::Plos,
            Self::Po(_) => EntityKind::Pos,
            Self::Prerequisite(_) => EntityKind::Prerequisites,
            Self::Material(_) => EntityKind::Materials,
            Self::Tool(_) => EntityKind::Tools,
            Self::Student(_) => EntityKind::Students,
        }
    }

    /// Checks that hold for any payload, however it was built. `today` is
    /// the reference for date rules.
    pub fn validate(&self, today: Date) -> ValidationResult<()> {
        let mut checks = Checks::default();
        match self {
            Self::Curriculum(input) => {
                checks.required("curriculumCode", &input.curriculum_code);
                checks.required("curriculumName", &input.curriculum_name);
                checks.rule(
                    "totalCredit",
                    input.total_credit.is_none_or(|credit| credit >= 0),
                    "cannot be negative",
                );
            }
            Self::Subject(input) => {
                checks.required("subjectCode", &input.subject_code);
                checks.required("subjectName", &input.subject_name);
                checks.rule(
                    "noCredit",
                    (0..=30).contains(&input.no_credit),
                    "must be between 0 and 30",
                );
                checks.optional_uuid("curriculumId", input.curriculum_id.as_ref().map(CurriculumId::as_str));
            }
            Self::Program(input) => {
                checks.required("programCode", &input.program_code);
                checks.required("programName", &input.program_name);
            }
            Self::Major(input) => {
                checks.required("majorCode", &input.major_code);
                checks.required("majorName", &input.major_name);
                checks.rule(
                    "startAt",
                    input.start_at >= today,
                    "must be today or later",
                );
                checks.optional_uuid("programId", input.program_id.as_ref().map(ProgramId::as_str));
            }
            Self::Combo(input) => {
                checks.required("comboCode", &input.combo_code);
                checks.required("comboName", &input.combo_name);
                checks.uuid("programId", input.program_id.as_str());
            }
            Self::Assessment(input) => {
                checks.uuid("subjectId", input.subject_id.as_str());
                checks.required("category", &input.category);
                checks.required("assessmentType", &input.assessment_type);
                checks.rule("part", input.part >= 1, "must be at least 1");
                checks.rule(
                    "weight",
                    (0.0..=100.0).contains(&input.weight),
                    "must be between 0 and 100",
                );
            }
            Self::Clo(input) => {
                checks.required("cloName", &input.clo_name);
                checks.required("cloDetails", &input.clo_details);
                checks.uuid("subjectId", input.subject_id.as_str());
                checks.uuid("assessmentId", input.assessment_id.as_str());
            }
            Self::Plo(input) => {
                checks.required("ploName", &input.plo_name);
                checks.required("ploDescription", &input.plo_description);
                checks.uuid("curriculumId", input.curriculum_id.as_str());
            }
            Self::Po(input) => {
                checks.required("poName", &input.po_name);
                checks.required("poDescription", &input.po_description);
                checks.uuid("programId", input.program_id.as_str());
            }
            Self::Prerequisite(input) => {
                checks.uuid("subjectId", input.subject_id.as_str());
                checks.uuid("prerequisiteSubjectId", input.prerequisite_subject_id.as_str());
                checks.rule(
                    "prerequisiteSubjectId",
                    input.subject_id != input.prerequisite_subject_id,
                    "a subject cannot require itself",
                );
            }
            Self::Material(input) => {
                checks.required("materialName", &input.material_name);
                checks.rule(
                    "publishedDate",
                    input.published_date.is_none_or(|date| date <= today),
                    "cannot be in the future",
                );
                checks.uuid("subjectId", input.subject_id.as_str());
            }
            Self::Tool(input) => {
                checks.required("toolName", &input.tool_name);
                checks.rule(
                    "publishedDate",
                    input.published_date.is_none_or(|date| date <= today),
                    "cannot be in the future",
                );
            }
            Self::Student(input) => {
                checks.required("studentCode", &input.student_code);
                checks.required("fullName", &input.full_name);
                if checks.required("email", &input.email) {
                    checks.rule("email", looks_like_email(&input.email), "must be an email address");
                }
                checks.optional_uuid("majorId", input.major_id.as_ref().map(MajorId::as_str));
                checks.optional_uuid("comboId", input.combo_id.as_ref().map(ComboId::as_str));
            }
        }
        checks.errors.into_result()
    }
}

#[derive(Debug, Default)]
struct Checks {
    errors: ValidationErrors,
}

impl Checks {
    fn required(&mut self, key: &'static str, value: &str) -> bool {
        let present = !value.trim().is_empty();
        if !present {
            self.errors.push(key, "is required");
        }
        present
    }

    fn uuid(&mut self, key: &'static str, value: &str) {
        if self.required(key, value) && Uuid::parse_str(value.trim()).is_err() {
            self.errors.push(key, "must be a UUID");
        }
    }

    fn optional_uuid(&mut self, key: &'static str, value: Option<&str>) {
        if let Some(value) = value {
            self.uuid(key, value);
        }
    }

    fn rule(&mut self, key: &'static str, ok: bool, message: &str) {
        if !ok {
            self.errors.push(key, message);
        }
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && domain
            .rsplit_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

pub fn parse_date(input: &str) -> Option<Date> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn parse_flag(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" | "y" => Some(true),
        "0" | "false" | "off" | "no" | "n" | "" => Some(false),
        _ => None,
    }
}

fn format_flag(value: bool) -> String {
    if value { "yes" } else { "no" }.to_owned()
}

/// Text values for one create or edit form, aligned with `field_specs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDraft {
    kind: EntityKind,
    target: Option<RecordId>,
    values: Vec<String>,
}

impl FormDraft {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            target: None,
            values: field_specs(kind)
                .iter()
                .map(|spec| spec.default.to_owned())
                .collect(),
        }
    }

    /// Draft prefilled from an existing record; submitting it updates that
    /// record.
    pub fn from_record(record: &Record) -> Self {
        let mut draft = Self::new(record.kind());
        draft.target = Some(record.id());
        for (key, value) in record_values(record) {
            draft.set(key, value);
        }
        draft
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn target(&self) -> Option<&RecordId> {
        self.target.as_ref()
    }

    pub fn specs(&self) -> &'static [FieldSpec] {
        field_specs(self.kind)
    }

    pub fn value(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn value_mut(&mut self, index: usize) -> Option<&mut String> {
        self.values.get_mut(index)
    }

    pub fn get(&self, key: &str) -> &str {
        self.index_of(key).map(|index| self.value(index)).unwrap_or("")
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let Some(index) = self.index_of(key) else {
            return false;
        };
        self.values[index] = value.into();
        true
    }

    fn index_of(&self, key: &str) -> Option<usize> {
        self.specs().iter().position(|spec| spec.key == key)
    }

    /// Parses and validates the draft. Any failure is field-level and
    /// nothing should be sent.
    pub fn build(&self, today: Date) -> ValidationResult<FormPayload> {
        let mut reader = DraftReader::new(self);
        let payload = reader.payload();
        reader.errors.into_result()?;
        payload.validate(today)?;
        Ok(payload)
    }
}

struct DraftReader<'a> {
    draft: &'a FormDraft,
    errors: ValidationErrors,
}

impl<'a> DraftReader<'a> {
    fn new(draft: &'a FormDraft) -> Self {
        let mut errors = ValidationErrors::default();
        for (index, spec) in draft.specs().iter().enumerate() {
            if spec.required && draft.value(index).trim().is_empty() {
                errors.push(spec.key, "is required");
            }
        }
        Self { draft, errors }
    }

    fn raw(&self, key: &str) -> &'a str {
        self.draft.get(key).trim()
    }

    fn text(&self, key: &str) -> String {
        self.raw(key).to_owned()
    }

    fn opt_text(&self, key: &str) -> Option<String> {
        let raw = self.raw(key);
        (!raw.is_empty()).then(|| raw.to_owned())
    }

    fn int(&mut self, key: &'static str) -> Option<i32> {
        let raw = self.raw(key);
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<i32>() {
            Ok(value) => Some(value),
            Err(_) => {
                self.errors.push(key, "must be a whole number");
                None
            }
        }
    }

    fn decimal(&mut self, key: &'static str) -> Option<f64> {
        let raw = self.raw(key);
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                self.errors.push(key, "must be a number");
                None
            }
        }
    }

    fn date(&mut self, key: &'static str) -> Option<Date> {
        let raw = self.raw(key);
        if raw.is_empty() {
            return None;
        }
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.errors.push(key, format!("must be a date ({DATE_LAYOUT})"));
        }
        parsed
    }

    fn id<T: From<String>>(&mut self, key: &'static str) -> Option<T> {
        let raw = self.raw(key);
        if raw.is_empty() {
            return None;
        }
        if Uuid::parse_str(raw).is_err() {
            self.errors.push(key, "must be a UUID");
            return None;
        }
        Some(T::from(raw.to_owned()))
    }

    fn required_id<T: From<String>>(&mut self, key: &'static str) -> T {
        self.id(key).unwrap_or_else(|| T::from(String::new()))
    }

    fn flag(&mut self, key: &'static str) -> bool {
        match parse_flag(self.raw(key)) {
            Some(value) => value,
            None => {
                self.errors.push(key, "must be yes or no");
                false
            }
        }
    }

    fn condition(&mut self, key: &'static str) -> ConditionType {
        let raw = self.raw(key);
        match ConditionType::parse(&raw.to_ascii_lowercase()) {
            Some(condition) => condition,
            None => {
                if !raw.is_empty() {
                    self.errors.push(
                        key,
                        format!("must be one of {}", ConditionType::NAMES.join(", ")),
                    );
                }
                ConditionType::Prerequisite
            }
        }
    }

    fn payload(&mut self) -> FormPayload {
        match self.draft.kind() {
            EntityKind::Curriculums => FormPayload::Curriculum(CurriculumInput {
                curriculum_code: self.text("curriculumCode"),
                curriculum_name: self.text("curriculumName"),
                description: self.opt_text("description"),
                decision_no: self.opt_text("decisionNo"),
                total_credit: self.int("totalCredit"),
                is_active: self.flag("isActive"),
                is_approved: self.flag("isApproved"),
            }),
            EntityKind::Subjects => FormPayload::Subject(SubjectInput {
                subject_code: self.text("subjectCode"),
                subject_name: self.text("subjectName"),
                description: self.opt_text("description"),
                no_credit: self.int("noCredit").unwrap_or_default(),
                curriculum_id: self.id("curriculumId"),
                is_active: self.flag("isActive"),
                is_approved: self.flag("isApproved"),
            }),
            EntityKind::Programs => FormPayload::Program(ProgramInput {
                program_code: self.text("programCode"),
                program_name: self.text("programName"),
                description: self.opt_text("description"),
                is_active: self.flag("isActive"),
            }),
            EntityKind::Majors => FormPayload::Major(MajorInput {
                major_code: self.text("majorCode"),
                major_name: self.text("majorName"),
                description: self.opt_text("description"),
                start_at: self.date("startAt").unwrap_or(Date::MIN),
                program_id: self.id("programId"),
                is_active: self.flag("isActive"),
            }),
            EntityKind::Combos => FormPayload::Combo(ComboInput {
                combo_code: self.text("comboCode"),
                combo_name: self.text("comboName"),
                description: self.opt_text("description"),
                program_id: self.required_id("programId"),
                is_active: self.flag("isActive"),
            }),
            EntityKind::Assessments => FormPayload::Assessment(AssessmentInput {
                subject_id: self.required_id("subjectId"),
                category: self.text("category"),
                assessment_type: self.text("assessmentType"),
                part: self.int("part").unwrap_or_default(),
                weight: self.decimal("weight").unwrap_or_default(),
                completion_criteria: self.opt_text("completionCriteria"),
                duration: self.opt_text("duration"),
            }),
            EntityKind::Clos => FormPayload::Clo(CloInput {
                clo_name: self.text("cloName"),
                clo_details: self.text("cloDetails"),
                subject_id: self.required_id("subjectId"),
                assessment_id: self.required_id("assessmentId"),
            }),
            EntityKind::Plos => FormPayload::Plo(PloInput {
                plo_name: self.text("ploName"),
                plo_description: self.text("ploDescription"),
                curriculum_id: self.required_id("curriculumId"),
            }),
            EntityKind::Pos => FormPayload::Po(PoInput {
                po_name: self.text("poName"),
                po_description: self.text("poDescription"),
                program_id: self.required_id("programId"),
            }),
            EntityKind::Prerequisites => FormPayload::Prerequisite(PrerequisiteInput {
                subject_id: self.required_id("subjectId"),
                prerequisite_subject_id: self.required_id("prerequisiteSubjectId"),
                condition_type: self.condition("conditionType"),
            }),
            EntityKind::Materials => FormPayload::Material(MaterialInput {
                material_name: self.text("materialName"),
                author: self.opt_text("author"),
                publisher: self.opt_text("publisher"),
                published_date: self.date("publishedDate"),
                edition: self.opt_text("edition"),
                isbn: self.opt_text("isbn"),
                is_main_material: self.flag("isMainMaterial"),
                is_hard_copy: self.flag("isHardCopy"),
                is_online: self.flag("isOnline"),
                note: self.opt_text("note"),
                subject_id: self.required_id("subjectId"),
            }),
            EntityKind::Tools => FormPayload::Tool(ToolInput {
                tool_name: self.text("toolName"),
                author: self.opt_text("author"),
                publisher: self.opt_text("publisher"),
                published_date: self.date("publishedDate"),
                description: self.opt_text("description"),
                note: self.opt_text("note"),
            }),
            EntityKind::Students => FormPayload::Student(StudentInput {
                student_code: self.text("studentCode"),
                full_name: self.text("fullName"),
                email: self.text("email"),
                major_id: self.id("majorId"),
                combo_id: self.id("comboId"),
                is_active: self.flag("isActive"),
            }),
        }
    }
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn opt_id(value: Option<&str>) -> String {
    value.unwrap_or_default().to_owned()
}

fn record_values(record: &Record) -> Vec<(&'static str, String)> {
    match record {
        Record::Curriculum(row) => vec![
            ("curriculumCode", row.curriculum_code.clone()),
            ("curriculumName", row.curriculum_name.clone()),
            ("description", opt(&row.description)),
            ("decisionNo", opt(&row.decision_no)),
            (
                "totalCredit",
                row.total_credit.map(|credit| credit.to_string()).unwrap_or_default(),
            ),
            ("isActive", format_flag(row.is_active)),
            ("isApproved", format_flag(row.is_approved)),
        ],
        Record::Subject(row) => vec![
            ("subjectCode", row.subject_code.clone()),
            ("subjectName", row.subject_name.clone()),
            ("description", opt(&row.description)),
            ("noCredit", row.no_credit.to_string()),
            ("curriculumId", opt_id(row.curriculum_id.as_ref().map(CurriculumId::as_str))),
            ("isActive", format_flag(row.is_active)),
            ("isApproved", format_flag(row.is_approved)),
        ],
        Record::Program(row) => vec![
            ("programCode", row.program_code.clone()),
            ("programName", row.program_name.clone()),
            ("description", opt(&row.description)),
            ("isActive", format_flag(row.is_active)),
        ],
        Record::Major(row) => vec![
            ("majorCode", row.major_code.clone()),
            ("majorName", row.major_name.clone()),
            ("description", opt(&row.description)),
            ("startAt", row.start_at.to_string()),
            ("programId", opt_id(row.program_id.as_ref().map(ProgramId::as_str))),
            ("isActive", format_flag(row.is_active)),
        ],
        Record::Combo(row) => vec![
            ("comboCode", row.combo_code.clone()),
            ("comboName", row.combo_name.clone()),
            ("description", opt(&row.description)),
            ("programId", row.program_id.to_string()),
            ("isActive", format_flag(row.is_active)),
        ],
        Record::Assessment(row) => vec![
            ("subjectId", row.subject_id.to_string()),
            ("category", row.category.clone()),
            ("assessmentType", row.assessment_type.clone()),
            ("part", row.part.to_string()),
            ("weight", row.weight.to_string()),
            ("completionCriteria", opt(&row.completion_criteria)),
            ("duration", opt(&row.duration)),
        ],
        Record::Clo(row) => vec![
            ("cloName", row.clo_name.clone()),
            ("cloDetails", row.clo_details.clone()),
            ("subjectId", row.subject_id.to_string()),
            ("assessmentId", row.assessment_id.to_string()),
        ],
        Record::Plo(row) => vec![
            ("ploName", row.plo_name.clone()),
            ("ploDescription", row.plo_description.clone()),
            ("curriculumId", row.curriculum_id.to_string()),
        ],
        Record::Po(row) => vec![
            ("poName", row.po_name.clone()),
            ("poDescription", row.po_description.clone()),
            ("programId", row.program_id.to_string()),
        ],
        Record::Prerequisite(row) => vec![
            ("subjectId", row.subject_id.to_string()),
            ("prerequisiteSubjectId", row.prerequisite_subject_id.to_string()),
            ("conditionType", row.condition_type.as_str().to_owned()),
        ],
        Record::Material(row) => vec![
            ("materialName", row.material_name.clone()),
            ("author", opt(&row.author)),
            ("publisher", opt(&row.publisher)),
            (
                "publishedDate",
                row.published_date.map(|date| date.to_string()).unwrap_or_default(),
            ),
            ("edition", opt(&row.edition)),
            ("isbn", opt(&row.isbn)),
            ("isMainMaterial", format_flag(row.is_main_material)),
            ("isHardCopy", format_flag(row.is_hard_copy)),
            ("isOnline", format_flag(row.is_online)),
            ("note", opt(&row.note)),
            ("subjectId", row.subject_id.to_string()),
        ],
        Record::Tool(row) => vec![
            ("toolName", row.tool_name.clone()),
            ("author", opt(&row.author)),
            ("publisher", opt(&row.publisher)),
            (
                "publishedDate",
                row.published_date.map(|date| date.to_string()).unwrap_or_default(),
            ),
            ("description", opt(&row.description)),
            ("note", opt(&row.note)),
        ],
        Record::Student(row) => vec![
            ("studentCode", row.student_code.clone()),
            ("fullName", row.full_name.clone()),
            ("email", row.email.clone()),
            ("majorId", opt_id(row.major_id.as_ref().map(MajorId::as_str))),
            ("comboId", opt_id(row.combo_id.as_ref().map(ComboId::as_str))),
            ("isActive", format_flag(row.is_active)),
        ],
    }
}

/// A validated payload ready to send. `target` is set for updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub target: Option<RecordId>,
    pub payload: FormPayload,
}

impl Submission {
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    pub fn is_update(&self) -> bool {
        self.target.is_some()
    }
}

/// Status line text for a finished create or update.
pub fn save_notification(kind: EntityKind, update: bool, result: &Result<()>) -> Notification {
    let noun = kind.noun();
    match result {
        Ok(()) if update => Notification::success(format!("{noun} updated")),
        Ok(()) => Notification::success(format!("{noun} created")),
        Err(error) => Notification::failure(format!("{noun} save failed: {error:#}")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitBlocked {
    InFlight,
    Invalid(ValidationErrors),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Saved; the modal should close.
    Saved(Notification),
    /// The call failed; the modal stays open with its draft.
    Failed(Notification),
}

/// Create/edit modal state around one draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormModal {
    pub draft: FormDraft,
    pub errors: ValidationErrors,
    pub cursor: usize,
    pending: bool,
}

impl FormModal {
    pub fn create(kind: EntityKind) -> Self {
        Self::with_draft(FormDraft::new(kind))
    }

    pub fn edit(record: &Record) -> Self {
        Self::with_draft(FormDraft::from_record(record))
    }

    fn with_draft(draft: FormDraft) -> Self {
        Self {
            draft,
            errors: ValidationErrors::default(),
            cursor: 0,
            pending: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.draft.specs().len() as isize;
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor as isize + delta).rem_euclid(len) as usize;
    }

    pub fn current_value_mut(&mut self) -> Option<&mut String> {
        if self.pending {
            return None;
        }
        self.draft.value_mut(self.cursor)
    }

    /// Validates and marks the modal pending. Refuses while a previous
    /// submission is still in flight.
    pub fn begin_submit(&mut self, today: Date) -> std::result::Result<Submission, SubmitBlocked> {
        if self.pending {
            return Err(SubmitBlocked::InFlight);
        }
        match self.draft.build(today) {
            Ok(payload) => {
                self.errors = ValidationErrors::default();
                self.pending = true;
                Ok(Submission {
                    target: self.draft.target().cloned(),
                    payload,
                })
            }
            Err(errors) => {
                self.errors = errors.clone();
                if let Some(index) = self
                    .draft
                    .specs()
                    .iter()
                    .position(|spec| errors.for_field(spec.key).is_some())
                {
                    self.cursor = index;
                }
                Err(SubmitBlocked::Invalid(errors))
            }
        }
    }

    /// Records the result of the call started by `begin_submit`. `refresh`
    /// runs once, only on success.
    pub fn finish_submit(&mut self, result: Result<()>, refresh: impl FnOnce()) -> SubmitOutcome {
        self.pending = false;
        let notification =
            save_notification(self.draft.kind(), self.draft.target().is_some(), &result);
        match result {
            Ok(()) => {
                refresh();
                SubmitOutcome::Saved(notification)
            }
            Err(_) => SubmitOutcome::Failed(notification),
        }
    }

    pub fn submit_with(
        &mut self,
        today: Date,
        send: impl FnOnce(&Submission) -> Result<()>,
        refresh: impl FnOnce(),
    ) -> std::result::Result<SubmitOutcome, SubmitBlocked> {
        let submission = self.begin_submit(today)?;
        let result = send(&submission);
        Ok(self.finish_submit(result, refresh))
    }
}
