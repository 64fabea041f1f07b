// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::forms::*;
use crate::ids::*;

time::serde::format_description!(pub(crate) iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    pub const fn arrow(self) -> &'static str {
        match self {
            Self::Ascending => "↑",
            Self::Descending => "↓",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Curriculums,
    Subjects,
    Programs,
    Majors,
    Combos,
    Assessments,
    Clos,
    Plos,
    Pos,
    Prerequisites,
    Materials,
    Tools,
    Students,
}

impl EntityKind {
    pub const ALL: [Self; 13] = [
        Self::Curriculums,
        Self::Subjects,
        Self::Programs,
        Self::Majors,
        Self::Combos,
        Self::Assessments,
        Self::Clos,
        Self::Plos,
        Self::Pos,
        Self::Prerequisites,
        Self::Materials,
        Self::Tools,
        Self::Students,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Curriculums => "curriculums",
            Self::Subjects => "subjects",
            Self::Programs => "programs",
            Self::Majors => "majors",
            Self::Combos => "combos",
            Self::Assessments => "assessments",
            Self::Clos => "clos",
            Self::Plos => "plos",
            Self::Pos => "pos",
            Self::Prerequisites => "prereqs",
            Self::Materials => "materials",
            Self::Tools => "tools",
            Self::Students => "students",
        }
    }

    /// Singular noun used in notifications ("major saved").
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Curriculums => "curriculum",
            Self::Subjects => "subject",
            Self::Programs => "program",
            Self::Majors => "major",
            Self::Combos => "combo",
            Self::Assessments => "assessment",
            Self::Clos => "CLO",
            Self::Plos => "PLO",
            Self::Pos => "PO",
            Self::Prerequisites => "prerequisite",
            Self::Materials => "material",
            Self::Tools => "tool",
            Self::Students => "student",
        }
    }

    /// REST collection path segment.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Curriculums => "curriculums",
            Self::Subjects => "subjects",
            Self::Programs => "programs",
            Self::Majors => "majors",
            Self::Combos => "combos",
            Self::Assessments => "assessments",
            Self::Clos => "clos",
            Self::Plos => "plos",
            Self::Pos => "pos",
            Self::Prerequisites => "prerequisites",
            Self::Materials => "materials",
            Self::Tools => "tools",
            Self::Students => "students",
        }
    }

    /// Server-side sort keys, `"default"` first.
    pub const fn sort_fields(self) -> &'static [&'static str] {
        match self {
            Self::Curriculums => &["default", "curriculumCode", "curriculumName", "createdAt"],
            Self::Subjects => &["default", "subjectCode", "subjectName", "noCredit", "createdAt"],
            Self::Programs => &["default", "programCode", "programName", "createdAt"],
            Self::Majors => &["default", "majorCode", "majorName", "startAt", "createdAt"],
            Self::Combos => &["default", "comboCode", "comboName", "createdAt"],
            Self::Assessments => &["default", "category", "part", "weight", "createdAt"],
            Self::Clos => &["default", "cloName", "createdAt"],
            Self::Plos => &["default", "ploName", "createdAt"],
            Self::Pos => &["default", "poName", "createdAt"],
            Self::Prerequisites => &["default", "conditionType", "createdAt"],
            Self::Materials => &["default", "materialName", "publishedDate", "createdAt"],
            Self::Tools => &["default", "toolName", "publishedDate", "createdAt"],
            Self::Students => &["default", "studentCode", "fullName", "email", "createdAt"],
        }
    }

    pub const fn requires_admin(self) -> bool {
        !matches!(self, Self::Students)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    Prerequisite,
    Corequisite,
    Parallel,
}

impl ConditionType {
    pub const NAMES: [&'static str; 3] = ["prerequisite", "corequisite", "parallel"];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prerequisite => "prerequisite",
            Self::Corequisite => "corequisite",
            Self::Parallel => "parallel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prerequisite" => Some(Self::Prerequisite),
            "corequisite" => Some(Self::Corequisite),
            "parallel" => Some(Self::Parallel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Audit columns every record carries. `is_delete` is the soft-delete flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_delete: bool,
}

impl Audit {
    pub fn created(at: OffsetDateTime) -> Self {
        Self {
            created_at: at,
            updated_at: None,
            deleted_at: None,
            is_delete: false,
        }
    }
}

pub trait Audited {
    fn audit(&self) -> &Audit;

    fn is_deleted(&self) -> bool {
        self.audit().is_delete
    }
}

/// A record type served from one REST collection.
pub trait Entity: Audited + Clone + Serialize + DeserializeOwned + Send + 'static {
    const KIND: EntityKind;
    type Input: Clone + Serialize + Send + 'static;

    fn record_id(&self) -> RecordId;
    fn label(&self) -> String;
    fn audit_mut(&mut self) -> &mut Audit;
    fn into_record(self) -> Record;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    pub id: CurriculumId,
    pub curriculum_code: String,
    pub curriculum_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub decision_no: Option<String>,
    #[serde(default)]
    pub total_credit: Option<i32>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub subject_code: String,
    pub subject_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub no_credit: i32,
    #[serde(default)]
    pub curriculum_id: Option<CurriculumId>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: ProgramId,
    pub program_code: String,
    pub program_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Major {
    pub id: MajorId,
    pub major_code: String,
    pub major_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "iso_date")]
    pub start_at: Date,
    #[serde(default)]
    pub program_id: Option<ProgramId>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combo {
    pub id: ComboId,
    pub combo_code: String,
    pub combo_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub program_id: ProgramId,
    #[serde(default)]
    pub is_active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: AssessmentId,
    pub subject_id: SubjectId,
    pub category: String,
    pub assessment_type: String,
    pub part: i32,
    pub weight: f64,
    #[serde(default)]
    pub completion_criteria: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clo {
    pub id: CloId,
    pub clo_name: String,
    pub clo_details: String,
    pub subject_id: SubjectId,
    pub assessment_id: AssessmentId,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plo {
    pub id: PloId,
    pub plo_name: String,
    pub plo_description: String,
    pub curriculum_id: CurriculumId,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Po {
    pub id: PoId,
    pub po_name: String,
    pub po_description: String,
    pub program_id: ProgramId,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    pub id: PrerequisiteId,
    pub subject_id: SubjectId,
    pub prerequisite_subject_id: SubjectId,
    pub condition_type: ConditionType,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: MaterialId,
    pub material_name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub published_date: Option<Date>,
    #[serde(default)]
    pub edition: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub is_main_material: bool,
    #[serde(default)]
    pub is_hard_copy: bool,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub note: Option<String>,
    pub subject_id: SubjectId,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: ToolId,
    pub tool_name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub published_date: Option<Date>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub student_code: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub major_id: Option<MajorId>,
    #[serde(default)]
    pub combo_id: Option<ComboId>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(flatten)]
    pub audit: Audit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: ChatSessionId,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Audited for ChatSession {
    fn audit(&self) -> &Audit {
        &self.audit
    }
}

/// A session with its history, in the order the server returned it
/// (newest first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionDetail {
    #[serde(flatten)]
    pub session: ChatSession,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub ai_chat_log: ChatSession,
    #[serde(rename = "messageAI")]
    pub message_ai: String,
}

/// Any CRUD record, for code that works across tabs.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Curriculum(Curriculum),
    Subject(Subject),
    Program(Program),
    Major(Major),
    Combo(Combo),
    Assessment(Assessment),
    Clo(Clo),
    Plo(Plo),
    Po(Po),
    Prerequisite(Prerequisite),
    Material(Material),
    Tool(Tool),
    Student(Student),
}

macro_rules! record_dispatch {
    ($record:expr, $bound:ident => $body:expr) => {
        match $record {
            Record::Curriculum($bound) => $body,
            Record::Subject($bound) => $body,
            Record::Program($bound) => $body,
            Record::Major($bound) => $body,
            Record::Combo($bound) => $body,
            Record::Assessment($bound) => $body,
            Record::Clo($bound) => $body,
            Record::Plo($bound) => $body,
            Record::Po($bound) => $body,
            Record::Prerequisite($bound) => $body,
            Record::Material($bound) => $body,
            Record::Tool($bound) => $body,
            Record::Student($bound) => $body,
        }
    };
}

impl Record {
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

    pub fn id(&self) -> RecordId {
        record_dispatch!(self, record => record.record_id())
    }

    pub fn label(&self) -> String {
        record_dispatch!(self, record => record.label())
    }
}

impl Audited for Record {
    fn audit(&self) -> &Audit {
        record_dispatch!(self, record => record.audit())
    }
}

macro_rules! impl_entity {
    ($record:ident, $kind:ident, $input:ident, $label:ident) => {
        impl Audited for $record {
            fn audit(&self) -> &Audit {
                &self.audit
            }
        }

        impl Entity for $record {
            const KIND: EntityKind = EntityKind::$kind;
            type Input = $input;

            fn record_id(&self) -> RecordId {
                RecordId::from(&self.id)
            }

            fn label(&self) -> String {
                self.$label.to_string()
            }

            fn audit_mut(&mut self) -> &mut Audit {
                &mut self.audit
            }

            fn into_record(self) -> Record {
                Record::$record(self)
            }
        }
    };
}

impl_entity!(Curriculum, Curriculums, CurriculumInput, curriculum_code);
impl_entity!(Subject, Subjects, SubjectInput, subject_code);
impl_entity!(Program, Programs, ProgramInput, program_code);
impl_entity!(Major, Majors, MajorInput, major_code);
impl_entity!(Combo, Combos, ComboInput, combo_code);
impl_entity!(Assessment, Assessments, AssessmentInput, category);
impl_entity!(Clo, Clos, CloInput, clo_name);
impl_entity!(Plo, Plos, PloInput, plo_name);
impl_entity!(Po, Pos, PoInput, po_name);
impl_entity!(Prerequisite, Prerequisites, PrerequisiteInput, id);
impl_entity!(Material, Materials, MaterialInput, material_name);
impl_entity!(Tool, Tools, ToolInput, tool_name);
impl_entity!(Student, Students, StudentInput, student_code);
