// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    (@base $name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
    ($name:ident) => {
        entity_id!(@base $name);

        impl From<&$name> for RecordId {
            fn from(value: &$name) -> Self {
                RecordId::new(value.as_str())
            }
        }
    };
}

// Untyped id used by the generic list, submit and delete paths.
entity_id!(@base RecordId);

entity_id!(CurriculumId);
entity_id!(SubjectId);
entity_id!(ProgramId);
entity_id!(MajorId);
entity_id!(ComboId);
entity_id!(AssessmentId);
entity_id!(CloId);
entity_id!(PloId);
entity_id!(PoId);
entity_id!(PrerequisiteId);
entity_id!(MaterialId);
entity_id!(ToolId);
entity_id!(StudentId);
entity_id!(ChatSessionId);
entity_id!(UserId);
