//! Core data model: resources, profiles, and the semantic types that govern
//! which query operators are legal on a column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier a client uses to address a resource. Never exposes the
/// downstream table name.
pub type ResourceId = Uuid;

/// Lifecycle state of a resource as recorded in the downstream `resources`
/// directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Ok,
    Deleted,
}

/// Resolved view of a resource: the concrete table to query plus the gates
/// the rest of the pipeline must respect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_id: ResourceId,
    pub table_name: String,
    pub status: ResourceStatus,
    pub dataset_id: Option<Uuid>,
    pub aggregation_allowed: bool,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// The semantic type inferred for a column. Governs which operator suffixes
/// are legal on it (see `query::operators`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Int,
    Float,
    Bool,
    Date,
    Datetime,
    Json,
}

impl SemanticType {
    pub fn is_numeric(self) -> bool {
        matches!(self, SemanticType::Int | SemanticType::Float)
    }

    pub fn is_orderable(self) -> bool {
        matches!(
            self,
            SemanticType::Int | SemanticType::Float | SemanticType::Date | SemanticType::Datetime
        )
    }
}

/// One column of a resource's inferred profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileColumn {
    pub name: String,
    pub semantic_type: SemanticType,
}

/// The inference profile for a resource: header order plus per-column
/// semantic type, and whatever provenance metadata the ingestion pipeline
/// attached (passed through verbatim, never interpreted by the gateway).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub columns: Vec<ProfileColumn>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Profile {
    pub fn semantic_type_of(&self, column: &str) -> Option<SemanticType> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.semantic_type)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Synthetic primary key column returned by the downstream table service
/// when no explicit projection is requested.
pub const SYNTHETIC_ID_COLUMN: &str = "__id";
