//! Entity model and SQLite schema derivation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

use crate::errors::PackagingError;
use crate::spec::SpecDocument;
use crate::util::{normalize_identifier, write_json_pretty};

// `table.field -> other_table.other_field`
static FOREIGN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^.\s]+)\.([^.\s]+)\s*->\s*([^.\s]+)\.([^.\s]+)\s*$").unwrap()
});

pub const SCHEMA_FILE: &str = "db_schema.sql";
pub const MIGRATION_FILE: &str = "db_migration_0001.sql";
pub const REPORT_FILE: &str = "db_report.json";

/// Storage-level category of a declared field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    Boolean,
    DateTime,
}

impl FieldKind {
    /// Classify a spec type name (case-insensitive). Unknown names are text.
    pub fn from_type(type_name: &str) -> Self {
        match type_name.trim().to_lowercase().as_str() {
            "int" | "integer" | "number" => FieldKind::Integer,
            "float" | "double" | "decimal" => FieldKind::Real,
            "bool" | "boolean" => FieldKind::Boolean,
            "date" | "datetime" | "timestamp" => FieldKind::DateTime,
            _ => FieldKind::Text,
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::DateTime => "TEXT",
            FieldKind::Integer | FieldKind::Boolean => "INTEGER",
            FieldKind::Real => "REAL",
        }
    }
}

/// A parsed `foreign` relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRef {
    pub table: String,
    pub field: String,
    pub target_table: String,
    pub target_field: String,
}

impl ForeignRef {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = FOREIGN_REGEX.captures(raw)?;
        Some(Self {
            table: caps[1].to_string(),
            field: caps[2].to_string(),
            target_table: caps[3].to_string(),
            target_field: caps[4].to_string(),
        })
    }
}

impl std::fmt::Display for ForeignRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.table, self.field, self.target_table, self.target_field
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub column_name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign: Option<String>,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        FieldKind::from_type(&self.field_type)
    }

    pub fn foreign_ref(&self) -> Option<ForeignRef> {
        self.foreign.as_deref().and_then(ForeignRef::parse)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub table_name: String,
    pub fields: Vec<Field>,
}

impl Entity {
    /// Collection path segment, e.g. `users` for `User`.
    pub fn collection(&self) -> String {
        format!("{}s", self.table_name)
    }
}

/// Normalize the spec's entity declarations. Order is preserved.
pub fn derive_entities(spec: &SpecDocument) -> Vec<Entity> {
    spec.entities()
        .iter()
        .map(|entity| Entity {
            name: entity.name.clone(),
            table_name: normalize_identifier(&entity.name),
            fields: entity
                .fields
                .iter()
                .map(|field| Field {
                    name: field.name.clone(),
                    column_name: normalize_identifier(&field.name),
                    field_type: field.field_type.clone(),
                    required: field.required,
                    primary_key: field.primary_key,
                    foreign: field.foreign.clone(),
                })
                .collect(),
        })
        .collect()
}

/// Render SQLite DDL for every entity.
pub fn render_sql(entities: &[Entity]) -> String {
    if entities.is_empty() {
        return "-- No entities declared in the spec; nothing to create.\n".to_string();
    }

    let mut sql = String::new();
    sql.push_str("-- SQLite schema generated by appforge\n");
    sql.push_str("-- Derived from the data entities of the application spec\n\n");

    for entity in entities {
        if entity.fields.is_empty() {
            sql.push_str(&format!(
                "-- Entity '{}' declares no fields; table '{}' not created\n\n",
                entity.name, entity.table_name
            ));
            continue;
        }

        let columns: Vec<String> = entity
            .fields
            .iter()
            .map(|field| {
                let mut column = format!("    {} {}", field.column_name, field.kind().sql_type());
                if field.primary_key {
                    column.push_str(" PRIMARY KEY");
                } else if field.required {
                    column.push_str(" NOT NULL");
                }
                column
            })
            .collect();
        sql.push_str(&format!("CREATE TABLE {} (\n", entity.table_name));
        sql.push_str(&columns.join(",\n"));
        sql.push_str("\n);\n\n");

        // SQLite cannot add constraints after the fact; record the link as a column plus comment
        for foreign in entity.fields.iter().filter_map(Field::foreign_ref) {
            sql.push_str(&format!(
                "ALTER TABLE {} ADD COLUMN {}_id INTEGER;\n",
                entity.table_name, foreign.field
            ));
            sql.push_str(&format!("-- Reference: {}\n\n", foreign));
        }
    }

    sql
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub name: String,
    pub table_name: String,
    pub field_count: usize,
}

/// Summary written to `db_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbReport {
    /// Tables actually created (entities with at least one field)
    pub tables: usize,
    pub columns: usize,
    pub entities: Vec<EntitySummary>,
}

impl DbReport {
    pub fn from_entities(entities: &[Entity]) -> Self {
        Self {
            tables: entities.iter().filter(|e| !e.fields.is_empty()).count(),
            columns: entities.iter().map(|e| e.fields.len()).sum(),
            entities: entities
                .iter()
                .map(|e| EntitySummary {
                    name: e.name.clone(),
                    table_name: e.table_name.clone(),
                    field_count: e.fields.len(),
                })
                .collect(),
        }
    }
}

/// Write the schema, the initial migration and the report into `artifacts_dir`.
pub fn write_schema_artifacts(
    artifacts_dir: &Path,
    entities: &[Entity],
    run_id: &str,
) -> Result<DbReport, PackagingError> {
    std::fs::create_dir_all(artifacts_dir).map_err(|e| PackagingError::io(artifacts_dir, e))?;

    let sql = render_sql(entities);
    let schema_path = artifacts_dir.join(SCHEMA_FILE);
    std::fs::write(&schema_path, &sql).map_err(|e| PackagingError::io(&schema_path, e))?;

    let migration = format!(
        "-- Migration 0001: initial schema\n-- Run: {}\n\n{}",
        run_id, sql
    );
    let migration_path = artifacts_dir.join(MIGRATION_FILE);
    std::fs::write(&migration_path, migration)
        .map_err(|e| PackagingError::io(&migration_path, e))?;

    let report = DbReport::from_entities(entities);
    let report_path = artifacts_dir.join(REPORT_FILE);
    write_json_pretty(&report_path, &report).map_err(|e| PackagingError::io(&report_path, e))?;

    Ok(report)
}
