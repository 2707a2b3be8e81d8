//! Derivation of data-layer and API artifacts from a validated spec.
//!
//! - `entities`: normalized entity model and SQLite DDL
//! - `contract`: CRUD endpoints and the OpenAPI 3.1 document
//! - `client`: Dart client stub consuming that contract
//!
//! Everything here is a pure function of the entity list plus file writes
//! into the run's artifact directory.

pub mod client;
pub mod contract;
pub mod entities;

pub use contract::{ContractDocument, ContractReport, Endpoint, Operation, derive_endpoints};
pub use entities::{DbReport, Entity, Field, FieldKind, derive_entities, render_sql};

fn words(name: &str) -> impl Iterator<Item = &str> {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `order item` / `order_item` -> `OrderItem`. Existing inner capitals are kept.
pub(crate) fn pascal_case(name: &str) -> String {
    words(name).map(capitalize).collect()
}

/// `unit_price` -> `unitPrice`.
pub(crate) fn camel_case(name: &str) -> String {
    let mut parts = words(name);
    let mut out = parts.next().map(|w| w.to_ascii_lowercase()).unwrap_or_default();
    for part in parts {
        out.push_str(&capitalize(part));
    }
    out
}
