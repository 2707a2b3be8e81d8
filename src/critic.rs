//! Semantic checks over a validated spec.
//!
//! Schema validation guarantees shape; the critic checks meaning. Missing
//! top-level sections and UI widgets pointing at undeclared entities are
//! blocking. Entities without fields and duplicate entity names are reported
//! as warnings only.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::spec::{REQUIRED_SECTIONS, SpecDocument};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticReport {
    /// Every finding, blocking ones included
    pub issues: Vec<String>,
    /// Findings that prevent acceptance
    pub blocking: Vec<String>,
    pub critical_count: usize,
    pub warning_count: usize,
}

impl CriticReport {
    fn block(&mut self, message: String) {
        self.issues.push(message.clone());
        self.blocking.push(message);
    }

    fn warn(&mut self, message: String) {
        self.issues.push(message);
    }

    fn finish(mut self) -> Self {
        self.critical_count = self.blocking.len();
        self.warning_count = self.issues.len() - self.blocking.len();
        self
    }

    pub fn is_clean(&self) -> bool {
        self.blocking.is_empty()
    }
}

/// Run all checks. Never fails.
pub fn critique(spec: &SpecDocument) -> CriticReport {
    let mut report = CriticReport::default();

    for section in REQUIRED_SECTIONS {
        if !spec.has_section(section) {
            report.block(format!("Section '{}' missing", section));
        }
    }

    let declared: HashSet<&str> = spec.entities().iter().map(|e| e.name.as_str()).collect();

    for screen in spec.screens() {
        for widget in &screen.widgets {
            for reference in [widget.source.as_deref(), widget.entity.as_deref()]
                .into_iter()
                .flatten()
            {
                if !declared.contains(reference) {
                    report.block(format!(
                        "Screen '{}': entity reference '{}' does not exist",
                        screen.display_name(),
                        reference
                    ));
                }
            }
        }
    }

    let mut seen = HashSet::new();
    for entity in spec.entities() {
        if entity.fields.is_empty() {
            report.warn(format!("Entity '{}' declares no fields", entity.name));
        }
        if !seen.insert(entity.name.as_str()) {
            report.warn(format!("Entity '{}' is declared more than once", entity.name));
        }
    }

    report.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: serde_json::Value) -> SpecDocument {
        serde_json::from_value(value).unwrap()
    }

    fn complete() -> serde_json::Value {
        json!({
            "meta": {"schema_version": "0.1.0"},
            "app": {"name": "Shop"},
            "data": {"entities": [
                {"name": "Product", "fields": [{"name": "title"}]},
                {"name": "Order", "fields": [{"name": "total", "type": "decimal"}]}
            ]},
            "ui": {"screens": [
                {"name": "Catalog", "widgets": [{"type": "List", "source": "Product"}]},
                {"name": "Cart", "widgets": [{"type": "Form", "entity": "Order"}]}
            ]},
            "ci": {"android": {"build_variant": "debug"}}
        })
    }

    #[test]
    fn test_complete_spec_is_clean() {
        let report = critique(&spec(complete()));
        assert!(report.is_clean());
        assert!(report.issues.is_empty());
        assert_eq!(report.critical_count, 0);
        assert_eq!(report.warning_count, 0);
    }

    #[test]
    fn test_each_missing_section_is_blocking() {
        for section in REQUIRED_SECTIONS {
            let mut value = complete();
            value.as_object_mut().unwrap().remove(section);
            let report = critique(&spec(value));
            let expected = format!("Section '{}' missing", section);
            assert!(report.blocking.contains(&expected), "{section}");
            assert!(report.issues.contains(&expected));
        }
    }

    #[test]
    fn test_dangling_references() {
        let mut value = complete();
        value["ui"]["screens"] = json!([
            {"name": "Checkout", "widgets": [
                {"type": "Form", "entity": "Payment"},
                {"type": "List", "source": "Product"},
                {"type": "List", "source": "Invoice"}
            ]}
        ]);
        let report = critique(&spec(value));
        assert_eq!(
            report.blocking,
            vec![
                "Screen 'Checkout': entity reference 'Payment' does not exist".to_string(),
                "Screen 'Checkout': entity reference 'Invoice' does not exist".to_string(),
            ]
        );
        assert_eq!(report.critical_count, 2);
    }

    #[test]
    fn test_unnamed_screen() {
        let mut value = complete();
        value["ui"]["screens"] = json!([{"widgets": [{"source": "Ghost"}]}]);
        let report = critique(&spec(value));
        assert_eq!(
            report.blocking,
            vec!["Screen 'unknown': entity reference 'Ghost' does not exist".to_string()]
        );
    }

    #[test]
    fn test_warnings_do_not_block() {
        let mut value = complete();
        value["data"]["entities"] = json!([
            {"name": "Product", "fields": [{"name": "title"}]},
            {"name": "Product", "fields": [{"name": "sku"}]},
            {"name": "Order"}
        ]);
        let report = critique(&spec(value));
        assert!(report.is_clean());
        assert_eq!(report.warning_count, 2);
        assert_eq!(report.issues.len(), 2);
    }
}
