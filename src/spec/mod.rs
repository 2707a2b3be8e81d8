//! Spec document model.
//!
//! A spec is a declarative description of one mobile application: metadata,
//! app identity, data entities, UI screens and CI settings. The typed view
//! here is produced only after the raw tree passed schema validation, and is
//! never mutated afterwards. Keys the model does not know about are kept in
//! the `extra` maps so nothing in the input is silently dropped.

pub mod loader;

pub use loader::{SchemaRegistry, SpecFormat, ValidationResult, load_spec, validate_spec};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level sections every complete spec carries, in document order.
pub const REQUIRED_SECTIONS: [&str; 5] = ["meta", "app", "data", "ui", "ci"];

/// Parsed, validated specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpecDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<AppSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci: Option<CiSection>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetaSection {
    #[serde(default)]
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppSection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id_android: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeSection>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThemeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DataSection {
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A data entity as declared in the spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntitySpec {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// A field as declared in the spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Relationship in the form `table.field -> other_table.other_field`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign: Option<String>,
}

fn default_field_type() -> String {
    "string".to_string()
}

fn default_required() -> bool {
    true
}

impl FieldSpec {
    pub fn new(name: &str, field_type: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            required,
            primary_key: false,
            foreign: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UiSection {
    /// Navigation style; usually a string such as `tabs`, but may be structured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<Value>,
    #[serde(default)]
    pub screens: Vec<ScreenSpec>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScreenSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub widgets: Vec<WidgetSpec>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ScreenSpec {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WidgetSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,
    /// Entity feeding a list/collection widget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Entity edited or displayed by a form/detail widget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CiSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidCi>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AndroidCi {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_variant: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Android build configuration requested by the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildVariant {
    #[default]
    Debug,
    Release,
}

impl BuildVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildVariant::Debug => "debug",
            BuildVariant::Release => "release",
        }
    }
}

impl std::fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SpecDocument {
    /// Whether a top-level section is present.
    pub fn has_section(&self, name: &str) -> bool {
        match name {
            "meta" => self.meta.is_some(),
            "app" => self.app.is_some(),
            "data" => self.data.is_some(),
            "ui" => self.ui.is_some(),
            "ci" => self.ci.is_some(),
            other => self.extra.contains_key(other),
        }
    }

    pub fn schema_version(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .map(|m| m.schema_version.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn entities(&self) -> &[EntitySpec] {
        self.data.as_ref().map(|d| d.entities.as_slice()).unwrap_or(&[])
    }

    pub fn screens(&self) -> &[ScreenSpec] {
        self.ui.as_ref().map(|u| u.screens.as_slice()).unwrap_or(&[])
    }

    pub fn app_name(&self) -> &str {
        self.app
            .as_ref()
            .map(|a| a.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("Application")
    }

    pub fn bundle_id(&self) -> &str {
        self.app
            .as_ref()
            .and_then(|a| a.bundle_id_android.as_deref())
            .unwrap_or("com.example.app")
    }

    pub fn primary_color(&self) -> &str {
        self.app
            .as_ref()
            .and_then(|a| a.theme.as_ref())
            .and_then(|t| t.primary_color.as_deref())
            .unwrap_or("#2196F3")
    }

    pub fn navigation(&self) -> Value {
        self.ui
            .as_ref()
            .and_then(|u| u.navigation.clone())
            .unwrap_or_else(|| Value::String("tabs".to_string()))
    }

    pub fn build_variant(&self) -> BuildVariant {
        let variant = self
            .ci
            .as_ref()
            .and_then(|c| c.android.as_ref())
            .and_then(|a| a.build_variant.as_deref());
        match variant.map(str::to_lowercase).as_deref() {
            Some("release") => BuildVariant::Release,
            _ => BuildVariant::Debug,
        }
    }
}
