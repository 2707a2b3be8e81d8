//! Dart client stub generation.
//!
//! Produces a small `forge_client` package: one model class per entity plus
//! `HealthResponse`, and a `ForgeClient` facade with `health()` and five CRUD
//! calls per entity.

use std::fmt::Write as _;
use std::path::Path;

use super::entities::{Entity, Field, FieldKind};
use super::{camel_case, pascal_case};
use crate::errors::PackagingError;

pub const DART_CLIENT_DIR: &str = "dart_client";

const PUBSPEC: &str = "name: forge_client
description: Dart client for the generated API
version: 1.0.0
publish_to: none

environment:
  sdk: '>=3.0.0 <4.0.0'

dependencies:
  http: ^1.1.0

dev_dependencies:
  test: ^1.24.0
";

const HEALTH_MODEL: &str = "class HealthResponse {
  HealthResponse({
    required this.status,
    required this.timestamp,
  });

  final String status;
  final DateTime timestamp;

  factory HealthResponse.fromJson(Map<String, dynamic> json) {
    return HealthResponse(
      status: json['status'] as String,
      timestamp: DateTime.parse(json['timestamp'] as String),
    );
  }

  Map<String, dynamic> toJson() {
    return {
      'status': status,
      'timestamp': timestamp.toIso8601String(),
    };
  }
}
";

fn dart_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "String",
        FieldKind::Integer => "int",
        FieldKind::Real => "double",
        FieldKind::Boolean => "bool",
        FieldKind::DateTime => "DateTime",
    }
}

/// Contents of a single-quoted Dart literal: no interpolation, no early close.
fn dart_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '\'' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn from_json_expr(field: &Field) -> String {
    let access = format!("json['{}']", dart_string(&field.name));
    match (field.kind(), field.required) {
        (FieldKind::Real, true) => format!("({} as num).toDouble()", access),
        (FieldKind::Real, false) => format!("({} as num?)?.toDouble()", access),
        (FieldKind::DateTime, true) => format!("DateTime.parse({} as String)", access),
        (FieldKind::DateTime, false) => {
            format!("{0} == null ? null : DateTime.parse({0} as String)", access)
        }
        (kind, true) => format!("{} as {}", access, dart_type(kind)),
        (kind, false) => format!("{} as {}?", access, dart_type(kind)),
    }
}

fn to_json_expr(field: &Field) -> String {
    let ident = camel_case(&field.column_name);
    match (field.kind(), field.required) {
        (FieldKind::DateTime, true) => format!("{}.toIso8601String()", ident),
        (FieldKind::DateTime, false) => format!("{}?.toIso8601String()", ident),
        _ => ident,
    }
}

fn render_model(entity: &Entity) -> String {
    let class = pascal_case(&entity.name);
    let mut out = String::new();

    let _ = writeln!(out, "class {} {{", class);
    if entity.fields.is_empty() {
        let _ = writeln!(out, "  {}();\n", class);
    } else {
        let _ = writeln!(out, "  {}({{", class);
        for field in &entity.fields {
            let prefix = if field.required { "required " } else { "" };
            let _ = writeln!(out, "    {}this.{},", prefix, camel_case(&field.column_name));
        }
        out.push_str("  });\n\n");
    }

    for field in &entity.fields {
        let nullable = if field.required { "" } else { "?" };
        let _ = writeln!(
            out,
            "  final {}{} {};",
            dart_type(field.kind()),
            nullable,
            camel_case(&field.column_name)
        );
    }
    if !entity.fields.is_empty() {
        out.push('\n');
    }

    let _ = writeln!(out, "  factory {}.fromJson(Map<String, dynamic> json) {{", class);
    let _ = writeln!(out, "    return {}(", class);
    for field in &entity.fields {
        let _ = writeln!(
            out,
            "      {}: {},",
            camel_case(&field.column_name),
            from_json_expr(field)
        );
    }
    out.push_str("    );\n  }\n\n");

    out.push_str("  Map<String, dynamic> toJson() {\n    return {\n");
    for field in &entity.fields {
        let _ = writeln!(out, "      '{}': {},", dart_string(&field.name), to_json_expr(field));
    }
    out.push_str("    };\n  }\n}\n");
    out
}

fn render_entity_methods(entity: &Entity) -> String {
    let class = pascal_case(&entity.name);
    let var = camel_case(&entity.table_name);
    let collection = entity.collection();
    format!(
        r#"  // {class}
  Future<List<{class}>> list{class}s() async {{
    final response = await _httpClient.get(Uri.parse('$baseUrl/{collection}'));
    _check(response, 'list {collection}');
    final body = jsonDecode(response.body) as Map<String, dynamic>;
    return (body['data'] as List)
        .map((item) => {class}.fromJson(item as Map<String, dynamic>))
        .toList();
  }}

  Future<{class}> create{class}({class} {var}) async {{
    final response = await _httpClient.post(
      Uri.parse('$baseUrl/{collection}'),
      headers: _jsonHeaders,
      body: jsonEncode({var}.toJson()),
    );
    _check(response, 'create {collection}');
    return {class}.fromJson(jsonDecode(response.body) as Map<String, dynamic>);
  }}

  Future<{class}> get{class}(String id) async {{
    final response = await _httpClient.get(Uri.parse('$baseUrl/{collection}/$id'));
    _check(response, 'get {collection}');
    return {class}.fromJson(jsonDecode(response.body) as Map<String, dynamic>);
  }}

  Future<{class}> update{class}(String id, {class} {var}) async {{
    final response = await _httpClient.put(
      Uri.parse('$baseUrl/{collection}/$id'),
      headers: _jsonHeaders,
      body: jsonEncode({var}.toJson()),
    );
    _check(response, 'update {collection}');
    return {class}.fromJson(jsonDecode(response.body) as Map<String, dynamic>);
  }}

  Future<void> delete{class}(String id) async {{
    final response = await _httpClient.delete(Uri.parse('$baseUrl/{collection}/$id'));
    _check(response, 'delete {collection}');
  }}

"#
    )
}

/// Render `lib/forge_client.dart`.
pub fn render_library(entities: &[Entity], base_url: &str) -> String {
    let mut out = String::from(
        "import 'dart:convert';\n\nimport 'package:http/http.dart' as http;\n\n",
    );
    out.push_str(HEALTH_MODEL);
    for entity in entities {
        out.push('\n');
        out.push_str(&render_model(entity));
    }

    let _ = write!(
        out,
        r#"
class ForgeClient {{
  ForgeClient({{
    this.baseUrl = '{base_url}',
    http.Client? httpClient,
  }}) : _httpClient = httpClient ?? http.Client();

  final String baseUrl;
  final http.Client _httpClient;

  static const _jsonHeaders = {{'Content-Type': 'application/json'}};

  void _check(http.Response response, String action) {{
    if (response.statusCode < 200 || response.statusCode >= 300) {{
      throw Exception('Failed to $action: HTTP ${{response.statusCode}}');
    }}
  }}

  Future<HealthResponse> health() async {{
    final response = await _httpClient.get(Uri.parse('$baseUrl/health'));
    _check(response, 'check health');
    return HealthResponse.fromJson(jsonDecode(response.body) as Map<String, dynamic>);
  }}

"#
    );
    for entity in entities {
        out.push_str(&render_entity_methods(entity));
    }
    out.push_str("  void dispose() {\n    _httpClient.close();\n  }\n}\n");
    out
}

fn render_readme(entities: &[Entity], base_url: &str) -> String {
    let mut out = format!(
        "# forge_client\n\nDart client for the generated API.\n\n## Installation\n\n```bash\ncd dart_client\ndart pub get\n```\n\n## Usage\n\n```dart\nimport 'package:forge_client/forge_client.dart';\n\nFuture<void> main() async {{\n  final client = ForgeClient(baseUrl: '{}');\n  try {{\n    final health = await client.health();\n    print('API status: ${{health.status}}');\n  }} finally {{\n    client.dispose();\n  }}\n}}\n```\n\n## Endpoints\n\n- `GET /health`\n",
        base_url
    );
    for entity in entities {
        let collection = entity.collection();
        let _ = write!(
            out,
            "- `GET /{0}`\n- `POST /{0}`\n- `GET /{0}/{{id}}`\n- `PUT /{0}/{{id}}`\n- `DELETE /{0}/{{id}}`\n",
            collection
        );
    }
    out.push_str("\nFailed requests throw an `Exception` carrying the HTTP status.\n");
    out
}

/// Write the client package into `dir`. Returns paths relative to `dir`.
pub fn write_dart_client(
    dir: &Path,
    entities: &[Entity],
    base_url: &str,
) -> Result<Vec<String>, PackagingError> {
    let lib_dir = dir.join("lib");
    std::fs::create_dir_all(&lib_dir).map_err(|e| PackagingError::io(&lib_dir, e))?;

    let files = [
        ("pubspec.yaml", PUBSPEC.to_string()),
        ("lib/forge_client.dart", render_library(entities, base_url)),
        ("README.md", render_readme(entities, base_url)),
    ];
    for (name, content) in &files {
        let path = dir.join(name);
        std::fs::write(&path, content).map_err(|e| PackagingError::io(&path, e))?;
    }
    Ok(files.iter().map(|(name, _)| name.to_string()).collect())
}
