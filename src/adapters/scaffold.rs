//! Minimal Flutter project written without any external tool.
//!
//! Used when the toolchain mode is `scaffold`, or as the fallback when the
//! real toolchain cannot be reached. The result is analyzable source but has
//! no `android/` platform directory, so it cannot be built.

use std::path::Path;

use super::codegen::CodegenVars;
use crate::derive::pascal_case;
use crate::errors::ToolError;

/// Dart package name derived from the app name: `[a-z0-9_]`, not starting with a digit.
pub fn dart_package_name(app_name: &str) -> String {
    let mut name: String = app_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "app_");
    }
    name
}

fn pubspec(vars: &CodegenVars) -> String {
    format!(
        r#"name: {}
description: "{} (generated by appforge)"
publish_to: "none"
version: 1.0.0+1

environment:
  sdk: ">=3.0.0 <4.0.0"

dependencies:
  flutter:
    sdk: flutter
  go_router: ^14.2.0

dev_dependencies:
  flutter_test:
    sdk: flutter
  flutter_lints: ^4.0.0

flutter:
  uses-material-design: true
"#,
        dart_package_name(&vars.app_name),
        vars.app_name.replace('"', "'")
    )
}

fn main_dart(vars: &CodegenVars) -> String {
    let color = vars.primary_color.trim_start_matches('#');
    format!(
        r#"import 'package:flutter/material.dart';

import 'app_router.dart';

void main() {{
  runApp(const GeneratedApp());
}}

class GeneratedApp extends StatelessWidget {{
  const GeneratedApp({{super.key}});

  @override
  Widget build(BuildContext context) {{
    final theme = ThemeData(
      colorScheme: ColorScheme.fromSeed(seedColor: const Color(0xFF{color})),
      useMaterial3: true,
    );
    return MaterialApp.router(
      title: '{title}',
      theme: theme,
      routerConfig: buildRouter(),
    );
  }}
}}
"#,
        color = color,
        title = vars.app_name.replace('\'', "\\'"),
    )
}

fn app_router_dart(vars: &CodegenVars) -> String {
    let mut routes = String::new();
    let mut links = String::new();
    for entity in &vars.entities {
        let segment = crate::util::normalize_identifier(&entity.name);
        let class = pascal_case(&entity.name);
        routes.push_str(&format!(
            "      GoRoute(\n        path: '/{segment}s',\n        builder: (context, state) => const EntityScreen(title: '{class}'),\n      ),\n"
        ));
        links.push_str(&format!(
            "          ListTile(\n            title: const Text('{class}'),\n            onTap: () => context.go('/{segment}s'),\n          ),\n"
        ));
    }

    format!(
        r#"import 'package:flutter/material.dart';
import 'package:go_router/go_router.dart';

GoRouter buildRouter() {{
  return GoRouter(
    initialLocation: '/',
    routes: [
      GoRoute(
        path: '/',
        builder: (context, state) => const HomeScreen(),
      ),
{routes}    ],
  );
}}

class HomeScreen extends StatelessWidget {{
  const HomeScreen({{super.key}});

  @override
  Widget build(BuildContext context) {{
    return Scaffold(
      appBar: AppBar(title: const Text('Home')),
      body: ListView(
        children: [
{links}        ],
      ),
    );
  }}
}}

class EntityScreen extends StatelessWidget {{
  const EntityScreen({{super.key, required this.title}});

  final String title;

  @override
  Widget build(BuildContext context) {{
    return Scaffold(
      appBar: AppBar(title: Text(title)),
      body: Center(child: Text('No $title records yet')),
    );
  }}
}}
"#
    )
}

const ANALYSIS_OPTIONS: &str = r#"include: package:flutter_lints/flutter.yaml

analyzer:
  exclude:
    - "**/*.g.dart"
    - "**/*.freezed.dart"
"#;

fn readme(vars: &CodegenVars) -> String {
    format!(
        "# {}\n\nMinimal Flutter scaffold generated by appforge.\n\n- Build: `flutter build apk --release`\n- Tests: `flutter test`\n\nThis scaffold has no `android/` directory; run `flutter create .` before building.\n",
        vars.app_name
    )
}

/// Write the scaffold into `app_dir`. Returns the files written, relative to `app_dir`.
pub fn write_scaffold(app_dir: &Path, vars: &CodegenVars) -> Result<Vec<String>, ToolError> {
    let lib_dir = app_dir.join("lib");
    std::fs::create_dir_all(&lib_dir).map_err(|e| ToolError::io(&lib_dir, e))?;

    let files = [
        ("pubspec.yaml", pubspec(vars)),
        ("lib/main.dart", main_dart(vars)),
        ("lib/app_router.dart", app_router_dart(vars)),
        ("analysis_options.yaml", ANALYSIS_OPTIONS.to_string()),
        ("README.md", readme(vars)),
    ];
    for (name, content) in &files {
        let path = app_dir.join(name);
        std::fs::write(&path, content).map_err(|e| ToolError::io(&path, e))?;
    }
    Ok(files.iter().map(|(name, _)| name.to_string()).collect())
}
