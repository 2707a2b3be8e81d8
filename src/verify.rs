//! Static-check and test verification of the generated client.
//!
//! Verification is pluggable. The default verifier does not run any tool and
//! reports a fixed outcome; a real implementation would drive `flutter
//! analyze` and `flutter test` the same way the build adapter drives the build.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCheckReport {
    pub format_ok: bool,
    pub analyze_ok: bool,
    pub lint_ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub tests_ok: bool,
    pub test_count: u32,
    pub passed: u32,
    pub failed: u32,
    pub message: String,
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn static_check(&self, app_dir: &Path) -> StaticCheckReport;
    async fn run_tests(&self, app_dir: &Path) -> TestReport;
}

/// Verifier returning fixed outcomes without inspecting the source tree.
#[derive(Debug, Clone, Copy)]
pub struct StubVerifier {
    static_ok: bool,
    tests_ok: bool,
}

impl Default for StubVerifier {
    fn default() -> Self {
        Self::passing()
    }
}

impl StubVerifier {
    pub fn passing() -> Self {
        Self {
            static_ok: true,
            tests_ok: true,
        }
    }

    pub fn new(static_ok: bool, tests_ok: bool) -> Self {
        Self {
            static_ok,
            tests_ok,
        }
    }
}

#[async_trait]
impl Verifier for StubVerifier {
    async fn static_check(&self, _app_dir: &Path) -> StaticCheckReport {
        StaticCheckReport {
            format_ok: self.static_ok,
            analyze_ok: self.static_ok,
            lint_ok: self.static_ok,
            message: "Static checks not executed (stub verifier)".to_string(),
        }
    }

    async fn run_tests(&self, _app_dir: &Path) -> TestReport {
        TestReport {
            tests_ok: self.tests_ok,
            test_count: 0,
            passed: 0,
            failed: 0,
            message: "Tests not executed (stub verifier)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_verifier_reports_configured_outcome() {
        let verifier = StubVerifier::new(false, true);
        let static_report = verifier.static_check(Path::new("app")).await;
        assert!(!static_report.analyze_ok);
        let tests = verifier.run_tests(Path::new("app")).await;
        assert!(tests.tests_ok);
        assert_eq!(tests.test_count, 0);
    }

    #[test]
    fn test_report_shape() {
        let json = serde_json::to_value(StaticCheckReport {
            format_ok: true,
            analyze_ok: true,
            lint_ok: true,
            message: "ok".into(),
        })
        .unwrap();
        assert_eq!(json["analyze_ok"], true);
        assert_eq!(json.as_object().unwrap().len(), 4);
    }
}
