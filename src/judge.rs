//! Accept/revise decision over the three quality gates.

use serde::{Deserialize, Serialize};

use crate::critic::CriticReport;
use crate::verify::{StaticCheckReport, TestReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Revise,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Accept => write!(f, "accept"),
            Decision::Revise => write!(f, "revise"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeDecision {
    pub decision: Decision,
    pub critic_ok: bool,
    pub static_ok: bool,
    pub tests_ok: bool,
    pub reason: String,
}

impl JudgeDecision {
    pub fn accepted(&self) -> bool {
        self.decision == Decision::Accept
    }
}

/// Accept iff the critic found nothing blocking, analysis passed and tests passed.
pub fn judge(critic: &CriticReport, static_checks: &StaticCheckReport, tests: &TestReport) -> JudgeDecision {
    let critic_ok = critic.blocking.is_empty();
    let static_ok = static_checks.analyze_ok;
    let tests_ok = tests.tests_ok;

    let failing: Vec<&str> = [
        (critic_ok, "critic"),
        (static_ok, "static checks"),
        (tests_ok, "tests"),
    ]
    .into_iter()
    .filter(|(ok, _)| !ok)
    .map(|(_, gate)| gate)
    .collect();

    let (decision, reason) = if failing.is_empty() {
        (Decision::Accept, "All gates passed".to_string())
    } else {
        (Decision::Revise, format!("Failing gates: {}", failing.join(", ")))
    };

    JudgeDecision {
        decision,
        critic_ok,
        static_ok,
        tests_ok,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn critic(blocking: bool) -> CriticReport {
        let mut report = CriticReport::default();
        if blocking {
            report.issues.push("Section 'ci' missing".into());
            report.blocking.push("Section 'ci' missing".into());
        }
        report
    }

    fn static_report(ok: bool) -> StaticCheckReport {
        StaticCheckReport {
            format_ok: true,
            analyze_ok: ok,
            lint_ok: true,
            message: String::new(),
        }
    }

    fn tests_report(ok: bool) -> TestReport {
        TestReport {
            tests_ok: ok,
            test_count: 0,
            passed: 0,
            failed: 0,
            message: String::new(),
        }
    }

    #[test]
    fn test_truth_table() {
        for critic_ok in [true, false] {
            for static_ok in [true, false] {
                for tests_ok in [true, false] {
                    let result = judge(
                        &critic(!critic_ok),
                        &static_report(static_ok),
                        &tests_report(tests_ok),
                    );
                    let expected = critic_ok && static_ok && tests_ok;
                    assert_eq!(result.accepted(), expected);
                    assert_eq!(result.critic_ok, critic_ok);
                    assert_eq!(result.static_ok, static_ok);
                    assert_eq!(result.tests_ok, tests_ok);
                }
            }
        }
    }

    #[test]
    fn test_reason_names_failing_gates() {
        let result = judge(&critic(true), &static_report(true), &tests_report(false));
        assert_eq!(result.decision, Decision::Revise);
        assert_eq!(result.reason, "Failing gates: critic, tests");

        let accepted = judge(&critic(false), &static_report(true), &tests_report(true));
        assert_eq!(accepted.reason, "All gates passed");
    }

    #[test]
    fn test_only_analyze_counts_for_static_gate() {
        let mut report = static_report(true);
        report.lint_ok = false;
        report.format_ok = false;
        assert!(judge(&critic(false), &report, &tests_report(true)).accepted());
    }
}
