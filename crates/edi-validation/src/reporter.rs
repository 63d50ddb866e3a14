//! Validation reporter

use edi_ir::{Issue, Severity};
use serde::Serialize;

/// Issue counts and the issues themselves, ready to log or return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Build a report, dropping exact duplicates while keeping first-seen order.
    pub fn new(issues: impl IntoIterator<Item = Issue>) -> Self {
        let mut report = Self::default();
        for issue in issues {
            report.push(issue);
        }
        report
    }

    pub fn push(&mut self, issue: Issue) {
        if self.issues.contains(&issue) {
            return;
        }
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warn => self.warnings += 1,
            Severity::Info => self.infos += 1,
        }
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors == 0
    }

    /// Issues recorded against one transaction set.
    pub fn for_transaction<'a>(&'a self, control_number: &'a str) -> impl Iterator<Item = &'a Issue> + 'a {
        self.issues
            .iter()
            .filter(move |i| i.transaction.as_deref() == Some(control_number))
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} error(s), {} warning(s), {} info",
            self.errors, self.warnings, self.infos
        )
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_are_dropped() {
        let issue = Issue::error("SE_COUNT_MISMATCH", "count").with_segment_ref("SE", 8);
        let mut report = ValidationReport::new([issue.clone(), Issue::warn("UNKNOWN_SEGMENT", "zz")]);
        report.extend([issue]);

        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.warnings, 1);
        assert!(!report.is_valid());
        assert_eq!(report.summary(), "1 error(s), 1 warning(s), 0 info");
    }

    #[test]
    fn test_for_transaction() {
        let report = ValidationReport::new([
            Issue::error("A", "a").in_transaction("0001"),
            Issue::error("B", "b").in_transaction("0002"),
            Issue::info("C", "c"),
        ]);
        let codes: Vec<_> = report.for_transaction("0002").map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["B"]);
    }
}
