pub mod session;

pub use session::{CodedContentDecision, ValidationSession};

/// Message sink for findings raised while deciding or checking.
///
/// Mirrors the validator convention of stating the condition that should hold:
/// a message is recorded only when `condition` is `false`. The return value is
/// the condition, so callers can chain checks.
pub trait MessageSink {
    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        severity: ValidationSeverity,
        code: &str,
        line: Option<u32>,
        column: Option<u32>,
        path: &str,
        condition: bool,
        message: &str,
    ) -> bool;

    /// Record an information-level message when `condition` is false
    fn hint(&mut self, code: &str, path: &str, condition: bool, message: &str) -> bool {
        self.record(
            ValidationSeverity::Information,
            code,
            None,
            None,
            path,
            condition,
            message,
        )
    }

    /// Record an error when `condition` is false
    fn rule(&mut self, code: &str, path: &str, condition: bool, message: &str) -> bool {
        self.record(
            ValidationSeverity::Error,
            code,
            None,
            None,
            path,
            condition,
            message,
        )
    }
}

impl MessageSink for Vec<ValidationIssue> {
    fn record(
        &mut self,
        severity: ValidationSeverity,
        code: &str,
        line: Option<u32>,
        column: Option<u32>,
        path: &str,
        condition: bool,
        message: &str,
    ) -> bool {
        if !condition {
            let mut issue = ValidationIssue::new(severity, code, message);
            if !path.is_empty() {
                issue = issue.with_path(path);
            }
            if line.is_some() || column.is_some() {
                issue = issue.with_location(ValidationLocation {
                    line,
                    column,
                    span: None,
                });
            }
            self.push(issue);
        }
        condition
    }
}

/// Result of a validation pass containing all issues found
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationResult {
    /// All validation issues found
    pub issues: Vec<ValidationIssue>,

    /// Whether validation passed (no errors)
    pub is_valid: bool,

    /// Summary statistics
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

impl ValidationResult {
    /// Create a new validation result from a list of issues
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let count = |severity: ValidationSeverity| {
            issues.iter().filter(|i| i.severity == severity).count()
        };
        let error_count = count(ValidationSeverity::Error);
        let warning_count = count(ValidationSeverity::Warning);
        let info_count = count(ValidationSeverity::Information);

        Self {
            is_valid: error_count == 0,
            issues,
            error_count,
            warning_count,
            info_count,
        }
    }

    /// Create a successful validation result with no issues
    pub fn success() -> Self {
        Self::from_issues(Vec::new())
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.info_count += other.info_count;
        self.is_valid = self.is_valid && other.is_valid;
    }

    /// Issues carrying the given code
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues.iter().filter(move |issue| issue.code == code)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub code: String,
    pub message: String,
    pub path: Option<String>,
    pub location: Option<ValidationLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ValidationSeverity {
    Error,
    Warning,
    Information,
}

impl std::fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationSeverity::Error => write!(f, "error"),
            ValidationSeverity::Warning => write!(f, "warning"),
            ValidationSeverity::Information => write!(f, "information"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationLocation {
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub span: Option<(u32, u32)>,
}

impl ValidationIssue {
    pub fn new(
        severity: ValidationSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            path: None,
            location: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Warning, code, message)
    }

    pub fn information(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ValidationSeverity::Information, code, message)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_location(mut self, location: ValidationLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {} @ {}: {}", self.severity, self.code, path, self.message),
            None => write!(f, "[{}] {}: {}", self.severity, self.code, self.message),
        }
    }
}
