use crate::aspect::{Aspect, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single validation finding, tagged with the aspect that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub aspect: Aspect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, code: IssueCode, aspect: Aspect, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            aspect,
            path: None,
            expression: None,
            category: None,
        }
    }

    pub fn error(code: IssueCode, aspect: Aspect, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, aspect, message)
    }

    pub fn warning(code: IssueCode, aspect: Aspect, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, aspect, message)
    }

    pub fn information(code: IssueCode, aspect: Aspect, message: impl Into<String>) -> Self {
        Self::new(Severity::Information, code, aspect, message)
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Evaluators translate any internal panic/exception they catch into one of these so a
    /// single aspect can never abort the whole pipeline run.
    pub fn internal_error(aspect: Aspect, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, IssueCode::Exception, aspect, message).with_category("validation-error")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    Invalid,
    Structure,
    Required,
    Value,
    Invariant,
    CodeInvalid,
    Extension,
    BusinessRule,
    NotFound,
    NotSupported,
    TooCostly,
    Informational,
    Exception,
    Timeout,
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueCode::Invalid => "invalid",
            IssueCode::Structure => "structure",
            IssueCode::Required => "required",
            IssueCode::Value => "value",
            IssueCode::Invariant => "invariant",
            IssueCode::CodeInvalid => "code-invalid",
            IssueCode::Extension => "extension",
            IssueCode::BusinessRule => "business-rule",
            IssueCode::NotFound => "not-found",
            IssueCode::NotSupported => "not-supported",
            IssueCode::TooCostly => "too-costly",
            IssueCode::Informational => "informational",
            IssueCode::Exception => "exception",
            IssueCode::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}
