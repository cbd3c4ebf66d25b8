//! Input checks that run before any storage access.
//!
//! Dates are matched by shape only: `2025-02-30` passes. Entry writes report
//! every offending field at once (date, wrong types and out-of-range values
//! together), addressed by dotted camelCase path (`metrics.mood`).

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{AppError, AppResult, FieldIssue};
use crate::models::daily_entry::{DailyRangeQuery, EntryPatch, SortOrder};

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // ASCII digits only; `\d` would accept other Unicode digits.
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern is valid")
});

/// A validated `from..=to` range. `from > to` is allowed and yields no rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub from: String,
    pub to: String,
    pub order: SortOrder,
}

pub fn is_date(raw: &str) -> bool {
    DATE_RE.is_match(raw)
}

fn date_issue(field: &str, raw: Option<&str>) -> Option<FieldIssue> {
    match raw {
        None => Some(FieldIssue::new(field, "is required")),
        Some(value) if !is_date(value) => Some(FieldIssue::new(field, "must be YYYY-MM-DD")),
        Some(_) => None,
    }
}

/// Checks a `POST /daily/:date` request as a whole and returns the typed
/// patch. `body` is the raw JSON, or the issue produced when it could not be
/// read as JSON at all.
pub fn validate_write(date: &str, body: Result<Value, FieldIssue>) -> AppResult<EntryPatch> {
    let mut issues: Vec<FieldIssue> = date_issue("date", Some(date)).into_iter().collect();

    let patch = match body {
        Ok(raw) => parse_entry(&raw, &mut issues),
        Err(issue) => {
            issues.push(issue);
            EntryPatch::default()
        }
    };
    if let Err(errors) = patch.validate() {
        issues.extend(flatten_errors(&errors));
    }

    if issues.is_empty() {
        Ok(patch)
    } else {
        issues.sort_by(|a, b| a.field.cmp(&b.field));
        Err(AppError::Validation(issues))
    }
}

/// Builds a patch from whatever fields have the right type; each field that
/// does not becomes an issue and is left out.
fn parse_entry(raw: &Value, issues: &mut Vec<FieldIssue>) -> EntryPatch {
    let Some(root) = raw.as_object() else {
        issues.push(FieldIssue::new("body", "must be a JSON object"));
        return EntryPatch::default();
    };

    // `symptoms` wins over the legacy `menopause` key when both are sent.
    let symptoms = root
        .get("symptoms")
        .filter(|v| !v.is_null())
        .or_else(|| root.get("menopause"));

    EntryPatch {
        metrics: typed_group("metrics", root.get("metrics"), issues),
        symptoms: typed_group("symptoms", symptoms, issues),
        supplements: typed_group("supplements", root.get("supplements"), issues),
        manual_override: typed_group("manualOverride", root.get("manualOverride"), issues),
    }
}

fn typed_group<T: DeserializeOwned>(
    path: &str,
    raw: Option<&Value>,
    issues: &mut Vec<FieldIssue>,
) -> Option<T> {
    let fields = match raw {
        None | Some(Value::Null) => return None,
        Some(Value::Object(fields)) => fields,
        Some(_) => {
            issues.push(FieldIssue::new(path, "must be an object"));
            return None;
        }
    };

    let mut clean = Map::new();
    for (key, value) in fields {
        let single = Value::Object(Map::from_iter([(key.clone(), value.clone())]));
        match serde_json::from_value::<T>(single) {
            Ok(_) => {
                clean.insert(key.clone(), value.clone());
            }
            Err(e) => issues.push(FieldIssue::new(format!("{path}.{key}"), e.to_string())),
        }
    }

    serde_json::from_value(Value::Object(clean)).ok()
}

pub fn validate_range(query: DailyRangeQuery) -> AppResult<DateRange> {
    let issues: Vec<FieldIssue> = [
        date_issue("from", query.from.as_deref()),
        date_issue("to", query.to.as_deref()),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !issues.is_empty() {
        return Err(AppError::Validation(issues));
    }

    match (query.from, query.to) {
        (Some(from), Some(to)) => Ok(DateRange {
            from,
            to,
            order: query.order.unwrap_or_default(),
        }),
        _ => Err(AppError::invalid("from", "is required")),
    }
}

/// Turns nested `validator` output into a flat, sorted issue list.
pub fn flatten_errors(errors: &ValidationErrors) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    collect_issues("", errors, &mut issues);
    issues.sort_by(|a, b| a.field.cmp(&b.field));
    issues
}

fn collect_issues(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldIssue>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            camel_case(field)
        } else {
            format!("{prefix}.{}", camel_case(field))
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for e in field_errors {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed `{}` check", e.code));
                    out.push(FieldIssue::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_issues(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_issues(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
