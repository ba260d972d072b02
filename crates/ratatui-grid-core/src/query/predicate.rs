use super::PredicateGroup;
use super::SearchClause;
use crate::settings::FilterOperator;
use crate::settings::FilterPredicate;
use crate::settings::SearchOperator;
use crate::value::Record;
use crate::value::compare_values;
use crate::value::display_value;
use crate::value::field;
use crate::value::values_equal;
use serde_json::Value;
use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalises text for comparison: optional lower-casing and accent stripping.
pub fn fold_text(s: &str, case_sensitive: bool, ignore_accent: bool) -> String {
    let s = if ignore_accent {
        s.nfd().filter(|c| !is_combining_mark(*c)).collect::<String>()
    } else {
        s.to_string()
    };
    if case_sensitive { s } else { s.to_lowercase() }
}

/// Interprets a filter value in the type of the field it is compared with.
fn coerce(filter_value: &Value, field_value: &Value) -> Value {
    match (field_value, filter_value) {
        (Value::Number(_), Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| filter_value.clone()),
        (Value::Bool(_), Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => filter_value.clone(),
        },
        _ => filter_value.clone(),
    }
}

impl FilterPredicate {
    fn text_eq(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::String(x), Value::String(y)) => {
                fold_text(x, self.case_sensitive, self.ignore_accent)
                    == fold_text(y, self.case_sensitive, self.ignore_accent)
            }
            _ => values_equal(a, &coerce(b, a)),
        }
    }

    fn fold(&self, v: &Value) -> String {
        fold_text(&display_value(v), self.case_sensitive, self.ignore_accent)
    }

    pub fn matches(&self, record: &Record) -> bool {
        let actual = field(record, &self.field);
        match self.operator {
            FilterOperator::Equal => self.text_eq(actual, &self.value),
            FilterOperator::NotEqual => !self.text_eq(actual, &self.value),
            FilterOperator::LessThan
            | FilterOperator::LessThanOrEqual
            | FilterOperator::GreaterThan
            | FilterOperator::GreaterThanOrEqual => {
                if actual.is_null() {
                    return false;
                }
                let ord = compare_values(actual, &coerce(&self.value, actual));
                match self.operator {
                    FilterOperator::LessThan => ord == Ordering::Less,
                    FilterOperator::LessThanOrEqual => ord != Ordering::Greater,
                    FilterOperator::GreaterThan => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }
            }
            FilterOperator::Contains => self.fold(actual).contains(&self.fold(&self.value)),
            FilterOperator::DoesNotContain => {
                !self.fold(actual).contains(&self.fold(&self.value))
            }
            FilterOperator::StartsWith => self.fold(actual).starts_with(&self.fold(&self.value)),
            FilterOperator::DoesNotStartWith => {
                !self.fold(actual).starts_with(&self.fold(&self.value))
            }
            FilterOperator::EndsWith => self.fold(actual).ends_with(&self.fold(&self.value)),
            FilterOperator::DoesNotEndWith => {
                !self.fold(actual).ends_with(&self.fold(&self.value))
            }
            FilterOperator::IsNull => actual.is_null(),
            FilterOperator::IsNotNull => !actual.is_null(),
            FilterOperator::IsEmpty => actual.is_null() || display_value(actual).is_empty(),
            FilterOperator::IsNotEmpty => !actual.is_null() && !display_value(actual).is_empty(),
            FilterOperator::In => self.is_member(actual),
            FilterOperator::NotIn => !self.is_member(actual),
        }
    }

    fn is_member(&self, actual: &Value) -> bool {
        match &self.value {
            Value::Array(items) => items.iter().any(|v| self.text_eq(actual, v)),
            single => self.text_eq(actual, single),
        }
    }
}

impl PredicateGroup {
    pub fn matches(&self, record: &Record) -> bool {
        self.0.is_empty() || self.0.iter().any(|p| p.matches(record))
    }
}

impl SearchClause {
    pub fn matches(&self, record: &Record) -> bool {
        let needle = fold_text(&self.value, self.case_sensitive, self.ignore_accent);
        self.fields.iter().any(|f| {
            let hay = fold_text(
                &display_value(field(record, f)),
                self.case_sensitive,
                self.ignore_accent,
            );
            match self.operator {
                SearchOperator::Contains => hay.contains(&needle),
                SearchOperator::StartsWith => hay.starts_with(&needle),
                SearchOperator::EndsWith => hay.ends_with(&needle),
                SearchOperator::Equal => hay == needle,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => Record::new(),
        }
    }

    #[test]
    fn folds_case_and_accents() {
        assert_eq!(fold_text("Crème", false, true), "creme");
        assert_eq!(fold_text("Crème", true, false), "Crème");
    }

    #[test]
    fn string_operators_respect_case_flag() {
        let r = rec(json!({"name": "Alice"}));
        let p = FilterPredicate::new("name", FilterOperator::StartsWith, json!("al"));
        assert!(p.matches(&r));
        assert!(!p.clone().case_sensitive(true).matches(&r));
    }

    #[test]
    fn numeric_comparisons_coerce_string_values() {
        let r = rec(json!({"age": 30}));
        assert!(FilterPredicate::new("age", FilterOperator::GreaterThan, json!("20")).matches(&r));
        assert!(FilterPredicate::new("age", FilterOperator::Equal, json!("30")).matches(&r));
        assert!(!FilterPredicate::new("missing", FilterOperator::LessThan, json!(5)).matches(&r));
    }

    #[test]
    fn membership_and_null_checks() {
        let r = rec(json!({"city": "Oslo", "zip": null}));
        let city = FilterPredicate::new("city", FilterOperator::In, json!(["oslo", "Rome"]));
        assert!(city.matches(&r));
        assert!(FilterPredicate::new("zip", FilterOperator::IsNull, Value::Null).matches(&r));
        assert!(FilterPredicate::new("zip", FilterOperator::IsEmpty, Value::Null).matches(&r));
        assert!(FilterPredicate::new("city", FilterOperator::NotIn, json!(["Rome"])).matches(&r));
    }

    #[test]
    fn search_matches_any_listed_field() {
        let r = rec(json!({"name": "Zoë", "city": "Paris"}));
        let clause = SearchClause {
            fields: vec!["name".into(), "city".into()],
            value: "zoe".into(),
            operator: SearchOperator::Contains,
            case_sensitive: false,
            ignore_accent: true,
        };
        assert!(clause.matches(&r));
    }
}
