use crate::value::display_value;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A field-level rule checked while an edit session validates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "rule", content = "arg")]
pub enum ValidationRule {
    Required,
    Number,
    Min(f64),
    Max(f64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
}

/// Form-validation collaborator consulted by the edit lifecycle.
///
/// Returns the first failure message for `value`, or `None` when every rule passes.
pub trait FieldValidator {
    fn validate_field(&self, name: &str, value: &Value, rules: &[ValidationRule])
    -> Option<String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultValidator;

impl FieldValidator for DefaultValidator {
    fn validate_field(
        &self,
        name: &str,
        value: &Value,
        rules: &[ValidationRule],
    ) -> Option<String> {
        let text = display_value(value);
        let blank = value.is_null() || text.trim().is_empty();
        for rule in rules {
            let failure = match rule {
                ValidationRule::Required if blank => Some(format!("{name} is required")),
                // The remaining rules only constrain values that are present.
                _ if blank => None,
                ValidationRule::Required => None,
                ValidationRule::Number => {
                    as_number(value).is_none().then(|| format!("{name} must be a number"))
                }
                ValidationRule::Min(min) => match as_number(value) {
                    Some(n) if n < *min => Some(format!("{name} must be at least {min}")),
                    Some(_) => None,
                    None => Some(format!("{name} must be a number")),
                },
                ValidationRule::Max(max) => match as_number(value) {
                    Some(n) if n > *max => Some(format!("{name} must be at most {max}")),
                    Some(_) => None,
                    None => Some(format!("{name} must be a number")),
                },
                ValidationRule::MinLength(len) => (text.chars().count() < *len)
                    .then(|| format!("{name} must have at least {len} characters")),
                ValidationRule::MaxLength(len) => (text.chars().count() > *len)
                    .then(|| format!("{name} must have at most {len} characters")),
                ValidationRule::Pattern(pattern) => match Regex::new(pattern) {
                    Ok(re) if re.is_match(&text) => None,
                    Ok(_) => Some(format!("{name} has an invalid format")),
                    Err(err) => {
                        tracing::warn!(field = name, %pattern, %err, "invalid validation pattern");
                        None
                    }
                },
            };
            if failure.is_some() {
                return failure;
            }
        }
        None
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_fails_on_blank_only() {
        let v = DefaultValidator;
        let rules = [ValidationRule::Required];
        assert!(v.validate_field("name", &json!(""), &rules).is_some());
        assert!(v.validate_field("name", &json!(null), &rules).is_some());
        assert!(v.validate_field("name", &json!("x"), &rules).is_none());
    }

    #[test]
    fn range_rules_accept_numeric_strings() {
        let v = DefaultValidator;
        let rules = [ValidationRule::Min(1.0), ValidationRule::Max(10.0)];
        assert!(v.validate_field("qty", &json!("5"), &rules).is_none());
        assert_eq!(
            v.validate_field("qty", &json!(11), &rules).as_deref(),
            Some("qty must be at most 10")
        );
    }

    #[test]
    fn optional_fields_skip_rules_when_blank() {
        let v = DefaultValidator;
        let rules = [ValidationRule::Pattern("^[a-z]+$".into())];
        assert!(v.validate_field("code", &json!(null), &rules).is_none());
        assert!(v.validate_field("code", &json!("AB"), &rules).is_some());
    }
}
