use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Field-keyed validation failures, serialized as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn require(&mut self, field: &str, value: &str, max_len: usize) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, format!("The {} field is required.", humanize(field)));
        } else if trimmed.chars().count() > max_len {
            self.add(
                field,
                format!("The {} may not be greater than {} characters.", humanize(field), max_len),
            );
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fields.values().flatten().next() {
            Some(first) => write!(f, "{}", first),
            None => write!(f, "The given data was invalid."),
        }
    }
}

impl std::error::Error for ValidationErrors {}

fn humanize(field: &str) -> String {
    field.replace('_', " ")
}

/// Loose structural email check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > 254 || email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Strip spaces and dashes; returns the phone when it is 10–15 digits with an optional `+`.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let cleaned: String = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(cleaned)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_collect_per_field() {
        let mut errors = ValidationErrors::new();
        errors.require("name", "   ", 255);
        errors.add("price", "The price must be at least 0.");
        assert!(errors.has("name"));
        assert_eq!(errors.get("price").unwrap().len(), 1);
        assert_eq!(errors.to_string(), "The name field is required.");

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["name"][0], "The name field is required.");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_email_check() {
        assert!(is_valid_email("ali@shop.pk"));
        assert!(is_valid_email("first.last+tag@mail.example.com"));
        assert!(!is_valid_email("ali@shop"));
        assert!(!is_valid_email("@shop.pk"));
        assert!(!is_valid_email("ali shop@x.pk"));
        assert!(!is_valid_email("ali@@shop.pk"));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("0300-123 4567").as_deref(), Some("03001234567"));
        assert_eq!(normalize_phone("+92 300 1234567").as_deref(), Some("+923001234567"));
        assert!(normalize_phone("12345").is_none());
        assert!(normalize_phone("0300abc4567").is_none());
    }
}
