use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Customer contact data (email, phone) that must never show up in log output.
///
/// `Debug` and `Display` print a fixed mask. Serialization is transparent so API
/// responses and persisted rows still carry the real value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn as_inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Masked(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_logs() {
        let email = Masked("ayesha@example.pk".to_string());
        assert_eq!(format!("{:?}", email), "********");
        assert_eq!(format!("{}", email), "********");
    }

    #[test]
    fn test_masked_serializes_real_value() {
        let phone = Masked("03001234567".to_string());
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"03001234567\"");

        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_inner(), "03001234567");
    }
}
