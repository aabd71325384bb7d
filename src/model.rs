use serde_json::Number;
use validator::ValidationError;

pub mod api_response;
pub mod assignment;
pub mod identity;
pub mod request;
pub mod submission;

/// Marks keep the client's JSON number form (`50` stays `50`) but may not go below zero.
pub(crate) fn non_negative(marks: &Number) -> Result<(), ValidationError> {
    match marks.as_f64() {
        Some(value) if value >= 0.0 => Ok(()),
        _ => Err(ValidationError::new("range").with_message("must not be negative".into())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn number(value: serde_json::Value) -> Number {
        match value {
            serde_json::Value::Number(n) => n,
            other => panic!("not a number: {other}"),
        }
    }

    #[test]
    fn marks_must_not_be_negative() {
        assert!(non_negative(&number(json!(0))).is_ok());
        assert!(non_negative(&number(json!(12.5))).is_ok());
        assert!(non_negative(&number(json!(-1))).is_err());
        assert!(non_negative(&number(json!(-0.5))).is_err());
    }
}
