use validator::{Validate, ValidationErrors};

use crate::middleware::logging::ApiError;

/// Runs the derived validators and reports only the first issue.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload
        .validate()
        .map_err(|errors| ApiError::ValidationFail(first_issue(&errors)))
}

/// Fields are visited alphabetically so the reported issue is stable.
pub fn first_issue(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .find_map(|(field, issues)| {
            issues.first().map(|issue| match &issue.message {
                Some(message) => message.to_string(),
                None => format!("Invalid value for {field}"),
            })
        })
        .unwrap_or_else(|| "Invalid input".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Signup {
        #[validate(email(message = "Please enter a valid email address"))]
        email: String,
        #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
        password: String,
        #[validate(length(min = 1))]
        name: String,
    }

    #[test]
    fn valid_payload_passes() {
        let payload = Signup {
            email: "ada@example.com".into(),
            password: "long-enough".into(),
            name: "Ada".into(),
        };
        assert!(validate_payload(&payload).is_ok());
    }

    #[test]
    fn reports_alphabetically_first_field() {
        let payload = Signup {
            email: "not-an-email".into(),
            password: "short".into(),
            name: "Ada".into(),
        };
        match validate_payload(&payload) {
            Err(ApiError::ValidationFail(message)) => {
                assert_eq!(message, "Please enter a valid email address")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_field_name_without_message() {
        let payload = Signup {
            email: "ada@example.com".into(),
            password: "long-enough".into(),
            name: String::new(),
        };
        match validate_payload(&payload) {
            Err(ApiError::ValidationFail(message)) => assert_eq!(message, "Invalid value for name"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
