use std::fmt::{self, Display, Formatter};

use poem_openapi::Validator;

use crate::modules::utils::validate_email;

/// Request-body check for bare e-mail addresses, e.g. a forward recipient.
pub struct EmailValidator;

impl Display for EmailValidator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Not a valid email address")
    }
}

impl Validator<String> for EmailValidator {
    fn check(&self, value: &String) -> bool {
        validate_email(value).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_shared_email_rule() {
        assert!(EmailValidator.check(&"bob@example.com".to_string()));
        assert!(!EmailValidator.check(&"bob@".to_string()));
        assert!(!EmailValidator.check(&"Bob <bob@example.com>".to_string()));
    }
}
