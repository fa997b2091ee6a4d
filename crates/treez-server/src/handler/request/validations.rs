//! Request validation utilities.

use validator::ValidationError;

pub fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// Checks that a new password mixes upper case, lower case and digits.
pub fn password_strength(password: &str) -> Result<(), ValidationError> {
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(validation_error(
            "password_uppercase",
            "Password must contain at least one uppercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(validation_error(
            "password_lowercase",
            "Password must contain at least one lowercase letter",
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(validation_error(
            "password_digit",
            "Password must contain at least one number",
        ));
    }

    Ok(())
}

/// Normalization of request strings before they reach a repository.
pub trait Normalized {
    /// Trimmed and lower-cased copy.
    fn normalized_string(&self) -> String;
}

impl Normalized for String {
    fn normalized_string(&self) -> String {
        self.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_passes() {
        assert!(password_strength("Secret123").is_ok());
    }

    #[test]
    fn weak_passwords_fail_with_reason() {
        let error = password_strength("secret123").unwrap_err();
        assert_eq!(error.code, "password_uppercase");

        let error = password_strength("SECRET123").unwrap_err();
        assert_eq!(error.code, "password_lowercase");

        let error = password_strength("SecretSecret").unwrap_err();
        assert_eq!(error.code, "password_digit");
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(
            String::from("  Jane@Example.COM ").normalized_string(),
            "jane@example.com"
        );
    }
}
