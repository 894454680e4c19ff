pub mod admin;
pub mod auth;
pub mod favorites;
pub mod health;
pub mod maps;
pub mod messages;
pub mod properties;
pub mod reviews;
pub mod users;

use crate::auth::password::MIN_PASSWORD_LEN;
use crate::error::{ApiError, ApiResult};

pub fn validate_username(username: &str) -> ApiResult<()> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(ApiError::bad_request("Username must be 3 to 50 characters"));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request("Username must not contain spaces"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ApiResult<()> {
    let valid = email.len() <= 255
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request("Email address is invalid"))
    }
}

pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Rejects text longer than the column that stores it.
pub fn check_len(value: &str, field: &str, max: usize) -> ApiResult<()> {
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Trims an optional text field, turning blanks into `None`.
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("al", false)]
    #[case("alice", true)]
    #[case("alice smith", false)]
    #[case(&"x".repeat(51), false)]
    fn usernames(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(validate_username(input).is_ok(), ok);
    }

    #[rstest]
    #[case("agent@example.com", true)]
    #[case("agent@localhost", false)]
    #[case("@example.com", false)]
    #[case("agent.example.com", false)]
    #[case("agent@.com", false)]
    fn emails(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(validate_email(input).is_ok(), ok);
    }

    #[rstest]
    #[case("short", false)]
    #[case("exactly8", true)]
    fn passwords(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(validate_password(input).is_ok(), ok);
    }

    #[rstest]
    #[case("Austin", true)]
    #[case(&"x".repeat(100), true)]
    #[case(&"x".repeat(101), false)]
    #[case(&"é".repeat(100), true)]
    fn lengths_count_characters(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(check_len(input, "City", 100).is_ok(), ok);
    }

    #[test]
    fn blank_optional_text_becomes_none() {
        assert_eq!(clean_optional(Some("   ".into())), None);
        assert_eq!(clean_optional(Some(" hi ".into())), Some("hi".into()));
        assert_eq!(clean_optional(None), None);
    }
}
