//! Input validation for sign-up and sign-in

use regex::Regex;
use std::sync::OnceLock;

/// Validate display name
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    let len = name.chars().count();
    if len < 3 {
        return Err("Name must be at least 3 characters long".to_string());
    }

    if len > 50 {
        return Err("Name must be at most 50 characters long".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Please provide a valid email".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let len = password.chars().count();
    if len < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }

    if len > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_bounds() {
        assert!(validate_name("Ann").is_ok());
        assert!(validate_name("  Al  ").is_err());
        assert!(validate_name(&"x".repeat(51)).is_err());
        assert_eq!(validate_name("").unwrap_err(), "Name is required");
    }

    #[test]
    fn test_email_format() {
        assert!(validate_email("jane.doe@example.com").is_ok());
        assert!(validate_email("jane@localhost").is_err());
        assert!(validate_email("not an email").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }
}
