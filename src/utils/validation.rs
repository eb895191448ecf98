use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::profanity::contains_profanity;
use crate::utils::error::{AppError, AppResult};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

fn is_printable_ascii(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

/// Returns the normalised (trimmed, lower-cased) email.
pub fn validate_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(AppError::Validation("Email cannot be empty".to_string()));
    }

    if email.len() > 254 || !EMAIL_RE.is_match(&email) {
        return Err(AppError::Validation("Email is not valid".to_string()));
    }

    Ok(email)
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }

    if username.len() > 64 {
        return Err(AppError::Validation(
            "Username must be at most 64 characters long".to_string(),
        ));
    }

    if !is_printable_ascii(username) || username.contains(' ') {
        return Err(AppError::Validation(
            "Username must contain only printable ASCII characters without spaces".to_string(),
        ));
    }

    if contains_profanity(username) {
        return Err(AppError::Validation(
            "Username contains inappropriate language".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters long".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_about(about: &str) -> AppResult<()> {
    if about.len() > 1000 {
        return Err(AppError::Validation(
            "About text must be at most 1000 characters long".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_comment(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation(
            "Comment cannot be empty".to_string(),
        ));
    }

    if content.len() > 2000 {
        return Err(AppError::Validation(
            "Comment must be at most 2000 characters long".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_message_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }

    if content.len() > 4000 {
        return Err(AppError::Validation(
            "Message content must be at most 4000 characters long".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_contact_message(message: &str) -> AppResult<()> {
    if message.trim().is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }

    if message.len() > 2000 {
        return Err(AppError::Validation(
            "Message must be at most 2000 characters long".to_string(),
        ));
    }

    Ok(())
}
