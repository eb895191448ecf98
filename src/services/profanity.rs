use rustrict::CensorStr;

/// Censors a global chat message. Returns the text to store and whether
/// anything was replaced.
pub fn censor_chat_message(text: &str) -> (String, bool) {
    if text.is_inappropriate() {
        (text.censor(), true)
    } else {
        (text.to_string(), false)
    }
}

pub fn contains_profanity(text: &str) -> bool {
    text.is_inappropriate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_censors_global_message() {
        let (stored, censored) = censor_chat_message("this upload is fucking great");
        assert!(censored);
        assert!(stored.contains('*'));
    }

    #[test]
    fn test_clean_message_untouched() {
        let (stored, censored) = censor_chat_message("new tools section is up");
        assert!(!censored);
        assert_eq!(stored, "new tools section is up");
    }

    #[test]
    fn test_contains_profanity() {
        assert!(contains_profanity("what the fuck"));
        assert!(!contains_profanity("alice"));
    }
}
