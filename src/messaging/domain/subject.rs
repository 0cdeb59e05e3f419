//! Validated subject names and handler identifiers.

use super::MessagingDomainError;
use std::fmt;

/// Maximum length for a subject name.
const MAX_SUBJECT_LENGTH: usize = 255;

/// Validated, dot-separated subject that messages are published to.
///
/// # Examples
///
/// ```
/// use courier::messaging::domain::Subject;
///
/// let subject = Subject::new(" orders.created ").expect("valid subject");
/// assert_eq!(subject.as_str(), "orders.created");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject(String);

impl Subject {
    /// Creates a validated subject.
    ///
    /// The input is trimmed. Whitespace inside the subject and empty
    /// dot-separated tokens (`orders..created`) are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingDomainError::EmptySubject`] when the value is empty
    /// after trimming, [`MessagingDomainError::SubjectTooLong`] when it exceeds
    /// 255 characters, or [`MessagingDomainError::InvalidSubject`] otherwise.
    pub fn new(value: impl Into<String>) -> Result<Self, MessagingDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(MessagingDomainError::EmptySubject);
        }

        if trimmed.chars().count() > MAX_SUBJECT_LENGTH {
            return Err(MessagingDomainError::SubjectTooLong(raw));
        }

        let has_whitespace = trimmed.chars().any(char::is_whitespace);
        let has_empty_token = trimmed.split('.').any(str::is_empty);
        if has_whitespace || has_empty_token {
            return Err(MessagingDomainError::InvalidSubject(raw));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the subject as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a registered message handler, used in logs and for
/// duplicate-registration checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(String);

impl HandlerId {
    /// Creates a handler identifier from a trimmed, non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`MessagingDomainError::EmptyHandlerId`] when the value is
    /// empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, MessagingDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MessagingDomainError::EmptyHandlerId);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
