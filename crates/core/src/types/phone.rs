//! Customer phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input contains no digits.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains something other than digits and whitespace.
    #[error("phone number may only contain digits")]
    InvalidCharacter,
    /// The input has the wrong number of digits.
    #[error("phone number must have {min}-{max} digits (got {len})")]
    InvalidLength {
        /// Minimum allowed digit count.
        min: usize,
        /// Maximum allowed digit count.
        max: usize,
        /// Digit count of the input.
        len: usize,
    },
}

/// A delivery contact phone number.
///
/// ## Constraints
///
/// - Whitespace is ignored and stripped
/// - Remaining characters must all be ASCII digits
/// - 10-11 digits
///
/// ## Examples
///
/// ```
/// use backoffice_core::Phone;
///
/// assert!(Phone::parse("0901234567").is_ok());
/// assert!(Phone::parse("090 123 4567").is_ok());
///
/// assert!(Phone::parse("").is_err());
/// assert!(Phone::parse("12345").is_err());
/// assert!(Phone::parse("+84901234567").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Minimum digit count.
    pub const MIN_DIGITS: usize = 10;
    /// Maximum digit count.
    pub const MAX_DIGITS: usize = 11;

    /// Parse a `Phone` from a string, stripping whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has no digits, contains non-digit
    /// characters, or has fewer than 10 or more than 11 digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneError::InvalidCharacter);
        }

        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
                len: digits.len(),
            });
        }

        Ok(Self(digits))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_numbers() {
        assert!(Phone::parse("0901234567").is_ok());
        assert!(Phone::parse("09012345678").is_ok());
        assert!(Phone::parse(" 0901 234 567 ").is_ok());
    }

    #[test]
    fn test_parse_strips_whitespace() {
        let phone = Phone::parse("090 123 4567").unwrap();
        assert_eq!(phone.as_str(), "0901234567");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Phone::parse("   "), Err(PhoneError::Empty));
    }

    #[test]
    fn test_parse_invalid_character() {
        assert_eq!(
            Phone::parse("090-123-4567"),
            Err(PhoneError::InvalidCharacter)
        );
    }

    #[test]
    fn test_parse_too_short_and_too_long() {
        assert!(matches!(
            Phone::parse("123456789"),
            Err(PhoneError::InvalidLength { len: 9, .. })
        ));
        assert!(matches!(
            Phone::parse("123456789012"),
            Err(PhoneError::InvalidLength { len: 12, .. })
        ));
    }

    #[test]
    fn test_from_str() {
        let phone: Phone = "0901234567".parse().unwrap();
        assert_eq!(phone.to_string(), "0901234567");
    }
}
