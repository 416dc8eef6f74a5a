//! Naming policy for rooms and players.

use crate::RoomError;

/// Longest accepted room or player name, in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Checks a room or player name.
///
/// Names are taken verbatim: letters of any script and digits only, no
/// whitespace or punctuation, between 1 and [`MAX_NAME_CHARS`] characters.
pub fn validate_name(name: &str) -> Result<(), RoomError> {
    let count = name.chars().count();
    if count == 0
        || count > MAX_NAME_CHARS
        || !name.chars().all(char::is_alphanumeric)
    {
        return Err(RoomError::InvalidName(name.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_accepts_letters_and_digits_of_any_script() {
        for name in ["Ana", "team7", "Ölçü", "Дима", "小明", "42"] {
            assert!(validate_name(name).is_ok(), "{name:?} should pass");
        }
    }

    #[test]
    fn test_validate_name_rejects_empty_and_punctuation() {
        for name in ["", " ", "Ana B", "a-b", "x!", "tab\t"] {
            assert!(
                matches!(validate_name(name), Err(RoomError::InvalidName(_))),
                "{name:?} should fail"
            );
        }
    }

    #[test]
    fn test_validate_name_counts_characters_not_bytes() {
        let at_limit = "ж".repeat(MAX_NAME_CHARS);
        assert!(validate_name(&at_limit).is_ok());

        let over = "a".repeat(MAX_NAME_CHARS + 1);
        assert!(validate_name(&over).is_err());
    }
}
