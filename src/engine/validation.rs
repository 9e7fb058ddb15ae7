/// Longest display name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 32;

#[derive(Debug, PartialEq)]
pub enum NameError {
    Empty,
    TooLong { max: usize, actual: usize },
    ControlCharacter,
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameError::Empty => write!(f, "Name cannot be empty"),
            NameError::TooLong { max, actual } => {
                write!(f, "Name cannot exceed {} characters (got {})", max, actual)
            }
            NameError::ControlCharacter => write!(f, "Name cannot contain control characters"),
        }
    }
}

impl std::error::Error for NameError {}

/// Trim a raw name line and check it. Returns the trimmed name.
pub fn validate_name(raw: &str) -> Result<String, NameError> {
    let name = raw.trim();

    if name.is_empty() {
        return Err(NameError::Empty);
    }

    let chars = name.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(NameError::TooLong {
            max: MAX_NAME_CHARS,
            actual: chars,
        });
    }

    if name.chars().any(char::is_control) {
        return Err(NameError::ControlCharacter);
    }

    Ok(name.to_string())
}
