//! Command decoding errors.

use thiserror::Error;

/// Raised when a parsed command cannot be turned into a typed [`Action`].
///
/// [`Action`]: crate::command::Action
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Invalid operand for '{verb}': {operand}")]
    InvalidOperand { verb: String, operand: String },

    #[error("Missing value for '{0}'")]
    MissingValue(String),

    #[error("Missing locator for '{0}'")]
    MissingLocator(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_operand_display() {
        let err = CommandError::InvalidOperand {
            verb: "wait".to_string(),
            operand: "soon".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("wait"));
        assert!(display.contains("soon"));
    }

    #[test]
    fn test_missing_value_display() {
        let err = CommandError::MissingValue("type".to_string());
        assert_eq!(err.to_string(), "Missing value for 'type'");
    }

    #[test]
    fn test_all_error_variants() {
        let errors = vec![
            CommandError::InvalidOperand {
                verb: "a".to_string(),
                operand: "b".to_string(),
            },
            CommandError::MissingValue("c".to_string()),
            CommandError::MissingLocator("d".to_string()),
            CommandError::UnknownOperator("e".to_string()),
        ];
        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
