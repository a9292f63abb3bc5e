//! Error taxonomy for editor-facing mutators.

use thiserror::Error;

/// Why an edit was rejected. A rejected edit leaves its target untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("{what} index {index} out of range (limit {limit})")]
    Range {
        what: &'static str,
        index: u64,
        limit: u64,
    },

    #[error("'{text}' is not a valid {expected} value")]
    TypeMismatch { expected: String, text: String },

    #[error("pattern belongs to machine '{pattern_owner}', track is bound to '{track_owner}'")]
    OwnershipMismatch {
        pattern_owner: String,
        track_owner: String,
    },

    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),

    #[error("{0} no longer exists")]
    StaleReference(&'static str),

    #[error("name '{0}' is already in use")]
    DuplicateName(String),
}

/// Result type for edits.
pub type EditResult<T> = Result<T, EditError>;

impl EditError {
    pub(crate) fn range(what: &'static str, index: impl TryInto<u64>, limit: impl TryInto<u64>) -> Self {
        EditError::Range {
            what,
            index: index.try_into().unwrap_or(u64::MAX),
            limit: limit.try_into().unwrap_or(u64::MAX),
        }
    }

    pub(crate) fn type_mismatch(expected: &str, text: &str) -> Self {
        EditError::TypeMismatch {
            expected: expected.to_string(),
            text: text.to_string(),
        }
    }
}

/// Check `index < limit`, naming the axis in the error.
pub(crate) fn check_index(what: &'static str, index: usize, limit: usize) -> EditResult<()> {
    if index < limit {
        Ok(())
    } else {
        Err(EditError::range(what, index, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_error_message_names_axis() {
        let err = EditError::range("tick", 12usize, 8usize);
        assert_eq!(err.to_string(), "tick index 12 out of range (limit 8)");
    }

    #[test]
    fn check_index_bounds() {
        assert!(check_index("param", 0, 1).is_ok());
        assert!(matches!(check_index("param", 1, 1), Err(EditError::Range { .. })));
    }
}
