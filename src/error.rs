use std::path::PathBuf;

use thiserror::Error;

pub type TransyncResult<T> = Result<T, TransyncError>;

#[derive(Error, Debug)]
pub enum TransyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to parse file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Filename {} not found in repository! To add new translation, add language file into repository.", .0.display())]
    MissingFile(PathBuf),

    #[error("Plural forms do not match the language (expected {expected}, found {found}).")]
    PluralMismatch { expected: String, found: String },

    #[error("{0} is only available when original file is a Gettext PO file!")]
    FormatNotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Translation is locked by {0}")]
    Locked(String),

    #[error("VCS error: {0}")]
    Vcs(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TransyncError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        TransyncError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Errors that validation paths show to the user instead of failing hard.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            TransyncError::Parse { .. }
                | TransyncError::MissingFile(_)
                | TransyncError::PluralMismatch { .. }
                | TransyncError::FormatNotSupported(_)
                | TransyncError::NotFound(_)
                | TransyncError::Locked(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_names_file() {
        let err = TransyncError::parse("po/de.po", "unterminated string");
        assert_eq!(
            err.to_string(),
            "Failed to parse file po/de.po: unterminated string"
        );
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_io_error_is_not_user_facing() {
        let err: TransyncError =
            std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into();
        assert!(!err.is_user_facing());
    }

    #[test]
    fn test_format_not_supported_message() {
        let err = TransyncError::FormatNotSupported("Download as Excel workbook".to_string());
        assert_eq!(
            err.to_string(),
            "Download as Excel workbook is only available when original file is a Gettext PO file!"
        );
    }
}
