//! CLI error type and exit codes.

use std::fmt::{self, Display, Formatter};

use volcast_config::ConfigError;
use volcast_fsops::{ErrorKind, FsOpsError};

/// CLI-level error type distinguishing bad input, missing volumes, partial
/// runs and operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    NoVolumes,
    Partial { failed: usize, total: usize },
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::NoVolumes => 4,
            Self::Partial { .. } => 5,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::NoVolumes => "no target volumes available".to_string(),
            Self::Partial { failed, total } => {
                format!("{failed} of {total} volumes did not complete successfully")
            }
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        match &error {
            ConfigError::InvalidField {
                section,
                field,
                value,
                reason,
            } => {
                let value = value.as_deref().unwrap_or("<unset>");
                Self::validation(format!(
                    "invalid configuration {section}.{field}={value}: {reason}"
                ))
            }
            ConfigError::Read { .. } | ConfigError::Parse { .. } => {
                Self::Failure(anyhow::Error::new(error))
            }
        }
    }
}

impl From<FsOpsError> for CliError {
    fn from(error: FsOpsError) -> Self {
        match error.kind() {
            ErrorKind::NoVolumesAvailable => Self::NoVolumes,
            ErrorKind::InvalidInput | ErrorKind::SourceUnavailable => {
                Self::validation(error.describe())
            }
            _ => Self::Failure(anyhow::Error::new(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn exit_codes_are_distinct() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("boom")).exit_code(), 3);
        assert_eq!(CliError::NoVolumes.exit_code(), 4);
        assert_eq!(CliError::Partial { failed: 1, total: 2 }.exit_code(), 5);
    }

    #[test]
    fn pipeline_errors_map_onto_cli_errors() {
        let err = CliError::from(FsOpsError::NoVolumesAvailable);
        assert!(matches!(err, CliError::NoVolumes));

        let err = CliError::from(FsOpsError::InvalidInput {
            field: "new_name",
            reason: "empty",
            value: None,
        });
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("new_name empty"));
    }

    #[test]
    fn partial_message_counts_volumes() {
        let err = CliError::Partial { failed: 1, total: 3 };
        assert_eq!(
            err.display_message(),
            "1 of 3 volumes did not complete successfully"
        );
        assert_eq!(err.to_string(), "cli error");
    }
}
