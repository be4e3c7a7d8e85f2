use thiserror::Error;

/// Fatal conditions that abort a run before (or instead of) archiving.
#[derive(Debug, Error)]
pub enum ArchiverError {
    #[error("firefox profile not found: {0}")]
    ProfileNotFound(String),
    #[error("no bookmark snapshot found: {0}")]
    NoSnapshot(String),
    #[error("bookmark snapshot could not be parsed: {0}")]
    Parse(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("processed-urls ledger unavailable: {0}")]
    LedgerIo(String),
}

impl ArchiverError {
    pub fn code(&self) -> ArchiverErrorCode {
        match self {
            Self::ProfileNotFound(_) => ArchiverErrorCode::E001ProfileNotFound,
            Self::NoSnapshot(_) => ArchiverErrorCode::E002NoSnapshot,
            Self::Parse(_) => ArchiverErrorCode::E003Parse,
            Self::InvalidConfig(_) => ArchiverErrorCode::E004ConfigInvalid,
            Self::LedgerIo(_) => ArchiverErrorCode::E005LedgerIo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiverErrorCode {
    E001ProfileNotFound,
    E002NoSnapshot,
    E003Parse,
    E004ConfigInvalid,
    E005LedgerIo,
    E999Unclassified,
}

impl ArchiverErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001ProfileNotFound => "E001_PROFILE_NOT_FOUND",
            Self::E002NoSnapshot => "E002_NO_SNAPSHOT",
            Self::E003Parse => "E003_PARSE",
            Self::E004ConfigInvalid => "E004_CONFIG_INVALID",
            Self::E005LedgerIo => "E005_LEDGER_IO",
            Self::E999Unclassified => "E999_UNCLASSIFIED",
        }
    }

    /// Find the first `ArchiverError` anywhere in an anyhow chain.
    pub fn classify(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<ArchiverError>())
            .map(ArchiverError::code)
            .unwrap_or(Self::E999Unclassified)
    }
}
