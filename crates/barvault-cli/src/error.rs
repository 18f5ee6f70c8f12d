use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] barvault_core::ValidationError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Universe(#[from] barvault_core::CoreError),

    #[error("login failed: {0}")]
    Session(#[from] barvault_core::SessionError),

    #[error(transparent)]
    Warehouse(#[from] barvault_warehouse::WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) => 2,
            Self::Universe(_) => 2,
            Self::Serialization(_) => 4,
            Self::Session(_) => 6,
            Self::Warehouse(_) => 7,
            Self::Io(_) => 10,
        }
    }
}
