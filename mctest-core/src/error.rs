use thiserror::Error;

#[derive(Error, Debug)]
pub enum McTestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot launch server: {0}")]
    LaunchFatal(String),

    #[error("No free port found after {attempts} attempts")]
    PortExhausted { attempts: u32 },

    #[error("Probe timed out after {secs}s")]
    ProbeTimeout { secs: u64 },

    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),
}

pub type Result<T> = std::result::Result<T, McTestError>;
