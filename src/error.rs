use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the core model
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Failed to load program image: {0}")]
    LoadError(#[from] LoadError),

    #[error("Core execution error: {0}")]
    ExecutionError(#[from] ExecutionError),

    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] serde_json::Error),
}

/// Errors related to reading hex images and ELF files
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read image '{0}': {1}")]
    FileReadError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse ELF file '{0}': {1}")]
    ParseError(PathBuf, String),

    #[error("Invalid hex token '{token}' at line {line}")]
    InvalidHexToken { line: usize, token: String },

    #[error("Memory address out of bounds: {0:#010x}")]
    AddressOutOfBounds(u32),

    #[error("Invalid ELF machine type: {0}")]
    InvalidMachine(u16),
}

/// Errors related to driving the core
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Cycle budget exhausted after {0} cycles")]
    CycleBudgetExceeded(u64),

    #[error("Self-check failed: {0}")]
    SelfCheckFailed(String),
}

/// Errors related to memory operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Memory access error at address {address:#010x}: {kind}")]
    AccessError { address: u32, kind: MemoryErrorKind },

    #[error("Invalid memory alignment: address {0:#010x} is not aligned to {1} bytes")]
    AlignmentError(u32, u32),
}

/// Specific kinds of memory errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryErrorKind {
    #[error("Attempted to read from unallocated memory")]
    ReadUnallocated,

    #[error("Invalid access size: {0}")]
    InvalidSize(u32),
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;
