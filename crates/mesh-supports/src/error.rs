//! Error types for support generation.
//!
//! Numeric dead ends inside the pipeline (a vertex whose rays hit nothing, a
//! triangle without valid widths) are not errors; they are encoded as `Option`
//! or simply produce no points. The errors here cover the outer surface:
//! configuration checks, mesh index validation and STL I/O.
//!
//! Each error has a code in the format `MESH-XXXX`:
//! - `MESH-1xxx`: I/O errors (file reading, writing, parsing)
//! - `MESH-2xxx`: Validation errors (indices, parameters)

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for support operations.
pub type SupportResult<T> = Result<T, SupportError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// MESH-1001: Failed to read file
    IoRead = 1001,
    /// MESH-1002: Failed to write file
    IoWrite = 1002,
    /// MESH-1003: Failed to parse file format
    ParseError = 1003,
    /// MESH-2001: Face references invalid vertex index
    InvalidVertexIndex = 2001,
    /// MESH-2005: Configuration value out of range
    InvalidParameter = 2005,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `MESH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "MESH-1001",
            ErrorCode::IoWrite => "MESH-1002",
            ErrorCode::ParseError => "MESH-1003",
            ErrorCode::InvalidVertexIndex => "MESH-2001",
            ErrorCode::InvalidParameter => "MESH-2005",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors returned by the support generation entry points.
#[derive(Debug, Error, Diagnostic)]
pub enum SupportError {
    /// Error reading from a file.
    #[error("failed to read mesh from {path}")]
    #[diagnostic(
        code(mesh::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write mesh to {path}")]
    #[diagnostic(
        code(mesh::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing mesh file format.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(mesh::parse::error),
        help("The file may be corrupted. Try re-exporting it as binary STL.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Invalid vertex index in face data.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(
        code(mesh::validation::vertex_index),
        help("Check the mesh export settings; every face must reference existing vertices.")
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// A configuration value is out of its valid range.
    #[error("invalid parameter `{name}`: {details}")]
    #[diagnostic(
        code(mesh::config::parameter),
        help("Start from `SupportConfig::default()` and adjust one value at a time.")
    )]
    InvalidParameter { name: &'static str, details: String },
}

impl SupportError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            SupportError::IoRead { .. } => ErrorCode::IoRead,
            SupportError::IoWrite { .. } => ErrorCode::IoWrite,
            SupportError::ParseError { .. } => ErrorCode::ParseError,
            SupportError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            SupportError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: &'static str, details: impl Into<String>) -> Self {
        SupportError::InvalidParameter {
            name,
            details: details.into(),
        }
    }

    /// Whether the error came from the filesystem or file contents.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            SupportError::IoRead { .. } | SupportError::IoWrite { .. } | SupportError::ParseError { .. }
        )
    }
}
