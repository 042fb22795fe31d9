//! Common error infrastructure for netmod-core.
//!
//! Domain-specific errors (`RecordError`, `RegistryError`, `UpgradeError`,
//! `BehaviorFault`) are defined in their respective modules alongside the
//! operations they validate. This module provides the classification shared
//! by all of them.

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: a single record misbehaved; the tick continues for everything else
/// - **Validation**: invalid input rejected at construction time, never reaches the wire
/// - **Internal**: peers disagree about replicated state (e.g. version skew)
/// - **Fatal**: content cannot be loaded at all; boot must stop
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Examples: malformed payload bytes clamped by a behavior
    Recoverable,

    /// Examples: header index out of range
    Validation,

    /// Examples: record names an unregistered behavior
    Internal,

    /// Examples: registry capacity exhausted
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error must stop startup.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

/// Common trait for all netmod-core errors.
///
/// # Implementation Guidelines
///
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait ModError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Default implementation uses the error type name.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
