//! ---
//! moss_section: "01-core-functionality"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Error taxonomy and framework fault codes."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use thiserror::Error;

/// Configuration errors surfaced at configure time.
///
/// All of these are fatal: they abort configuration before any device
/// resource is acquired.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The runtime index does not match any instance record.
    #[error("no configuration instance found for sal_index {sal_index}")]
    NotFound { sal_index: u32 },
    /// Structural or value constraint violated by an otherwise parseable document.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The document does not match the configuration schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error codes reported to the enclosing framework when the component is
/// forced into the fault state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FaultCode {
    /// Controller connection could not be established.
    Connection = 1,
}

impl FaultCode {
    /// Numeric code published alongside the fault event.
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultCode::Connection => write!(f, "CONNECTION"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_code_values() {
        assert_eq!(FaultCode::Connection.code(), 1);
        assert_eq!(FaultCode::Connection.to_string(), "CONNECTION");
    }
}
