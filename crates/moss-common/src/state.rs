//! ---
//! moss_section: "01-core-functionality"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Operational summary states of the control component."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Operational summary state of the control component.
///
/// The state machine itself is owned by the enclosing control framework; this
/// crate only reacts to transitions. Resources are held while the component is
/// in one of the two operating states ([`State::Disabled`], [`State::Enabled`])
/// and released on any transition out of them.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Standby,
    Disabled,
    Enabled,
    Fault,
    Offline,
}

impl State {
    /// Whether this is an operating state in which device resources are held.
    pub fn is_disabled_or_enabled(&self) -> bool {
        matches!(self, State::Disabled | State::Enabled)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            State::Standby => "STANDBY",
            State::Disabled => "DISABLED",
            State::Enabled => "ENABLED",
            State::Fault => "FAULT",
            State::Offline => "OFFLINE",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operating_state_predicate() {
        assert!(State::Disabled.is_disabled_or_enabled());
        assert!(State::Enabled.is_disabled_or_enabled());
        assert!(!State::Standby.is_disabled_or_enabled());
        assert!(!State::Fault.is_disabled_or_enabled());
        assert!(!State::Offline.is_disabled_or_enabled());
    }

    #[test]
    fn display_matches_framework_labels() {
        assert_eq!(State::Standby.to_string(), "STANDBY");
        assert_eq!(State::Enabled.to_string(), "ENABLED");
    }
}
