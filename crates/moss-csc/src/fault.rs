//! ---
//! moss_section: "01-core-functionality"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Fault-escalation side channel into the enclosing framework."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use async_trait::async_trait;

use moss_common::FaultCode;

/// Fault-transition side channel supplied by the enclosing control framework.
///
/// Unrecoverable acquisition failures are reported here rather than propagated
/// to the caller of the transition handler: the framework's state machine, not
/// the call stack, is the unwind target.
#[async_trait]
pub trait FaultSink: Send + Sync {
    /// Request that the enclosing component transition to the fault state.
    async fn enter_fault(&self, code: FaultCode, report: &str);
}
