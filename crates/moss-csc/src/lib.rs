//! ---
//! moss_section: "01-core-functionality"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Resource orchestration core for the MOSS control component."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
pub mod csc;
pub mod fault;

pub use csc::{CscError, MossCsc};
pub use fault::FaultSink;
