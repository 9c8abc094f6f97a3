//! ---
//! moss_section: "01-core-functionality"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Shared primitives for the MOSS control component."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod state;

pub use config::{InstanceConfig, MossConfig, StoragePartition, TcpipConfig};
pub use device::SensorKind;
pub use error::{ConfigError, FaultCode};
pub use state::State;
