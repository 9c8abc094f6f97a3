//! ---
//! moss_section: "01-core-functionality"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Sensor device sub-types supported by the component."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Sensor hardware sub-type.
///
/// The wire framing differs per sub-type (measurement replies carry one sample
/// per beam), so both the simulator and the controller link are parameterized
/// by this value.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SensorKind {
    #[default]
    FourBeam,
    EightBeam,
}

impl SensorKind {
    /// Number of beams reported in each measurement frame.
    pub fn beams(&self) -> usize {
        match self {
            SensorKind::FourBeam => 4,
            SensorKind::EightBeam => 8,
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-beam", self.beams())
    }
}
