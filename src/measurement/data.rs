use serde::Serialize;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRecord {
    pub volts: String, // "U=" field
    pub amps: String,  // "I=" field
    pub watts: String, // "Watt=" field
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: String,
}
