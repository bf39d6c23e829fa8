mod diagnosis;
mod geo;
mod image;
mod location;
mod lookup;
mod map;
mod settings;
mod simulator;
mod site;
#[cfg(test)]
mod tests;
mod tracking;

pub use diagnosis::{
    DIAGNOSIS_UNAVAILABLE_MESSAGE, Diagnosis, DiagnosisClient, DiagnosisError, DiagnosisRequest,
    DiagnosisResult, DiagnosisState, SYSTEM_INSTRUCTION, Severity, SubmitError,
};
pub use geo::{DistanceEstimate, distance_and_eta, haversine_meters};
pub use image::{ImageUpload, MAX_IMAGE_BYTES};
pub use location::{
    GeoCoordinate, LocationService, POSITION_OPTIONS, PositionOptions, ReportedLocation,
};
pub use lookup::{InvalidPhoneSuffix, PHONE_SUFFIX_LEN, PhoneSuffix};
pub use map::{HeadlessMap, HeadlessMapView, MapAdapter, MapView, Marker, MarkerKind, TileSource};
pub use settings::TrackerSettings;
pub use simulator::LocationSimulator;
pub use site::{Engineer, SiteProfile};
pub use tracking::{StateUpdateSender, TrackingSession, TrackingSnapshot, TrackingStatus};

/// Convenience alias for UTC DT
pub type UtcDT = chrono::DateTime<chrono::Utc>;

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
