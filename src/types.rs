use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical smoking-zone record, the unit of ingestion and storage.
///
/// Address is the natural key; the sink enforces uniqueness on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub region: Option<String>,
    #[serde(rename = "type")]
    pub zone_type: Option<String>,
    pub subtype: Option<String>,
    pub description: Option<String>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub size: Option<String>,
    pub date: Option<NaiveDate>,
    pub creator: Option<String>,
    pub image: Option<String>,
}

impl ZoneRecord {
    /// Whether both coordinates are present, finite, in range, and not the
    /// 0/0 "unset" sentinel some agencies emit.
    pub fn has_valid_coordinates(&self) -> bool {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                lat.is_finite()
                    && lng.is_finite()
                    && (-90.0..=90.0).contains(&lat)
                    && (-180.0..=180.0).contains(&lng)
                    && !(lat == 0.0 && lng == 0.0)
            }
            _ => false,
        }
    }
}
