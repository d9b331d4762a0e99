use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

use crate::mapping::{CanonicalField, HeaderMapping};
use crate::types::ZoneRecord;

/// Placeholder strings some agencies leave in the address column.
const NOISE_ADDRESSES: &[&str] = &["실외"];

/// Why a row was dropped before reaching the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingAddress,
    AddressTooShort,
    NoiseAddress,
    /// No usable coordinates after normalization and enrichment.
    MissingCoordinates,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingAddress => write!(f, "address is missing"),
            RejectReason::AddressTooShort => write!(f, "address is too short"),
            RejectReason::NoiseAddress => write!(f, "address is a placeholder value"),
            RejectReason::MissingCoordinates => write!(f, "no usable coordinates"),
        }
    }
}

/// Result of normalizing one raw row.
#[derive(Debug)]
pub enum RowOutcome {
    /// A candidate record; coordinates may still be absent and recoverable
    /// through geocoding.
    Candidate(ZoneRecord),
    Rejected(RejectReason),
}

/// Coerces one raw CSV row into a typed candidate record.
///
/// The address rules reject immediately; date and coordinate parse failures
/// degrade to `None` so enrichment gets a chance at the row.
pub fn normalize_row(mapping: &HeaderMapping, row: &csv::StringRecord) -> RowOutcome {
    let address = match mapping.get(CanonicalField::Address, row) {
        Some(address) => address,
        None => return RowOutcome::Rejected(RejectReason::MissingAddress),
    };
    if address.chars().count() < 2 {
        return RowOutcome::Rejected(RejectReason::AddressTooShort);
    }
    if NOISE_ADDRESSES.contains(&address) {
        return RowOutcome::Rejected(RejectReason::NoiseAddress);
    }

    let owned = |field| mapping.get(field, row).map(str::to_string);

    let mut record = ZoneRecord {
        region: owned(CanonicalField::Region),
        zone_type: owned(CanonicalField::Type),
        subtype: owned(CanonicalField::Subtype),
        description: owned(CanonicalField::Description),
        address: address.to_string(),
        latitude: mapping
            .get(CanonicalField::Latitude, row)
            .and_then(parse_coordinate),
        longitude: mapping
            .get(CanonicalField::Longitude, row)
            .and_then(parse_coordinate),
        size: owned(CanonicalField::Size),
        date: mapping.get(CanonicalField::Date, row).and_then(parse_date),
        creator: None,
        image: None,
    };

    // 0/0 is the unset sentinel, not a place in the Gulf of Guinea.
    if record.latitude == Some(0.0) && record.longitude == Some(0.0) {
        record.latitude = None;
        record.longitude = None;
    }

    RowOutcome::Candidate(record)
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Lenient date parsing across the formats agencies actually use.
/// Month-granularity values pin to the first of the month; anything
/// unparseable becomes `None`, never a rejection.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim().trim_end_matches('.');

    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y.%m.%d",
        "%Y. %m. %d",
        "%Y/%m/%d",
        "%Y년 %m월 %d일",
        "%Y%m%d",
    ];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(datetime.date());
        }
    }

    const MONTH_FORMATS: &[&str] = &["%Y-%m", "%Y.%m", "%Y/%m", "%Y년 %m월"];
    for format in MONTH_FORMATS {
        let with_day = format!("{raw} 1");
        let format_with_day = format!("{format} %d");
        if let Ok(date) = NaiveDate::parse_from_str(&with_day, &format_with_day) {
            return Some(date);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::HeaderMapping;

    fn mapping_and_row(headers: &[&str], cells: &[&str]) -> (HeaderMapping, csv::StringRecord) {
        let mapping = HeaderMapping::resolve(headers.iter().copied());
        let row = csv::StringRecord::from(cells.to_vec());
        (mapping, row)
    }

    const HEADERS: &[&str] = &["소재지도로명주소", "위도", "경도", "시설 구분", "설치일"];

    #[test]
    fn well_formed_row_becomes_a_candidate() {
        let (mapping, row) = mapping_and_row(
            HEADERS,
            &["서울시 종로구 1길", "37.57", "126.98", "일반", "2023-05-01"],
        );
        match normalize_row(&mapping, &row) {
            RowOutcome::Candidate(record) => {
                assert_eq!(record.address, "서울시 종로구 1길");
                assert_eq!(record.latitude, Some(37.57));
                assert_eq!(record.longitude, Some(126.98));
                assert_eq!(record.zone_type.as_deref(), Some("일반"));
                assert_eq!(record.date, NaiveDate::from_ymd_opt(2023, 5, 1));
                assert!(record.has_valid_coordinates());
            }
            RowOutcome::Rejected(reason) => panic!("row rejected: {reason}"),
        }
    }

    #[test]
    fn empty_address_is_rejected() {
        let (mapping, row) = mapping_and_row(HEADERS, &["  ", "37.57", "126.98", "", ""]);
        match normalize_row(&mapping, &row) {
            RowOutcome::Rejected(reason) => assert_eq!(reason, RejectReason::MissingAddress),
            RowOutcome::Candidate(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn single_character_address_is_rejected() {
        let (mapping, row) = mapping_and_row(HEADERS, &["가", "37.57", "126.98", "", ""]);
        match normalize_row(&mapping, &row) {
            RowOutcome::Rejected(reason) => assert_eq!(reason, RejectReason::AddressTooShort),
            RowOutcome::Candidate(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn outdoor_placeholder_address_is_rejected() {
        let (mapping, row) = mapping_and_row(HEADERS, &["실외", "37.57", "126.98", "", ""]);
        match normalize_row(&mapping, &row) {
            RowOutcome::Rejected(reason) => assert_eq!(reason, RejectReason::NoiseAddress),
            RowOutcome::Candidate(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn unparseable_coordinates_degrade_to_none() {
        let (mapping, row) = mapping_and_row(
            HEADERS,
            &["서울시 종로구 1길", "위도없음", "126.98", "", ""],
        );
        match normalize_row(&mapping, &row) {
            RowOutcome::Candidate(record) => {
                assert_eq!(record.latitude, None);
                assert_eq!(record.longitude, Some(126.98));
                assert!(!record.has_valid_coordinates());
            }
            RowOutcome::Rejected(reason) => panic!("row rejected: {reason}"),
        }
    }

    #[test]
    fn zero_zero_coordinates_are_cleared() {
        let (mapping, row) =
            mapping_and_row(HEADERS, &["서울시 종로구 1길", "0", "0.0", "", ""]);
        match normalize_row(&mapping, &row) {
            RowOutcome::Candidate(record) => {
                assert_eq!(record.latitude, None);
                assert_eq!(record.longitude, None);
            }
            RowOutcome::Rejected(reason) => panic!("row rejected: {reason}"),
        }
    }

    #[test]
    fn invalid_date_becomes_absent_not_an_error() {
        let (mapping, row) = mapping_and_row(
            HEADERS,
            &["서울시 종로구 1길", "37.57", "126.98", "", "설치일미상"],
        );
        match normalize_row(&mapping, &row) {
            RowOutcome::Candidate(record) => assert_eq!(record.date, None),
            RowOutcome::Rejected(reason) => panic!("row rejected: {reason}"),
        }
    }

    #[test]
    fn date_formats_from_the_wild() {
        assert_eq!(parse_date("2023-05-01"), NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(parse_date("2023.05.01"), NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(parse_date("20230501"), NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(
            parse_date("2023년 5월 1일"),
            NaiveDate::from_ymd_opt(2023, 5, 1)
        );
        assert_eq!(
            parse_date("2023-05-01 00:00:00"),
            NaiveDate::from_ymd_opt(2023, 5, 1)
        );
        // Month-granularity installation dates pin to day one.
        assert_eq!(parse_date("2023-05"), NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(parse_date("2023.05"), NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("미상"), None);
    }
}
