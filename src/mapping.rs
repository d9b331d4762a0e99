use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

/// Target attributes every source schema is reconciled onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Region,
    Type,
    Subtype,
    Description,
    Address,
    Latitude,
    Longitude,
    Size,
    Date,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::Region,
        CanonicalField::Type,
        CanonicalField::Subtype,
        CanonicalField::Description,
        CanonicalField::Address,
        CanonicalField::Latitude,
        CanonicalField::Longitude,
        CanonicalField::Size,
        CanonicalField::Date,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Region => "region",
            CanonicalField::Type => "type",
            CanonicalField::Subtype => "subtype",
            CanonicalField::Description => "description",
            CanonicalField::Address => "address",
            CanonicalField::Latitude => "latitude",
            CanonicalField::Longitude => "longitude",
            CanonicalField::Size => "size",
            CanonicalField::Date => "date",
        }
    }
}

/// Exact header names observed across agency datasets. Adding a new
/// agency's naming convention is a data change here, not a code change.
static EXACT_ALIASES: Lazy<HashMap<&'static str, CanonicalField>> = Lazy::new(|| {
    use CanonicalField::*;
    HashMap::from([
        ("자치구명", Region),
        ("시도명", Region),
        ("시설 구분", Type),
        ("구분", Type),
        ("시설형태", Subtype),
        ("흡연구역범위상세", Subtype),
        ("실외     실내", Subtype),
        ("흡연실 형태", Subtype),
        ("설치 위치", Description),
        ("서울특별시 용산구 설치 위치", Description),
        ("흡연구역명", Description),
        ("시설명", Description),
        ("건물명", Description),
        ("설치도로명주소", Address),
        ("소재지도로명주소", Address),
        ("주소", Address),
        ("영업소소재지(도로 명)", Address),
        ("도로명주소", Address),
        ("위도", Latitude),
        ("경도", Longitude),
        ("규모", Size),
        ("규모_제곱미터", Size),
        ("규모(제곱미터)", Size),
        ("설치일", Date),
        ("설치연월", Date),
        ("데이터기준일자", Date),
    ])
});

/// Substring fallback for headers the alias table has never seen.
/// A header may serve several fields ("설치 위치" is both an address and a
/// description hint); each field binds at most one header.
const KEYWORD_RULES: &[(CanonicalField, &[&str])] = &[
    (CanonicalField::Address, &["주소", "위치", "Address"]),
    (CanonicalField::Type, &["구분", "시설", "형태", "Type"]),
    (CanonicalField::Description, &["상세", "위치", "Description"]),
    (CanonicalField::Latitude, &["위도", "Latitude", "Y"]),
    (CanonicalField::Longitude, &["경도", "Longitude", "X"]),
    (CanonicalField::Region, &["자치구", "지역", "Region"]),
    (CanonicalField::Size, &["규모", "Size"]),
];

/// Resolved mapping from canonical field to source column index for one file.
#[derive(Debug, Clone, Default)]
pub struct HeaderMapping {
    bound: HashMap<CanonicalField, usize>,
}

impl HeaderMapping {
    /// Resolves a header row against the alias and keyword tables.
    ///
    /// For each canonical field the first exactly-aliased header wins; only
    /// when no exact alias exists does the keyword scan run. Earlier columns
    /// win and a bound field is never overwritten, so the result is
    /// deterministic for a given header list.
    pub fn resolve<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let headers: Vec<&str> = headers.into_iter().map(str::trim).collect();
        let mut bound = HashMap::new();

        for field in CanonicalField::ALL {
            let exact = headers
                .iter()
                .position(|h| EXACT_ALIASES.get(h) == Some(&field));
            let index = exact.or_else(|| {
                KEYWORD_RULES
                    .iter()
                    .find(|(f, _)| *f == field)
                    .and_then(|(_, keywords)| {
                        headers
                            .iter()
                            .position(|h| keywords.iter().any(|kw| h.contains(kw)))
                    })
            });
            if let Some(index) = index {
                debug!(
                    "Mapped column '{}' -> {}",
                    headers[index],
                    field.name()
                );
                bound.insert(field, index);
            }
        }

        Self { bound }
    }

    /// A file whose headers bind no address column is unusable.
    pub fn has_address(&self) -> bool {
        self.bound.contains_key(&CanonicalField::Address)
    }

    pub fn index(&self, field: CanonicalField) -> Option<usize> {
        self.bound.get(&field).copied()
    }

    /// Extracts the cell bound to `field` from one row, trimmed.
    /// Returns `None` for unbound fields, short rows, and empty cells.
    pub fn get<'r>(&self, field: CanonicalField, row: &'r csv::StringRecord) -> Option<&'r str> {
        let cell = row.get(self.index(field)?)?.trim();
        if cell.is_empty() {
            None
        } else {
            Some(cell)
        }
    }
}
