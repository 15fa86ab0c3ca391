//! Typed parcel records and the value-per-area metric.
//!
//! Raw records from the archive or the cache carry their attributes as a JSON
//! property map. [`Parcel::from_raw`] projects that map onto the handful of
//! columns the pipeline uses and fails with [`Error::MissingColumn`] as soon
//! as one of them is absent, instead of failing later on a lookup.

use geo::Geometry;
use geojson::JsonObject;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

pub const LAND_VALUE: &str = "Sum_LandVa";
pub const IMPROVEMENT_VALUE: &str = "Sum_Improv";
pub const PRIMARY_ADDRESS: &str = "PrimaryAdd";
pub const PROPERTY_ADDRESS: &str = "PropertyAd";
pub const SHAPE_AREA: &str = "Shape_STAr";
pub const MUNICIPALITY: &str = "Municipali";
pub const GEOMETRY: &str = "geometry";
pub const VALUE_PER_AREA: &str = "VAL_PER_AREA";

/// Columns kept by the filter, in output order.
pub const COLUMNS: [&str; 7] = [
    LAND_VALUE,
    IMPROVEMENT_VALUE,
    PRIMARY_ADDRESS,
    PROPERTY_ADDRESS,
    SHAPE_AREA,
    MUNICIPALITY,
    GEOMETRY,
];

/// Columns of the filtered dataset, including the derived metric.
pub const FILTERED_COLUMNS: [&str; 8] = [
    LAND_VALUE,
    IMPROVEMENT_VALUE,
    PRIMARY_ADDRESS,
    PROPERTY_ADDRESS,
    SHAPE_AREA,
    MUNICIPALITY,
    GEOMETRY,
    VALUE_PER_AREA,
];

/// Flag value marking the primary address record of a parcel.
pub const PRIMARY_FLAG: &str = "Yes";

/// An untyped record as read from a source: every attribute plus an optional geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub properties: JsonObject,
    pub geometry: Option<Geometry<f64>>,
}

/// Everything the loader read from an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataset {
    /// CRS definition of the geometries (WKT or an authority code).
    pub crs: Option<String>,
    pub records: Vec<RawRecord>,
}

/// A land parcel with the attributes the valuation uses.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub land_value: f64,
    pub improvement_value: f64,
    pub primary_address: Option<String>,
    pub property_address: Option<String>,
    pub shape_area: f64,
    pub municipality: Option<String>,
    /// `None` for null shapes; they pass through the pipeline but are not drawn.
    pub geometry: Option<Geometry<f64>>,
}

impl Parcel {
    /// Project a raw record onto the typed columns.
    ///
    /// Null numeric attributes become NaN. `index` is only used in error messages.
    pub fn from_raw(index: usize, record: RawRecord) -> Result<Self> {
        let props = &record.properties;
        let geometry = polygonal(index, record.geometry)?;

        Ok(Self {
            land_value: number(props, LAND_VALUE, index)?,
            improvement_value: number(props, IMPROVEMENT_VALUE, index)?,
            primary_address: text(props, PRIMARY_ADDRESS, index)?,
            property_address: text(props, PROPERTY_ADDRESS, index)?,
            shape_area: number(props, SHAPE_AREA, index)?,
            municipality: text(props, MUNICIPALITY, index)?,
            geometry,
        })
    }

    pub fn is_primary_address(&self) -> bool {
        self.primary_address.as_deref() == Some(PRIMARY_FLAG)
    }

    pub fn in_municipality(&self, municipality: &str) -> bool {
        self.municipality.as_deref() == Some(municipality)
    }

    pub fn total_value(&self) -> f64 {
        self.land_value + self.improvement_value
    }

    /// Total assessed value divided by shape area.
    ///
    /// No guard: a zero area gives an infinity (or NaN for a zero total).
    pub fn value_per_area(&self) -> f64 {
        self.total_value() / self.shape_area
    }

    pub fn properties(&self) -> JsonObject {
        let mut props = JsonObject::new();
        props.insert(LAND_VALUE.to_string(), JsonValue::from(self.land_value));
        props.insert(IMPROVEMENT_VALUE.to_string(), JsonValue::from(self.improvement_value));
        props.insert(PRIMARY_ADDRESS.to_string(), JsonValue::from(self.primary_address.clone()));
        props.insert(PROPERTY_ADDRESS.to_string(), JsonValue::from(self.property_address.clone()));
        props.insert(SHAPE_AREA.to_string(), JsonValue::from(self.shape_area));
        props.insert(MUNICIPALITY.to_string(), JsonValue::from(self.municipality.clone()));
        props
    }
}

/// A parcel with its value-per-area metric attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuedParcel {
    pub parcel: Parcel,
    pub value_per_area: f64,
}

impl ValuedParcel {
    /// Read a record of the filtered dataset back, e.g. from the cache.
    pub fn from_raw(index: usize, record: RawRecord) -> Result<Self> {
        let value_per_area = number(&record.properties, VALUE_PER_AREA, index)?;
        let parcel = Parcel::from_raw(index, record)?;
        Ok(Self { parcel, value_per_area })
    }

    /// Properties including the metric. Non-finite numbers serialize as `null`.
    pub fn properties(&self) -> JsonObject {
        let mut props = self.parcel.properties();
        props.insert(VALUE_PER_AREA.to_string(), JsonValue::from(self.value_per_area));
        props
    }
}

fn lookup<'a>(props: &'a JsonObject, column: &'static str, record: usize) -> Result<&'a JsonValue> {
    props.get(column).ok_or(Error::MissingColumn { column, record })
}

fn number(props: &JsonObject, column: &'static str, record: usize) -> Result<f64> {
    match lookup(props, column, record)? {
        JsonValue::Null => Ok(f64::NAN),
        JsonValue::Number(n) => n.as_f64().ok_or(Error::InvalidColumn {
            column,
            record,
            expected: "number",
        }),
        _ => Err(Error::InvalidColumn { column, record, expected: "number" }),
    }
}

fn text(props: &JsonObject, column: &'static str, record: usize) -> Result<Option<String>> {
    match lookup(props, column, record)? {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s.clone())),
        _ => Err(Error::InvalidColumn { column, record, expected: "string" }),
    }
}

fn polygonal(record: usize, geometry: Option<Geometry<f64>>) -> Result<Option<Geometry<f64>>> {
    match geometry {
        Some(g @ (Geometry::Polygon(_) | Geometry::MultiPolygon(_))) => Ok(Some(g)),
        Some(other) => Err(Error::UnsupportedGeometry {
            record,
            reason: geometry_kind(&other).to_string(),
        }),
        None => Ok(None),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::{polygon, Point};

    pub(crate) fn square() -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: -89.40, y: 43.07),
            (x: -89.39, y: 43.07),
            (x: -89.39, y: 43.08),
            (x: -89.40, y: 43.08),
            (x: -89.40, y: 43.07),
        ])
    }

    pub(crate) fn raw(land: f64, improv: f64, area: f64, municipality: &str, primary: &str) -> RawRecord {
        let mut properties = JsonObject::new();
        properties.insert(LAND_VALUE.into(), land.into());
        properties.insert(IMPROVEMENT_VALUE.into(), improv.into());
        properties.insert(PRIMARY_ADDRESS.into(), primary.into());
        properties.insert(PROPERTY_ADDRESS.into(), "4817 SHEBOYGAN AVE".into());
        properties.insert(SHAPE_AREA.into(), area.into());
        properties.insert(MUNICIPALITY.into(), municipality.into());
        properties.insert("Extra".into(), "dropped".into());
        RawRecord { properties, geometry: Some(square()) }
    }

    #[test]
    fn test_from_raw_projects_columns() {
        let parcel = Parcel::from_raw(0, raw(100.0, 50.0, 10.0, "City of Madison", "Yes")).unwrap();
        assert_eq!(parcel.total_value(), 150.0);
        assert_eq!(parcel.value_per_area(), 15.0);
        assert!(parcel.is_primary_address());
        assert!(parcel.in_municipality("City of Madison"));
        assert!(!parcel.properties().contains_key("Extra"));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut record = raw(1.0, 1.0, 1.0, "City of Madison", "Yes");
        record.properties.remove(SHAPE_AREA);
        let err = Parcel::from_raw(7, record).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { column: SHAPE_AREA, record: 7 }));
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let mut record = raw(1.0, 1.0, 1.0, "City of Madison", "Yes");
        record.properties.insert(LAND_VALUE.into(), "lots".into());
        let err = Parcel::from_raw(0, record).unwrap_err();
        assert!(matches!(err, Error::InvalidColumn { column: LAND_VALUE, .. }));
    }

    #[test]
    fn test_null_values() {
        let mut record = raw(1.0, 1.0, 1.0, "City of Madison", "Yes");
        record.properties.insert(IMPROVEMENT_VALUE.into(), JsonValue::Null);
        record.properties.insert(PRIMARY_ADDRESS.into(), JsonValue::Null);
        let parcel = Parcel::from_raw(0, record).unwrap();
        assert!(parcel.improvement_value.is_nan());
        assert!(!parcel.is_primary_address());
    }

    #[test]
    fn test_zero_area_metric_is_not_finite() {
        let parcel = Parcel::from_raw(0, raw(200.0, 0.0, 0.0, "City of Madison", "Yes")).unwrap();
        assert!(parcel.value_per_area().is_infinite());

        let empty = Parcel::from_raw(0, raw(0.0, 0.0, 0.0, "City of Madison", "Yes")).unwrap();
        assert!(empty.value_per_area().is_nan());
    }

    #[test]
    fn test_non_polygon_geometry_is_rejected() {
        let mut record = raw(1.0, 1.0, 1.0, "City of Madison", "Yes");
        record.geometry = Some(Geometry::Point(Point::new(0.0, 0.0)));
        assert!(matches!(
            Parcel::from_raw(0, record).unwrap_err(),
            Error::UnsupportedGeometry { .. }
        ));
    }

    #[test]
    fn test_null_geometry_is_kept() {
        let mut record = raw(1.0, 1.0, 1.0, "Other", "Yes");
        record.geometry = None;
        let parcel = Parcel::from_raw(0, record).unwrap();
        assert!(parcel.geometry.is_none());
    }

    #[test]
    fn test_valued_parcel_requires_metric_column() {
        let err = ValuedParcel::from_raw(3, raw(1.0, 1.0, 1.0, "City of Madison", "Yes")).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { column: VALUE_PER_AREA, record: 3 }));
    }

    #[test]
    fn test_non_finite_metric_serializes_as_null() {
        let parcel = Parcel::from_raw(0, raw(200.0, 0.0, 0.0, "City of Madison", "Yes")).unwrap();
        let valued = ValuedParcel { value_per_area: parcel.value_per_area(), parcel };
        assert_eq!(valued.properties()[VALUE_PER_AREA], JsonValue::Null);
    }
}
