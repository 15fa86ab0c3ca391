//! Reads the zipped parcel shapefile into raw records.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use geo::Geometry;
use geojson::JsonObject;
use serde_json::Value as JsonValue;
use shapefile::dbase::FieldValue;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::parcel::{RawDataset, RawRecord};

/// Load every record of the first shapefile found in the zip archive at `path`.
pub fn read_archive(path: &Path) -> Result<RawDataset> {
    info!("Loading file: {}", path.display());
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let shp_name = member_with_extension(&archive, "shp").ok_or(Error::MissingArchiveMember(".shp"))?;
    let stem = &shp_name[..shp_name.len() - ".shp".len()];
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let sibling = |ext: &str| {
        names
            .iter()
            .find(|n| n.len() == stem.len() + ext.len() + 1 && n.starts_with(stem) && has_extension(n, ext))
            .cloned()
    };

    let dbf_name = sibling("dbf").ok_or(Error::MissingArchiveMember(".dbf"))?;
    let prj_name = sibling("prj");

    debug!("Reading {} and {}", shp_name, dbf_name);
    let shp = read_member(&mut archive, &shp_name)?;
    let dbf = read_member(&mut archive, &dbf_name)?;
    let crs = match prj_name {
        Some(name) => Some(String::from_utf8_lossy(&read_member(&mut archive, &name)?).trim().to_string()),
        None => None,
    };

    let records = read_shapefile(Cursor::new(shp), Cursor::new(dbf))?;
    info!("Loaded {} records from {}", records.len(), path.display());

    Ok(RawDataset { crs, records })
}

/// Parse a shapefile from its `.shp` and `.dbf` streams.
pub fn read_shapefile<T, D>(shp: T, dbf: D) -> Result<Vec<RawRecord>>
where
    T: Read + Seek,
    D: Read + Seek,
{
    let shape_reader = shapefile::ShapeReader::new(shp)?;
    let dbase_reader = shapefile::dbase::Reader::new(dbf).map_err(shapefile::Error::from)?;
    let mut reader = shapefile::Reader::new(shape_reader, dbase_reader);

    let mut records = Vec::new();
    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item?;
        if (index + 1) % 10_000 == 0 {
            debug!("Processing record {}", index + 1);
        }

        let geometry = match shape {
            shapefile::Shape::NullShape => None,
            shape => Some(Geometry::<f64>::try_from(shape).map_err(|e| Error::UnsupportedGeometry {
                record: index,
                reason: e.to_string(),
            })?),
        };

        let fields: HashMap<String, FieldValue> = record.into();
        let properties: JsonObject = fields
            .into_iter()
            .map(|(name, value)| (name, field_to_json(value)))
            .collect();

        records.push(RawRecord { properties, geometry });
    }

    Ok(records)
}

/// dBase values mapped onto JSON; empty fields become `null`.
pub fn field_to_json(value: FieldValue) -> JsonValue {
    match value {
        FieldValue::Character(s) => s.map(JsonValue::from).unwrap_or(JsonValue::Null),
        FieldValue::Numeric(n) => n.map(JsonValue::from).unwrap_or(JsonValue::Null),
        FieldValue::Float(f) => f.map(|f| JsonValue::from(f as f64)).unwrap_or(JsonValue::Null),
        FieldValue::Double(d) => JsonValue::from(d),
        FieldValue::Currency(c) => JsonValue::from(c),
        FieldValue::Integer(i) => JsonValue::from(i),
        FieldValue::Logical(b) => b.map(JsonValue::from).unwrap_or(JsonValue::Null),
        FieldValue::Memo(s) => JsonValue::from(s),
        other => JsonValue::from(format!("{:?}", other)),
    }
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn member_with_extension<R: Read + Seek>(archive: &ZipArchive<R>, ext: &str) -> Option<String> {
    let mut names: Vec<&str> = archive.file_names().filter(|n| has_extension(n, ext)).collect();
    names.sort_unstable();
    names.first().map(|n| n.to_string())
}

fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive.by_name(name)?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}
