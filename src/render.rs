//! Exports the valued parcels as an extruded deck.gl map in a standalone HTML file.
//!
//! Elevation is the raw value per area. Colour comes from normalising the
//! metric into `t = (value - min) / (max - min)` and mapping `t` linearly to
//! RGB `(50 + 130t, 150 - 150t, 50 + 130t)`.
//!
//! With [`NumericPolicy::Preserve`] nothing is guarded: when every parcel has
//! the same metric the span is zero and every `t` is NaN, and an infinite
//! metric stretches the range to infinity. JSON has no NaN or infinity, so
//! such values reach the document as `null`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use geo::{Coord, Geometry, Polygon};
use geojson::{Feature, FeatureCollection, Geometry as GeoJsonGeometry, JsonObject};
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use crate::config::NumericPolicy;
use crate::error::Result;
use crate::parcel::{ValuedParcel, PROPERTY_ADDRESS, VALUE_PER_AREA};

const DECK_SPEC_PLACEHOLDER: &str = "__DECK_SPEC__";

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="UTF-8" />
    <title>Parcel value per area</title>
    <script src="https://unpkg.com/deck.gl@~8.9.*/dist.min.js"></script>
    <script src="https://unpkg.com/@deck.gl/json@~8.9.*/dist.min.js"></script>
    <style>
      body { margin: 0; padding: 0; overflow: hidden; }
      #deck-container { width: 100vw; height: 100vh; position: relative; }
    </style>
  </head>
  <body>
    <div id="deck-container"></div>
    <script>
      const spec = __DECK_SPEC__;
      const converter = new deck.JSONConverter({ configuration: { classes: deck } });
      new deck.DeckGL({
        container: 'deck-container',
        controller: true,
        ...converter.convert(spec),
      });
    </script>
  </body>
</html>
"#;

/// Smallest and largest metric over a set of parcels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    /// NaN metrics never take part. Infinite metrics do unless the policy is `Guard`.
    pub fn of<'a>(values: impl IntoIterator<Item = &'a f64>, policy: NumericPolicy) -> Self {
        values
            .into_iter()
            .filter(|v| policy == NumericPolicy::Preserve || v.is_finite())
            .fold(
                MetricRange { min: f64::INFINITY, max: f64::NEG_INFINITY },
                |range, &v| MetricRange {
                    min: range.min.min(v),
                    max: range.max.max(v),
                },
            )
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Position of `value` in the range.
    pub fn normalize(&self, value: f64, policy: NumericPolicy) -> f64 {
        let t = (value - self.min) / self.span();
        match policy {
            NumericPolicy::Preserve => t,
            NumericPolicy::Guard if t.is_nan() => 0.0,
            NumericPolicy::Guard => t.clamp(0.0, 1.0),
        }
    }
}

/// RGB colour for a normalised metric.
pub fn color_for(t: f64) -> [f64; 3] {
    [50.0 + 130.0 * t, 150.0 - 150.0 * t, 50.0 + 130.0 * t]
}

/// Visual encoding of one parcel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParcelStyle {
    pub elevation: f64,
    pub color: [f64; 3],
}

/// Compute the metric range and a style per parcel.
pub fn styles(parcels: &[ValuedParcel], policy: NumericPolicy) -> (MetricRange, Vec<ParcelStyle>) {
    let range = MetricRange::of(parcels.iter().map(|p| &p.value_per_area), policy);
    if range.span() == 0.0 {
        warn!("All parcels share value per area {}, colour scale has zero span", range.min);
    }

    let styles = parcels
        .iter()
        .map(|p| {
            let elevation = match policy {
                NumericPolicy::Guard if !p.value_per_area.is_finite() => 0.0,
                _ => p.value_per_area,
            };
            ParcelStyle {
                elevation,
                color: color_for(range.normalize(p.value_per_area, policy)),
            }
        })
        .collect();

    (range, styles)
}

/// Every exterior and interior ring coordinate of the given (multi-)polygons.
pub fn points_from_polygons<'a>(geometries: impl IntoIterator<Item = &'a Geometry<f64>>) -> Vec<Coord<f64>> {
    fn push_rings(polygon: &Polygon<f64>, points: &mut Vec<Coord<f64>>) {
        points.extend(polygon.exterior().coords().copied());
        for interior in polygon.interiors() {
            points.extend(interior.coords().copied());
        }
    }

    let mut points = Vec::new();
    for geometry in geometries {
        match geometry {
            Geometry::Polygon(polygon) => push_rings(polygon, &mut points),
            Geometry::MultiPolygon(multi) => {
                for polygon in multi {
                    push_rings(polygon, &mut points);
                }
            }
            _ => {}
        }
    }
    points
}

/// Mean of all ring coordinates, used to centre the initial view.
pub fn view_center(parcels: &[ValuedParcel]) -> Option<Coord<f64>> {
    let points = points_from_polygons(parcels.iter().filter_map(|p| p.parcel.geometry.as_ref()));
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let sum = points.iter().fold(Coord { x: 0.0, y: 0.0 }, |acc, c| Coord {
        x: acc.x + c.x,
        y: acc.y + c.y,
    });
    Some(Coord { x: sum.x / n, y: sum.y / n })
}

/// The deck.gl JSON description of the map.
pub fn deck_spec(parcels: &[ValuedParcel], styles: &[ParcelStyle]) -> JsonValue {
    let features: Vec<Feature> = parcels
        .iter()
        .zip(styles)
        .filter_map(|(valued, style)| valued.parcel.geometry.as_ref().map(|g| (valued, g, style)))
        .map(|(valued, geometry, style)| {
            let mut properties = JsonObject::new();
            properties.insert(VALUE_PER_AREA.to_string(), JsonValue::from(valued.value_per_area));
            properties.insert(
                PROPERTY_ADDRESS.to_string(),
                JsonValue::from(valued.parcel.property_address.clone()),
            );
            properties.insert("elevation".to_string(), JsonValue::from(style.elevation));
            properties.insert("color".to_string(), json!(style.color));
            Feature {
                bbox: None,
                geometry: Some(GeoJsonGeometry::new(geojson::Value::from(geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let data = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let center = view_center(parcels).unwrap_or(Coord { x: 0.0, y: 0.0 });

    json!({
        "initialViewState": {
            "longitude": center.x,
            "latitude": center.y,
            "zoom": 11,
            "pitch": 45,
            "bearing": 0,
        },
        "layers": [{
            "@@type": "GeoJsonLayer",
            "id": "parcels",
            "data": data,
            "opacity": 1,
            "stroked": true,
            "filled": true,
            "extruded": true,
            "wireframe": true,
            "pickable": true,
            "getElevation": "@@=properties.elevation",
            "getFillColor": "@@=properties.color",
            "getLineColor": "@@=properties.color",
        }],
    })
}

/// Substitute the deck spec into the page, escaping `</` so the data cannot close the script tag.
pub fn html_document(spec: &JsonValue) -> Result<String> {
    let spec = serde_json::to_string(spec)?.replace("</", "<\\/");
    Ok(HTML_TEMPLATE.replace(DECK_SPEC_PLACEHOLDER, &spec))
}

/// Style the parcels and write the standalone map to `output_path`.
pub fn render_html(parcels: &[ValuedParcel], output_path: &Path, policy: NumericPolicy) -> Result<()> {
    info!("Plotting {} parcels", parcels.len());
    let (range, styles) = styles(parcels, policy);
    info!("Value per area ranges from {} to {}", range.min, range.max);

    let document = html_document(&deck_spec(parcels, &styles))?;

    if let Some(dir) = output_path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let mut writer = BufWriter::new(File::create(output_path)?);
    writer.write_all(document.as_bytes())?;
    writer.flush()?;

    info!("Map written to {}", output_path.display());
    Ok(())
}
