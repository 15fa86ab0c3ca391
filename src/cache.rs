//! Whole-dataset GeoJSON cache of the filtered parcels.
//!
//! The cache is keyed on file existence only: there is no fingerprint of the
//! source archive, no version and no expiry. Delete the file to force a
//! refresh. A hit is still checked against the filter options: a cache holding
//! another municipality is recomputed, and under [`NumericPolicy::Guard`] a
//! cached zero-area parcel fails the run as it would on a miss. Writes go straight to the final path, so two runs racing on an
//! empty cache both do the full pipeline and the last writer wins; a reader
//! that overlaps a write can see a truncated file.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use geo::Geometry;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry as GeoJsonGeometry};
use tracing::{debug, info, warn};

use crate::acquire::{ensure_archive, Downloader};
use crate::config::NumericPolicy;
use crate::error::Result;
use crate::filter::{filter_parcels, value_per_area, FilterOptions};
use crate::loader::read_archive;
use crate::parcel::{RawDataset, RawRecord, ValuedParcel};
use crate::reproject::reprojector_for;

/// Where raw parcels come from on a cache miss.
pub trait ParcelSource {
    fn load(&mut self) -> Result<RawDataset>;
}

/// Downloads the archive if needed, then parses it.
pub struct ArchiveSource<'a> {
    pub downloader: &'a dyn Downloader,
    pub url: String,
    pub archive_path: PathBuf,
}

impl ParcelSource for ArchiveSource<'_> {
    fn load(&mut self) -> Result<RawDataset> {
        ensure_archive(self.downloader, &self.url, &self.archive_path)?;
        read_archive(&self.archive_path)
    }
}

/// Return the cached parcels if the cache file exists and matches `options`,
/// otherwise load, filter and cache them.
pub fn load_or_compute(
    cache_path: &Path,
    source: &mut dyn ParcelSource,
    options: &FilterOptions,
    target_crs: &str,
) -> Result<Vec<ValuedParcel>> {
    if cache_path.is_file() {
        info!("Reading cached data from {}", cache_path.display());
        let cached = read_cache(cache_path)?;
        match cached.iter().find(|v| !v.parcel.in_municipality(&options.municipality)) {
            Some(stale) => warn!(
                "Cache holds parcels from {:?}, not {}; recomputing",
                stale.parcel.municipality.as_deref().unwrap_or_default(),
                options.municipality
            ),
            None => {
                check_policy(&cached, options.numeric_policy)?;
                return Ok(cached);
            }
        }
    } else {
        debug!("No cache at {}", cache_path.display());
    }


    let dataset = source.load()?;
    let reprojector = reprojector_for(dataset.crs.as_deref(), target_crs)?;
    let (parcels, _) = filter_parcels(dataset, options, reprojector.as_ref())?;

    write_cache(cache_path, &parcels)?;
    Ok(parcels)
}

/// Apply the metric guard to parcels that skipped the filter stage.
fn check_policy(parcels: &[ValuedParcel], policy: NumericPolicy) -> Result<()> {
    for (index, valued) in parcels.iter().enumerate() {
        value_per_area(index, &valued.parcel, policy)?;
    }
    Ok(())
}

/// Serialize the filtered parcels as a GeoJSON feature collection.
pub fn write_cache(cache_path: &Path, parcels: &[ValuedParcel]) -> Result<()> {
    info!("Caching {} parcels to {}", parcels.len(), cache_path.display());
    if let Some(dir) = cache_path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let features: Vec<Feature> = parcels
        .iter()
        .map(|valued| Feature {
            bbox: None,
            geometry: valued
                .parcel
                .geometry
                .as_ref()
                .map(|g| GeoJsonGeometry::new(geojson::Value::from(g))),
            id: None,
            properties: Some(valued.properties()),
            foreign_members: None,
        })
        .collect();

    let feature_collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let mut writer = BufWriter::new(File::create(cache_path)?);
    serde_json::to_writer(&mut writer, &feature_collection)?;
    writer.flush()?;
    Ok(())
}

/// Read a cache file written by [`write_cache`].
///
/// `null` numbers (non-finite values at write time) come back as NaN.
pub fn read_cache(cache_path: &Path) -> Result<Vec<ValuedParcel>> {
    let reader = BufReader::new(File::open(cache_path)?);
    let geojson = GeoJson::from_reader(reader)?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => Vec::new(),
    };
    debug!("Found {} features in cache", features.len());

    features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let geometry = feature.geometry.map(Geometry::<f64>::try_from).transpose()?;
            let record = RawRecord {
                properties: feature.properties.unwrap_or_default(),
                geometry,
            };
            ValuedParcel::from_raw(index, record)
        })
        .collect()
}
