use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_ARCHIVE_NAME: &str = "Parcels.zip";
pub const DEFAULT_CACHE_NAME: &str = "cachedata.geojson";
pub const DEFAULT_SOURCE_URL: &str = "https://dciimages.danecounty.gov/Parcels/Parcels.zip";
pub const DEFAULT_OUTPUT_PATH: &str = "./3dmap.html";
pub const DEFAULT_MUNICIPALITY: &str = "City of Madison";
pub const TARGET_CRS: &str = "EPSG:4326";

/// How division by zero in the metric and colour normalisation is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericPolicy {
    /// Let zero areas and zero spreads produce infinities and NaNs.
    #[default]
    Preserve,
    /// Reject zero areas, ignore non-finite metrics in the range and clamp the colour scale.
    Guard,
}

/// Locations and constants the pipeline runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub archive_name: String,
    pub cache_name: String,
    pub source_url: String,
    pub output_path: PathBuf,
    pub municipality: String,
    pub target_crs: String,
    pub numeric_policy: NumericPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            municipality: DEFAULT_MUNICIPALITY.to_string(),
            target_crs: TARGET_CRS.to_string(),
            numeric_policy: NumericPolicy::Preserve,
        }
    }
}

impl PipelineConfig {
    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(&self.archive_name)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.cache_name)
    }
}
