use tracing::info;

pub mod acquire;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod parcel;
pub mod render;
pub mod reproject;

pub use config::{NumericPolicy, PipelineConfig};
pub use error::{Error, Result};
pub use parcel::{Parcel, ValuedParcel};

use acquire::{Downloader, HttpDownloader};
use cache::{load_or_compute, ArchiveSource};
use filter::FilterOptions;

/// Filtered parcels, from the cache when present, otherwise from the source archive.
pub fn get_data(config: &PipelineConfig, downloader: &dyn Downloader) -> Result<Vec<ValuedParcel>> {
    let mut source = ArchiveSource {
        downloader,
        url: config.source_url.clone(),
        archive_path: config.archive_path(),
    };
    let options = FilterOptions {
        municipality: config.municipality.clone(),
        numeric_policy: config.numeric_policy,
    };
    load_or_compute(&config.cache_path(), &mut source, &options, &config.target_crs)
}

/// Cache check, pipeline or cache read, then render the map.
pub fn run(config: &PipelineConfig) -> Result<()> {
    let downloader = HttpDownloader::new()?;
    let parcels = get_data(config, &downloader)?;
    info!("{} parcels ready", parcels.len());
    render::render_html(&parcels, &config.output_path, config.numeric_policy)
}

/// Parcels whose property address contains `needle` literally.
pub fn parcels_with_address<'a>(parcels: &'a [ValuedParcel], needle: &str) -> Vec<&'a ValuedParcel> {
    parcels
        .iter()
        .filter(|p| {
            p.parcel
                .property_address
                .as_deref()
                .is_some_and(|address| address.contains(needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcel::tests::raw;

    #[test]
    fn test_address_substring_match() {
        let mut with_address = Parcel::from_raw(0, raw(1.0, 1.0, 1.0, "City of Madison", "Yes")).unwrap();
        with_address.property_address = Some("4817 SHEBOYGAN AVE UNIT 2".to_string());
        let mut without = with_address.clone();
        without.property_address = None;
        let mut other = with_address.clone();
        other.property_address = Some("1 MAIN ST".to_string());

        let parcels: Vec<ValuedParcel> = [with_address, without, other]
            .into_iter()
            .map(|parcel| ValuedParcel { parcel, value_per_area: 1.0 })
            .collect();

        let found = parcels_with_address(&parcels, "4817 SHEBOYGAN AVE");
        assert_eq!(found.len(), 1);
        assert!(parcels_with_address(&parcels, "sheboygan").is_empty());
    }
}
