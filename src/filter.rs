//! Narrows the raw dataset down to the valued parcels of one municipality.
//!
//! The stages run in a fixed order:
//!
//! 1. project each record onto [`crate::parcel::COLUMNS`]
//! 2. keep the target municipality
//! 3. reproject geometries into the target CRS
//! 4. compute value-per-area
//! 5. keep primary address records
//!
//! Stage 4 runs before stage 5, so the metric is also computed for records
//! that are dropped afterwards. Under [`NumericPolicy::Guard`] a zero-area
//! record fails the run even when it is not a primary address.

use tracing::{debug, info, warn};

use crate::config::NumericPolicy;
use crate::error::{Error, Result};
use crate::parcel::{Parcel, RawDataset, ValuedParcel};
use crate::reproject::Reproject;

/// Settings for [`filter_parcels`].
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub municipality: String,
    pub numeric_policy: NumericPolicy,
}

/// Record counts after each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub input: usize,
    pub in_municipality: usize,
    pub metrics_computed: usize,
    pub non_finite_metrics: usize,
    pub output: usize,
}

/// Run the filter/transform stages over a loaded dataset.
pub fn filter_parcels(
    dataset: RawDataset,
    options: &FilterOptions,
    reprojector: &dyn Reproject,
) -> Result<(Vec<ValuedParcel>, FilterReport)> {
    let mut report = FilterReport {
        input: dataset.records.len(),
        ..FilterReport::default()
    };

    let parcels = dataset
        .records
        .into_iter()
        .enumerate()
        .map(|(index, record)| Parcel::from_raw(index, record).map(|p| (index, p)))
        .collect::<Result<Vec<_>>>()?;

    let mut parcels: Vec<(usize, Parcel)> = parcels
        .into_iter()
        .filter(|(_, p)| p.in_municipality(&options.municipality))
        .collect();
    report.in_municipality = parcels.len();
    debug!("{} of {} records in {}", report.in_municipality, report.input, options.municipality);

    for geometry in parcels.iter_mut().filter_map(|(_, p)| p.geometry.as_mut()) {
        reprojector.reproject(geometry)?;
    }

    let valued = parcels
        .into_iter()
        .map(|(index, parcel)| {
            let value_per_area = value_per_area(index, &parcel, options.numeric_policy)?;
            Ok(ValuedParcel { parcel, value_per_area })
        })
        .collect::<Result<Vec<_>>>()?;
    report.metrics_computed = valued.len();
    report.non_finite_metrics = valued.iter().filter(|v| !v.value_per_area.is_finite()).count();
    if report.non_finite_metrics > 0 {
        warn!("{} parcels have a non-finite value per area", report.non_finite_metrics);
    }

    let output: Vec<ValuedParcel> = valued
        .into_iter()
        .filter(|v| v.parcel.is_primary_address())
        .collect();
    report.output = output.len();

    info!(
        "Filtered {} records down to {} primary address parcels",
        report.input, report.output
    );
    Ok((output, report))
}

/// The metric for one parcel under `policy`.
pub fn value_per_area(index: usize, parcel: &Parcel, policy: NumericPolicy) -> Result<f64> {
    if policy == NumericPolicy::Guard && parcel.shape_area == 0.0 {
        return Err(Error::ZeroArea { record: index });
    }
    Ok(parcel.value_per_area())
}
