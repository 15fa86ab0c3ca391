use geo::Geometry;
use proj::{Proj, Transform};
use tracing::debug;

use crate::error::{Error, Result};

/// Moves geometries from the source CRS into the target CRS.
pub trait Reproject {
    fn reproject(&self, geometry: &mut Geometry<f64>) -> Result<()>;
}

/// Used when source and target CRS are the same definition.
pub struct Identity;

impl Reproject for Identity {
    fn reproject(&self, _geometry: &mut Geometry<f64>) -> Result<()> {
        Ok(())
    }
}

/// PROJ-backed transformation between two CRS definitions.
pub struct ProjReprojector {
    proj: Proj,
}

impl ProjReprojector {
    /// `source_crs` may be an authority code or the WKT from a `.prj` file.
    pub fn new(source_crs: &str, target_crs: &str) -> Result<Self> {
        let proj = Proj::new_known_crs(source_crs, target_crs, None)?;
        Ok(Self { proj })
    }
}

impl Reproject for ProjReprojector {
    fn reproject(&self, geometry: &mut Geometry<f64>) -> Result<()> {
        geometry.transform(&self.proj)?;
        Ok(())
    }
}

/// Pick a reprojector for a dataset whose CRS is `source_crs`.
///
/// Data without a CRS cannot be placed on the map and is rejected.
pub fn reprojector_for(source_crs: Option<&str>, target_crs: &str) -> Result<Box<dyn Reproject>> {
    let source = source_crs.map(str::trim).filter(|s| !s.is_empty()).ok_or(Error::MissingCrs)?;

    if source.eq_ignore_ascii_case(target_crs) {
        debug!("Source CRS already {}, skipping reprojection", target_crs);
        return Ok(Box::new(Identity));
    }

    debug!("Reprojecting from {} to {}", source, target_crs);
    Ok(Box::new(ProjReprojector::new(source, target_crs)?))
}
