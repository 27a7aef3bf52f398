//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// A coordinate reference system, known by any of an EPSG code, a WKT
/// definition or a PROJ string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    wkt: Option<String>,
    epsg: Option<u32>,
    proj: Option<String>,
}

impl CRS {
    const UNKNOWN: CRS = CRS {
        wkt: None,
        epsg: None,
        proj: None,
    };

    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            ..Self::UNKNOWN
        }
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            ..Self::UNKNOWN
        }
    }

    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            proj: Some(proj.into()),
            ..Self::UNKNOWN
        }
    }

    /// EPSG:4326, the GeoJSON default
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Parse an authority name as found in GeoJSON `crs` members and on the
    /// command line.
    ///
    /// Accepts `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`, `urn:ogc:def:crs:EPSG:6.6:4326`
    /// and `urn:ogc:def:crs:OGC:1.3:CRS84` (mapped to EPSG:4326).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84")
            || name.eq_ignore_ascii_case("CRS84")
        {
            return Some(Self::wgs84());
        }
        let upper = name.to_ascii_uppercase();
        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            upper.rsplit(':').next()?
        } else {
            return None;
        };
        code.parse().ok().map(Self::from_epsg)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// PROJ definition, either given explicitly or looked up from the EPSG code
    pub fn proj4(&self) -> Option<&str> {
        if let Some(proj) = self.proj.as_deref() {
            return Some(proj);
        }
        let code = u16::try_from(self.epsg?).ok()?;
        crs_definitions::from_code(code).map(|def| def.proj4)
    }

    /// Whether coordinates are longitude/latitude in degrees
    pub fn is_geographic(&self) -> bool {
        self.proj4()
            .map(|p| p.contains("+proj=longlat") || p.contains("+proj=latlong"))
            .unwrap_or(false)
    }

    /// Same EPSG code, else same WKT, else same PROJ string
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }
        false
    }

    /// Short key used in logs and caches
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let end = wkt.char_indices().nth(50).map(|(i, _)| i).unwrap_or(wkt.len());
            return format!("WKT:{}", &wkt[..end]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_crs_from_geojson_names() {
        assert_eq!(CRS::from_name("EPSG:32633"), Some(CRS::from_epsg(32633)));
        assert_eq!(
            CRS::from_name("urn:ogc:def:crs:EPSG::3857"),
            Some(CRS::from_epsg(3857))
        );
        assert_eq!(
            CRS::from_name("urn:ogc:def:crs:OGC:1.3:CRS84"),
            Some(CRS::wgs84())
        );
        assert_eq!(CRS::from_name("not a crs"), None);
    }

    #[test]
    fn test_projected_crs_is_not_geographic() {
        let utm = CRS::from_epsg(32633);
        assert!(utm.proj4().is_some());
        assert!(!utm.is_geographic());
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_epsg(4326).is_equivalent(&CRS::from_epsg(3857)));
    }
}
