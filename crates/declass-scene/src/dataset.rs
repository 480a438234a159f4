//! The fixed set of declassified imagery datasets

use crate::SceneError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the catalog partitions being synchronized
///
/// Variant order matches the catalog names' lexical order, so sorting by
/// `Dataset` and sorting by [`Dataset::catalog_name`] agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dataset {
    /// Declass I: CORONA, ARGON, LANYARD (KH-1 to KH-6), 1960-1972
    #[serde(rename = "corona2")]
    DeclassI,
    /// Declass II: KH-7 GAMBIT and KH-9 mapping camera, 1963-1980
    #[serde(rename = "declassii")]
    DeclassII,
    /// Declass III: KH-9 HEXAGON, 1971-1984
    #[serde(rename = "declassiii")]
    DeclassIII,
}

impl Dataset {
    /// Every dataset, in sort order
    pub const ALL: [Dataset; 3] = [Dataset::DeclassI, Dataset::DeclassII, Dataset::DeclassIII];

    /// Dataset name as the catalog API spells it
    #[inline]
    #[must_use]
    pub const fn catalog_name(self) -> &'static str {
        match self {
            Dataset::DeclassI => "corona2",
            Dataset::DeclassII => "declassii",
            Dataset::DeclassIII => "declassiii",
        }
    }

    /// Human-readable label for exported artifacts
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Dataset::DeclassI => "Declass I — CORONA/ARGON/LANYARD",
            Dataset::DeclassII => "Declass II — GAMBIT/HEXAGON",
            Dataset::DeclassIII => "Declass III — HEXAGON",
        }
    }

    /// Catalog-internal dataset id, used in EarthExplorer metadata URLs
    #[must_use]
    pub const fn catalog_id(self) -> &'static str {
        match self {
            Dataset::DeclassI => "5e839febdccb64b3",
            Dataset::DeclassII => "5e839ff7d71d4811",
            Dataset::DeclassIII => "5e7c41f3ffaaf662",
        }
    }

    /// Id of the "Download Available" metadata field for this dataset
    #[must_use]
    pub const fn download_filter_id(self) -> &'static str {
        match self {
            Dataset::DeclassI => "5e839feb64cee663",
            Dataset::DeclassII => "5e839ff8ba6eead0",
            Dataset::DeclassIII => "5e7c41f38f5a8fa1",
        }
    }

    /// EarthExplorer full-metadata page for a scene of this dataset
    #[must_use]
    pub fn metadata_url(self, display_id: &str) -> String {
        format!(
            "https://earthexplorer.usgs.gov/scene/metadata/full/{}/{}/",
            self.catalog_id(),
            display_id
        )
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.catalog_name())
    }
}

impl FromStr for Dataset {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Dataset::ALL
            .into_iter()
            .find(|d| d.catalog_name() == needle)
            .ok_or_else(|| SceneError::UnknownDataset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_catalog_names() {
        assert_eq!("corona2".parse::<Dataset>().unwrap(), Dataset::DeclassI);
        assert_eq!(" DECLASSII ".parse::<Dataset>().unwrap(), Dataset::DeclassII);
        assert_eq!("declassiii".parse::<Dataset>().unwrap(), Dataset::DeclassIII);
    }

    #[test]
    fn parse_unknown_dataset() {
        let err = "landsat".parse::<Dataset>().unwrap_err();
        assert_eq!(err.to_string(), "unknown dataset: 'landsat'");
    }

    #[test]
    fn ordering_matches_catalog_names() {
        let mut by_name: Vec<_> = Dataset::ALL.to_vec();
        by_name.sort_by_key(|d| d.catalog_name());
        assert_eq!(by_name, Dataset::ALL.to_vec());
    }

    #[test]
    fn serde_uses_catalog_name() {
        let json = serde_json::to_string(&Dataset::DeclassIII).unwrap();
        assert_eq!(json, "\"declassiii\"");
    }

    #[test]
    fn metadata_url_embeds_catalog_id() {
        let url = Dataset::DeclassII.metadata_url("DZB00401200038H025001");
        assert_eq!(
            url,
            "https://earthexplorer.usgs.gov/scene/metadata/full/5e839ff7d71d4811/DZB00401200038H025001/"
        );
    }
}
