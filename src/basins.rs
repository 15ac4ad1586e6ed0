/// Basin registry for the Kelani rainfall pipeline.
///
/// Defines the drainage basins whose mean rainfall is written to the
/// Delft-FEWS CSV, together with the store identifiers that feed them.
/// This is the single source of truth for series identifiers — all other
/// modules should reference basins from here rather than hardcoding hashes.

// ---------------------------------------------------------------------------
// Basin metadata
// ---------------------------------------------------------------------------

/// Metadata for one drainage basin.
pub struct Basin {
    /// Short key used in logs and CLI output.
    pub key: &'static str,
    /// Full basin name.
    pub name: &'static str,
    /// Location name/id written into the CSV metadata rows.
    pub location: &'static str,
    /// Store identifier of the observed mean rainfall series, if the basin
    /// has ground-truth gauges feeding one.
    pub observed_id: Option<&'static str>,
    /// Store identifiers of the WRF mean rainfall series for the day0,
    /// day1 and day2 horizons, in that order.
    pub forecast_ids: [&'static str; 3],
}

impl Basin {
    pub fn has_observations(&self) -> bool {
        self.observed_id.is_some()
    }
}

/// Key of the basin written into the first data column.
pub const UPPER_BASIN: &str = "KUB";

/// Key of the basin written into the second data column.
pub const LOWER_BASIN: &str = "KLB";

/// All basins covered by the pipeline, in CSV column order.
pub static BASIN_REGISTRY: &[Basin] = &[
    Basin {
        key: UPPER_BASIN,
        name: "Kelani Upper Basin",
        location: "Awissawella",
        observed_id: Some("b0e008522be904bcf71e290b3b0096b33c3e24d9b623dcbe7e58e7d1cc82d0db"),
        forecast_ids: [
            "fb575cb25f1e3d3a07c84513ea6a91c8f2fb98454df1a432518ab98ad7182861", // wrf0, kub_mean, 0-d
            "9b18ffa16b251319ad1a931c4e1011b4ce42c874543def69b8a4af76d7b8f9fc", // wrf0, kub_mean, 1-d
            "e0e9cdc2aa4fef7178af08b987f4febc186d19397be744525fb6263815ca5fef", // wrf0, kub_mean, 2-d
        ],
    },
    Basin {
        key: LOWER_BASIN,
        name: "Kelani Lower Basin",
        location: "Colombo",
        observed_id: None, // no gauges reporting a basin mean yet
        forecast_ids: [
            "69c464f749b36d9e55e461947238e7ed809c2033e75ae56234f466eec00aee35", // wrf0, klb_mean, 0-d
            "35599583ae45d2c0ff93485b8a444da19fabdda8bf8fb539a6d77a0b0819da0a", // wrf0, klb_mean, 1-d
            "c48dbb9475ec31b3419bd3dd4206fdff3c53d4d156fa5681ccfa0768e4c39417", // wrf0, klb_mean, 2-d
        ],
    },
];

/// Looks up a basin by key. Returns `None` if not found.
pub fn find_basin(key: &str) -> Option<&'static Basin> {
    BASIN_REGISTRY.iter().find(|b| b.key == key)
}

/// Location names in CSV column order.
pub fn csv_locations() -> Vec<&'static str> {
    BASIN_REGISTRY.iter().map(|b| b.location).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn all_ids(basin: &Basin) -> Vec<&'static str> {
        let mut ids: Vec<_> = basin.forecast_ids.to_vec();
        ids.extend(basin.observed_id);
        ids
    }

    #[test]
    fn test_all_series_ids_are_sha256_hex() {
        // The store keys series by a SHA-256 of their metadata. A truncated
        // or mistyped hash silently returns zero rows.
        for basin in BASIN_REGISTRY {
            for id in all_ids(basin) {
                assert_eq!(id.len(), 64, "id for '{}' should be 64 chars, got '{}'", basin.name, id);
                assert!(
                    id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
                    "id for '{}' should be lowercase hex, got '{}'",
                    basin.name,
                    id
                );
            }
        }
    }

    #[test]
    fn test_no_duplicate_ids_within_a_basin() {
        for basin in BASIN_REGISTRY {
            let mut seen = std::collections::HashSet::new();
            for id in all_ids(basin) {
                assert!(seen.insert(id), "duplicate id '{}' in basin '{}'", id, basin.name);
            }
        }
    }

    #[test]
    fn test_upper_basin_has_observations_lower_does_not() {
        let upper = find_basin(UPPER_BASIN).expect("KUB should be in registry");
        let lower = find_basin(LOWER_BASIN).expect("KLB should be in registry");
        assert!(upper.has_observations());
        assert!(!lower.has_observations());
    }

    #[test]
    fn test_find_basin_returns_none_for_unknown_key() {
        assert!(find_basin("XYZ").is_none());
    }

    #[test]
    fn test_csv_locations_follow_registry_order() {
        assert_eq!(csv_locations(), vec!["Awissawella", "Colombo"]);
    }
}
