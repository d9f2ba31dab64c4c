//! Dataset descriptors.

use serde::Serialize;

/// A dataset to load: tileset URL plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetConfig {
    pub url: String,
    pub name: String,
}

impl DatasetConfig {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}

/// The scan-audit point clouds shipped with the viewer: `(name, url)`.
pub const SCAN_AUDIT_DATASETS: &[(&str, &str)] = &[
    (
        "Castle",
        "https://scanaudit.s3.amazonaws.com/pointclouds/PY3Dtiles-EPSG4978-rgbTRUE/tileset.json",
    ),
    (
        "Barn",
        "https://scanaudit.s3.amazonaws.com/pointclouds/Istallo-3dtiles/tileset.json",
    ),
    (
        "Guesthouse",
        "https://scanaudit.s3.amazonaws.com/pointclouds/Vendeghaz-3dtiles/tileset.json",
    ),
];

/// [`SCAN_AUDIT_DATASETS`] as owned configs.
pub fn scan_audit_datasets() -> Vec<DatasetConfig> {
    SCAN_AUDIT_DATASETS
        .iter()
        .map(|(name, url)| DatasetConfig::new(*url, *name))
        .collect()
}

/// Stable dataset id derived from a display name.
///
/// Lowercases the name and replaces each run of whitespace with one hyphen:
/// `"Old Town  Hall"` becomes `"old-town-hall"`.
pub fn slugify(display_name: &str) -> String {
    let mut id = String::with_capacity(display_name.len());
    let mut in_whitespace = false;
    for c in display_name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                id.push('-');
            }
            in_whitespace = true;
        } else {
            id.extend(c.to_lowercase());
            in_whitespace = false;
        }
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Castle"), "castle");
        assert_eq!(slugify("Old Town  Hall"), "old-town-hall");
        assert_eq!(slugify("Barn\tNorth"), "barn-north");
    }

    #[test]
    fn test_scan_audit_datasets() {
        let datasets = scan_audit_datasets();
        let names: Vec<_> = datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["Castle", "Barn", "Guesthouse"]);
        assert!(datasets.iter().all(|d| d.url.ends_with("tileset.json")));
    }
}
