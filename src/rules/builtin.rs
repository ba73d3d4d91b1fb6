//! Rule catalogs compiled into the binary.

use crate::rules::loader::{load_from_str, CatalogError, CatalogReport};

pub const OPTIONAL: &str = include_str!("../../catalog/optional.toml");
pub const TIME: &str = include_str!("../../catalog/time.toml");
pub const REACTOR: &str = include_str!("../../catalog/reactor.toml");

/// `(catalog name, TOML source)` for every built-in catalog.
pub const CATALOGS: &[(&str, &str)] = &[
    ("optional", OPTIONAL),
    ("time", TIME),
    ("reactor", REACTOR),
];

pub fn load_builtin() -> Result<Vec<CatalogReport>, CatalogError> {
    CATALOGS
        .iter()
        .map(|(name, source)| {
            tracing::debug!(catalog = name, "loading built-in catalog");
            load_from_str(source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogs_load_cleanly() {
        let reports = load_builtin().unwrap();
        assert_eq!(reports.len(), CATALOGS.len());
        for report in &reports {
            assert!(
                report.is_clean(),
                "{}: {:?}",
                report.name,
                report.errors
            );
            assert!(!report.rules.is_empty());
        }
    }
}
