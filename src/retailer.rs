// ============================================================================
// File: src/retailer.rs
// Known retailers and retailer-scope resolution
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::filter::RetailerScope;

/// A storefront the aggregator can search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retailer {
    /// Short lowercase identifier used in retailer scopes (e.g. "amazon")
    pub id: String,

    /// Display name attached to every offer from this retailer
    pub label: String,

    /// Domain every offer URL must belong to (e.g. "amazon.com")
    pub domain: String,
}

impl Retailer {
    pub fn new(id: impl Into<String>, label: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            domain: domain.into(),
        }
    }
}

pub fn default_retailers() -> Vec<Retailer> {
    vec![
        Retailer::new("amazon", "Amazon", "amazon.com"),
        Retailer::new("newegg", "Newegg", "newegg.com"),
    ]
}

#[derive(Debug, Clone)]
pub struct RetailerCatalog {
    retailers: Vec<Retailer>,
}

impl Default for RetailerCatalog {
    fn default() -> Self {
        Self::new(default_retailers())
    }
}

impl RetailerCatalog {
    pub fn new(retailers: Vec<Retailer>) -> Self {
        Self { retailers }
    }

    pub fn retailers(&self) -> &[Retailer] {
        &self.retailers
    }

    pub fn get(&self, id: &str) -> Option<&Retailer> {
        self.retailers
            .iter()
            .find(|r| r.id.eq_ignore_ascii_case(id))
    }

    /// Retailers covered by `scope`, in catalog order.
    pub fn resolve(&self, scope: &RetailerScope) -> Result<Vec<&Retailer>, ScanError> {
        if self.retailers.is_empty() {
            return Err(ScanError::NoRetailers);
        }

        match scope {
            RetailerScope::All => Ok(self.retailers.iter().collect()),
            RetailerScope::Only(id) => self
                .get(id)
                .map(|r| vec![r])
                .ok_or_else(|| ScanError::UnknownRetailer(id.clone())),
        }
    }

    /// Progress line shown while a scan runs, e.g. "Scanning Amazon & Newegg...".
    pub fn scanning_banner(&self, scope: &RetailerScope) -> String {
        let labels: Vec<&str> = match self.resolve(scope) {
            Ok(retailers) => retailers.iter().map(|r| r.label.as_str()).collect(),
            Err(_) => Vec::new(),
        };

        match labels.as_slice() {
            [] => "Scanning...".to_string(),
            [only] => format!("Scanning {}...", only),
            [init @ .., last] => format!("Scanning {} & {}...", init.join(", "), last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_scope_resolves_every_retailer() {
        let catalog = RetailerCatalog::default();
        let resolved = catalog.resolve(&RetailerScope::All).unwrap();
        let ids: Vec<&str> = resolved.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["amazon", "newegg"]);
    }

    #[test]
    fn single_scope_resolves_one_retailer() {
        let catalog = RetailerCatalog::default();
        let resolved = catalog
            .resolve(&RetailerScope::Only("newegg".into()))
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].domain, "newegg.com");
    }

    #[test]
    fn unknown_retailer_is_an_error() {
        let catalog = RetailerCatalog::default();
        let err = catalog
            .resolve(&RetailerScope::Only("bestbuy".into()))
            .unwrap_err();
        assert_eq!(err, ScanError::UnknownRetailer("bestbuy".into()));
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let catalog = RetailerCatalog::new(Vec::new());
        assert_eq!(
            catalog.resolve(&RetailerScope::All).unwrap_err(),
            ScanError::NoRetailers
        );
    }

    #[test]
    fn banner_names_the_scanned_retailers() {
        let catalog = RetailerCatalog::default();
        assert_eq!(
            catalog.scanning_banner(&RetailerScope::All),
            "Scanning Amazon & Newegg..."
        );
        assert_eq!(
            catalog.scanning_banner(&RetailerScope::Only("amazon".into())),
            "Scanning Amazon..."
        );

        let three = RetailerCatalog::new(vec![
            Retailer::new("a", "A", "a.com"),
            Retailer::new("b", "B", "b.com"),
            Retailer::new("c", "C", "c.com"),
        ]);
        assert_eq!(three.scanning_banner(&RetailerScope::All), "Scanning A, B & C...");
    }
}
