// ============================================================================
// File: src/aggregator.rs
// Concurrent fan-out of a scan across retailers, merged by price
// ============================================================================

use std::time::Instant;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ScanError;
use crate::extract::{ExtractionClient, Offer};
use crate::filter::Filter;
use crate::query::RetailerQuery;
use crate::retailer::RetailerCatalog;

/// Offers in ascending price order. Equal prices keep their arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OfferList(Vec<Offer>);

impl OfferList {
    pub fn from_unsorted(mut offers: Vec<Offer>) -> Self {
        // sort_by is stable
        offers.sort_by(|a, b| a.price().total_cmp(&b.price()));
        Self(offers)
    }

    /// The cheapest offer.
    pub fn best(&self) -> Option<&Offer> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Offer> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Offer] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Offer> {
        self.0
    }
}

impl<'a> IntoIterator for &'a OfferList {
    type Item = &'a Offer;
    type IntoIter = std::slice::Iter<'a, Offer>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

pub struct DealAggregator {
    catalog: RetailerCatalog,
    extractor: ExtractionClient,
}

impl DealAggregator {
    pub fn new(catalog: RetailerCatalog, extractor: ExtractionClient) -> Self {
        Self { catalog, extractor }
    }

    pub fn catalog(&self) -> &RetailerCatalog {
        &self.catalog
    }

    /// Searches every retailer in the filter's scope at once and returns
    /// the merged offers, cheapest first.
    ///
    /// Only scope resolution can fail. A retailer whose request fails
    /// simply contributes no offers.
    pub async fn scan(&self, filter: &Filter) -> Result<OfferList, ScanError> {
        let retailers = self.catalog.resolve(filter.scope())?;

        let queries: Vec<RetailerQuery> = retailers
            .iter()
            .map(|r| RetailerQuery::build(&r.domain, &r.label, filter))
            .collect();

        info!(
            filter = %filter.describe(),
            retailers = queries.len(),
            "starting scan"
        );

        let start = Instant::now();
        let batches = join_all(queries.iter().map(|q| self.extractor.fetch_offers(q))).await;

        for (query, batch) in queries.iter().zip(&batches) {
            debug!(retailer = query.retailer_label(), offers = batch.len(), "retailer settled");
        }

        let offers = OfferList::from_unsorted(batches.into_iter().flatten().collect());

        info!(
            offers = offers.len(),
            best_price = offers.best().map(|o| o.price()),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "scan finished"
        );

        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{OfferPolicy, RawOffer};

    fn offer(title: &str, price: f64) -> Offer {
        let query = RetailerQuery::build("newegg.com", "Newegg", &Filter::default());
        OfferPolicy::default()
            .admit(
                RawOffer {
                    title: title.into(),
                    price,
                    url: format!("https://www.newegg.com/p/{}", title),
                },
                &query,
            )
            .unwrap()
    }

    #[test]
    fn sorts_ascending_and_keeps_ties_in_arrival_order() {
        let list = OfferList::from_unsorted(vec![
            offer("c", 120.0),
            offer("a1", 95.5),
            offer("b", 89.99),
            offer("a2", 95.5),
        ]);

        let titles: Vec<&str> = list.iter().map(|o| o.title()).collect();
        assert_eq!(titles, vec!["b", "a1", "a2", "c"]);
        assert_eq!(list.best().map(|o| o.title()), Some("b"));
        assert_eq!(list.into_vec().len(), 4);
    }

    #[test]
    fn empty_list_has_no_best() {
        let list = OfferList::from_unsorted(Vec::new());
        assert!(list.is_empty());
        assert!(list.best().is_none());
    }
}
