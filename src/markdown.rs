// ============================================================================
// File: src/markdown.rs
// Markdown export of a scan result
// ============================================================================

use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::aggregator::OfferList;
use crate::filter::Filter;
use crate::retailer::Retailer;

pub struct DealReport<'a> {
    filter: &'a Filter,
    retailers: &'a [&'a Retailer],
    offers: &'a OfferList,
    generated_at: DateTime<Local>,
}

impl<'a> DealReport<'a> {
    pub fn new(filter: &'a Filter, retailers: &'a [&'a Retailer], offers: &'a OfferList) -> Self {
        Self {
            filter,
            retailers,
            offers,
            generated_at: Local::now(),
        }
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut content = String::new();

        self.write_header(&mut content);
        self.write_best_value(&mut content);
        self.write_results(&mut content);

        content
    }

    fn write_header(&self, content: &mut String) {
        content.push_str(&format!("# RAM Deals: {}\n\n", self.filter.describe()));
        content.push_str(&format!(
            "**Date**: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        let names: Vec<&str> = self.retailers.iter().map(|r| r.label.as_str()).collect();
        content.push_str(&format!("**Retailers**: {}\n\n", names.join(", ")));
    }

    fn write_best_value(&self, content: &mut String) {
        if let Some(best) = self.offers.best() {
            content.push_str(&format!(
                "**Best Value**: [{}]({}) at {} for ${:.2}\n\n",
                escape(best.title()),
                best.url(),
                best.retailer(),
                best.price()
            ));
        }
    }

    fn write_results(&self, content: &mut String) {
        let count = self.offers.len();
        content.push_str(&format!(
            "## Results ({} result{} found)\n\n",
            count,
            if count == 1 { "" } else { "s" }
        ));

        if self.offers.is_empty() {
            content.push_str("No deals found for this configuration.\n");
            content.push_str("Try changing the filters or the retailer selection.\n");
            return;
        }

        content.push_str("| # | Retailer | Product | Price |\n");
        content.push_str("|---|----------|---------|------:|\n");
        for (i, offer) in self.offers.iter().enumerate() {
            content.push_str(&format!(
                "| {} | {} | [{}]({}) | ${:.2} |\n",
                i + 1,
                offer.retailer(),
                escape(offer.title()),
                offer.url(),
                offer.price()
            ));
        }
    }
}

/// Keeps model-supplied titles from breaking table cells or link text.
fn escape(text: &str) -> String {
    text.replace('|', "\\|")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('\n', " ")
}
