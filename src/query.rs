// ============================================================================
// File: src/query.rs
// Retailer-scoped extraction queries built from a search filter
// ============================================================================

use chrono::{Local, NaiveDate};
use serde_json::{json, Value};

use crate::filter::Filter;

/// One retailer's slice of a scan: the target domain, the label offers
/// are attributed to, and the filter being searched for.
#[derive(Debug, Clone, PartialEq)]
pub struct RetailerQuery {
    domain: String,
    retailer_label: String,
    filter: Filter,
    date: NaiveDate,
}

impl RetailerQuery {
    /// Builds a query dated today (local time).
    pub fn build(domain: &str, retailer_label: &str, filter: &Filter) -> Self {
        Self::build_on(domain, retailer_label, filter, Local::now().date_naive())
    }

    pub fn build_on(domain: &str, retailer_label: &str, filter: &Filter, date: NaiveDate) -> Self {
        Self {
            domain: domain.trim().to_ascii_lowercase(),
            retailer_label: retailer_label.to_string(),
            filter: filter.clone(),
            date,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn retailer_label(&self) -> &str {
        &self.retailer_label
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Search expression handed to the web-search tool.
    pub fn search_terms(&self) -> String {
        format!(
            "site:{} buy \"{}\" \"{}\" {} RAM memory",
            self.domain,
            self.filter.capacity(),
            self.filter.generation(),
            self.filter.speed()
        )
    }

    /// Full extraction instruction for the model.
    pub fn prompt(&self) -> String {
        format!(
            "ACT AS A PRECISE WEB SCRAPING API.\n\n\
             CONTEXT:\n\
             - Target Domain: {domain}\n\
             - Target Product: {product} Desktop RAM\n\
             - Current Date: {date}\n\n\
             INSTRUCTIONS:\n\
             1. Perform a deep web search for the query: [{terms}]\n\
             2. Parse the search results to find specific product pages on {domain}.\n\
             3. Extract EXACT data found in the search results.\n\n\
             STRICT DATA INTEGRITY RULES:\n\
             - URLS: \"...\" or truncated URLs are FORBIDDEN. Output the full, valid URL found in the source.\n\
             - PRICES: Extract the current selling price. Ignore \"was\", \"save\" or monthly prices.\n\
             - FRESHNESS: Discard old news, forum posts and reviews. Only list purchase pages.\n\
             - HALLUCINATION: If a field (like price) is not explicitly visible in the result, DO NOT INVENT IT. Skip the item.\n\n\
             OUTPUT FORMAT:\n\
             Return a raw JSON array of objects with exactly the fields \"title\", \"price\" and \"url\". No markdown formatting.\n\n\
             Example structure:\n\
             [\n  {{\n    \"title\": \"Corsair Vengeance {product}\",\n    \"price\": 99.99,\n    \"url\": \"https://www.{domain}/...\"\n  }}\n]\n",
            domain = self.domain,
            product = self.filter.describe(),
            date = self.date.format("%Y-%m-%d"),
            terms = self.search_terms(),
        )
    }

    /// Output schema the model is asked to honor.
    pub fn response_schema() -> Value {
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING" },
                    "price": { "type": "NUMBER" },
                    "url": { "type": "STRING" }
                },
                "required": ["title", "price", "url"]
            }
        })
    }
}
