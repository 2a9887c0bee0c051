// ============================================================================
// File: src/extract.rs
// Per-retailer offer extraction and validation of untrusted model output
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::{GenerationRequest, GenerativeBackend, Turn};
use crate::error::LlmError;
use crate::query::RetailerQuery;

/// Prices at or below this are treated as placeholders. RAM is rarely under $10.
pub const DEFAULT_PRICE_FLOOR: f64 = 10.0;

/// Link shapes that point back at the search provider instead of the store.
const REDIRECT_MARKERS: [&str; 2] = [
    "google.com/url",
    "vertexaisearch.cloud.google.com/grounding-api-redirect",
];

/// An offer exactly as the model reported it. Nothing here is trusted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawOffer {
    pub title: String,
    pub price: f64,
    pub url: String,
}

/// A validated offer attributed to a retailer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    title: String,
    price: f64,
    url: String,
    retailer: String,
}

impl Offer {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn retailer(&self) -> &str {
        &self.retailer
    }
}

/// How strictly an offer's host must match the retailer's domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostMatch {
    /// Host equals the domain exactly.
    Exact,
    /// Host equals the domain once a leading `www.` is dropped from both.
    #[default]
    IgnoreWww,
    /// Host is the domain or any subdomain of it.
    Subdomain,
}

impl HostMatch {
    pub fn matches(&self, host: &str, domain: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        match self {
            HostMatch::Exact => host == domain,
            HostMatch::IgnoreWww => strip_www(&host) == strip_www(&domain),
            HostMatch::Subdomain => {
                let domain = strip_www(&domain);
                host == domain || host.ends_with(&format!(".{}", domain))
            }
        }
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Admission rules applied to every raw offer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfferPolicy {
    pub price_floor: f64,
    pub host_match: HostMatch,
}

impl Default for OfferPolicy {
    fn default() -> Self {
        Self {
            price_floor: DEFAULT_PRICE_FLOOR,
            host_match: HostMatch::default(),
        }
    }
}

/// Why a raw offer was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    ImplausiblePrice,
    IndirectUrl,
    ForeignHost,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::ImplausiblePrice => "price at or below the plausibility floor",
            Rejection::IndirectUrl => "missing, non-http or redirect url",
            Rejection::ForeignHost => "url host outside the target domain",
        };
        f.write_str(reason)
    }
}

impl OfferPolicy {
    /// Checks all three predicates; every one must hold. The admitted
    /// offer carries the parsed URL, so its scheme and host are lowercase.
    pub fn admit(&self, raw: RawOffer, query: &RetailerQuery) -> Result<Offer, Rejection> {
        if !self.price_is_plausible(raw.price) {
            return Err(Rejection::ImplausiblePrice);
        }
        let url = direct_url(&raw.url).ok_or(Rejection::IndirectUrl)?;
        let host = url.host_str().unwrap_or_default();
        if !self.host_match.matches(host, query.domain()) {
            return Err(Rejection::ForeignHost);
        }

        Ok(Offer {
            title: raw.title,
            price: raw.price,
            url: url.into(),
            retailer: query.retailer_label().to_string(),
        })
    }

    pub fn price_is_plausible(&self, price: f64) -> bool {
        price.is_finite() && price > self.price_floor
    }
}

/// Parses `raw` if it is an absolute http(s) link that does not bounce
/// through the search provider.
fn direct_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || REDIRECT_MARKERS.iter().any(|m| trimmed.contains(m)) {
        return None;
    }

    let url = Url::parse(trimmed).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

/// Parses the model's reply as a JSON array of raw offers.
pub fn parse_raw_offers(text: &str) -> Result<Vec<RawOffer>, serde_json::Error> {
    serde_json::from_str(text.trim())
}

/// Runs one retailer query against the backend and keeps only offers that
/// pass the [`OfferPolicy`].
#[derive(Clone)]
pub struct ExtractionClient {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
    policy: OfferPolicy,
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn GenerativeBackend>, model: impl Into<String>, policy: OfferPolicy) -> Self {
        Self {
            backend,
            model: model.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &OfferPolicy {
        &self.policy
    }

    /// Never fails: backend errors and unparseable replies count as
    /// "nothing found at this retailer".
    pub async fn fetch_offers(&self, query: &RetailerQuery) -> Vec<Offer> {
        let raw = match self.request_raw(query).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    retailer = query.retailer_label(),
                    domain = query.domain(),
                    error = %e,
                    "extraction failed; treating retailer as empty"
                );
                return Vec::new();
            }
        };

        let received = raw.len();
        let offers: Vec<Offer> = raw
            .into_iter()
            .filter_map(|offer| {
                let url = offer.url.clone();
                match self.policy.admit(offer, query) {
                    Ok(admitted) => Some(admitted),
                    Err(reason) => {
                        debug!(retailer = query.retailer_label(), %url, %reason, "offer rejected");
                        None
                    }
                }
            })
            .collect();

        info!(
            retailer = query.retailer_label(),
            received,
            admitted = offers.len(),
            "retailer extraction finished"
        );
        offers
    }

    async fn request_raw(&self, query: &RetailerQuery) -> Result<Vec<RawOffer>, ExtractFailure> {
        let mut request = GenerationRequest::new(self.model.clone());
        request.turns = vec![Turn::user(query.prompt())];
        request.temperature = Some(0.0);
        request.response_schema = Some(RetailerQuery::response_schema());
        request.web_search = true;

        let text = self.backend.generate(request).await.map_err(ExtractFailure::Backend)?;
        parse_raw_offers(&text).map_err(ExtractFailure::Malformed)
    }
}

#[derive(Debug)]
enum ExtractFailure {
    Backend(LlmError),
    Malformed(serde_json::Error),
}

impl fmt::Display for ExtractFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractFailure::Backend(e) => write!(f, "{}", e),
            ExtractFailure::Malformed(e) => write!(f, "malformed offer list: {}", e),
        }
    }
}
