// ============================================================================
// File: src/lib.rs
// Library root: deal aggregation, advisory tips and the chat assistant
// ============================================================================

//! Finds memory-module deals by asking a search-grounded language model
//! about one retailer at a time, then validating and ranking what it says.
//!
//! ```text
//! Filter ──► DealAggregator ──► RetailerQuery × N ──► ExtractionClient × N (concurrent)
//!                 ▲                                          │
//!                 └────────── OfferList (by price) ◄─────────┘
//!
//! TipClient ──► one-line tip            ChatSession ──► FragmentStream
//! ```
//!
//! Every component talks to the model through [`backend::GenerativeBackend`];
//! [`llm_client::GeminiClient`] is the production implementation and
//! [`mock::MockBackend`] a scripted one.

pub mod aggregator;
pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod extract;
pub mod filter;
pub mod llm_client;
pub mod markdown;
pub mod mock;
pub mod models;
pub mod query;
pub mod retailer;
pub mod tip;

pub use aggregator::{DealAggregator, OfferList};
pub use chat::{ChatClient, ChatMessage, ChatSession, Role, SendOutcome, Transcript};
pub use config::Config;
pub use error::{FilterError, LlmError, ScanError};
pub use extract::{ExtractionClient, HostMatch, Offer, OfferPolicy};
pub use filter::{Capacity, Filter, Generation, RetailerScope, Speed};
pub use retailer::{Retailer, RetailerCatalog};
pub use tip::TipClient;
