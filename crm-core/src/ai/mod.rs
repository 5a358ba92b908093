//! AI Integration Module for AutoCRM
//!
//! Drafts congratulatory emails for won deals through a hosted
//! text-generation API (OpenAI or Gemini).

pub mod client;
pub mod enricher;
pub mod gateway;
pub mod gemini;
pub mod openai;
pub mod prompts;
pub mod responses;

pub use client::{build_provider, EmailProvider, ProviderError, ProviderSettings};
pub use enricher::{
    build_enricher, enricher_or_unavailable, DealEnricher, DisabledEnricher, EnrichmentError,
    EnrichmentOutcome, GatewayEnricher, RemoteEnricher, UnavailableEnricher,
};
pub use gateway::{EmailGateway, EmailRequest, GatewayError, GatewayResponse};
pub use responses::{EmailMetadata, GatewayBody, GeneratedEmail};
