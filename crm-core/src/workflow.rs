//! Deal update workflow
//!
//! Wraps the deal store's update so that moving a deal into `won` also asks
//! an enricher for a congratulatory email and appends it to the notes. The
//! enrichment is best effort: its failure never fails the update.

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;

use crate::ai::{DealEnricher, EmailRequest, EnrichmentOutcome};
use crate::models::{Deal, DealPatch, DealStatus, EntityId, Validate};
use crate::store::DealStore;

/// Contact name used in the email when the deal's contact is unknown
pub const PLACEHOLDER_CONTACT_NAME: &str = "Valued Customer";

/// What happened to the enrichment step of an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentStatus {
    /// The update was not a transition into `won`
    NotTriggered,
    Appended { model: String, tokens_used: u64 },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DealUpdate {
    pub deal: Deal,
    pub enrichment: EnrichmentStatus,
}

pub struct DealWorkflow {
    deals: Arc<DealStore>,
    enricher: Arc<dyn DealEnricher>,
}

impl DealWorkflow {
    pub fn new(deals: Arc<DealStore>, enricher: Arc<dyn DealEnricher>) -> Self {
        Self { deals, enricher }
    }

    pub fn deals(&self) -> &DealStore {
        &self.deals
    }

    /// Updates a deal, enriching its notes on a transition into `won`.
    ///
    /// Returns `None` when the deal does not exist.
    pub fn update_deal(
        &self,
        id: EntityId,
        patch: DealPatch,
        contact_name: Option<&str>,
    ) -> Result<Option<DealUpdate>> {
        patch.validate()?;

        let Some(mut deal) = self.deals.get_by_id(id)? else {
            return Ok(None);
        };

        let was_won = deal.status == DealStatus::Won;
        let will_be_won = patch.status == Some(DealStatus::Won);

        let now = Utc::now();
        deal.apply(patch, now);

        let enrichment = if !was_won && will_be_won {
            tracing::info!(deal_id = id, "deal won, drafting congratulatory email");
            self.enrich(&mut deal, contact_name, now)
        } else {
            EnrichmentStatus::NotTriggered
        };

        Ok(self
            .deals
            .replace(deal)?
            .map(|deal| DealUpdate { deal, enrichment }))
    }

    fn enrich(
        &self,
        deal: &mut Deal,
        contact_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> EnrichmentStatus {
        let contact_name = contact_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(PLACEHOLDER_CONTACT_NAME);

        let request = EmailRequest {
            deal_name: deal.name.clone(),
            deal_value: deal.value,
            contact_name: contact_name.to_string(),
        };

        match self.enricher.enrich(&request) {
            EnrichmentOutcome::Generated(generated) => {
                deal.notes = append_email_block(&deal.notes, &generated.email, now);
                EnrichmentStatus::Appended {
                    model: generated.model,
                    tokens_used: generated.tokens_used,
                }
            }
            EnrichmentOutcome::Failed(error) => {
                tracing::warn!(deal_id = deal.id, %error, "could not generate congratulatory email");
                EnrichmentStatus::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }
}

/// Appends a delimited, timestamped email block to existing notes
pub fn append_email_block(notes: &str, email: &str, at: DateTime<Utc>) -> String {
    let block = format!(
        "--- Congratulatory email (generated {}) ---\n{}\n--- End ---",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        email.trim()
    );
    if notes.is_empty() {
        block
    } else {
        format!("{}\n\n{}", notes, block)
    }
}
