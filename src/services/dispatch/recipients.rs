//! Expansion of recipient configs into concrete recipients.

use std::collections::HashSet;
use std::sync::Arc;

use super::UserDirectory;
use crate::error::AppResult;
use crate::models::{Recipient, RecipientConfig};

/// Resolves a rule's per-channel recipient config
pub struct RecipientResolver {
    directory: Arc<dyn UserDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Deduplicated recipients, first occurrence wins the position
    pub async fn resolve(&self, config: &RecipientConfig) -> AppResult<Vec<Recipient>> {
        let recipients = match config {
            RecipientConfig::Role { roles } => {
                let mut recipients = Vec::new();
                for role in roles {
                    let user_ids = self.directory.users_with_role(role).await?;
                    recipients.extend(user_ids.into_iter().map(Recipient::User));
                }
                recipients
            }
            RecipientConfig::User { users } => users.iter().copied().map(Recipient::User).collect(),
            RecipientConfig::Custom { custom } => custom
                .iter()
                .filter(|value| !value.trim().is_empty())
                .map(|value| Recipient::Custom(value.clone()))
                .collect(),
        };

        Ok(dedup(recipients))
    }
}

/// Parses forced recipient descriptors (`user:<id>` or literal)
pub fn parse_descriptors(descriptors: &[String]) -> Vec<Recipient> {
    dedup(
        descriptors
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(Recipient::parse)
            .collect(),
    )
}

fn dedup(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    recipients
        .into_iter()
        .filter(|r| seen.insert(r.clone()))
        .collect()
}
