//! Crack ingestor.
//!
//! Deduplicates submitted plaintexts, marks hash items, feeds the
//! per-attack zap log, and signals campaign completion when a hash list
//! finishes. `submit_crack` is idempotent at the hash-item level: the
//! first writer wins, later submissions see `AlreadyCracked`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Attack, Campaign, CrackOutcome, HashList, Task};
use crate::domain::ports::{
    AttackRepository, CampaignRepository, CrackRepository, HashListRepository, TaskRepository,
    ZapRepository,
};
use crate::services::event_bus::{EntityKind, EventBus};
use crate::services::task_scheduler::TaskScheduler;

/// Hashcat hash type for NTLM, whose submissions may arrive as pwdump rows.
const NTLM_HASH_TYPE: u32 = 1000;

/// Ingests recovered plaintexts and serves zap deltas.
pub struct CrackIngestor {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    cracks: Arc<dyn CrackRepository>,
    zaps: Arc<dyn ZapRepository>,
    scheduler: Arc<TaskScheduler>,
    events: Arc<EventBus>,
}

impl CrackIngestor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        hash_lists: Arc<dyn HashListRepository>,
        cracks: Arc<dyn CrackRepository>,
        zaps: Arc<dyn ZapRepository>,
        scheduler: Arc<TaskScheduler>,
        events: Arc<EventBus>,
    ) -> Self {
        Self { tasks, attacks, campaigns, hash_lists, cracks, zaps, scheduler, events }
    }

    /// Record a recovered plaintext submitted against a task.
    ///
    /// The hash value is canonicalised for the list's hash type before
    /// lookup; values absent from the list fail `NotFound` without any
    /// mutation. Timestamps from the future are clamped to server time.
    #[instrument(skip(self, hash_value, plaintext), fields(agent_id = %agent_id, task_id = %task_id))]
    pub async fn submit_crack(
        &self,
        agent_id: Uuid,
        task_id: Uuid,
        hash_value: &str,
        plaintext: &str,
        timestamp: DateTime<Utc>,
    ) -> DomainResult<CrackOutcome> {
        let task = self.owned_task(agent_id, task_id).await?;
        let (attack, campaign, list) = self.context_of(&task).await?;

        let canonical = canonicalize_hash(hash_value, list.hash_type);
        let item = self
            .hash_lists
            .find_item_by_hash(list.id, &canonical)
            .await?
            .ok_or(DomainError::NotFound { entity: "hash", id: canonical.clone() })?;

        if item.cracked {
            return Ok(CrackOutcome::AlreadyCracked);
        }

        let cracked_at = timestamp.min(Utc::now());
        let won = self
            .cracks
            .record(item.id, task.id, attack.id, plaintext, cracked_at)
            .await?;
        if !won {
            return Ok(CrackOutcome::AlreadyCracked);
        }

        info!(hash = %canonical, campaign_id = %campaign.id, "hash cracked");
        self.events.emit(EntityKind::Crack, item.id);
        self.events.emit(EntityKind::Campaign, campaign.id);

        let list = self
            .hash_lists
            .get(list.id)
            .await?
            .ok_or_else(|| DomainError::not_found("hash_list", campaign.hash_list_id))?;
        if list.is_fully_cracked() {
            self.scheduler.complete_campaign_for_cracked_list(campaign.id).await?;
            return Ok(CrackOutcome::ListComplete);
        }

        Ok(CrackOutcome::MoreRemain)
    }

    /// Hash values cracked against the task's attack that this agent has
    /// not yet been served. Each value is delivered to an agent at most
    /// once; the cursor advances as part of the read.
    pub async fn get_zaps(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<Vec<String>> {
        let task = self.owned_task(agent_id, task_id).await?;
        self.zaps.drain(agent_id, task.attack_id).await
    }

    async fn owned_task(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<Task> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or_else(|| DomainError::not_found("task", task_id))?;
        if task.assigned_agent_id != Some(agent_id) {
            return Err(DomainError::not_found("task", task_id));
        }
        Ok(task)
    }

    async fn context_of(&self, task: &Task) -> DomainResult<(Attack, Campaign, HashList)> {
        let attack = self
            .attacks
            .get(task.attack_id)
            .await?
            .ok_or_else(|| DomainError::not_found("attack", task.attack_id))?;
        let campaign = self
            .campaigns
            .get(attack.campaign_id)
            .await?
            .ok_or_else(|| DomainError::not_found("campaign", attack.campaign_id))?;
        let list = self
            .hash_lists
            .get(campaign.hash_list_id)
            .await?
            .ok_or_else(|| DomainError::not_found("hash_list", campaign.hash_list_id))?;
        Ok((attack, campaign, list))
    }
}

/// Canonicalise a submitted hash value for its hash type.
///
/// Hex digests are lower-cased. NTLM submissions may arrive as pwdump
/// rows (`user:rid:lm:nt:::`); the trailing hex field is the NT hash.
pub fn canonicalize_hash(raw: &str, hash_type: u32) -> String {
    let trimmed = raw.trim();

    if hash_type == NTLM_HASH_TYPE && trimmed.contains(':') {
        if let Some(field) = trimmed.rsplit(':').find(|f| !f.is_empty() && is_hex(f)) {
            return field.to_ascii_lowercase();
        }
    }

    if is_hex(trimmed) {
        trimmed.to_ascii_lowercase()
    } else {
        trimmed.to_string()
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_digests_are_lowercased() {
        assert_eq!(
            canonicalize_hash("5D41402ABC4B2A76B9719D911017C592", 0),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn ntlm_pwdump_rows_keep_only_the_nt_hash() {
        let row = "Administrator:500:aad3b435b51404eeaad3b435b51404ee:31D6CFE0D16AE931B73C59D7E0C089C0:::";
        assert_eq!(
            canonicalize_hash(row, NTLM_HASH_TYPE),
            "31d6cfe0d16ae931b73c59d7e0c089c0"
        );
    }

    #[test]
    fn bare_ntlm_hashes_pass_through() {
        assert_eq!(
            canonicalize_hash("31d6cfe0d16ae931b73c59d7e0c089c0", NTLM_HASH_TYPE),
            "31d6cfe0d16ae931b73c59d7e0c089c0"
        );
    }

    #[test]
    fn non_hex_values_are_left_untouched() {
        assert_eq!(canonicalize_hash("$2b$12$abcdef", 3200), "$2b$12$abcdef");
    }
}
