//! Shared service stack for integration tests: every repository wired to
//! one in-memory SQLite pool, plus fixture builders for the common
//! campaign/attack/agent setups the scenarios need.

#![allow(dead_code)]

use std::sync::Arc;

use sqlx::SqlitePool;
use uuid::Uuid;

use cipherswarm::adapters::sqlite::{
    SqliteAgentErrorRepository, SqliteAgentRepository, SqliteAttackRepository,
    SqliteCampaignRepository, SqliteCrackRepository, SqliteHashListRepository,
    SqliteTaskRepository, SqliteZapRepository,
};
use cipherswarm::domain::models::{
    Agent, Attack, AttackMode, Campaign, HashItem, HashList, SchedulerConfig,
};
use cipherswarm::domain::ports::{
    AgentErrorRepository, AgentRepository, AttackRepository, CampaignRepository, CrackRepository,
    HashListRepository, TaskRepository, ZapRepository,
};
use cipherswarm::services::{
    AgentRegistry, BenchmarkEntry, CrackIngestor, EventBus, ProgressReconciler, TaskScheduler,
    Timekeeper,
};

use super::database::setup_test_db;

pub struct Harness {
    pub pool: SqlitePool,
    pub tasks: Arc<dyn TaskRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub attacks: Arc<dyn AttackRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub hash_lists: Arc<dyn HashListRepository>,
    pub cracks: Arc<dyn CrackRepository>,
    pub zaps: Arc<dyn ZapRepository>,
    pub agent_errors: Arc<dyn AgentErrorRepository>,
    pub events: Arc<EventBus>,
    pub scheduler: Arc<TaskScheduler>,
    pub registry: Arc<AgentRegistry>,
    pub reconciler: Arc<ProgressReconciler>,
    pub ingestor: Arc<CrackIngestor>,
    pub timekeeper: Timekeeper,
    pub config: SchedulerConfig,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(SchedulerConfig::default()).await
    }

    pub async fn with_config(config: SchedulerConfig) -> Self {
        let pool = setup_test_db().await;

        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let agents: Arc<dyn AgentRepository> = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let attacks: Arc<dyn AttackRepository> =
            Arc::new(SqliteAttackRepository::new(pool.clone()));
        let campaigns: Arc<dyn CampaignRepository> =
            Arc::new(SqliteCampaignRepository::new(pool.clone()));
        let hash_lists: Arc<dyn HashListRepository> =
            Arc::new(SqliteHashListRepository::new(pool.clone()));
        let cracks: Arc<dyn CrackRepository> = Arc::new(SqliteCrackRepository::new(pool.clone()));
        let zaps: Arc<dyn ZapRepository> = Arc::new(SqliteZapRepository::new(pool.clone()));
        let agent_errors: Arc<dyn AgentErrorRepository> =
            Arc::new(SqliteAgentErrorRepository::new(pool.clone()));

        let events = Arc::new(EventBus::default());
        let scheduler = Arc::new(TaskScheduler::new(
            tasks.clone(),
            agents.clone(),
            attacks.clone(),
            campaigns.clone(),
            hash_lists.clone(),
            agent_errors.clone(),
            events.clone(),
            config.clone(),
        ));
        let registry = Arc::new(AgentRegistry::new(
            agents.clone(),
            agent_errors.clone(),
            scheduler.clone(),
            events.clone(),
            &config,
        ));
        let reconciler = Arc::new(ProgressReconciler::new(
            tasks.clone(),
            attacks.clone(),
            campaigns.clone(),
            events.clone(),
            config.clone(),
        ));
        let ingestor = Arc::new(CrackIngestor::new(
            tasks.clone(),
            attacks.clone(),
            campaigns.clone(),
            hash_lists.clone(),
            cracks.clone(),
            zaps.clone(),
            scheduler.clone(),
            events.clone(),
        ));
        let timekeeper = Timekeeper::new(
            agents.clone(),
            tasks.clone(),
            attacks.clone(),
            campaigns.clone(),
            agent_errors.clone(),
            scheduler.clone(),
            events.clone(),
            config.clone(),
        );

        Self {
            pool,
            tasks,
            agents,
            attacks,
            campaigns,
            hash_lists,
            cracks,
            zaps,
            agent_errors,
            events,
            scheduler,
            registry,
            reconciler,
            ingestor,
            timekeeper,
            config,
        }
    }

    /// Register an agent and activate it with a single-device benchmark
    /// for the given hash type.
    pub async fn active_agent(&self, name: &str, hash_type: u32, hash_speed: f64) -> Agent {
        let agent = self
            .registry
            .register("hashcat-agent/1.0", name.to_string(), "linux", vec!["GPU0".to_string()])
            .await
            .expect("failed to register agent");

        self.registry
            .submit_benchmark(
                agent.id,
                vec![BenchmarkEntry { hash_type, device: 0, runtime_ms: 1000, hash_speed }],
            )
            .await
            .expect("failed to submit benchmark");

        self.registry.get(agent.id).await.expect("failed to reload agent")
    }

    /// Create a hash list with the given uncracked items.
    pub async fn hash_list(&self, hash_type: u32, hashes: &[&str]) -> HashList {
        let list = HashList::new(Uuid::new_v4(), "test list", hash_type);
        self.hash_lists.create(&list).await.expect("failed to create hash list");

        let items: Vec<HashItem> =
            hashes.iter().map(|h| HashItem::new(list.id, (*h).to_string())).collect();
        self.hash_lists.add_items(list.id, &items).await.expect("failed to add items");

        self.hash_lists.get(list.id).await.expect("reload").expect("list exists")
    }

    /// Create a draft campaign with one dictionary attack over the list.
    pub async fn campaign_with_attack(
        &self,
        list: &HashList,
        total_keyspace: u64,
        priority: i32,
    ) -> (Campaign, Attack) {
        let campaign =
            Campaign::new(list.project_id, "test campaign", list.id).with_priority(priority);
        self.campaigns.create(&campaign).await.expect("failed to create campaign");

        let attack = Attack::new(campaign.id, 1, AttackMode::Dictionary)
            .with_wordlist("wordlists/rockyou.txt")
            .with_keyspace(total_keyspace);
        self.attacks.create(&attack).await.expect("failed to create attack");

        (campaign, attack)
    }

    /// Campaign + attack + start: ready for `request_task`.
    pub async fn running_campaign(
        &self,
        list: &HashList,
        total_keyspace: u64,
        priority: i32,
    ) -> (Campaign, Attack) {
        let (campaign, attack) = self.campaign_with_attack(list, total_keyspace, priority).await;
        self.scheduler.start_campaign(campaign.id).await.expect("failed to start campaign");
        let campaign = self.campaigns.get(campaign.id).await.expect("reload").expect("exists");
        let attack = self.attacks.get(attack.id).await.expect("reload").expect("exists");
        (campaign, attack)
    }
}
