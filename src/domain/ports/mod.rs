//! Repository ports: the persistence seams the core depends on.

pub mod agent_error_repository;
pub mod agent_repository;
pub mod attack_repository;
pub mod campaign_repository;
pub mod crack_repository;
pub mod hash_list_repository;
pub mod task_repository;
pub mod zap_repository;

pub use agent_error_repository::AgentErrorRepository;
pub use agent_repository::AgentRepository;
pub use attack_repository::AttackRepository;
pub use campaign_repository::CampaignRepository;
pub use crack_repository::CrackRepository;
pub use hash_list_repository::HashListRepository;
pub use task_repository::TaskRepository;
pub use zap_repository::ZapRepository;
