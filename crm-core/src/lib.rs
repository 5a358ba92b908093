pub mod ai;
pub mod config;
pub mod db;
pub mod models;
pub mod seed;
pub mod stats;
pub mod storage;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use ai::{
    build_enricher, enricher_or_unavailable, DealEnricher, EmailGateway, EmailRequest,
    EnrichmentError, EnrichmentOutcome, GatewayError, GatewayResponse, GeneratedEmail,
    ProviderSettings,
};
pub use config::{
    default_config_path, CrmConfig, EnrichmentConfig, EnrichmentMode, LatencyProfile, ProviderKind,
};
pub use db::{create_backend, BackendType, DatabaseBackend};
pub use models::{
    Contact, ContactPatch, Deal, DealPatch, DealStatus, EntityId, NewContact, NewDeal, NewTask,
    RelatedType, Task, TaskPatch, TaskUrgency, Validate, ValidationErrors,
};
pub use stats::DashboardStats;
pub use store::{ContactStore, DealStore, Entity, EntityStore, Latency, Stores, TaskStore};
pub use workflow::{DealUpdate, DealWorkflow, EnrichmentStatus};
