pub mod audit;
pub mod authz;
pub mod database;
pub mod integrations;
pub mod members;
pub mod org_context;
pub mod probes;
pub mod secrets;
pub mod store;
pub mod verification_cache;

pub use audit::AuditService;
pub use authz::{require_role, AuthContext, Denied};
pub use database::Database;
pub use integrations::IntegrationService;
pub use members::MemberAdminService;
pub use org_context::{ActiveOrg, OrgContext, OrgContextResolver};
pub use probes::{ConnectionProbe, LiveProbes, StaticProbe};
pub use secrets::{mask_secret, SecretCodec};
pub use store::{AuditStore, InMemoryStore, MembershipStore, SettingsStore};
pub use verification_cache::VerificationCache;
