pub mod audit_log;
pub mod integration;
pub mod membership;
pub mod organization;
pub mod role;
pub mod user;

pub use audit_log::{
    AuditAction, AuditContext, AuditDraft, AuditEntityKind, AuditLogEntry, AuditPage, AuditQuery,
};
pub use integration::{
    EnvDefaults, FieldSpec, IntegrationKey, IntegrationSettingsRecord, MaskedSettings, MaskedValue,
    ResolvedSettings, SettingsState, TestResult,
};
pub use membership::{Membership, OrgMembership};
pub use organization::Organization;
pub use role::OrgRole;
pub use user::User;
