//! Service layer
//!
//! Services contain the reconcile logic of the controller. They converge
//! GitHub webhooks and deploy keys, refresh repository metadata, and manage
//! the secrets derived from generated key material.
//!
//! Remote resource syncers are trait-based so the reconciler can be tested
//! against in-memory fakes.

mod deploy_key_syncer;
mod reconciler;
mod repos;
mod secrets;
mod syncer;
mod webhook_syncer;

// Re-export traits
pub use syncer::ResourceSyncer;

// Re-export implementations
pub use deploy_key_syncer::DeployKeySyncer;
pub use reconciler::Reconciler;
pub use repos::RepositorySyncer;
pub use secrets::SecretManager;
pub use webhook_syncer::WebhookSyncer;
