//! In-memory state for the things gateway: the device registry and the OAuth
//! credential store.
//!
//! Both stores are independent, each guarded by its own lock, and neither
//! knows about the other. Records cross store boundaries only as keys.

pub mod credentials;
pub mod error;
pub mod models;
pub mod registry;

pub use credentials::CredentialStore;
pub use error::{RecordKind, StoreError};
pub use models::{AccessCredential, AuthorizationGrant, Client, Device, DeviceId};
pub use registry::DeviceRegistry;
