//! Account Manager (C3, `spec.md` §4.3). Maps a `forge_identity_ref` to its
//! credential and capability set. Credentials are resolved through the
//! `CredentialStore` port at boot and held only behind that port — this
//! service never caches the raw credential string itself, only the
//! `forge_identity_ref` needed to re-resolve it just before use, so a
//! `Debug`-dump of `AccountManager` can never leak a secret.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::errors::BootError;
use crate::domain::ports::CredentialStore;

#[derive(Debug, Clone)]
pub struct AccountIdentity {
    pub forge_identity_ref: String,
    pub display_name: String,
    pub email: String,
    pub capabilities: HashSet<String>,
}

pub struct AccountManager {
    store: Arc<dyn CredentialStore>,
    identities: HashMap<String, AccountIdentity>,
}

impl AccountManager {
    pub fn new(store: Arc<dyn CredentialStore>, identities: Vec<AccountIdentity>) -> Self {
        Self {
            store,
            identities: identities
                .into_iter()
                .map(|i| (i.forge_identity_ref.clone(), i))
                .collect(),
        }
    }

    /// Resolves the raw credential for an identity. Callers must not log or
    /// `Debug`-format the returned string.
    pub fn credential_for(&self, forge_identity_ref: &str) -> Result<String, BootError> {
        self.store.resolve(forge_identity_ref)
    }

    pub fn identity(&self, forge_identity_ref: &str) -> Option<&AccountIdentity> {
        self.identities.get(forge_identity_ref)
    }

    /// `can(identity, capability)` per `spec.md` §4.3. Unknown identities
    /// have no capabilities; C2 enforces this again independently.
    pub fn can(&self, forge_identity_ref: &str, capability: &str) -> bool {
        self.identities
            .get(forge_identity_ref)
            .is_some_and(|i| i.capabilities.contains(capability))
    }
}
