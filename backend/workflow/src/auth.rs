//! Identity and role checks consumed by the workflow engine.
//!
//! The identity provider itself (wallet session, login) is an external
//! collaborator; the engine only needs the narrow [`AuthProvider`] view.

use crate::types::UploaderType;

/// Role held by the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Individual,
    Business,
    Verifier,
    Admin,
}

/// Actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    UploadDocument,
    AttestDocument,
    RejectDocument,
    MintCredits,
}

impl Role {
    /// Default role/permission mapping. Individuals and businesses upload;
    /// verifiers attest, reject and mint; admins do everything.
    pub fn allows(&self, permission: Permission) -> bool {
        match self {
            Role::Individual | Role::Business => {
                matches!(permission, Permission::UploadDocument)
            }
            Role::Verifier => matches!(
                permission,
                Permission::AttestDocument | Permission::RejectDocument | Permission::MintCredits
            ),
            Role::Admin => true,
        }
    }

    /// The uploader type recorded on documents created by this role.
    pub fn uploader_type(&self) -> Option<UploaderType> {
        match self {
            Role::Individual => Some(UploaderType::Individual),
            Role::Business => Some(UploaderType::Business),
            Role::Verifier | Role::Admin => None,
        }
    }
}

/// The authenticated user as seen by the workflow core.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    /// Wallet address; absent when the session has no connected wallet.
    pub wallet_address: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
}

/// Narrow identity interface required from the auth collaborator.
pub trait AuthProvider: Send + Sync {
    /// The currently signed-in user, or `None`.
    fn current_user(&self) -> Option<User>;

    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    fn has_permission(&self, permission: Permission) -> bool {
        self.current_user()
            .map(|u| u.role.allows(permission))
            .unwrap_or(false)
    }

    fn is_verifier(&self) -> bool {
        self.current_user()
            .map(|u| matches!(u.role, Role::Verifier | Role::Admin))
            .unwrap_or(false)
    }
}
