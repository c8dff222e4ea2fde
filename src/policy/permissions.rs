use axum::http::Method;

use crate::auth::Identity;
use crate::error::{AppError, AppResult};

/// Route-level permission predicate evaluated before the handler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    AllowAny,
    AdminOrReadOnly,
    Authenticated,
}

/// GET, HEAD and OPTIONS never mutate
pub fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

pub fn admin_or_read_only(identity: &Identity, mutating: bool) -> bool {
    !mutating || identity.is_admin()
}

pub fn owner_or_read_only(identity: &Identity, mutating: bool, owner_id: i64) -> bool {
    !mutating || identity.user().is_some_and(|user| user.id == owner_id)
}

pub fn authenticated_only(identity: &Identity) -> bool {
    identity.is_authenticated()
}

/// Maps a denied predicate to 401 for anonymous callers and 403 otherwise
pub fn deny(identity: &Identity) -> AppError {
    if identity.is_authenticated() {
        AppError::Forbidden
    } else {
        AppError::NotAuthenticated
    }
}

impl Permission {
    pub fn check(self, identity: &Identity, method: &Method) -> AppResult<()> {
        let allowed = match self {
            Permission::AllowAny => true,
            Permission::AdminOrReadOnly => admin_or_read_only(identity, is_mutating(method)),
            Permission::Authenticated => authenticated_only(identity),
        };

        if allowed {
            Ok(())
        } else {
            Err(deny(identity))
        }
    }
}

/// Object-level check for resources with a recorded owner
pub fn check_owner(identity: &Identity, method: &Method, owner_id: i64) -> AppResult<()> {
    if owner_or_read_only(identity, is_mutating(method), owner_id) {
        Ok(())
    } else {
        Err(deny(identity))
    }
}
