// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::UserRole,
};

/// 1. O Trait que define o cargo mínimo exigido
pub trait RoleDef: Send + Sync + 'static {
    fn minimum() -> UserRole;
}

/// 2. O Extractor (Guardião)
pub struct RequireRole<T>(pub PhantomData<T>);

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_request_parts(parts, state)
            .await
            .unwrap_or_default();

        // A. Extrai Usuário (colocado pelo auth_guard)
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale))?;

        // B. Compara com o cargo exigido
        if !has_role(user.0.role, T::minimum()) {
            tracing::warn!(
                "⛔ Usuário {} ({:?}) tentou acessar recurso de {:?}",
                user.0.login,
                user.0.role,
                T::minimum()
            );
            return Err(AppError::Forbidden.to_api_error(&locale));
        }

        Ok(RequireRole(PhantomData))
    }
}

pub fn has_role(actual: UserRole, required: UserRole) -> bool {
    actual >= required
}

// ---
// DEFINIÇÃO DOS CARGOS (TIPOS)
// ---

pub struct AdminOnly;
impl RoleDef for AdminOnly {
    fn minimum() -> UserRole { UserRole::Admin }
}

pub struct SuperAdminOnly;
impl RoleDef for SuperAdminOnly {
    fn minimum() -> UserRole { UserRole::SuperAdmin }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_roles_inherit_lower_permissions() {
        assert!(has_role(UserRole::SuperAdmin, AdminOnly::minimum()));
        assert!(has_role(UserRole::Admin, AdminOnly::minimum()));
        assert!(!has_role(UserRole::Operador, AdminOnly::minimum()));
        assert!(!has_role(UserRole::Admin, SuperAdminOnly::minimum()));
    }
}
