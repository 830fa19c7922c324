use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role allowing read access to universe and market data.
pub const ROLE_VIEWER: &str = "portfolio.viewer";
/// Role allowing ingestion and rebalance job submission.
pub const ROLE_ADMIN: &str = "portfolio.admin";

/// Caller identity resolved by the auth collaborator.
///
/// Core components only ever see this resolved context, never raw credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub tenant_id: Uuid,
    pub roles: Vec<String>,
    pub user_id: Option<String>,
}

impl AuthContext {
    #[must_use]
    pub fn new(tenant_id: Uuid, roles: Vec<String>) -> Self {
        Self {
            tenant_id,
            roles,
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Viewers and admins may read.
    #[must_use]
    pub fn can_view(&self) -> bool {
        self.has_role(ROLE_VIEWER) || self.has_role(ROLE_ADMIN)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_can_view() {
        let ctx = AuthContext::new(Uuid::new_v4(), vec![ROLE_ADMIN.to_string()]);
        assert!(ctx.can_view());
        assert!(ctx.is_admin());
    }

    #[test]
    fn viewer_is_not_admin() {
        let ctx = AuthContext::new(Uuid::new_v4(), vec![ROLE_VIEWER.to_string()])
            .with_user("user-1");
        assert!(ctx.can_view());
        assert!(!ctx.is_admin());
        assert_eq!(ctx.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let ctx = AuthContext::new(Uuid::new_v4(), vec!["billing.viewer".to_string()]);
        assert!(!ctx.can_view());
        assert!(!ctx.is_admin());
    }
}
