use serde::{Deserialize, Serialize};

/// `SecurityContext` carries the already-resolved identity of the caller for one scope.
///
/// It is read-only input for the data layer: the acting subject stamped on audit
/// fields, the tenant used for row visibility and the role set used for
/// privileged bypasses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContext {
    subject_id: String,
    display_name: Option<String>,
    username: Option<String>,
    tenant_id: Option<String>,
    roles: Vec<String>,
}

impl SecurityContext {
    /// Create a new `SecurityContext` builder
    #[must_use]
    pub fn builder() -> SecurityContextBuilder {
        SecurityContextBuilder::default()
    }

    /// Create an anonymous `SecurityContext` with no subject, tenant or roles
    #[must_use]
    pub fn anonymous() -> Self {
        SecurityContextBuilder::default().build()
    }

    /// Opaque identifier of the acting subject. Empty for anonymous contexts.
    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Tenant of the request. An empty tenant id is reported as `None`.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref().filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Name recorded in audit logs: display name, falling back to the username.
    #[must_use]
    pub fn actor_name(&self) -> Option<&str> {
        self.display_name().or_else(|| self.username())
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    #[must_use]
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.subject_id.is_empty()
    }
}

#[derive(Default)]
pub struct SecurityContextBuilder {
    subject_id: Option<String>,
    display_name: Option<String>,
    username: Option<String>,
    tenant_id: Option<String>,
    roles: Vec<String>,
}

impl SecurityContextBuilder {
    #[must_use]
    pub fn subject_id(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn build(self) -> SecurityContext {
        SecurityContext {
            subject_id: self.subject_id.unwrap_or_default(),
            display_name: self.display_name,
            username: self.username,
            tenant_id: self.tenant_id,
            roles: self.roles,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::roles;

    #[test]
    fn test_security_context_builder_full() {
        let ctx = SecurityContext::builder()
            .subject_id("u1")
            .display_name("Jane Doe")
            .username("jane")
            .tenant_id("T1")
            .role(roles::ADMIN)
            .build();

        assert_eq!(ctx.subject_id(), "u1");
        assert_eq!(ctx.tenant_id(), Some("T1"));
        assert_eq!(ctx.actor_name(), Some("Jane Doe"));
        assert!(ctx.is_in_role(roles::ADMIN));
        assert!(!ctx.is_in_role(roles::SYSTEM_ADMIN));
    }

    #[test]
    fn test_security_context_anonymous() {
        let ctx = SecurityContext::anonymous();

        assert!(ctx.is_anonymous());
        assert_eq!(ctx.tenant_id(), None);
        assert_eq!(ctx.actor_name(), None);
        assert!(ctx.roles().is_empty());
    }

    #[test]
    fn empty_tenant_means_no_tenant() {
        let ctx = SecurityContext::builder().subject_id("u1").tenant_id("").build();
        assert_eq!(ctx.tenant_id(), None);
    }

    #[test]
    fn actor_name_falls_back_to_username() {
        let ctx = SecurityContext::builder().subject_id("u1").username("jane").build();
        assert_eq!(ctx.actor_name(), Some("jane"));
    }

    #[test]
    fn test_security_context_serialize_deserialize() {
        let original = SecurityContext::builder()
            .subject_id("u1")
            .tenant_id("T1")
            .role(roles::SYSTEM_ADMIN)
            .build();

        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: SecurityContext = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized, original);
    }
}
