use async_trait::async_trait;

use crate::pipeline::{ExecutionContext, Rule, RuleError};
use crate::types::{Action, Resource, Role};

/// Role → permission table
pub struct Policy;

impl Policy {
    pub fn allows(role: Role, resource: Resource, action: Action) -> bool {
        match role {
            Role::Admin => true,
            Role::Viewer => action == Action::Read,
            Role::Editor => match action {
                Action::Read => true,
                Action::Create | Action::Update => !matches!(resource, Resource::Users | Resource::Analytics),
                Action::Delete => matches!(resource, Resource::Posts | Resource::Profiles),
            },
        }
    }
}

/// Rejects callers whose role may not perform `action` on `resource`
pub struct Authorize {
    pub resource: Resource,
    pub action: Action,
}

impl Authorize {
    pub fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

#[async_trait]
impl<D: Send + Sync> Rule<D> for Authorize {
    fn name(&self) -> &str {
        "authorize"
    }

    async fn check(&self, ctx: &mut ExecutionContext<D>) -> Result<(), RuleError> {
        if Policy::allows(ctx.actor.role, self.resource, self.action) {
            Ok(())
        } else {
            Err(RuleError::Forbidden(format!(
                "role '{}' may not {} {}",
                ctx.actor.role, self.action, self.resource
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::types::Actor;
    use std::sync::Arc;

    #[test]
    fn policy_table() {
        use Action::*;
        use Resource::*;

        assert!(Policy::allows(Role::Admin, Users, Delete));
        assert!(Policy::allows(Role::Admin, Analytics, Read));

        assert!(Policy::allows(Role::Editor, Users, Read));
        assert!(!Policy::allows(Role::Editor, Users, Create));
        assert!(!Policy::allows(Role::Editor, Users, Update));
        assert!(Policy::allows(Role::Editor, Posts, Create));
        assert!(Policy::allows(Role::Editor, LargeTable, Update));
        assert!(Policy::allows(Role::Editor, Posts, Delete));
        assert!(Policy::allows(Role::Editor, Profiles, Delete));
        assert!(!Policy::allows(Role::Editor, Categories, Delete));
        assert!(!Policy::allows(Role::Editor, Pokemon, Delete));

        assert!(Policy::allows(Role::Viewer, Pokemon, Read));
        assert!(!Policy::allows(Role::Viewer, Posts, Create));
        assert!(!Policy::allows(Role::Viewer, Profiles, Delete));
    }

    #[tokio::test]
    async fn authorize_rule_forbids() {
        let mut ctx = ExecutionContext::new("t", Actor::new("1", Role::Viewer), Arc::new(MemoryStore::new()), ());
        let rule = Authorize::new(Resource::Posts, Action::Delete);
        assert!(matches!(rule.check(&mut ctx).await, Err(RuleError::Forbidden(_))));

        ctx.actor.role = Role::Admin;
        assert!(rule.check(&mut ctx).await.is_ok());
    }
}
