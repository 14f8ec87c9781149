//! Read-only permission checks.
//!
//! Membership and roles are managed elsewhere; this module only answers
//! whether a user may manage a given organization's events.

use sea_orm::prelude::*;

use crate::{
    entities::{Event, Organization, OrganizationMember, User, event, organization_member, user},
    errors::{Error, Result},
};

/// Succeeds iff `user_id` is an active user holding an owner, admin or planner
/// role in `organization_id`.
pub async fn ensure_organization_planner<C>(db: &C, user_id: i64, organization_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    Organization::find_by_id(organization_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("organization", organization_id))?;

    let active_user = User::find_by_id(user_id)
        .filter(user::Column::DeletedAt.is_null())
        .one(db)
        .await?;

    let membership = match active_user {
        Some(_) => {
            OrganizationMember::find()
                .filter(organization_member::Column::OrganizationId.eq(organization_id))
                .filter(organization_member::Column::UserId.eq(user_id))
                .one(db)
                .await?
        }
        None => None,
    };

    let allowed = membership
        .and_then(|m| m.role())
        .is_some_and(organization_member::MemberRole::can_manage_events);

    if allowed {
        Ok(())
    } else {
        Err(Error::Forbidden {
            user_id,
            organization_id,
        })
    }
}

/// Loads an active event and checks that `user_id` may manage it.
///
/// Returns the event so callers running inside a transaction can reuse the row.
pub async fn ensure_event_planner<C>(db: &C, user_id: i64, event_id: i64) -> Result<event::Model>
where
    C: ConnectionTrait,
{
    let event = Event::find_by_id(event_id)
        .filter(event::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("event", event_id))?;

    ensure_organization_planner(db, user_id, event.organization_id).await?;

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::organization_member::MemberRole;
    use crate::test_utils::*;
    use sea_orm::{ActiveModelTrait, Set};

    #[tokio::test]
    async fn test_planner_roles_allowed() -> Result<()> {
        let fx = setup_with_event().await?;
        for role in [MemberRole::Owner, MemberRole::Admin, MemberRole::Planner] {
            let user = create_member(&*fx.db, fx.organization.id, role).await?;
            let event = ensure_event_planner(&*fx.db, user.id, fx.event.id).await?;
            assert_eq!(event.id, fx.event.id);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_plain_member_forbidden() -> Result<()> {
        let fx = setup_with_event().await?;
        let member = create_member(&*fx.db, fx.organization.id, MemberRole::Member).await?;

        let result = ensure_event_planner(&*fx.db, member.id, fx.event.id).await;
        assert!(matches!(
            result,
            Err(Error::Forbidden { user_id, organization_id })
                if user_id == member.id && organization_id == fx.organization.id
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_outsider_and_deleted_user_forbidden() -> Result<()> {
        let fx = setup_with_event().await?;
        let outsider = create_test_user(&*fx.db, "outsider@example.com").await?;
        assert!(matches!(
            ensure_event_planner(&*fx.db, outsider.id, fx.event.id).await,
            Err(Error::Forbidden { .. })
        ));

        let mut planner: user::ActiveModel = fx.planner.clone().into();
        planner.deleted_at = Set(Some(t0()));
        planner.update(&*fx.db).await?;
        assert!(matches!(
            ensure_event_planner(&*fx.db, fx.planner.id, fx.event.id).await,
            Err(Error::Forbidden { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_event() -> Result<()> {
        let fx = setup_with_event().await?;
        let result = ensure_event_planner(&*fx.db, fx.planner.id, 999).await;
        assert!(matches!(result, Err(Error::NotFound { entity: "event", .. })));
        Ok(())
    }
}
