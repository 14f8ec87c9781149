//! Organization membership - links a user to an organization with a role.
//!
//! Roles are stored as plain strings; [`MemberRole`] is the typed view used by
//! the permission check.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role a member holds within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    /// Created the organization
    Owner,
    /// Full administrative access
    Admin,
    /// Manages events, budgets and approvals
    Planner,
    /// Ordinary member, no management rights
    Member,
}

impl MemberRole {
    /// Value stored in the `role` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Planner => "planner",
            Self::Member => "member",
        }
    }

    /// Parses a stored `role` value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "planner" => Some(Self::Planner),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    /// Whether this role may edit budgets and decide on itineraries.
    #[must_use]
    pub const fn can_manage_events(self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Planner)
    }
}

/// Organization membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organization_members")]
pub struct Model {
    /// Unique identifier for the membership
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Organization the user belongs to
    #[sea_orm(indexed)]
    pub organization_id: i64,
    /// Member user
    pub user_id: i64,
    /// One of `owner`, `admin`, `planner`, `member`
    pub role: String,
}

impl Model {
    /// Typed role; unknown stored values grant nothing.
    #[must_use]
    pub fn role(&self) -> Option<MemberRole> {
        MemberRole::parse(&self.role)
    }
}

/// Defines relationships between membership rows and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one organization
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id"
    )]
    Organization,
    /// Each membership belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
