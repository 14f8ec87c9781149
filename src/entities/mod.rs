//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod attendee;
pub mod event;
pub mod event_budget_audit_log;
pub mod event_group;
pub mod itinerary;
pub mod organization;
pub mod organization_member;
pub mod user;

// Re-export specific types to avoid conflicts
pub use attendee::{Column as AttendeeColumn, Entity as Attendee, Model as AttendeeModel};
pub use event::{Column as EventColumn, Entity as Event, Model as EventModel};
pub use event_budget_audit_log::{
    Column as EventBudgetAuditLogColumn, Entity as EventBudgetAuditLog,
    Model as EventBudgetAuditLogModel,
};
pub use event_group::{Column as EventGroupColumn, Entity as EventGroup, Model as EventGroupModel};
pub use itinerary::{Column as ItineraryColumn, Entity as Itinerary, Model as ItineraryModel};
pub use organization::{
    Column as OrganizationColumn, Entity as Organization, Model as OrganizationModel,
};
pub use organization_member::{
    Column as OrganizationMemberColumn, Entity as OrganizationMember,
    Model as OrganizationMemberModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
