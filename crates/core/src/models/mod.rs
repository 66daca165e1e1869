//! Shared domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a resource record asks for help or offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A request for aid.
    Need,
    /// An offer of aid.
    Offer,
}

impl Default for ResourceType {
    fn default() -> Self {
        Self::Need
    }
}

/// Aid category a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ResourceCategory {
    Water,
    Shelter,
    Food,
    Supplies,
    Medical,
    Safety,
}

impl Default for ResourceCategory {
    fn default() -> Self {
        Self::Supplies
    }
}

/// Handling state of a resource. Transitions are free-form; any value may be
/// set at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ResourceStatus {
    Pending,
    Addressing,
    Resolved,
}

/// Ingestion path a resource arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceOrigin {
    /// Posted through the request flow by a signed-in user.
    Request,
    /// Posted directly to the resource board.
    #[default]
    Board,
}

/// A single line item attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceItem {
    /// Item name, e.g. `blankets`.
    pub name: String,
    /// How many are needed or offered.
    pub quantity: u32,
}

/// A need or offer posted by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier within the resource collection.
    pub id: String,
    /// Need or offer.
    #[serde(rename = "type")]
    pub kind: ResourceType,
    /// Aid category.
    pub category: ResourceCategory,
    /// Short human-readable title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Where the need/offer applies.
    pub location: String,
    /// Optional extra location detail (landmark, floor, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_detail: Option<String>,
    /// Optional contact information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    /// Marks the record as urgent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    /// Creation time, immutable after the record is issued.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Handling state, absent for records that were never triaged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
    /// Who is working on the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Rough head count affected by the need.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people_affected: Option<u32>,
    /// Owning user id, set when posted while signed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Owning user display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Itemised contents of the need/offer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ResourceItem>>,
    /// Ingestion provenance.
    #[serde(default)]
    pub origin: ResourceOrigin,
}

impl Resource {
    /// Returns a user-facing label combining title and location.
    pub fn display_name(&self) -> String {
        if self.location.is_empty() {
            self.title.clone()
        } else {
            format!("{} ({})", self.title, self.location)
        }
    }
}

/// Input for a new resource; id, creation time and provenance are assigned by
/// the store.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct ResourceDraft {
    pub kind: ResourceType,
    pub category: ResourceCategory,
    pub title: String,
    pub description: String,
    pub location: String,
    pub location_detail: Option<String>,
    pub contact: Option<String>,
    pub urgent: Option<bool>,
    pub status: Option<ResourceStatus>,
    pub assigned_to: Option<String>,
    pub people_affected: Option<u32>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub items: Option<Vec<ResourceItem>>,
}

impl ResourceDraft {
    pub(crate) fn into_resource(
        self,
        id: String,
        created_at: DateTime<Utc>,
        origin: ResourceOrigin,
    ) -> Resource {
        Resource {
            id,
            kind: self.kind,
            category: self.category,
            title: self.title,
            description: self.description,
            location: self.location,
            location_detail: self.location_detail,
            contact: self.contact,
            urgent: self.urgent,
            created_at,
            status: self.status,
            assigned_to: self.assigned_to,
            people_affected: self.people_affected,
            user_id: self.user_id,
            username: self.username,
            items: self.items,
            origin,
        }
    }
}

/// Whether a response offers aid for a request or asks for more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ResponseType {
    Offer,
    Request,
}

/// Review state of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ResponseStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A reply linking a responding user to a resource request. Stored in the
/// responding user's partition; id unique within it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceResponse {
    /// Unique identifier within the owning user's partition.
    pub id: String,
    /// Id of the resource being responded to.
    pub request_id: String,
    /// Offer or follow-up request.
    #[serde(rename = "type")]
    pub kind: ResponseType,
    /// Aid category, mirrored from the parent request.
    pub category: ResourceCategory,
    /// Short human-readable title.
    pub title: String,
    /// Creation time, immutable after the record is issued.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Review state.
    pub status: ResponseStatus,
}

/// Input for a new response; id and creation time are assigned by the store.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct ResponseDraft {
    pub request_id: String,
    pub kind: ResponseType,
    pub category: ResourceCategory,
    pub title: String,
    pub status: ResponseStatus,
}

impl ResponseDraft {
    pub(crate) fn into_response(self, id: String, created_at: DateTime<Utc>) -> ResourceResponse {
        ResourceResponse {
            id,
            request_id: self.request_id,
            kind: self.kind,
            category: self.category,
            title: self.title,
            created_at,
            status: self.status,
        }
    }
}

/// Partial update applied to a stored response. Unset fields are preserved.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct ResponseUpdate {
    pub status: Option<ResponseStatus>,
    pub title: Option<String>,
}

impl ResponseUpdate {
    pub(crate) fn apply(&self, response: &mut ResourceResponse) {
        if let Some(status) = self.status {
            response.status = status;
        }
        if let Some(title) = &self.title {
            response.title = title.clone();
        }
    }
}

/// One message in a per-contact chat log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Identifier within the conversation log.
    pub id: String,
    /// User id of the sender.
    pub sender_id: String,
    /// Message body.
    pub body: String,
    /// Send time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Directory entry for a reachable volunteer or organisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Stable user id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role within the relief effort.
    pub role: crate::session::UserRole,
    /// Optional area of operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Optional contact information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}
