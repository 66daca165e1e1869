#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

/// Role a user acts under within the relief effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Victim,
    Volunteer,
    Ngo,
    Government,
    Admin,
}

impl UserRole {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Profile of an authenticated user, held as the current session and
/// persisted under the session partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_volunteer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Patch applied to the externally stored profile and the held session.
/// Only the listed fields may change; unset fields are preserved.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_volunteer: Option<bool>,
}

impl ProfileUpdate {
    pub(crate) fn apply(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(role) = self.role {
            profile.role = role;
        }
        if let Some(image) = &self.profile_image {
            profile.profile_image = Some(image.clone());
        }
        if let Some(can_volunteer) = self.can_volunteer {
            profile.can_volunteer = Some(can_volunteer);
        }
    }
}
