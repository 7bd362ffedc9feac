use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Organizer,
    Attendee,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "organizer" => Ok(Role::Organizer),
            "attendee" => Ok(Role::Attendee),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// An authenticated user as forwarded by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: Uuid,
    pub roles: Vec<Role>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// Who is making the call. Passed explicitly into every service operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    User(Identity),
}

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Caller::Anonymous => None,
            Caller::User(identity) => Some(identity),
        }
    }

    pub fn subject_id(&self) -> Option<Uuid> {
        self.identity().map(|identity| identity.subject_id)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.identity()
            .map(|identity| identity.roles.contains(&role))
            .unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Admins manage every event; organizers manage the ones they own.
    pub fn can_manage_event(&self, organizer_id: Option<Uuid>) -> bool {
        if self.is_admin() {
            return true;
        }
        self.has_role(Role::Organizer)
            && organizer_id.is_some()
            && organizer_id == self.subject_id()
    }
}
