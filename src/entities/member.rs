use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, validation_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Passenger,
    Driver,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Passenger => "passenger",
            Self::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passenger" => Ok(Self::Passenger),
            "driver" => Ok(Self::Driver),
            _ => Err(invalid_input_error("Invalid role")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The identity of a ride's counterpart, attached to ride listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
}

impl From<&Member> for MemberSummary {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
            phone: member.phone.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Option<String>,
}

impl SignUpRequest {
    /// Collects every field problem at once, keyed by the request field name.
    pub fn validate(self) -> Result<Member, Error> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut reject = |field: &str, message: &str| {
            errors
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        };

        let name = self.name.unwrap_or_default().trim().to_string();
        if name.chars().count() < 2 {
            reject("name", "Name must be at least 2 characters");
        }

        let email = self.email.unwrap_or_default().trim().to_lowercase();
        if !is_email(&email) {
            reject("email", "Invalid email address");
        }

        let phone = self.phone_number.unwrap_or_default().trim().to_string();
        if phone.chars().count() < 10 {
            reject("phoneNumber", "Phone number must be at least 10 digits");
        }

        let role = self.role.as_deref().and_then(|role| role.parse::<Role>().ok());
        if role.is_none() {
            reject("role", "Please select a role");
        }

        match role {
            Some(role) if errors.is_empty() => Ok(Member {
                id: Uuid::new_v4(),
                name,
                email,
                phone,
                role,
                created_at: Utc::now(),
            }),
            _ => Err(validation_error(errors)),
        }
    }
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}
