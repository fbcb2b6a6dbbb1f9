use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{check_finite, check_optional_len, clean_optional, clean_required};
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Meters above sea level
    pub altitude: Option<f64>,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub zone: Option<String>,
    pub responsible_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Bumped on every committed change
    pub version: u64,
}

/// Create/replace payload for a location.
///
/// On update every optional attribute is replaced: omitting a field clears it.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LocationInput {
    pub name: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub zone: Option<String>,
    pub responsible_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Expected current version; a mismatch on update is reported as a conflict
    pub version: Option<u64>,
}

impl LocationInput {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Normalize free-text fields and reject out-of-domain values.
    pub fn validate(self) -> Result<Self, CoreError> {
        let name = clean_required("name", &self.name, 100)?;
        let description = clean_optional(self.description);
        let building = clean_optional(self.building);
        let floor = clean_optional(self.floor);
        let room = clean_optional(self.room);
        let zone = clean_optional(self.zone);
        let responsible_person = clean_optional(self.responsible_person);
        let phone = clean_optional(self.phone);
        let email = clean_optional(self.email);

        check_optional_len("building", building.as_ref(), 100)?;
        check_optional_len("floor", floor.as_ref(), 50)?;
        check_optional_len("room", room.as_ref(), 100)?;
        check_optional_len("zone", zone.as_ref(), 100)?;
        check_optional_len("responsible_person", responsible_person.as_ref(), 100)?;
        check_optional_len("phone", phone.as_ref(), 20)?;
        check_optional_len("email", email.as_ref(), 100)?;

        if let Some(e) = &email
            && !e.contains('@')
        {
            return Err(CoreError::validation("email must contain '@'"));
        }

        check_finite("latitude", self.latitude)?;
        check_finite("longitude", self.longitude)?;
        check_finite("altitude", self.altitude)?;
        if self.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
            return Err(CoreError::validation("latitude must be within [-90, 90]"));
        }
        if self.longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
            return Err(CoreError::validation("longitude must be within [-180, 180]"));
        }

        Ok(Self {
            name,
            description,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            building,
            floor,
            room,
            zone,
            responsible_person,
            phone,
            email,
            version: self.version,
        })
    }

    /// Build a new location from a validated payload.
    #[must_use]
    pub fn into_location(self, id: Uuid, now: DateTime<Utc>) -> Location {
        Location {
            id,
            name: self.name,
            description: self.description,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            building: self.building,
            floor: self.floor,
            room: self.room,
            zone: self.zone,
            responsible_person: self.responsible_person,
            phone: self.phone,
            email: self.email,
            created_at: now,
            updated_at: None,
            version: 0,
        }
    }

    /// Replace every mutable attribute of `current`, keeping identity and bookkeeping.
    #[must_use]
    pub fn apply_to(self, current: &Location, now: DateTime<Utc>) -> Location {
        Location {
            id: current.id,
            created_at: current.created_at,
            updated_at: Some(now),
            version: current.version,
            ..self.into_location(current.id, now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_and_clears_blank_fields() {
        let input = LocationInput {
            name: "  Lab 1 ".into(),
            building: Some("   ".into()),
            room: Some(" 101 ".into()),
            ..LocationInput::default()
        }
        .validate()
        .unwrap();

        assert_eq!(input.name, "Lab 1");
        assert_eq!(input.building, None);
        assert_eq!(input.room.as_deref(), Some("101"));
    }

    #[test]
    fn validate_rejects_blank_name_and_bad_coordinates() {
        assert!(LocationInput::named("   ").validate().is_err());

        let input = LocationInput {
            latitude: Some(91.0),
            ..LocationInput::named("North")
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn apply_to_replaces_optional_attributes() {
        let now = Utc::now();
        let original = LocationInput {
            building: Some("B".into()),
            ..LocationInput::named("Hall")
        }
        .into_location(Uuid::new_v4(), now);

        let replaced = LocationInput::named("Hall").apply_to(&original, now);

        assert_eq!(replaced.id, original.id);
        assert_eq!(replaced.building, None);
        assert_eq!(replaced.created_at, original.created_at);
        assert!(replaced.updated_at.is_some());
    }
}
