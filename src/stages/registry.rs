//! Static per-actor stage tables.

use serde::{Deserialize, Serialize};

/// The onboarding roles. Each has its own fixed, linear stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Driver,
    Restaurant,
}

impl ActorType {
    /// Collection segment used by the registration service, e.g. `drivers-staged`.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Driver => "drivers-staged",
            Self::Restaurant => "restaurants-staged",
        }
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver => write!(f, "driver"),
            Self::Restaurant => write!(f, "restaurant"),
        }
    }
}

impl std::str::FromStr for ActorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driver" => Ok(Self::Driver),
            "restaurant" => Ok(Self::Restaurant),
            other => Err(format!("unknown actor type: {other}")),
        }
    }
}

/// How a single required field is judged complete.
///
/// Chosen explicitly per field when the stage table is written; nothing is
/// inferred from the field's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    /// Present, non-null, and not an empty string. Also used for uploaded
    /// document URLs and date strings.
    Required { field: &'static str },
    /// A nested group whose listed keys must each satisfy `Required`.
    RequiredComposite {
        field: &'static str,
        keys: &'static [&'static str],
    },
    /// Must be exactly `true`.
    RequiredBoolean { field: &'static str },
    /// Never blocks completion (free-text notes and the like).
    AlwaysSatisfied { field: &'static str },
}

impl FieldRule {
    pub fn field(&self) -> &'static str {
        match *self {
            Self::Required { field }
            | Self::RequiredComposite { field, .. }
            | Self::RequiredBoolean { field }
            | Self::AlwaysSatisfied { field } => field,
        }
    }
}

/// One numbered step of an actor's onboarding sequence.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDefinition {
    pub stage_number: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub required_fields: &'static [FieldRule],
}

const fn required(field: &'static str) -> FieldRule {
    FieldRule::Required { field }
}

const fn consent(field: &'static str) -> FieldRule {
    FieldRule::RequiredBoolean { field }
}

const fn optional(field: &'static str) -> FieldRule {
    FieldRule::AlwaysSatisfied { field }
}

const BANKING_KEYS: &[&str] = &["transitNumber", "institutionNumber", "accountNumber"];

const DRIVER_STAGES: &[StageDefinition] = &[
    StageDefinition {
        stage_number: 1,
        title: "Personal Information",
        description: "Your name, contact details, and home address",
        required_fields: &[
            required("firstName"),
            required("lastName"),
            required("email"),
            required("phone"),
            required("dateOfBirth"),
            required("streetAddress"),
            required("city"),
            required("province"),
            required("postalCode"),
        ],
    },
    StageDefinition {
        stage_number: 2,
        title: "Vehicle & License",
        description: "The vehicle you deliver with and your driver's license",
        required_fields: &[
            required("vehicleType"),
            required("vehicleMake"),
            required("vehicleModel"),
            required("vehicleYear"),
            required("licensePlate"),
            required("driversLicenseNumber"),
            required("driversLicenseExpiryDate"),
        ],
    },
    StageDefinition {
        stage_number: 3,
        title: "Documents",
        description: "License, registration, and insurance uploads",
        required_fields: &[
            required("driversLicenseFrontUrl"),
            required("driversLicenseBackUrl"),
            required("vehicleRegistrationUrl"),
            required("insuranceProofUrl"),
            required("insuranceExpiryDate"),
        ],
    },
    StageDefinition {
        stage_number: 4,
        title: "Banking & Tax",
        description: "Where your earnings are deposited",
        required_fields: &[
            required("sinNumber"),
            FieldRule::RequiredComposite {
                field: "bankingInfo",
                keys: BANKING_KEYS,
            },
        ],
    },
    StageDefinition {
        stage_number: 5,
        title: "Background Check & Agreement",
        description: "Consent to a background check and accept the driver agreement",
        required_fields: &[
            required("criminalRecordCheckUrl"),
            consent("backgroundCheckConsent"),
            optional("additionalNotes"),
            consent("termsAccepted"),
        ],
    },
];

const RESTAURANT_STAGES: &[StageDefinition] = &[
    StageDefinition {
        stage_number: 1,
        title: "Business Information",
        description: "Legal name, contact details, and location",
        required_fields: &[
            required("businessName"),
            required("businessEmail"),
            required("businessPhone"),
            required("streetAddress"),
            required("city"),
            required("province"),
            required("postalCode"),
        ],
    },
    StageDefinition {
        stage_number: 2,
        title: "Owner Information",
        description: "The person responsible for the account",
        required_fields: &[
            required("ownerFirstName"),
            required("ownerLastName"),
            required("ownerEmail"),
            required("ownerPhone"),
        ],
    },
    StageDefinition {
        stage_number: 3,
        title: "Business Documents",
        description: "Licensing and food safety certification",
        required_fields: &[
            required("businessLicenseUrl"),
            required("businessLicenseExpiryDate"),
            required("foodHandlingCertificateUrl"),
            required("hstNumber"),
        ],
    },
    StageDefinition {
        stage_number: 4,
        title: "Banking Information",
        description: "Where payouts are deposited",
        required_fields: &[
            FieldRule::RequiredComposite {
                field: "bankingInfo",
                keys: BANKING_KEYS,
            },
            required("voidChequeUrl"),
        ],
    },
    StageDefinition {
        stage_number: 5,
        title: "Menu & Operations",
        description: "Cuisine, menu, and opening hours",
        required_fields: &[
            required("cuisineType"),
            required("menuUrl"),
            required("operatingHours"),
            optional("specialInstructions"),
        ],
    },
    StageDefinition {
        stage_number: 6,
        title: "Review & Agreement",
        description: "Accept the partner agreement and commission terms",
        required_fields: &[
            consent("commissionAgreementAccepted"),
            consent("termsAccepted"),
            optional("additionalNotes"),
        ],
    },
];

/// Ordered stage definitions for an actor type.
pub fn definitions_for(actor: ActorType) -> &'static [StageDefinition] {
    match actor {
        ActorType::Driver => DRIVER_STAGES,
        ActorType::Restaurant => RESTAURANT_STAGES,
    }
}

/// Look up a single stage, if `stage_number` exists for the actor.
pub fn definition(actor: ActorType, stage_number: u32) -> Option<&'static StageDefinition> {
    definitions_for(actor)
        .iter()
        .find(|d| d.stage_number == stage_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_numbers_are_dense_and_one_based() {
        for actor in [ActorType::Driver, ActorType::Restaurant] {
            for (i, def) in definitions_for(actor).iter().enumerate() {
                assert_eq!(def.stage_number as usize, i + 1, "{actor} stage {i}");
                assert!(!def.required_fields.is_empty());
            }
        }
    }

    #[test]
    fn driver_has_five_stages() {
        assert_eq!(definitions_for(ActorType::Driver).len(), 5);
        assert_eq!(definitions_for(ActorType::Restaurant).len(), 6);
    }

    #[test]
    fn definition_lookup() {
        assert_eq!(
            definition(ActorType::Driver, 4).map(|d| d.title),
            Some("Banking & Tax")
        );
        assert!(definition(ActorType::Driver, 0).is_none());
        assert!(definition(ActorType::Driver, 6).is_none());
    }

    #[test]
    fn actor_display_matches_serde_and_parse() {
        for actor in [ActorType::Driver, ActorType::Restaurant] {
            let display = actor.to_string();
            let json = serde_json::to_string(&actor).unwrap();
            assert_eq!(format!("\"{display}\""), json);
            assert_eq!(display.parse::<ActorType>().unwrap(), actor);
        }
        assert!("courier".parse::<ActorType>().is_err());
    }

    #[test]
    fn collection_segment() {
        assert_eq!(ActorType::Driver.collection(), "drivers-staged");
        assert_eq!(ActorType::Restaurant.collection(), "restaurants-staged");
    }

    #[test]
    fn rule_field_names() {
        let rule = FieldRule::RequiredComposite {
            field: "bankingInfo",
            keys: BANKING_KEYS,
        };
        assert_eq!(rule.field(), "bankingInfo");
        assert_eq!(optional("notes").field(), "notes");
    }
}
