use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The serde representation matches `as_str`, so JSON and SQLite agree.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(RiskLevel {
    Low => "Low",
    Medium => "Medium",
    High => "High",
});

str_enum!(DoseStatus {
    Taken => "taken",
    Skipped => "skipped",
});

str_enum!(MedicationFrequency {
    OnceDaily => "once daily",
    TwiceDaily => "twice daily",
    ThriceDaily => "thrice daily",
    AsNeeded => "as needed",
});

str_enum!(SenderRole {
    Patient => "patient",
    Doctor => "doctor",
});

str_enum!(NotificationType {
    MedicationReminder => "medication_reminder",
    AiWarning => "ai_warning",
    DoctorInstruction => "doctor_instruction",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn risk_level_round_trip() {
        for (variant, s) in [
            (RiskLevel::Low, "Low"),
            (RiskLevel::Medium, "Medium"),
            (RiskLevel::High, "High"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(RiskLevel::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn frequency_uses_spaced_labels() {
        assert_eq!(MedicationFrequency::TwiceDaily.as_str(), "twice daily");
        assert_eq!(
            MedicationFrequency::from_str("as needed").unwrap(),
            MedicationFrequency::AsNeeded
        );
    }

    #[test]
    fn serde_matches_as_str() {
        let json = serde_json::to_string(&NotificationType::AiWarning).unwrap();
        assert_eq!(json, "\"ai_warning\"");
        let status: DoseStatus = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(status, DoseStatus::Skipped);
    }

    #[test]
    fn invalid_enum_value_errors() {
        let err = RiskLevel::from_str("Critical").unwrap_err();
        assert!(err.to_string().contains("RiskLevel"));
        assert!(DoseStatus::from_str("TAKEN").is_err());
    }
}
