use serde::{Deserialize, Serialize};

use crate::queue::ValidationError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// The `else` form adds a catch-all variant: unrecognised strings map to it
/// instead of failing, both through `FromStr` and through serde.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
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
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ValidationError::InvalidEnum {
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
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? } else $fallback:ident => $fs:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant,)+
            #[serde(rename = $fs, other)]
            $fallback,
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                    Self::$fallback => $fs,
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($s => Self::$variant,)+
                    _ => Self::$fallback,
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(
    /// Booking category of a visit.
    AppointmentType {
        Regular => "regular",
        FollowUp => "follow-up",
        Urgent => "urgent",
        Specialist => "specialist",
    } else Unknown => "unknown"
);

impl AppointmentType {
    /// Relative weight shared by the feature vector and the priority score.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Regular => 1.0,
            Self::FollowUp => 1.2,
            Self::Urgent => 1.8,
            Self::Specialist => 1.5,
            Self::Unknown => 1.0,
        }
    }
}

str_enum!(
    AgeGroup {
        Child => "child",
        Adult => "adult",
        Senior => "senior",
    } else Unknown => "unknown"
);

impl AgeGroup {
    pub fn weight(&self) -> f64 {
        match self {
            Self::Adult => 1.0,
            Self::Senior => 1.3,
            Self::Child => 1.4,
            Self::Unknown => 1.0,
        }
    }
}

str_enum!(
    /// Lifecycle state reported by the patient data source.
    PatientStatus {
        Waiting => "waiting",
        InProgress => "in-progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

impl Default for PatientStatus {
    fn default() -> Self {
        Self::Waiting
    }
}
