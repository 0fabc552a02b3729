//! Closed enumerations parsed once at the configuration/JSON boundary.
//!
//! Every enum parses case-insensitively and rejects unknown values with a
//! [`GateError::Configuration`]. Serde uses the same parser, so an unknown
//! severity in a service response fails deserialization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::GateError;

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = GateError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(GateError::Configuration(format!(
                        "unrecognized {} '{}' (expected one of: {})",
                        $label,
                        other,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = GateError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_enum! {
    /// Violation severity, ordered `Low < Medium < High < Critical`.
    Severity, "severity" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

closed_enum! {
    /// Minimum finding severity at which the service flags human review.
    ReviewThreshold, "human review threshold" {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

closed_enum! {
    /// Execution mode requested from the service.
    Mode, "mode" {
        Validate => "validate",
        Audit => "audit",
        Monitor => "monitor",
    }
}

closed_enum! {
    /// Console output format for the build step.
    OutputFormat, "output format" {
        Json => "json",
        Summary => "summary",
        All => "all",
    }
}

impl Severity {
    /// Position in the severity order (`low` = 0 .. `critical` = 3).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Icon used in human-readable reports.
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Critical => "🔴",
            Severity::High => "🟠",
            Severity::Medium => "🟡",
            Severity::Low => "🔵",
        }
    }
}

impl OutputFormat {
    pub fn shows_summary(&self) -> bool {
        matches!(self, OutputFormat::Summary | OutputFormat::All)
    }

    pub fn shows_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(Severity::Low.index(), 0);
        assert_eq!(Severity::Critical.index(), 3);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert_eq!(" Audit ".parse::<Mode>().unwrap(), Mode::Audit);
        assert_eq!("All".parse::<OutputFormat>().unwrap(), OutputFormat::All);
    }

    #[test]
    fn test_unknown_value_is_configuration_error() {
        let err = "extreme".parse::<Severity>().unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
        assert!(err.to_string().contains("extreme"));

        assert!("critical".parse::<ReviewThreshold>().is_err());
        assert!("enforce".parse::<Mode>().is_err());
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");

        let parsed: Severity = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(parsed, Severity::Medium);

        assert!(serde_json::from_str::<Severity>("\"urgent\"").is_err());
    }

    #[test]
    fn test_output_format_flags() {
        assert!(OutputFormat::Json.shows_json());
        assert!(!OutputFormat::Json.shows_summary());
        assert!(OutputFormat::Summary.shows_summary());
        assert!(OutputFormat::All.shows_json() && OutputFormat::All.shows_summary());
    }
}
