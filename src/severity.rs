// src/severity.rs - EPICS style alarm severity levels
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TreeError;

/// Alarm severity of a process variable or of a whole subtree
///
/// Levels are totally ordered by [`Severity::level`]. `Unknown` is the lowest
/// value and the baseline every subtree starts from; anything above
/// `NoAlarm` counts as an alarm.
///
/// # Examples
///
/// ```rust
/// use alarmtree::Severity;
///
/// assert!(Severity::Major > Severity::Minor);
/// assert_eq!(Severity::lowest(), Severity::Unknown);
/// assert!(!Severity::NoAlarm.is_alarm());
/// assert_eq!(
///     Severity::highest([Severity::Minor, Severity::Invalid, Severity::NoAlarm]),
///     Severity::Invalid,
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// No data received yet
    Unknown = 0,
    /// Value is within limits
    NoAlarm = 1,
    /// Minor alarm limit violated
    Minor = 2,
    /// Major alarm limit violated
    Major = 3,
    /// Value cannot be trusted
    Invalid = 4,
}

impl Severity {
    /// All severities, lowest first
    pub const ALL: [Severity; 5] = [
        Severity::Unknown,
        Severity::NoAlarm,
        Severity::Minor,
        Severity::Major,
        Severity::Invalid,
    ];

    /// Integer rank used for comparison
    pub const fn level(self) -> u8 {
        self as u8
    }

    /// The lowest severity, used as the neutral aggregate baseline
    pub const fn lowest() -> Self {
        Severity::Unknown
    }

    /// True for every level above `NoAlarm`
    pub const fn is_alarm(self) -> bool {
        self.level() > Severity::NoAlarm.level()
    }

    /// Max-reduction; an empty iterator yields [`Severity::lowest`]
    pub fn highest<I>(severities: I) -> Self
    where
        I: IntoIterator<Item = Severity>,
    {
        severities
            .into_iter()
            .fold(Severity::lowest(), |highest, s| {
                if s.level() > highest.level() { s } else { highest }
            })
    }

    /// EPICS record field spelling
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Unknown => "UNKNOWN",
            Severity::NoAlarm => "NO_ALARM",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Invalid => "INVALID",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::lowest()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Severity::Unknown),
            "NO_ALARM" | "NONE" | "OK" => Ok(Severity::NoAlarm),
            "MINOR" => Ok(Severity::Minor),
            "MAJOR" => Ok(Severity::Major),
            "INVALID" => Ok(Severity::Invalid),
            other => Err(TreeError::Config(format!("Unknown severity '{}'", other))),
        }
    }
}
