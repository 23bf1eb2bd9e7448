//! Crawl status and control signal enums.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Outcome state of a URL, persisted as its integer code.
///
/// The order is not a strict progression: a recurring source can go from
/// any terminal state back to RUNNING when its schedule comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlStatus {
    Pending,
    Running,
    Success,
    TempFail,
    PermFail,
    Skipped,
    Stopped,
}

impl CrawlStatus {
    pub const ALL: [CrawlStatus; 7] = [
        Self::Pending,
        Self::Running,
        Self::Success,
        Self::TempFail,
        Self::PermFail,
        Self::Skipped,
        Self::Stopped,
    ];

    pub fn code(&self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Success => 2,
            Self::TempFail => 3,
            Self::PermFail => 4,
            Self::Skipped => 5,
            Self::Stopped => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::TempFail => "TEMP_FAIL",
            Self::PermFail => "PERM_FAIL",
            Self::Skipped => "SKIPPED",
            Self::Stopped => "STOPPED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|st| st.as_str() == upper)
    }

    /// Terminal for one-shot resources: never retried automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::PermFail | Self::Skipped | Self::Stopped
        )
    }

    /// Counted in the dashboard's `failed` column.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TempFail | Self::PermFail)
    }
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CrawlStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Accepts either the integer code (what remote workers send) or the name.
impl<'de> Deserialize<'de> for CrawlStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(i64),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Code(code) => Self::from_code(code)
                .ok_or_else(|| D::Error::custom(format!("unknown crawl status code: {}", code))),
            Repr::Name(name) => Self::from_str(&name)
                .ok_or_else(|| D::Error::custom(format!("unknown crawl status: {}", name))),
        }
    }
}

impl ToSql for CrawlStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for CrawlStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = i64::column_result(value)?;
        Self::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

/// Flow-control signal read by every interruptible wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlSignal {
    #[default]
    Normal,
    /// Suspend waits until resumed.
    Pause,
    /// Cut the current wait short, once.
    Immediate,
}

impl ControlSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Pause => "PAUSE",
            Self::Immediate => "IMMEDIATE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NORMAL" => Some(Self::Normal),
            "PAUSE" => Some(Self::Pause),
            "IMMEDIATE" => Some(Self::Immediate),
            _ => None,
        }
    }
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
