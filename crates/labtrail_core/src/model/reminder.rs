//! Reminder schedule attached to a project, hypothesis or experiment.
//!
//! # Invariants
//! - `parent.kind` is one of Project, Hypothesis, Experiment.
//! - `hour < 24`, `minute < 60`, weekdays are ISO numbers `1..=7`.
//! - `days_of_week` is only meaningful for `ReminderFrequency::Weekly`.

use crate::model::record::{Entity, EntityKind, ParentRef, RecordMeta, ValidationError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderFrequency {
    Daily,
    Weekdays,
    Weekly,
}

impl ReminderFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekdays => "weekdays",
            Self::Weekly => "weekly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "weekdays" => Some(Self::Weekdays),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSetting {
    pub meta: RecordMeta,
    pub parent: ParentRef,
    pub frequency: ReminderFrequency,
    pub hour: u8,
    pub minute: u8,
    /// ISO weekdays (Monday = 1) for weekly reminders, sorted.
    pub days_of_week: Vec<u8>,
    pub enabled: bool,
}

impl ReminderSetting {
    pub fn daily(parent: ParentRef, hour: u8, minute: u8) -> Self {
        Self {
            meta: RecordMeta::default(),
            parent,
            frequency: ReminderFrequency::Daily,
            hour,
            minute,
            days_of_week: Vec::new(),
            enabled: true,
        }
    }

    pub fn weekly(parent: ParentRef, hour: u8, minute: u8, days_of_week: Vec<u8>) -> Self {
        let mut days_of_week = days_of_week;
        days_of_week.sort_unstable();
        days_of_week.dedup();
        Self {
            frequency: ReminderFrequency::Weekly,
            days_of_week,
            ..Self::daily(parent, hour, minute)
        }
    }

    /// Comma-separated weekday list as stored locally and remotely.
    pub fn days_to_text(&self) -> String {
        self.days_of_week
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parses a stored weekday list; `None` when any entry is not a number.
    pub fn days_from_text(value: &str) -> Option<Vec<u8>> {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u8>().ok())
            .collect()
    }
}

impl Entity for ReminderSetting {
    const KIND: EntityKind = EntityKind::ReminderSetting;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn parent(&self) -> Option<ParentRef> {
        Some(self.parent)
    }

    fn dedup_key(&self) -> Cow<'_, str> {
        Cow::Owned(format!(
            "{}@{:02}:{:02}",
            self.frequency.as_str(),
            self.hour,
            self.minute
        ))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !self.parent.kind.accepts_reminders() {
            return Err(ValidationError::InvalidParentKind(self.parent.kind));
        }
        if self.hour >= 24 {
            return Err(ValidationError::OutOfRange {
                field: "hour",
                value: i64::from(self.hour),
            });
        }
        if self.minute >= 60 {
            return Err(ValidationError::OutOfRange {
                field: "minute",
                value: i64::from(self.minute),
            });
        }
        if let Some(day) = self.days_of_week.iter().find(|day| !(1..=7).contains(*day)) {
            return Err(ValidationError::OutOfRange {
                field: "days_of_week",
                value: i64::from(*day),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ReminderSetting;
    use crate::model::record::{Entity, ParentRef, ValidationError};

    #[test]
    fn weekly_sorts_and_dedups_days() {
        let reminder = ReminderSetting::weekly(ParentRef::project(1), 8, 30, vec![5, 1, 5, 3]);
        assert_eq!(reminder.days_of_week, vec![1, 3, 5]);
        assert_eq!(reminder.days_to_text(), "1,3,5");
        assert_eq!(ReminderSetting::days_from_text("1,3,5"), Some(vec![1, 3, 5]));
        assert_eq!(ReminderSetting::days_from_text(""), Some(vec![]));
        assert_eq!(ReminderSetting::days_from_text("1,x"), None);
    }

    #[test]
    fn validate_rejects_log_entry_parent_and_bad_time() {
        let mut reminder = ReminderSetting::daily(ParentRef::project(1), 25, 0);
        assert!(matches!(
            reminder.validate(),
            Err(ValidationError::OutOfRange { field: "hour", .. })
        ));

        reminder.hour = 7;
        reminder.parent = ParentRef::new(crate::model::EntityKind::LogEntry, 3);
        assert!(matches!(
            reminder.validate(),
            Err(ValidationError::InvalidParentKind(_))
        ));
    }
}
