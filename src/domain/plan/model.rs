//! Service plan domain entity

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::shared::geo::GeoPoint;

/// How the service is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    /// Provider travels to the seeker
    OnSite,
    /// Delivered remotely
    Remote,
}

impl Default for ServiceMode {
    fn default() -> Self {
        Self::OnSite
    }
}

/// Recurrence pattern for a subscription series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    /// Every day, except the listed weekdays
    Daily { exempt_weekdays: Vec<Weekday> },
    /// Once per week on the given weekday
    Weekly { weekday: Weekday },
}

/// A recurring plan over an inclusive date window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Recurrence {
    /// Expand into the qualifying dates, in ascending order.
    ///
    /// Empty when `end_date < start_date`.
    pub fn expand(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut date = self.start_date;
        while date <= self.end_date {
            let qualifies = match &self.pattern {
                RecurrencePattern::Daily { exempt_weekdays } => {
                    !exempt_weekdays.contains(&date.weekday())
                }
                RecurrencePattern::Weekly { weekday } => date.weekday() == *weekday,
            };
            if qualifies {
                dates.push(date);
            }
            date = match date.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }
}

/// Ephemeral service request: what the seeker wants, where and when
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServicePlan {
    /// Requested service type (matches provider catalogue entries)
    #[validate(length(min = 1))]
    pub service_type: String,
    pub mode: ServiceMode,
    /// Search center
    pub location: GeoPoint,
    pub date: NaiveDate,
    /// Requested units (people, hours, seats — model dependent)
    #[validate(range(min = 1))]
    pub units: u32,
    /// Draw from the reserved priority pool where the slot supports it
    pub priority: bool,
    /// Chosen catalogue option, if any
    pub option_id: Option<String>,
    /// Present for subscription series requests
    pub recurrence: Option<Recurrence>,
}
