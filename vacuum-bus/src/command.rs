//! Typed command wrappers over [`crate::DeviceBus::send_command`] (spec §4.5).

use crate::error::BusError;
use crate::DeviceBus;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Status {
    pub state: i64,
    pub battery: i64,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub fan_power: Option<i64>,
    #[serde(default)]
    pub clean_area: Option<i64>,
    #[serde(default)]
    pub clean_time: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DndTimer {
    pub enabled: i64,
    pub start_hour: i64,
    pub start_minute: i64,
    pub end_hour: i64,
    pub end_minute: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CleanSummary {
    #[serde(default)]
    pub clean_time: i64,
    #[serde(default)]
    pub clean_area: i64,
    #[serde(default)]
    pub records: Vec<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CleanRecord {
    pub begin: i64,
    pub end: i64,
    pub duration: i64,
    pub area: i64,
    #[serde(default)]
    pub error: i64,
    #[serde(default)]
    pub complete: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Consumable {
    pub main_brush_work_time: i64,
    pub side_brush_work_time: i64,
    pub filter_work_time: i64,
    pub sensor_dirty_time: i64,
}

/// Aggregate result of [`get_prop`] — present whenever at least one of the
/// four underlying queries succeeded.
#[derive(Clone, Debug, Default)]
pub struct DeviceProp {
    pub status: Option<Status>,
    pub dnd_timer: Option<DndTimer>,
    pub clean_summary: Option<CleanSummary>,
    pub consumable: Option<Consumable>,
    pub last_clean_record: Option<CleanRecord>,
}

impl DeviceBus {
    pub async fn get_status(&self) -> Result<Status, BusError> {
        self.call("get_status", &[]).await
    }

    pub async fn get_dnd_timer(&self) -> Result<DndTimer, BusError> {
        self.call("get_dnd_timer", &[]).await
    }

    pub async fn get_clean_summary(&self) -> Result<CleanSummary, BusError> {
        self.call("get_clean_summary", &[]).await
    }

    pub async fn get_clean_record(&self, id: i64) -> Result<CleanRecord, BusError> {
        self.call("get_clean_record", &[serde_json::json!(id)]).await
    }

    pub async fn get_consumable(&self) -> Result<Consumable, BusError> {
        self.call("get_consumable", &[]).await
    }

    pub async fn app_start(&self) -> Result<(), BusError> {
        self.call_no_response("app_start", &[]).await
    }

    pub async fn app_stop(&self) -> Result<(), BusError> {
        self.call_no_response("app_stop", &[]).await
    }

    pub async fn app_charge(&self) -> Result<(), BusError> {
        self.call_no_response("app_charge", &[]).await
    }

    pub async fn set_custom_mode(&self, fan_power: i64) -> Result<(), BusError> {
        self.call_no_response("set_custom_mode", &[serde_json::json!(fan_power)]).await
    }

    /// Composite query: fan out the first four calls concurrently, then —
    /// only if the clean summary reports at least one record — fetch the
    /// most recent one. Degrades gracefully: returns `Some` unless every
    /// sub-call failed.
    pub async fn get_prop(&self) -> Option<DeviceProp> {
        let (status, dnd_timer, clean_summary, consumable) = tokio::join!(
            self.get_status(),
            self.get_dnd_timer(),
            self.get_clean_summary(),
            self.get_consumable(),
        );

        let status = status.ok();
        let dnd_timer = dnd_timer.ok();
        let clean_summary = clean_summary.ok();
        let consumable = consumable.ok();

        if status.is_none() && dnd_timer.is_none() && clean_summary.is_none() && consumable.is_none() {
            return None;
        }

        let last_clean_record = match clean_summary.as_ref().and_then(|s| s.records.first()) {
            Some(&id) => self.get_clean_record(id).await.ok(),
            None => None,
        };

        Some(DeviceProp { status, dnd_timer, clean_summary, consumable, last_clean_record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_records_means_no_last_clean_record_lookup() {
        let summary = CleanSummary { clean_time: 0, clean_area: 0, records: vec![] };
        assert!(summary.records.first().is_none());
    }
}
