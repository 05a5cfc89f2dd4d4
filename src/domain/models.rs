use serde::{Deserialize, Deserializer, Serialize};

/// A stored enphase telemetry row. Every column is exposed by name on the
/// wire; `create_date` and `update_date` are RFC 3339 UTC strings stamped by
/// the service layer, never by SQLite defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyRecord {
    pub id: i64,
    pub system_id: i64,
    pub current_power: i64,
    pub energy_lifetime: i64,
    pub energy_today: i64,
    pub last_interval_end_at: i64,
    pub last_report_at: i64,
    pub modules: i64,
    pub operational_at: i64,
    pub size_w: i64,
    pub status: String,
    pub summary_date: String,
    pub events: Option<String>,
    pub alarms: Option<String>,
    pub create_date: String,
    pub update_date: String,
}

/// Create/replace payload: the record schema minus `id` and the timestamps.
/// Used by both POST and PUT; on PUT an absent optional field overwrites the
/// stored value with NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnergyRecord {
    pub system_id: i64,
    pub current_power: i64,
    pub energy_lifetime: i64,
    pub energy_today: i64,
    pub last_interval_end_at: i64,
    pub last_report_at: i64,
    pub modules: i64,
    pub operational_at: i64,
    pub size_w: i64,
    pub status: String,
    pub summary_date: String,
    #[serde(default)]
    pub events: Option<String>,
    #[serde(default)]
    pub alarms: Option<String>,
}

/// Partial-update payload with explicit field presence. A key absent from
/// the body leaves the stored value untouched; a key that is present is
/// applied, so `"events": null` clears the column while omitting `events`
/// keeps it. The nullable columns track presence with a double `Option`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnergyRecordPatch {
    pub system_id: Option<i64>,
    pub current_power: Option<i64>,
    pub energy_lifetime: Option<i64>,
    pub energy_today: Option<i64>,
    pub last_interval_end_at: Option<i64>,
    pub last_report_at: Option<i64>,
    pub modules: Option<i64>,
    pub operational_at: Option<i64>,
    pub size_w: Option<i64>,
    pub status: Option<String>,
    pub summary_date: Option<String>,
    #[serde(default, deserialize_with = "present_as_some")]
    pub events: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_as_some")]
    pub alarms: Option<Option<String>>,
}

fn present_as_some<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl EnergyRecordPatch {
    /// Merges every present field into `record`, leaving the rest as-is.
    pub fn apply(&self, record: &mut EnergyRecord) {
        if let Some(value) = self.system_id {
            record.system_id = value;
        }
        if let Some(value) = self.current_power {
            record.current_power = value;
        }
        if let Some(value) = self.energy_lifetime {
            record.energy_lifetime = value;
        }
        if let Some(value) = self.energy_today {
            record.energy_today = value;
        }
        if let Some(value) = self.last_interval_end_at {
            record.last_interval_end_at = value;
        }
        if let Some(value) = self.last_report_at {
            record.last_report_at = value;
        }
        if let Some(value) = self.modules {
            record.modules = value;
        }
        if let Some(value) = self.operational_at {
            record.operational_at = value;
        }
        if let Some(value) = self.size_w {
            record.size_w = value;
        }
        if let Some(value) = &self.status {
            record.status = value.clone();
        }
        if let Some(value) = &self.summary_date {
            record.summary_date = value.clone();
        }
        if let Some(value) = &self.events {
            record.events = value.clone();
        }
        if let Some(value) = &self.alarms {
            record.alarms = value.clone();
        }
    }
}

impl EnergyRecord {
    /// Builds the row a full replace writes: every payload column taken from
    /// `input`, `create_date` preserved, `update_date` supplied by the caller.
    pub fn replaced_with(&self, input: &NewEnergyRecord, update_date: String) -> Self {
        Self {
            id: self.id,
            system_id: input.system_id,
            current_power: input.current_power,
            energy_lifetime: input.energy_lifetime,
            energy_today: input.energy_today,
            last_interval_end_at: input.last_interval_end_at,
            last_report_at: input.last_report_at,
            modules: input.modules,
            operational_at: input.operational_at,
            size_w: input.size_w,
            status: input.status.clone(),
            summary_date: input.summary_date.clone(),
            events: input.events.clone(),
            alarms: input.alarms.clone(),
            create_date: self.create_date.clone(),
            update_date,
        }
    }
}
