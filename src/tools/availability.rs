use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::SchedulingStore;
use crate::traits::Tool;

/// Hour window for a time-of-day filter word. Unknown or missing words fall
/// back to the full clinic hours.
pub fn time_of_day_window(
    time_of_day: Option<&str>,
    open_hour: u32,
    close_hour: u32,
) -> (u32, u32) {
    match time_of_day.map(|t| t.trim().to_lowercase()).as_deref() {
        Some("morning") => (9, 12),
        Some("afternoon") => (12, 16),
        Some("evening") => (16, 19),
        _ => (open_hour, close_hour),
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    doctor_name: String,
    start_date: String,
    end_date: Option<String>,
    time_of_day: Option<String>,
}

pub struct GetAvailabilityTool {
    store: Arc<SchedulingStore>,
    open_hour: u32,
    close_hour: u32,
    slot_minutes: u32,
}

impl GetAvailabilityTool {
    pub fn new(
        store: Arc<SchedulingStore>,
        open_hour: u32,
        close_hour: u32,
        slot_minutes: u32,
    ) -> Self {
        Self {
            store,
            open_hour,
            close_hour,
            slot_minutes,
        }
    }
}

#[async_trait]
impl Tool for GetAvailabilityTool {
    fn name(&self) -> &str {
        "get_doctor_availability"
    }

    fn description(&self) -> &str {
        "Return available appointment slots for a doctor between dates"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "get_doctor_availability",
            "description": "Return available appointment slots for a doctor between dates",
            "parameters": {
                "type": "object",
                "properties": {
                    "doctor_name": { "type": "string", "description": "Doctor name, e.g. 'Dr. Ahuja'" },
                    "start_date": { "type": "string", "description": "YYYY-MM-DD" },
                    "end_date": { "type": "string", "description": "YYYY-MM-DD (optional, defaults to start_date)" },
                    "time_of_day": { "type": "string", "description": "morning|afternoon|evening (optional)" }
                },
                "required": ["doctor_name", "start_date"]
            }
        })
    }

    async fn call(&self, args: &Value) -> anyhow::Result<Value> {
        let args: Args = match serde_json::from_value(args.clone()) {
            Ok(a) => a,
            Err(e) => {
                return Ok(json!({
                    "ok": false,
                    "error": format!("Missing or invalid arguments: {}", e),
                }))
            }
        };

        let Some(doctor) = self.store.find_doctor(&args.doctor_name).await? else {
            return Ok(json!({
                "ok": false,
                "error": format!("Doctor '{}' not found", args.doctor_name),
            }));
        };

        let Ok(start_date) = NaiveDate::parse_from_str(&args.start_date, "%Y-%m-%d") else {
            return Ok(json!({
                "ok": false,
                "error": format!("Invalid start_date '{}', expected YYYY-MM-DD", args.start_date),
            }));
        };
        let end_date = match &args.end_date {
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(d) if d >= start_date => d,
                Ok(_) => start_date,
                Err(_) => {
                    return Ok(json!({
                        "ok": false,
                        "error": format!("Invalid end_date '{}', expected YYYY-MM-DD", raw),
                    }))
                }
            },
            None => start_date,
        };

        let (window_start, window_end) =
            time_of_day_window(args.time_of_day.as_deref(), self.open_hour, self.close_hour);
        let slot_hours = (self.slot_minutes / 60).max(1);

        let mut available = Vec::new();
        let mut date = start_date;
        while date <= end_date {
            let date_str = date.format("%Y-%m-%d").to_string();
            let existing: Vec<String> = self
                .store
                .appointments_on(doctor.id, &date_str)
                .await?
                .into_iter()
                .map(|a| a.start_time)
                .collect();

            let mut hour = window_start;
            while hour + slot_hours <= window_end {
                let start_time = format!("{:02}:00:00", hour);
                if !existing.contains(&start_time) {
                    let end_hour = hour + slot_hours;
                    available.push(json!({
                        "date": date_str,
                        "start_time": start_time,
                        "end_time": format!("{:02}:00:00", end_hour),
                        "start_iso": format!("{}T{:02}:00:00", date_str, hour),
                        "end_iso": format!("{}T{:02}:00:00", date_str, end_hour),
                    }));
                }
                hour += slot_hours;
            }

            date += ChronoDuration::days(1);
        }

        Ok(json!({
            "ok": true,
            "doctor": doctor.name,
            "start_date": args.start_date,
            "available_slots": available,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InsertOutcome;

    async fn tool_with_store() -> (GetAvailabilityTool, Arc<SchedulingStore>, tempfile::NamedTempFile)
    {
        let db_file = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(
            SchedulingStore::new(db_file.path().to_str().unwrap())
                .await
                .unwrap(),
        );
        store
            .seed_doctors(&["Dr. Ahuja".to_string()])
            .await
            .unwrap();
        let tool = GetAvailabilityTool::new(Arc::clone(&store), 9, 17, 60);
        (tool, store, db_file)
    }

    #[test]
    fn time_of_day_windows() {
        assert_eq!(time_of_day_window(Some("morning"), 9, 17), (9, 12));
        assert_eq!(time_of_day_window(Some("Afternoon"), 9, 17), (12, 16));
        assert_eq!(time_of_day_window(Some("evening"), 9, 17), (16, 19));
        assert_eq!(time_of_day_window(Some("lunch"), 9, 17), (9, 17));
        assert_eq!(time_of_day_window(None, 9, 17), (9, 17));
    }

    #[tokio::test]
    async fn full_day_has_eight_hourly_slots() {
        let (tool, _store, _db) = tool_with_store().await;
        let result = tool
            .call(&json!({"doctor_name": "Dr. Ahuja", "start_date": "2025-12-02"}))
            .await
            .unwrap();
        assert_eq!(result["ok"], true);
        assert_eq!(result["doctor"], "Dr. Ahuja");
        let slots = result["available_slots"].as_array().unwrap();
        assert_eq!(slots.len(), 8);
        assert_eq!(slots[0]["start_iso"], "2025-12-02T09:00:00");
        assert_eq!(slots[0]["end_iso"], "2025-12-02T10:00:00");
    }

    #[tokio::test]
    async fn booked_slots_are_excluded() {
        let (tool, store, _db) = tool_with_store().await;
        let doc = store.find_doctor("Ahuja").await.unwrap().unwrap();
        let outcome = store
            .insert_appointment(doc.id, "John", "2025-12-02", "09:00:00", "10:00:00", "")
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Created(_)));

        let result = tool
            .call(&json!({"doctor_name": "Dr. Ahuja", "start_date": "2025-12-02"}))
            .await
            .unwrap();
        let slots = result["available_slots"].as_array().unwrap();
        assert_eq!(slots.len(), 7);
        assert!(slots.iter().all(|s| s["start_time"] != "09:00:00"));
    }

    #[tokio::test]
    async fn morning_filter_narrows_the_window() {
        let (tool, _store, _db) = tool_with_store().await;
        let result = tool
            .call(&json!({
                "doctor_name": "Dr. Ahuja",
                "start_date": "2025-12-02",
                "time_of_day": "morning"
            }))
            .await
            .unwrap();
        let slots = result["available_slots"].as_array().unwrap();
        assert_eq!(slots.len(), 3); // 09, 10, 11
    }

    #[tokio::test]
    async fn unknown_doctor_is_a_structured_error() {
        let (tool, _store, _db) = tool_with_store().await;
        let result = tool
            .call(&json!({"doctor_name": "Dr. Nobody", "start_date": "2025-12-02"}))
            .await
            .unwrap();
        assert_eq!(result["ok"], false);
        assert_eq!(result["error"], "Doctor 'Dr. Nobody' not found");
    }

    #[tokio::test]
    async fn bad_date_is_a_structured_error() {
        let (tool, _store, _db) = tool_with_store().await;
        let result = tool
            .call(&json!({"doctor_name": "Dr. Ahuja", "start_date": "soon"}))
            .await
            .unwrap();
        assert_eq!(result["ok"], false);
    }

    #[tokio::test]
    async fn date_range_spans_multiple_days() {
        let (tool, _store, _db) = tool_with_store().await;
        let result = tool
            .call(&json!({
                "doctor_name": "Dr. Ahuja",
                "start_date": "2025-12-02",
                "end_date": "2025-12-03"
            }))
            .await
            .unwrap();
        let slots = result["available_slots"].as_array().unwrap();
        assert_eq!(slots.len(), 16);
    }
}
