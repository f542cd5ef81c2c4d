use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::notify::Notifier;
use crate::store::{InsertOutcome, SchedulingStore};
use crate::traits::Tool;

#[derive(Debug, Deserialize)]
struct Args {
    doctor_name: String,
    patient_name: String,
    patient_email: Option<String>,
    start_iso: String,
    end_iso: Option<String>,
    reason: Option<String>,
}

fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
}

pub struct BookAppointmentTool {
    store: Arc<SchedulingStore>,
    notifier: Arc<Notifier>,
}

impl BookAppointmentTool {
    pub fn new(store: Arc<SchedulingStore>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }
}

#[async_trait]
impl Tool for BookAppointmentTool {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment with a doctor and notify the patient"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "book_appointment",
            "description": "Book an appointment with a doctor and notify the patient",
            "parameters": {
                "type": "object",
                "properties": {
                    "doctor_name": { "type": "string" },
                    "patient_name": { "type": "string" },
                    "patient_email": { "type": "string" },
                    "start_iso": { "type": "string", "description": "ISO datetime, e.g. 2025-12-02T09:00:00" },
                    "end_iso": { "type": "string", "description": "ISO datetime (optional, defaults to start + 1 hour)" },
                    "reason": { "type": "string" }
                },
                "required": ["doctor_name", "patient_name", "start_iso"]
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

        let Some(start) = parse_iso(&args.start_iso) else {
            return Ok(json!({
                "ok": false,
                "error": format!(
                    "Invalid start_iso '{}', expected an ISO datetime like 2025-12-02T09:00:00",
                    args.start_iso
                ),
            }));
        };
        let end = match &args.end_iso {
            Some(raw) => match parse_iso(raw) {
                Some(e) if e > start => e,
                Some(_) => {
                    return Ok(json!({
                        "ok": false,
                        "error": "end_iso must be after start_iso",
                    }))
                }
                None => {
                    return Ok(json!({
                        "ok": false,
                        "error": format!("Invalid end_iso '{}'", raw),
                    }))
                }
            },
            None => start + ChronoDuration::hours(1),
        };

        let date = start.format("%Y-%m-%d").to_string();
        let start_time = start.format("%H:%M:%S").to_string();
        let end_time = end.format("%H:%M:%S").to_string();
        let reason = args.reason.unwrap_or_default();

        let outcome = self
            .store
            .insert_appointment(
                doctor.id,
                &args.patient_name,
                &date,
                &start_time,
                &end_time,
                &reason,
            )
            .await?;

        let appointment_id = match outcome {
            InsertOutcome::Created(id) => id,
            InsertOutcome::SlotTaken => {
                return Ok(json!({
                    "ok": false,
                    "error": "Slot already booked",
                }))
            }
        };

        // Side channels never block a successful booking.
        let start_full = start.format("%Y-%m-%dT%H:%M:%S").to_string();
        let end_full = end.format("%Y-%m-%dT%H:%M:%S").to_string();
        let calendar = self
            .notifier
            .calendar_event(&doctor.name, &args.patient_name, &start_full, &end_full)
            .await;
        let email_to = args
            .patient_email
            .unwrap_or_else(|| "patient@example.com".to_string());
        let email = self
            .notifier
            .email(
                &email_to,
                &format!("Appointment with {}", doctor.name),
                &format!("Your appointment on {}", start_full),
            )
            .await;

        Ok(json!({
            "ok": true,
            "appointment_id": appointment_id,
            "doctor": doctor.name,
            "start_iso": start_full,
            "end_iso": end_full,
            "calendar": calendar,
            "email": email,
        }))
    }
}
