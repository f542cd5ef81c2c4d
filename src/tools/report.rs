use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::notify::Notifier;
use crate::store::SchedulingStore;
use crate::traits::{CallerRole, RoleRequirement, Tool};

const TOP_REASONS_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
struct Args {
    doctor_name: String,
    ref_date: Option<String>,
    send_notification: Option<bool>,
}

pub struct DoctorReportTool {
    store: Arc<SchedulingStore>,
    notifier: Arc<Notifier>,
}

impl DoctorReportTool {
    pub fn new(store: Arc<SchedulingStore>, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }
}

#[async_trait]
impl Tool for DoctorReportTool {
    fn name(&self) -> &str {
        "doctor_report"
    }

    fn description(&self) -> &str {
        "Summary report of patient counts and visit reasons for a doctor"
    }

    fn schema(&self) -> Value {
        json!({
            "name": "doctor_report",
            "description": "Summary report of patient counts and visit reasons for a doctor",
            "parameters": {
                "type": "object",
                "properties": {
                    "doctor_name": { "type": "string", "description": "Doctor full name, e.g. 'Dr. Ahuja'" },
                    "ref_date": { "type": "string", "description": "Reference date YYYY-MM-DD (optional, defaults to today)" },
                    "send_notification": { "type": "boolean", "description": "Post the summary to the doctor's chat webhook when configured" }
                },
                "required": ["doctor_name"]
            }
        })
    }

    fn required_role(&self) -> RoleRequirement {
        RoleRequirement::Role(CallerRole::Doctor)
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

        let ref_date = match &args.ref_date {
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(d) => d,
                Err(_) => {
                    return Ok(json!({
                        "ok": false,
                        "error": format!("Invalid ref_date '{}', expected YYYY-MM-DD", raw),
                    }))
                }
            },
            None => Utc::now().date_naive(),
        };
        let yesterday = ref_date - ChronoDuration::days(1);
        let tomorrow = ref_date + ChronoDuration::days(1);

        let patients_yesterday = self
            .store
            .count_on(doctor.id, &yesterday.to_string())
            .await?;
        let patients_today = self.store.count_on(doctor.id, &ref_date.to_string()).await?;
        let patients_tomorrow = self
            .store
            .count_on(doctor.id, &tomorrow.to_string())
            .await?;

        let breakdown = self.store.reason_breakdown(doctor.id).await?;
        let top_reasons: Vec<Value> = breakdown
            .iter()
            .take(TOP_REASONS_LIMIT)
            .map(|(reason, count)| json!({ "reason": reason, "count": count }))
            .collect();

        let mut summary = format!(
            "Summary report for {} — {}\n- Patients yesterday: {}\n- Patients today: {}\n- Patients tomorrow: {}",
            doctor.name, ref_date, patients_yesterday, patients_today, patients_tomorrow
        );
        if !top_reasons.is_empty() {
            let reasons: Vec<String> = breakdown
                .iter()
                .take(TOP_REASONS_LIMIT)
                .map(|(reason, count)| format!("{} ({})", reason, count))
                .collect();
            summary.push_str(&format!("\n- Top reasons: {}", reasons.join(", ")));
        }

        let send = args.send_notification.unwrap_or(true);
        let mut notification_sent = false;
        if send && self.notifier.has_webhook() {
            let outcome = self.notifier.chat_message(&summary).await;
            notification_sent = outcome["ok"] == true && outcome["source"] == "chat_webhook";
        }

        Ok(json!({
            "ok": true,
            "doctor": doctor.name,
            "ref_date": ref_date.to_string(),
            "summary_text": summary,
            "raw_stats": {
                "doctor": doctor.name,
                "ref_date": ref_date.to_string(),
                "patients_yesterday": patients_yesterday,
                "patients_today": patients_today,
                "patients_tomorrow": patients_tomorrow,
                "top_reasons": top_reasons,
            },
            "notification_sent": notification_sent,
        }))
    }
}
