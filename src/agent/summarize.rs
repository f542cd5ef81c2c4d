//! Deterministic summarizer: renders a tool-call trace into user-facing text
//! without any model involvement. It is the only renderer in fallback mode
//! and the backstop in model mode when the second exchange returns nothing
//! usable. Total by construction: every tool's success and error shapes
//! render to non-empty text, and unknown tools fall back to a JSON dump.

use serde_json::Value;

use crate::traits::ToolTrace;

const SLOT_DISPLAY_LIMIT: usize = 6;
const REASON_DISPLAY_LIMIT: usize = 10;

/// Heuristic for an unusable model reply after tool execution: blank text or
/// a leaked raw tool echo.
pub fn looks_like_tool_echo(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.to_lowercase().starts_with("tool result")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn error_text(result: &Value) -> String {
    str_field(result, "error").unwrap_or("unknown error").to_string()
}

fn render_availability(entry: &ToolTrace, lines: &mut Vec<String>) {
    let result = &entry.result;
    if result["ok"] != true {
        lines.push(format!("Error: {}", error_text(result)));
        return;
    }
    let doctor = str_field(result, "doctor")
        .or_else(|| str_field(&entry.args, "doctor_name"))
        .unwrap_or("the doctor");
    let date = str_field(result, "start_date")
        .or_else(|| str_field(&entry.args, "start_date"))
        .unwrap_or("the requested date");

    let slots = result["available_slots"].as_array();
    match slots {
        Some(slots) if !slots.is_empty() => {
            lines.push(format!("Available slots for {} on {}:", doctor, date));
            for slot in slots.iter().take(SLOT_DISPLAY_LIMIT) {
                lines.push(format!(
                    " • {} — {}",
                    str_field(slot, "start_iso").unwrap_or("?"),
                    str_field(slot, "end_iso").unwrap_or("?"),
                ));
            }
        }
        _ => lines.push(format!("No slots available for {} on {}.", doctor, date)),
    }
}

fn render_booking(entry: &ToolTrace, lines: &mut Vec<String>) {
    let result = &entry.result;
    if result["ok"] == true {
        let id = result["appointment_id"]
            .as_i64()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        lines.push(format!("Appointment created (id: {}).", id));
    } else {
        lines.push(format!("Failed to create appointment: {}", error_text(result)));
    }
}

fn render_report(entry: &ToolTrace, lines: &mut Vec<String>) {
    let result = &entry.result;
    if result["ok"] != true {
        lines.push(format!("Stats error: {}", error_text(result)));
        return;
    }

    match str_field(result, "summary_text").map(str::trim) {
        Some(summary) if !summary.is_empty() => lines.push(summary.to_string()),
        _ => {
            // No pre-rendered narrative: assemble one from the raw counters.
            let raw = &result["raw_stats"];
            let doctor = str_field(raw, "doctor").unwrap_or("Doctor");
            let ref_date = str_field(raw, "ref_date").unwrap_or("");
            lines.push(format!("Summary report for {} — {}", doctor, ref_date));
            lines.push(format!(
                "- Patients yesterday: {}",
                raw["patients_yesterday"].as_i64().unwrap_or(0)
            ));
            lines.push(format!(
                "- Patients today: {}",
                raw["patients_today"].as_i64().unwrap_or(0)
            ));
            lines.push(format!(
                "- Patients tomorrow: {}",
                raw["patients_tomorrow"].as_i64().unwrap_or(0)
            ));
            lines.push("- Reason breakdown:".to_string());
            let reasons = raw["top_reasons"].as_array();
            match reasons {
                Some(reasons) if !reasons.is_empty() => {
                    for item in reasons.iter().take(REASON_DISPLAY_LIMIT) {
                        lines.push(format!(
                            " • {}: {}",
                            title_case(str_field(item, "reason").unwrap_or("?")),
                            item["count"].as_i64().unwrap_or(0),
                        ));
                    }
                }
                _ => lines.push(" • No categorized reasons available.".to_string()),
            }
        }
    }

    let notified = result["notification_sent"] == true;
    lines.push(format!(
        "Notification sent: {}",
        if notified { "Yes" } else { "No" }
    ));
}

/// Render an ordered tool-call trace into stable, human-readable text.
pub fn render_trace(trace: &[ToolTrace]) -> String {
    let mut lines = Vec::new();
    for entry in trace {
        match entry.tool.as_str() {
            "get_doctor_availability" => render_availability(entry, &mut lines),
            "book_appointment" => render_booking(entry, &mut lines),
            "doctor_report" => render_report(entry, &mut lines),
            _ => lines.push(
                serde_json::to_string(&entry.result).unwrap_or_else(|_| "{}".to_string()),
            ),
        }
    }
    if lines.is_empty() {
        "No results.".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(tool: &str, args: Value, result: Value) -> ToolTrace {
        ToolTrace {
            tool: tool.to_string(),
            args,
            result,
        }
    }

    #[test]
    fn availability_with_slots_lists_them() {
        let trace = vec![entry(
            "get_doctor_availability",
            json!({"doctor_name": "Dr. Ahuja", "start_date": "2025-12-02"}),
            json!({
                "ok": true,
                "doctor": "Dr. Ahuja",
                "start_date": "2025-12-02",
                "available_slots": [
                    {"start_iso": "2025-12-02T09:00:00", "end_iso": "2025-12-02T10:00:00"},
                    {"start_iso": "2025-12-02T10:00:00", "end_iso": "2025-12-02T11:00:00"},
                ],
            }),
        )];
        let text = render_trace(&trace);
        assert!(text.starts_with("Available slots for Dr. Ahuja on 2025-12-02:"));
        assert!(text.contains("2025-12-02T09:00:00"));
    }

    #[test]
    fn availability_without_slots_says_so() {
        let trace = vec![entry(
            "get_doctor_availability",
            json!({}),
            json!({"ok": true, "doctor": "Dr. Ahuja", "start_date": "2025-12-02", "available_slots": []}),
        )];
        assert_eq!(
            render_trace(&trace),
            "No slots available for Dr. Ahuja on 2025-12-02."
        );
    }

    #[test]
    fn slot_list_is_bounded() {
        let slots: Vec<Value> = (0..20)
            .map(|i| {
                json!({
                    "start_iso": format!("2025-12-02T{:02}:00:00", i),
                    "end_iso": format!("2025-12-02T{:02}:00:00", i + 1),
                })
            })
            .collect();
        let trace = vec![entry(
            "get_doctor_availability",
            json!({}),
            json!({"ok": true, "doctor": "D", "start_date": "2025-12-02", "available_slots": slots}),
        )];
        let text = render_trace(&trace);
        assert_eq!(text.lines().count(), 1 + SLOT_DISPLAY_LIMIT);
    }

    #[test]
    fn booking_success_and_failure_render() {
        let ok = vec![entry(
            "book_appointment",
            json!({}),
            json!({"ok": true, "appointment_id": 7}),
        )];
        assert_eq!(render_trace(&ok), "Appointment created (id: 7).");

        let err = vec![entry(
            "book_appointment",
            json!({}),
            json!({"ok": false, "error": "Slot already booked"}),
        )];
        assert_eq!(
            render_trace(&err),
            "Failed to create appointment: Slot already booked"
        );
    }

    #[test]
    fn report_prefers_prerendered_narrative() {
        let trace = vec![entry(
            "doctor_report",
            json!({}),
            json!({
                "ok": true,
                "summary_text": "Summary report for Dr. Ahuja — 2025-12-02",
                "raw_stats": {"patients_today": 99},
                "notification_sent": true,
            }),
        )];
        let text = render_trace(&trace);
        assert!(text.starts_with("Summary report for Dr. Ahuja"));
        assert!(!text.contains("99"));
        assert!(text.ends_with("Notification sent: Yes"));
    }

    #[test]
    fn report_assembles_from_raw_stats_when_narrative_is_blank() {
        let trace = vec![entry(
            "doctor_report",
            json!({}),
            json!({
                "ok": true,
                "summary_text": "  ",
                "raw_stats": {
                    "doctor": "Dr. Ahuja",
                    "ref_date": "2025-12-02",
                    "patients_yesterday": 1,
                    "patients_today": 2,
                    "patients_tomorrow": 3,
                    "top_reasons": [
                        {"reason": "fever", "count": 2},
                        {"reason": "checkup", "count": 1},
                    ],
                },
                "notification_sent": false,
            }),
        )];
        let text = render_trace(&trace);
        assert!(text.contains("- Patients yesterday: 1"));
        assert!(text.contains("- Patients today: 2"));
        assert!(text.contains("- Patients tomorrow: 3"));
        assert!(text.contains(" • Fever: 2"));
        assert!(text.contains(" • Checkup: 1"));
        assert!(text.ends_with("Notification sent: No"));
    }

    #[test]
    fn report_without_reasons_renders_placeholder() {
        let trace = vec![entry(
            "doctor_report",
            json!({}),
            json!({
                "ok": true,
                "raw_stats": {
                    "doctor": "Dr. Ahuja",
                    "ref_date": "2025-12-02",
                    "patients_yesterday": 0,
                    "patients_today": 0,
                    "patients_tomorrow": 0,
                    "top_reasons": [],
                },
                "notification_sent": false,
            }),
        )];
        assert!(render_trace(&trace).contains("No categorized reasons available"));
    }

    #[test]
    fn every_tool_error_shape_renders_nonempty() {
        for tool in ["get_doctor_availability", "book_appointment", "doctor_report"] {
            let trace = vec![entry(tool, json!({}), json!({"ok": false, "error": "boom"}))];
            let text = render_trace(&trace);
            assert!(!text.trim().is_empty(), "{} rendered empty", tool);
            assert!(text.contains("boom"));
        }
    }

    #[test]
    fn unknown_tool_falls_back_to_json_dump() {
        let trace = vec![entry("mystery_tool", json!({}), json!({"ok": true, "x": 1}))];
        let text = render_trace(&trace);
        assert!(text.contains("\"x\":1"));
    }

    #[test]
    fn empty_trace_renders_placeholder() {
        assert_eq!(render_trace(&[]), "No results.");
    }

    #[test]
    fn rendering_is_idempotent() {
        let trace = vec![
            entry(
                "get_doctor_availability",
                json!({}),
                json!({"ok": true, "doctor": "D", "start_date": "2025-12-02", "available_slots": []}),
            ),
            entry(
                "book_appointment",
                json!({}),
                json!({"ok": true, "appointment_id": 1}),
            ),
        ];
        assert_eq!(render_trace(&trace), render_trace(&trace));
    }

    #[test]
    fn tool_echo_heuristic() {
        assert!(looks_like_tool_echo(""));
        assert!(looks_like_tool_echo("   \n"));
        assert!(looks_like_tool_echo("Tool result: {...}"));
        assert!(!looks_like_tool_echo("Here are the slots."));
    }
}
