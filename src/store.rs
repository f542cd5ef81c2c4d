//! SQLite scheduling store: doctors and appointments.
//!
//! Dates and times are stored as ISO text (`YYYY-MM-DD`, `HH:MM:SS`), which
//! keeps the schema readable and sorts correctly. The booking conflict check
//! runs inside a transaction, with a unique index on
//! (doctor_id, date, start_time) as a backstop, so the same slot can never be
//! booked twice.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Appointment {
    pub id: i64,
    pub doctor_id: i64,
    pub patient_name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub reason: String,
}

/// Outcome of an insert attempt. The conflict case is ordinary data, not an
/// error: callers surface it to the user in plain language.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(i64),
    SlotTaken,
}

pub struct SchedulingStore {
    pool: SqlitePool,
}

impl SchedulingStore {
    pub async fn new(db_path: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS doctors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                specialization TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS appointments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doctor_id INTEGER NOT NULL REFERENCES doctors(id),
                patient_name TEXT NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                reason TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_appointments_slot
             ON appointments(doctor_id, date, start_time)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_appointments_doctor_date
             ON appointments(doctor_id, date)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert any seed doctors that are not present yet. Returns how many
    /// rows were added.
    pub async fn seed_doctors(&self, names: &[String]) -> anyhow::Result<usize> {
        let mut added = 0;
        for name in names {
            let result = sqlx::query(
                "INSERT INTO doctors (name, specialization)
                 VALUES (?, 'General Physician')
                 ON CONFLICT(name) DO NOTHING",
            )
            .bind(name)
            .execute(&self.pool)
            .await?;
            added += result.rows_affected() as usize;
        }
        Ok(added)
    }

    pub async fn list_doctors(&self) -> anyhow::Result<Vec<Doctor>> {
        let rows = sqlx::query("SELECT id, name, specialization FROM doctors ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| Doctor {
                id: r.get("id"),
                name: r.get("name"),
                specialization: r.get("specialization"),
            })
            .collect())
    }

    /// Case-insensitive substring match, first hit wins. "doctor not found"
    /// is a distinguishable `None`, never an error.
    pub async fn find_doctor(&self, name: &str) -> anyhow::Result<Option<Doctor>> {
        let pattern = format!("%{}%", name);
        let row = sqlx::query(
            "SELECT id, name, specialization FROM doctors
             WHERE name LIKE ? COLLATE NOCASE
             ORDER BY id LIMIT 1",
        )
        .bind(&pattern)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Doctor {
            id: r.get("id"),
            name: r.get("name"),
            specialization: r.get("specialization"),
        }))
    }

    pub async fn appointments_on(
        &self,
        doctor_id: i64,
        date: &str,
    ) -> anyhow::Result<Vec<Appointment>> {
        let rows = sqlx::query(
            "SELECT id, doctor_id, patient_name, date, start_time, end_time, reason
             FROM appointments
             WHERE doctor_id = ? AND date = ?
             ORDER BY start_time",
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Appointment {
                id: r.get("id"),
                doctor_id: r.get("doctor_id"),
                patient_name: r.get("patient_name"),
                date: r.get("date"),
                start_time: r.get("start_time"),
                end_time: r.get("end_time"),
                reason: r.get("reason"),
            })
            .collect())
    }

    /// Conflict-checked insert. The check and the insert share one
    /// transaction; the unique slot index catches anything that slips past.
    pub async fn insert_appointment(
        &self,
        doctor_id: i64,
        patient_name: &str,
        date: &str,
        start_time: &str,
        end_time: &str,
        reason: &str,
    ) -> anyhow::Result<InsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let conflict = sqlx::query(
            "SELECT id FROM appointments
             WHERE doctor_id = ? AND date = ? AND start_time = ?",
        )
        .bind(doctor_id)
        .bind(date)
        .bind(start_time)
        .fetch_optional(&mut *tx)
        .await?;

        if conflict.is_some() {
            tx.rollback().await?;
            return Ok(InsertOutcome::SlotTaken);
        }

        let inserted = sqlx::query(
            "INSERT INTO appointments
                 (doctor_id, patient_name, date, start_time, end_time, reason, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(doctor_id)
        .bind(patient_name)
        .bind(date)
        .bind(start_time)
        .bind(end_time)
        .bind(reason)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(result) => {
                tx.commit().await?;
                Ok(InsertOutcome::Created(result.last_insert_rowid()))
            }
            Err(e) => {
                tx.rollback().await?;
                if e.as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false)
                {
                    Ok(InsertOutcome::SlotTaken)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    pub async fn count_on(&self, doctor_id: i64, date: &str) -> anyhow::Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM appointments WHERE doctor_id = ? AND date = ?",
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    /// Visit reasons ranked by count. Ties keep insertion order (lowest
    /// first-seen row id first) so the ranking is stable across runs.
    pub async fn reason_breakdown(&self, doctor_id: i64) -> anyhow::Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT lower(reason) AS reason, COUNT(*) AS n
             FROM appointments
             WHERE doctor_id = ? AND reason != ''
             GROUP BY lower(reason)
             ORDER BY n DESC, MIN(id) ASC",
        )
        .bind(doctor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("reason"), r.get::<i64, _>("n")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (SchedulingStore, tempfile::NamedTempFile) {
        let db_file = tempfile::NamedTempFile::new().unwrap();
        let store = SchedulingStore::new(db_file.path().to_str().unwrap())
            .await
            .unwrap();
        store
            .seed_doctors(&["Dr. Ahuja".to_string(), "Dr. Mehta".to_string()])
            .await
            .unwrap();
        (store, db_file)
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let (store, _db) = test_store().await;
        let added = store
            .seed_doctors(&["Dr. Ahuja".to_string(), "Dr. New".to_string()])
            .await
            .unwrap();
        assert_eq!(added, 1);
    }

    #[tokio::test]
    async fn find_doctor_is_case_insensitive_substring() {
        let (store, _db) = test_store().await;
        let doc = store.find_doctor("ahuja").await.unwrap().unwrap();
        assert_eq!(doc.name, "Dr. Ahuja");
        assert!(store.find_doctor("Dr. Nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_doctors_returns_seeded_rows_in_order() {
        let (store, _db) = test_store().await;
        let docs = store.list_doctors().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, "Dr. Ahuja");
        assert_eq!(docs[0].specialization.as_deref(), Some("General Physician"));
        assert_eq!(docs[1].name, "Dr. Mehta");
    }

    #[tokio::test]
    async fn appointments_on_returns_full_rows_in_start_order() {
        let (store, _db) = test_store().await;
        let doc = store.find_doctor("Ahuja").await.unwrap().unwrap();
        store
            .insert_appointment(doc.id, "Jane", "2025-12-02", "10:00:00", "11:00:00", "cough")
            .await
            .unwrap();
        store
            .insert_appointment(doc.id, "John", "2025-12-02", "09:00:00", "10:00:00", "fever")
            .await
            .unwrap();

        let rows = store.appointments_on(doc.id, "2025-12-02").await.unwrap();
        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert!(first.id > 0);
        assert_eq!(first.doctor_id, doc.id);
        assert_eq!(first.patient_name, "John");
        assert_eq!(first.date, "2025-12-02");
        assert_eq!(first.start_time, "09:00:00");
        assert_eq!(first.end_time, "10:00:00");
        assert_eq!(first.reason, "fever");
    }

    #[tokio::test]
    async fn second_booking_of_same_slot_is_rejected() {
        let (store, _db) = test_store().await;
        let doc = store.find_doctor("Ahuja").await.unwrap().unwrap();

        let first = store
            .insert_appointment(doc.id, "John", "2025-12-02", "09:00:00", "10:00:00", "fever")
            .await
            .unwrap();
        assert!(matches!(first, InsertOutcome::Created(_)));

        let second = store
            .insert_appointment(doc.id, "Jane", "2025-12-02", "09:00:00", "10:00:00", "cough")
            .await
            .unwrap();
        assert_eq!(second, InsertOutcome::SlotTaken);

        assert_eq!(store.count_on(doc.id, "2025-12-02").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_slot_for_other_doctor_is_fine() {
        let (store, _db) = test_store().await;
        let ahuja = store.find_doctor("Ahuja").await.unwrap().unwrap();
        let mehta = store.find_doctor("Mehta").await.unwrap().unwrap();

        for doc in [&ahuja, &mehta] {
            let outcome = store
                .insert_appointment(doc.id, "John", "2025-12-02", "09:00:00", "10:00:00", "")
                .await
                .unwrap();
            assert!(matches!(outcome, InsertOutcome::Created(_)));
        }
    }

    #[tokio::test]
    async fn reason_breakdown_ranks_by_count_then_first_seen() {
        let (store, _db) = test_store().await;
        let doc = store.find_doctor("Ahuja").await.unwrap().unwrap();

        let slots = [
            ("09:00:00", "Fever"),
            ("10:00:00", "checkup"),
            ("11:00:00", "fever"),
            ("12:00:00", "cough"),
        ];
        for (start, reason) in slots {
            store
                .insert_appointment(doc.id, "P", "2025-12-02", start, "x", reason)
                .await
                .unwrap();
        }

        let breakdown = store.reason_breakdown(doc.id).await.unwrap();
        assert_eq!(breakdown[0], ("fever".to_string(), 2));
        // checkup was seen before cough; both have count 1.
        assert_eq!(breakdown[1], ("checkup".to_string(), 1));
        assert_eq!(breakdown[2], ("cough".to_string(), 1));
    }
}
