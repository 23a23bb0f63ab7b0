use chrono::{DateTime, SecondsFormat, Utc};
use inbound_health::infrastructure::persistence::Database;
use uuid::Uuid;

/// File-backed SQLite database with migrations applied. Each instance gets
/// its own file so tests can run in parallel; the file is removed on drop.
pub struct TestDatabase {
    db: Database,
    path: String,
}

impl TestDatabase {
    pub async fn new() -> Self {
        let path = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", path);

        let db = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");
        db.run_migrations()
            .await
            .expect("Failed to run migrations");

        Self { db, path }
    }

    pub fn db(&self) -> Database {
        self.db.clone()
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path, suffix));
        }
    }
}

pub fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Insert the marketplace OAuth record the polling classifier reads
pub async fn insert_oauth(
    db: &Database,
    tenant_id: &str,
    status: &str,
    last_error: Option<&str>,
    at: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO marketplace_oauth_connections (id, tenant_id, marketplace, status, last_error, created_at, updated_at)
         VALUES (?, ?, 'AMAZON', ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(tenant_id)
    .bind(status)
    .bind(last_error)
    .bind(ts(at))
    .bind(ts(at))
    .execute(db.pool())
    .await
    .expect("Failed to insert oauth connection");
}

/// Insert a polling job run. `finished_at` becomes the job's updated_at.
pub async fn insert_job(
    db: &Database,
    tenant_id: &str,
    job_type: &str,
    status: &str,
    created_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    last_error: Option<&str>,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO jobs (id, tenant_id, job_type, payload, status, run_at, created_at, updated_at, attempts, max_attempts, last_error)
         VALUES (?, ?, ?, '{}', ?, ?, ?, ?, 1, 3, ?)",
    )
    .bind(&id)
    .bind(tenant_id)
    .bind(job_type)
    .bind(status)
    .bind(ts(created_at))
    .bind(ts(created_at))
    .bind(ts(finished_at))
    .bind(last_error)
    .execute(db.pool())
    .await
    .expect("Failed to insert job");
    id
}

pub async fn count_jobs(db: &Database, job_type: &str) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE job_type = ?")
        .bind(job_type)
        .fetch_one(db.pool())
        .await
        .expect("Failed to count jobs");
    row.0
}
