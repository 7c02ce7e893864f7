//! Predictions and import-job history. Plain CRUD, no ledger coupling.

use super::Repository;
use crate::domain::{Direction, ImportJob, ImportStatus, Prediction, PredictionStatus, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl Repository {
    pub async fn insert_prediction(&self, prediction: &Prediction) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO predictions (
                id, strategy, direction, confidence, status, result, notes, created_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&prediction.id)
        .bind(&prediction.strategy)
        .bind(prediction.direction.as_str())
        .bind(prediction.confidence)
        .bind(prediction.status.as_str())
        .bind(prediction.result.as_deref())
        .bind(prediction.notes.as_deref())
        .bind(prediction.created_at_ms.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update the resolvable fields of a prediction. Returns the updated row,
    /// or None if the id is unknown.
    pub async fn update_prediction(
        &self,
        prediction_id: &str,
        status: Option<PredictionStatus>,
        result: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Option<Prediction>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, strategy, direction, confidence, status, result, notes, created_at_ms
            FROM predictions
            WHERE id = ?
            "#,
        )
        .bind(prediction_id)
        .fetch_optional(&self.pool)
        .await?;

        let mut prediction = match row {
            Some(r) => prediction_from_row(&r)?,
            None => return Ok(None),
        };

        if let Some(status) = status {
            prediction.status = status;
        }
        if let Some(result) = result {
            prediction.result = Some(result.to_string());
        }
        if let Some(notes) = notes {
            prediction.notes = Some(notes.to_string());
        }

        sqlx::query("UPDATE predictions SET status = ?, result = ?, notes = ? WHERE id = ?")
            .bind(prediction.status.as_str())
            .bind(prediction.result.as_deref())
            .bind(prediction.notes.as_deref())
            .bind(prediction_id)
            .execute(&self.pool)
            .await?;

        Ok(Some(prediction))
    }

    /// List predictions newest first, optionally filtered by status.
    pub async fn query_predictions(
        &self,
        status: Option<PredictionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Prediction>, i64), sqlx::Error> {
        let (sql, count_sql) = if status.is_some() {
            (
                r#"
                SELECT id, strategy, direction, confidence, status, result, notes, created_at_ms
                FROM predictions
                WHERE status = ?
                ORDER BY created_at_ms DESC, rowid DESC
                LIMIT ? OFFSET ?
                "#,
                "SELECT COUNT(*) FROM predictions WHERE status = ?",
            )
        } else {
            (
                r#"
                SELECT id, strategy, direction, confidence, status, result, notes, created_at_ms
                FROM predictions
                ORDER BY created_at_ms DESC, rowid DESC
                LIMIT ? OFFSET ?
                "#,
                "SELECT COUNT(*) FROM predictions",
            )
        };

        let mut query = sqlx::query(sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(count_sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
            count_query = count_query.bind(status.as_str());
        }

        let rows = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;
        let total = count_query.fetch_one(&self.pool).await?;

        let predictions = rows
            .iter()
            .map(prediction_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((predictions, total))
    }

    pub async fn insert_import_job(&self, job: &ImportJob) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO import_jobs (
                id, file_name, status, total_rows, imported_rows, failed_rows, created_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.file_name)
        .bind(job.status.as_str())
        .bind(job.total_rows)
        .bind(job.imported_rows)
        .bind(job.failed_rows)
        .bind(job.created_at_ms.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// List import jobs newest first, optionally filtered by status.
    pub async fn query_import_jobs(
        &self,
        status: Option<ImportStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ImportJob>, i64), sqlx::Error> {
        let (sql, count_sql) = if status.is_some() {
            (
                r#"
                SELECT id, file_name, status, total_rows, imported_rows, failed_rows, created_at_ms
                FROM import_jobs
                WHERE status = ?
                ORDER BY created_at_ms DESC, rowid DESC
                LIMIT ? OFFSET ?
                "#,
                "SELECT COUNT(*) FROM import_jobs WHERE status = ?",
            )
        } else {
            (
                r#"
                SELECT id, file_name, status, total_rows, imported_rows, failed_rows, created_at_ms
                FROM import_jobs
                ORDER BY created_at_ms DESC, rowid DESC
                LIMIT ? OFFSET ?
                "#,
                "SELECT COUNT(*) FROM import_jobs",
            )
        };

        let mut query = sqlx::query(sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(count_sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
            count_query = count_query.bind(status.as_str());
        }

        let rows = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;
        let total = count_query.fetch_one(&self.pool).await?;

        let jobs = rows
            .iter()
            .map(import_job_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((jobs, total))
    }
}

fn prediction_from_row(row: &SqliteRow) -> Result<Prediction, sqlx::Error> {
    let direction_str: String = row.get("direction");
    let direction = Direction::parse(&direction_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown direction: {}", direction_str).into())
    })?;
    let status_str: String = row.get("status");
    let status = PredictionStatus::parse(&status_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown prediction status: {}", status_str).into())
    })?;

    Ok(Prediction {
        id: row.get("id"),
        strategy: row.get("strategy"),
        direction,
        confidence: row.get("confidence"),
        status,
        result: row.get("result"),
        notes: row.get("notes"),
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
    })
}

fn import_job_from_row(row: &SqliteRow) -> Result<ImportJob, sqlx::Error> {
    let status_str: String = row.get("status");
    let status = ImportStatus::parse(&status_str).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown import status: {}", status_str).into())
    })?;

    Ok(ImportJob {
        id: row.get("id"),
        file_name: row.get("file_name"),
        status,
        total_rows: row.get("total_rows"),
        imported_rows: row.get("imported_rows"),
        failed_rows: row.get("failed_rows"),
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
    })
}
