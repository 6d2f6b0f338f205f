//! Analysis audit log

use rusqlite::params;

use super::{format_datetime, parse_datetime, row_error, Database};
use crate::error::{Error, Result};
use crate::models::{AuditRecord, AuditStatus, NewAuditRecord};
use crate::store::AuditLog;

impl Database {
    /// Append an audit record
    pub fn record_analysis_log(&self, record: &NewAuditRecord) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO ai_analysis_logs (
                user_id, request_payload, response_payload, ai_model_used,
                status, error_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.user_id,
                serde_json::to_string(&record.request_payload)?,
                serde_json::to_string(&record.response_payload)?,
                record.model_used,
                record.status.as_str(),
                record.error_message,
                format_datetime(record.timestamp),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent audit records for a user, newest first
    pub fn list_analysis_logs(&self, user_id: i64, limit: usize) -> Result<Vec<AuditRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, request_payload, response_payload, ai_model_used,
                   status, error_message, created_at
            FROM ai_analysis_logs
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let records = stmt
            .query_map(params![user_id, limit as i64], |row| {
                let request: String = row.get(2)?;
                let response: String = row.get(3)?;
                let status: String = row.get(5)?;
                let created_at: String = row.get(7)?;

                Ok(AuditRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    request_payload: serde_json::from_str(&request)
                        .map_err(|e| row_error(Error::Json(e)))?,
                    response_payload: serde_json::from_str(&response)
                        .map_err(|e| row_error(Error::Json(e)))?,
                    model_used: row.get(4)?,
                    status: status
                        .parse::<AuditStatus>()
                        .map_err(|e| row_error(Error::InvalidData(e)))?,
                    error_message: row.get(6)?,
                    timestamp: parse_datetime(&created_at).map_err(row_error)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl AuditLog for Database {
    fn record(&self, record: &NewAuditRecord) -> Result<i64> {
        self.record_analysis_log(record)
    }

    fn recent_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<AuditRecord>> {
        self.list_analysis_logs(user_id, limit)
    }
}
