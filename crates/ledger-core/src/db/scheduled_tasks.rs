//! Scheduled task storage

use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, row_error, Database};
use crate::error::{Error, Result};
use crate::models::{NewScheduledTask, ScheduleType, ScheduledTask, TaskType};
use crate::store::ScheduledTaskStore;

const TASK_COLUMNS: &str = "id, user_id, task_type, schedule_type, cron_expression, is_active, \
                            last_run_at, next_run_at, created_at";

fn map_task(row: &Row<'_>) -> rusqlite::Result<ScheduledTask> {
    let task_type: String = row.get(2)?;
    let schedule_type: String = row.get(3)?;
    let last_run_at: Option<String> = row.get(6)?;
    let next_run_at: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;

    let optional_datetime = |s: Option<String>| -> rusqlite::Result<_> {
        s.map(|s| parse_datetime(&s).map_err(row_error)).transpose()
    };

    Ok(ScheduledTask {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task_type: task_type
            .parse::<TaskType>()
            .map_err(|e| row_error(Error::InvalidData(e)))?,
        schedule_type: schedule_type
            .parse::<ScheduleType>()
            .map_err(|e| row_error(Error::InvalidData(e)))?,
        cron_expression: row.get(4)?,
        is_active: row.get(5)?,
        last_run_at: optional_datetime(last_run_at)?,
        next_run_at: optional_datetime(next_run_at)?,
        created_at: parse_datetime(&created_at).map_err(row_error)?,
    })
}

impl Database {
    /// Persist a new active task
    pub fn create_scheduled_task(&self, task: &NewScheduledTask) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO scheduled_tasks (
                user_id, task_type, schedule_type, cron_expression, is_active, next_run_at
            ) VALUES (?, ?, ?, ?, 1, ?)
            "#,
            params![
                task.user_id,
                task.task_type.as_str(),
                task.schedule_type.as_str(),
                task.cron_expression,
                task.next_run_at.map(format_datetime),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_scheduled_task(&self, id: i64) -> Result<Option<ScheduledTask>> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {} FROM scheduled_tasks WHERE id = ?", TASK_COLUMNS),
                params![id],
                map_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Active tasks, optionally for a single user
    pub fn list_active_scheduled_tasks(&self, user_id: Option<i64>) -> Result<Vec<ScheduledTask>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM scheduled_tasks \
             WHERE is_active = 1 AND (?1 IS NULL OR user_id = ?1) \
             ORDER BY id",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![user_id], map_task)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Save run bookkeeping and activation state
    pub fn update_scheduled_task(&self, task: &ScheduledTask) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE scheduled_tasks
            SET is_active = ?, last_run_at = ?, next_run_at = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![
                task.is_active,
                task.last_run_at.map(format_datetime),
                task.next_run_at.map(format_datetime),
                task.id,
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("scheduled task {}", task.id)));
        }
        Ok(())
    }
}

impl ScheduledTaskStore for Database {
    fn create(&self, task: &NewScheduledTask) -> Result<i64> {
        self.create_scheduled_task(task)
    }

    fn get(&self, id: i64) -> Result<Option<ScheduledTask>> {
        self.get_scheduled_task(id)
    }

    fn list_active(&self) -> Result<Vec<ScheduledTask>> {
        self.list_active_scheduled_tasks(None)
    }

    fn list_active_for_user(&self, user_id: i64) -> Result<Vec<ScheduledTask>> {
        self.list_active_scheduled_tasks(Some(user_id))
    }

    fn update(&self, task: &ScheduledTask) -> Result<()> {
        self.update_scheduled_task(task)
    }
}
