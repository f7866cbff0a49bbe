/// Session history reporting
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use tabled::{Table, Tabled};

use blokd_storage::{Database, SessionHistory};

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Ended")]
    ended: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Blocked Attempts")]
    attempts: u32,
}

impl From<&SessionHistory> for SessionRow {
    fn from(session: &SessionHistory) -> Self {
        Self {
            id: session.id,
            started: format_time(session.start_time),
            ended: session
                .end_time
                .map_or_else(|| "ongoing".to_string(), format_time),
            duration: session
                .duration_seconds()
                .map_or_else(|| "-".to_string(), format_duration),
            attempts: session.blocked_attempts,
        }
    }
}

pub fn show(id: Option<i64>) -> Result<()> {
    let db = Database::new(None)?;

    let sessions = match id {
        Some(id) => match db.get_session_by_id(id)? {
            Some(session) => vec![session],
            None => {
                println!("No session with id {id}.");
                return Ok(());
            }
        },
        None => db.get_sessions()?,
    };

    if sessions.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }

    let rows: Vec<SessionRow> = sessions.iter().map(SessionRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn format_duration(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
