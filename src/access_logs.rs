use std::net::IpAddr;

use chrono::naive::NaiveDateTime;
use serde_json::Value;
use uuid::Uuid;

/// Kind of access that also marks the note as read
pub const READ_ACCESS: &str = "read";

/// Access to a note by its owner
#[derive(Clone, Debug)]
pub struct AccessLog {
    pub id: Uuid,
    pub owner_id: String,
    pub note_id: String,
    pub kind: String,
    pub location: Option<String>,
    pub client_info: Option<Value>,
    pub server_ip: Option<IpAddr>,
    pub created_at: NaiveDateTime,
}

/// When a note was last read by its owner
#[derive(Clone, Debug)]
pub struct NoteReadStatus {
    pub last_read_at: NaiveDateTime,
}
