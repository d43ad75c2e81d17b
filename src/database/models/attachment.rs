use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Full attachment record including content bytes. Only fetched for
/// downloads; listings use [`AttachmentMeta`] so the content column stays
/// out of list queries.
#[derive(Debug, Clone, FromRow)]
pub struct Attachment {
    pub id: i64,
    pub ticket_id: i64,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub data: Vec<u8>,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttachmentMeta {
    pub id: i64,
    pub ticket_id: i64,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<&Attachment> for AttachmentMeta {
    fn from(a: &Attachment) -> Self {
        AttachmentMeta {
            id: a.id,
            ticket_id: a.ticket_id,
            filename: a.filename.clone(),
            content_type: a.content_type.clone(),
            size_bytes: a.size_bytes,
            uploaded_by: a.uploaded_by,
            created_at: a.created_at,
        }
    }
}

/// Upload shape. Multipart decoding happens upstream; the core only ever
/// sees already-decoded bytes plus metadata.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub ticket_id: i64,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub uploaded_by: Option<i64>,
}
