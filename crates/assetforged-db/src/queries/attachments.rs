//! Attachment database queries.
//!
//! CRUD operations for attachments and the parent/name and parent/location
//! lookups used by the variant cache.

use assetforged_common::{Attachment, AttachmentId, Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

const COLUMNS: &str = "id, parent_id, name, title, mime_type, size, revised, location";

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_id(idx: usize, raw: &str) -> rusqlite::Result<AttachmentId> {
    Uuid::parse_str(raw)
        .map(AttachmentId::from)
        .map_err(|e| conversion_error(idx, e))
}

/// Parse an attachment from a database row.
///
/// Expects columns in the order of [`COLUMNS`].
fn parse_attachment_row(row: &rusqlite::Row) -> rusqlite::Result<Attachment> {
    let id = parse_id(0, &row.get::<_, String>(0)?)?;
    let parent_id = row
        .get::<_, Option<String>>(1)?
        .map(|raw| parse_id(1, &raw))
        .transpose()?;
    let revised = DateTime::parse_from_rfc3339(&row.get::<_, String>(6)?)
        .map_err(|e| conversion_error(6, e))?
        .with_timezone(&Utc);

    Ok(Attachment {
        id,
        parent_id,
        name: row.get(2)?,
        title: row.get(3)?,
        mime_type: row.get(4)?,
        size: row.get::<_, i64>(5)?.max(0) as u64,
        revised,
        location: row.get(7)?,
    })
}

fn format_revised(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Insert a new attachment record.
pub fn insert_attachment(conn: &Connection, att: &Attachment) -> Result<AttachmentId> {
    conn.execute(
        "INSERT INTO attachments (id, parent_id, name, title, mime_type, size, revised, location)
         VALUES (:id, :parent_id, :name, :title, :mime_type, :size, :revised, :location)",
        rusqlite::named_params! {
            ":id": att.id.to_string(),
            ":parent_id": att.parent_id.map(|p| p.to_string()),
            ":name": &att.name,
            ":title": &att.title,
            ":mime_type": &att.mime_type,
            ":size": att.size as i64,
            ":revised": format_revised(&att.revised),
            ":location": &att.location,
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(att.id)
}

/// Get an attachment by ID.
///
/// # Returns
///
/// * `Ok(Some(Attachment))` - The attachment if found
/// * `Ok(None)` - If the attachment does not exist
/// * `Err(Error)` - If a database error occurs
pub fn get_attachment(conn: &Connection, id: AttachmentId) -> Result<Option<Attachment>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM attachments WHERE id = :id"),
        rusqlite::named_params! { ":id": id.to_string() },
        parse_attachment_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Get all children of `parent_id` with the given name, newest revision first.
pub fn children_named(
    conn: &Connection,
    parent_id: AttachmentId,
    name: &str,
) -> Result<Vec<Attachment>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM attachments
             WHERE parent_id = :parent_id AND name = :name
             ORDER BY revised DESC"
        ))
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map(
            rusqlite::named_params! {
                ":parent_id": parent_id.to_string(),
                ":name": name,
            },
            parse_attachment_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows)
}

/// Get the first child of `parent_id` carrying the given location tag.
pub fn get_by_location(
    conn: &Connection,
    parent_id: AttachmentId,
    location: &str,
) -> Result<Option<Attachment>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM attachments
             WHERE parent_id = :parent_id AND location = :location
             ORDER BY revised DESC
             LIMIT 1"
        ),
        rusqlite::named_params! {
            ":parent_id": parent_id.to_string(),
            ":location": location,
        },
        parse_attachment_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Persist every mutable field of an existing attachment.
///
/// Returns `Error::NotFound` if no row has the attachment's ID.
pub fn update_attachment(conn: &Connection, att: &Attachment) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE attachments
             SET parent_id = :parent_id, name = :name, title = :title,
                 mime_type = :mime_type, size = :size, revised = :revised,
                 location = :location
             WHERE id = :id",
            rusqlite::named_params! {
                ":id": att.id.to_string(),
                ":parent_id": att.parent_id.map(|p| p.to_string()),
                ":name": &att.name,
                ":title": &att.title,
                ":mime_type": &att.mime_type,
                ":size": att.size as i64,
                ":revised": format_revised(&att.revised),
                ":location": &att.location,
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if changed == 0 {
        return Err(Error::not_found(format!("attachment {}", att.id)));
    }
    Ok(())
}

/// Set only the mime type of an attachment, leaving size and revision alone.
///
/// Returns `Error::NotFound` if no row has that ID.
pub fn set_mime_type(conn: &Connection, id: AttachmentId, mime_type: &str) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE attachments SET mime_type = :mime_type WHERE id = :id",
            rusqlite::named_params! {
                ":id": id.to_string(),
                ":mime_type": mime_type,
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if changed == 0 {
        return Err(Error::not_found(format!("attachment {}", id)));
    }
    Ok(())
}

/// Delete an attachment by ID.
///
/// # Returns
///
/// * `Ok(true)` - If the attachment was deleted
/// * `Ok(false)` - If no attachment had that ID
pub fn delete_attachment(conn: &Connection, id: AttachmentId) -> Result<bool> {
    let changed = conn
        .execute(
            "DELETE FROM attachments WHERE id = :id",
            rusqlite::named_params! { ":id": id.to_string() },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(changed > 0)
}
