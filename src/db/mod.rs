mod schema;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::files::ProcessedUpload;
use crate::models::*;

const NOTE_COLUMNS: &str = "id, user_id, title, content, tags, metadata, is_favorite, is_archived,
     is_hidden, is_locked, lock_pin_hash, is_deleted, deleted_at, version, created_at, updated_at";

const USER_COLUMNS: &str =
    "id, name, email, password_hash, avatar_url, bio, created_at, updated_at, last_login";

const FILE_COLUMNS: &str =
    "id, note_id, filename, original_filename, file_type, file_size, metadata, created_at";

const SHARE_COLUMNS: &str = "id, note_id, token, is_active, expires_at, password_hash IS NOT NULL,
     view_count, last_viewed_at, created_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        configure(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "noteai")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("noteai.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // User operations
    // ============================================================

    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                name,
                email,
                password_hash,
                ts(now),
                ts(now),
            ),
        )?;

        Ok(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            avatar_url: None,
            bio: None,
            created_at: now,
            updated_at: now,
            last_login: None,
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
                [id.to_string()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
                [email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn update_user(&self, id: Uuid, input: UpdateUserInput) -> Result<Option<User>> {
        let Some(existing) = self.get_user(id)? else {
            return Ok(None);
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let name = input.name.unwrap_or(existing.name);
        let bio = input.bio.or(existing.bio);
        let avatar_url = input.avatar_url.or(existing.avatar_url);

        conn.execute(
            "UPDATE users SET name = ?, bio = ?, avatar_url = ?, updated_at = ? WHERE id = ?",
            (&name, &bio, &avatar_url, ts(now), id.to_string()),
        )?;

        Ok(Some(User {
            name,
            bio,
            avatar_url,
            updated_at: now,
            ..existing
        }))
    }

    pub fn record_login(&self, id: Uuid) -> Result<DateTime<Utc>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        conn.execute(
            "UPDATE users SET last_login = ? WHERE id = ?",
            (ts(now), id.to_string()),
        )?;
        Ok(now)
    }

    pub fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?",
            (password_hash, ts(Utc::now()), id.to_string()),
        )?;
        Ok(rows > 0)
    }

    /// Store a reset token for the account with this email. Returns false when there is none.
    pub fn set_reset_token(&self, email: &str, token: &str, expires: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE users SET reset_token = ?, reset_token_expires = ? WHERE email = ?",
            (token, ts(expires), email),
        )?;
        Ok(rows > 0)
    }

    /// Replace the password of the account holding an unexpired `token`, consuming the token.
    pub fn reset_password_with_token(&self, token: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = ts(Utc::now());
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?, reset_token = NULL, reset_token_expires = NULL, updated_at = ?
             WHERE reset_token = ? AND reset_token_expires > ?",
            (password_hash, &now, token, &now),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Note operations
    // ============================================================

    /// Insert a note at version 1 and record its first snapshot.
    pub fn create_note(&self, user_id: Uuid, input: CreateNoteInput) -> Result<Note> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let tags_json = serde_json::to_string(&input.tags)?;
        let metadata_json = serde_json::to_string(&input.metadata)?;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO notes (id, user_id, title, content, tags, metadata, is_favorite, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
            params![
                id.to_string(),
                user_id.to_string(),
                &input.title,
                &input.content,
                &tags_json,
                &metadata_json,
                input.is_favorite,
                ts(now),
                ts(now),
            ],
        )?;
        insert_version(
            &tx,
            id,
            1,
            &input.title,
            input.content.as_deref(),
            &tags_json,
            &metadata_json,
            now,
        )?;
        tx.commit()?;

        Ok(Note {
            id,
            user_id,
            title: input.title,
            content: input.content,
            tags: input.tags,
            metadata: input.metadata,
            is_favorite: input.is_favorite,
            is_archived: false,
            is_hidden: false,
            is_locked: false,
            lock_pin_hash: None,
            is_deleted: false,
            deleted_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
            files: Vec::new(),
        })
    }

    /// A live (not trashed) note owned by `user_id`.
    pub fn get_note(&self, user_id: Uuid, id: Uuid) -> Result<Option<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        Ok(live_note(&conn, user_id, id)?)
    }

    /// A live note with its attachments loaded.
    pub fn get_note_with_files(&self, user_id: Uuid, id: Uuid) -> Result<Option<Note>> {
        let Some(mut note) = self.get_note(user_id, id)? else {
            return Ok(None);
        };
        note.files = self.list_files(note.id)?;
        Ok(Some(note))
    }

    pub fn list_notes(&self, user_id: Uuid, query: &NoteListQuery) -> Result<Vec<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE user_id = ? AND is_deleted = 0 AND is_archived = ?
             ORDER BY updated_at DESC LIMIT ? OFFSET ?"
        ))?;

        let notes = stmt
            .query_map(
                params![user_id.to_string(), query.archived, query.limit, query.skip],
                note_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    /// Live notes updated at or after `since`, newest first.
    pub fn notes_updated_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE user_id = ? AND is_deleted = 0 AND updated_at >= ?
             ORDER BY updated_at DESC LIMIT ?"
        ))?;

        let notes = stmt
            .query_map(
                params![user_id.to_string(), ts(since), limit],
                note_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    /// Apply a partial update, snapshotting the previous state and bumping the version.
    pub fn update_note(&self, user_id: Uuid, id: Uuid, input: UpdateNoteInput) -> Result<Option<Note>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();

        let tx = conn.transaction()?;
        let Some(existing) = live_note(&tx, user_id, id)? else {
            return Ok(None);
        };
        insert_version(
            &tx,
            id,
            existing.version,
            &existing.title,
            existing.content.as_deref(),
            &serde_json::to_string(&existing.tags)?,
            &serde_json::to_string(&existing.metadata)?,
            now,
        )?;

        let note = Note {
            title: input.title.unwrap_or(existing.title.clone()),
            content: input.content.or(existing.content.clone()),
            tags: input.tags.unwrap_or(existing.tags.clone()),
            metadata: input.metadata.unwrap_or(existing.metadata.clone()),
            is_favorite: input.is_favorite.unwrap_or(existing.is_favorite),
            is_archived: input.is_archived.unwrap_or(existing.is_archived),
            is_hidden: input.is_hidden.unwrap_or(existing.is_hidden),
            version: existing.version + 1,
            updated_at: now,
            ..existing
        };

        tx.execute(
            "UPDATE notes SET title = ?, content = ?, tags = ?, metadata = ?, is_favorite = ?,
                 is_archived = ?, is_hidden = ?, version = ?, updated_at = ?
             WHERE id = ?",
            params![
                &note.title,
                &note.content,
                serde_json::to_string(&note.tags)?,
                serde_json::to_string(&note.metadata)?,
                note.is_favorite,
                note.is_archived,
                note.is_hidden,
                note.version,
                ts(now),
                id.to_string(),
            ],
        )?;
        tx.commit()?;

        Ok(Some(note))
    }

    /// Write AI-derived tags and/or category without creating a version.
    pub fn apply_enrichment(
        &self,
        user_id: Uuid,
        id: Uuid,
        tags: Option<Vec<String>>,
        category: Option<&str>,
    ) -> Result<Option<Note>> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let Some(mut note) = live_note(&tx, user_id, id)? else {
            return Ok(None);
        };
        if let Some(tags) = tags {
            note.tags = tags;
        }
        if let Some(category) = category {
            note.metadata
                .insert("category".to_string(), Value::String(category.to_string()));
        }

        tx.execute(
            "UPDATE notes SET tags = ?, metadata = ? WHERE id = ?",
            (
                serde_json::to_string(&note.tags)?,
                serde_json::to_string(&note.metadata)?,
                id.to_string(),
            ),
        )?;
        tx.commit()?;
        Ok(Some(note))
    }

    pub fn set_archived(&self, user_id: Uuid, id: Uuid, archived: bool) -> Result<Option<Note>> {
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            let rows = conn.execute(
                "UPDATE notes SET is_archived = ?, updated_at = ?
                 WHERE id = ? AND user_id = ? AND is_deleted = 0",
                params![archived, ts(Utc::now()), id.to_string(), user_id.to_string()],
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.get_note(user_id, id)
    }

    /// Permanently remove a note and everything attached to it.
    pub fn delete_note(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM notes WHERE id = ? AND user_id = ?",
            [id.to_string(), user_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    pub fn search_notes(&self, user_id: Uuid, search: &NoteSearch) -> Result<Vec<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let mut clauses = vec!["user_id = ?".to_string(), "is_deleted = 0".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

        if let Some(query) = search.query.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", query.to_lowercase());
            clauses.push(
                "(unicode_lower(title) LIKE ? OR unicode_lower(COALESCE(content, '')) LIKE ?)"
                    .to_string(),
            );
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }
        if let Some(favorite) = search.is_favorite {
            clauses.push("is_favorite = ?".to_string());
            params.push(Box::new(favorite));
        }
        if let Some(archived) = search.is_archived {
            clauses.push("is_archived = ?".to_string());
            params.push(Box::new(archived));
        }
        if let Some(from) = search.date_from {
            clauses.push("created_at >= ?".to_string());
            params.push(Box::new(ts(from)));
        }
        if let Some(to) = search.date_to {
            clauses.push("created_at <= ?".to_string());
            params.push(Box::new(ts(to)));
        }

        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE {} ORDER BY updated_at DESC",
            clauses.join(" AND ")
        );
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let notes = stmt
            .query_map(params_ref.as_slice(), note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        // Tags are a JSON column, so overlap is checked here rather than in SQL.
        let wanted = search.tags.as_deref().filter(|t| !t.is_empty());
        let notes = notes
            .into_iter()
            .filter(|n| wanted.map_or(true, |tags| n.tags.iter().any(|t| tags.contains(t))))
            .skip(search.offset.max(0) as usize)
            .take(search.limit.max(0) as usize)
            .collect();

        Ok(notes)
    }

    pub fn get_note_versions(&self, user_id: Uuid, note_id: Uuid) -> Result<Option<Vec<NoteVersion>>> {
        if self.get_note(user_id, note_id)?.is_none() {
            return Ok(None);
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, note_id, version_number, title, content, tags, metadata, created_at
             FROM note_versions WHERE note_id = ? ORDER BY version_number DESC, created_at DESC",
        )?;

        let versions = stmt
            .query_map([note_id.to_string()], |row| {
                Ok(NoteVersion {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    note_id: parse_uuid(row.get::<_, String>(1)?),
                    version_number: row.get(2)?,
                    title: row.get(3)?,
                    content: row.get(4)?,
                    tags: parse_json_or_default(row.get::<_, String>(5)?),
                    metadata: parse_json_or_default(row.get::<_, String>(6)?),
                    created_at: parse_datetime(row.get::<_, String>(7)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(versions))
    }

    // ============================================================
    // Privacy operations
    // ============================================================

    pub fn lock_note(&self, user_id: Uuid, id: Uuid, pin_hash: &str) -> Result<LockOutcome> {
        let Some(note) = self.get_note(user_id, id)? else {
            return Ok(LockOutcome::NotFound);
        };
        if note.is_locked {
            return Ok(LockOutcome::AlreadyLocked);
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE notes SET is_locked = 1, lock_pin_hash = ? WHERE id = ?",
            (pin_hash, id.to_string()),
        )?;
        Ok(LockOutcome::Done)
    }

    /// Unlock when `pin_matches` accepts the stored PIN hash.
    pub fn unlock_note<F>(&self, user_id: Uuid, id: Uuid, pin_matches: F) -> Result<LockOutcome>
    where
        F: FnOnce(&str) -> bool,
    {
        let Some(note) = self.get_note(user_id, id)? else {
            return Ok(LockOutcome::NotFound);
        };
        if !note.is_locked {
            return Ok(LockOutcome::NotLocked);
        }
        let hash = note
            .lock_pin_hash
            .ok_or_else(|| anyhow::anyhow!("Lock PIN hash missing for locked note {id}"))?;
        if !pin_matches(&hash) {
            return Ok(LockOutcome::WrongPin);
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE notes SET is_locked = 0, lock_pin_hash = NULL WHERE id = ?",
            [id.to_string()],
        )?;
        Ok(LockOutcome::Done)
    }

    /// Flip the hidden flag, returning its new value.
    pub fn toggle_hidden(&self, user_id: Uuid, id: Uuid) -> Result<Option<bool>> {
        let Some(note) = self.get_note(user_id, id)? else {
            return Ok(None);
        };
        let hidden = !note.is_hidden;

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE notes SET is_hidden = ? WHERE id = ?",
            params![hidden, id.to_string()],
        )?;
        Ok(Some(hidden))
    }

    // ============================================================
    // Trash operations
    // ============================================================

    pub fn trash_note(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE notes SET is_deleted = 1, deleted_at = ?
             WHERE id = ? AND user_id = ? AND is_deleted = 0",
            (ts(Utc::now()), id.to_string(), user_id.to_string()),
        )?;
        Ok(rows > 0)
    }

    pub fn restore_note(&self, user_id: Uuid, id: Uuid) -> Result<Option<Note>> {
        {
            let conn = self.conn.lock().expect("database lock poisoned");
            let rows = conn.execute(
                "UPDATE notes SET is_deleted = 0, deleted_at = NULL
                 WHERE id = ? AND user_id = ? AND is_deleted = 1",
                [id.to_string(), user_id.to_string()],
            )?;
            if rows == 0 {
                return Ok(None);
            }
        }
        self.get_note(user_id, id)
    }

    /// Trashed notes, most recently trashed first.
    pub fn list_trash(&self, user_id: Uuid) -> Result<Vec<Note>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE user_id = ? AND is_deleted = 1 ORDER BY deleted_at DESC"
        ))?;
        let notes = stmt
            .query_map([user_id.to_string()], note_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Permanently delete one trashed note.
    pub fn purge_note(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM notes WHERE id = ? AND user_id = ? AND is_deleted = 1",
            [id.to_string(), user_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    /// Permanently delete every trashed note; returns how many were removed.
    pub fn empty_trash(&self, user_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM notes WHERE user_id = ? AND is_deleted = 1",
            [user_id.to_string()],
        )?;
        Ok(rows)
    }

    // ============================================================
    // File operations
    // ============================================================

    pub fn create_file(&self, note_id: Uuid, upload: ProcessedUpload) -> Result<FileAttachment> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let file_size = upload.data.len() as i64;
        let metadata = match upload.metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        conn.execute(
            "INSERT INTO file_attachments (id, note_id, filename, original_filename, file_type, file_size, data, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id.to_string(),
                note_id.to_string(),
                &upload.filename,
                &upload.original_filename,
                &upload.file_type,
                file_size,
                &upload.data,
                serde_json::to_string(&metadata)?,
                ts(now),
            ],
        )?;

        Ok(FileAttachment {
            id,
            note_id,
            filename: upload.filename,
            original_filename: upload.original_filename,
            file_type: upload.file_type,
            file_size,
            metadata,
            created_at: now,
        })
    }

    pub fn list_files(&self, note_id: Uuid) -> Result<Vec<FileAttachment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM file_attachments WHERE note_id = ? ORDER BY created_at"
        ))?;
        let files = stmt
            .query_map([note_id.to_string()], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// An attachment on one of the user's notes.
    pub fn get_file(&self, user_id: Uuid, id: Uuid) -> Result<Option<FileAttachment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let columns = FILE_COLUMNS
            .split(", ")
            .map(|c| format!("f.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let file = conn
            .query_row(
                &format!(
                    "SELECT {columns} FROM file_attachments f JOIN notes n ON n.id = f.note_id
                     WHERE f.id = ? AND n.user_id = ?"
                ),
                [id.to_string(), user_id.to_string()],
                file_from_row,
            )
            .optional()?;
        Ok(file)
    }

    pub fn get_file_data(&self, user_id: Uuid, id: Uuid) -> Result<Option<FileDownload>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let download = conn
            .query_row(
                "SELECT f.original_filename, f.file_type, f.data
                 FROM file_attachments f JOIN notes n ON n.id = f.note_id
                 WHERE f.id = ? AND n.user_id = ?",
                [id.to_string(), user_id.to_string()],
                |row| {
                    Ok(FileDownload {
                        original_filename: row.get(0)?,
                        file_type: row.get(1)?,
                        data: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(download)
    }

    pub fn delete_file(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM file_attachments
             WHERE id = ? AND note_id IN (SELECT id FROM notes WHERE user_id = ?)",
            [id.to_string(), user_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Shared link operations
    // ============================================================

    pub fn create_share(
        &self,
        note_id: Uuid,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
        password_hash: Option<&str>,
    ) -> Result<SharedLink> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO shared_links (id, note_id, token, is_active, expires_at, password_hash, view_count, created_at)
             VALUES (?, ?, ?, 1, ?, ?, 0, ?)",
            (
                id.to_string(),
                note_id.to_string(),
                token,
                expires_at.map(ts),
                password_hash,
                ts(now),
            ),
        )?;

        Ok(SharedLink {
            id,
            note_id,
            token: token.to_string(),
            is_active: true,
            expires_at,
            has_password: password_hash.is_some(),
            view_count: 0,
            last_viewed_at: None,
            created_at: now,
        })
    }

    pub fn list_shares(&self, note_id: Uuid) -> Result<Vec<SharedLink>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {SHARE_COLUMNS} FROM shared_links WHERE note_id = ? ORDER BY created_at DESC"
        ))?;
        let links = stmt
            .query_map([note_id.to_string()], share_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    /// Deactivate a link on one of the user's notes.
    pub fn deactivate_share(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE shared_links SET is_active = 0
             WHERE id = ? AND note_id IN (SELECT id FROM notes WHERE user_id = ?)",
            [id.to_string(), user_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    /// Open a shared note by token, counting the view on success.
    ///
    /// `password_ok` is only consulted for password-protected links and
    /// receives the stored hash.
    pub fn access_shared_note<F>(&self, token: &str, password_ok: F) -> Result<SharedAccess>
    where
        F: FnOnce(&str) -> bool,
    {
        let now = Utc::now();
        let link = {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.query_row(
                "SELECT id, note_id, expires_at, password_hash FROM shared_links
                 WHERE token = ? AND is_active = 1",
                [token],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?
        };

        let Some((link_id, note_id, expires_at, password_hash)) = link else {
            return Ok(SharedAccess::Unavailable);
        };
        if expires_at.map(parse_datetime).is_some_and(|exp| exp < now) {
            return Ok(SharedAccess::Unavailable);
        }
        if let Some(hash) = password_hash {
            if !password_ok(&hash) {
                return Ok(SharedAccess::WrongPassword);
            }
        }

        let note = {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE shared_links SET view_count = view_count + 1, last_viewed_at = ? WHERE id = ?",
                (ts(now), &link_id),
            )?;
            conn.query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND is_deleted = 0"),
                [&note_id],
                note_from_row,
            )
            .optional()?
        };

        let Some(mut note) = note else {
            return Ok(SharedAccess::Unavailable);
        };
        note.files = self.list_files(note.id)?;
        Ok(SharedAccess::Granted(Box::new(note)))
    }

    // ============================================================
    // Activity operations
    // ============================================================

    pub fn log_activity(&self, user_id: Uuid, activity: NewActivity) -> Result<Activity> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO user_activities (id, user_id, note_id, activity_type, description, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                user_id.to_string(),
                activity.note_id.map(|u| u.to_string()),
                &activity.activity_type,
                &activity.description,
                serde_json::to_string(&activity.metadata)?,
                ts(now),
            ),
        )?;

        Ok(Activity {
            id,
            user_id,
            note_id: activity.note_id,
            activity_type: activity.activity_type,
            description: activity.description,
            metadata: activity.metadata,
            created_at: now,
        })
    }

    /// Most recent activity first.
    pub fn list_activities(&self, user_id: Uuid, limit: i64) -> Result<Vec<Activity>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, note_id, activity_type, description, metadata, created_at
             FROM user_activities WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )?;

        let activities = stmt
            .query_map(params![user_id.to_string(), limit], |row| {
                Ok(Activity {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    user_id: parse_uuid(row.get::<_, String>(1)?),
                    note_id: row.get::<_, Option<String>>(2)?.map(parse_uuid),
                    activity_type: row.get(3)?,
                    description: row.get(4)?,
                    metadata: parse_json_or_default(row.get::<_, String>(5)?),
                    created_at: parse_datetime(row.get::<_, String>(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(activities)
    }

    pub fn analytics(&self, user_id: Uuid) -> Result<Analytics> {
        let recent_activities = self
            .list_activities(user_id, 10)?
            .into_iter()
            .map(|a| ActivitySummary {
                activity_type: a.activity_type,
                description: a.description,
                created_at: a.created_at,
            })
            .collect();

        let conn = self.conn.lock().expect("database lock poisoned");
        let uid = user_id.to_string();
        let now = Utc::now();
        let scalar = |sql: &str, params: &[&dyn rusqlite::ToSql]| -> Result<i64> {
            Ok(conn.query_row(sql, params, |row| row.get(0))?)
        };

        let total_notes = scalar(
            "SELECT COUNT(*) FROM notes WHERE user_id = ? AND is_deleted = 0",
            &[&uid],
        )?;
        let notes_this_week = scalar(
            "SELECT COUNT(*) FROM notes WHERE user_id = ? AND is_deleted = 0 AND created_at >= ?",
            &[&uid, &ts(now - Duration::days(7))],
        )?;
        let total_files = scalar(
            "SELECT COUNT(*) FROM file_attachments f JOIN notes n ON n.id = f.note_id WHERE n.user_id = ?",
            &[&uid],
        )?;
        let total_shared = scalar(
            "SELECT COUNT(*) FROM shared_links s JOIN notes n ON n.id = s.note_id
             WHERE n.user_id = ? AND s.is_active = 1",
            &[&uid],
        )?;
        let ai_operations_count = scalar(
            "SELECT COUNT(*) FROM user_activities WHERE user_id = ? AND activity_type LIKE 'ai\\_%' ESCAPE '\\'",
            &[&uid],
        )?;

        let mut notes_by_tag = BTreeMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT tags FROM notes WHERE user_id = ? AND is_deleted = 0")?;
            let tag_lists = stmt
                .query_map([&uid], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            for tags in tag_lists {
                for tag in parse_json_or_default::<Vec<String>>(tags) {
                    *notes_by_tag.entry(tag).or_insert(0) += 1;
                }
            }
        }

        let mut activity_timeline = Vec::with_capacity(7);
        for days_ago in (0..7).rev() {
            let date = (now - Duration::days(days_ago)).format("%Y-%m-%d").to_string();
            let count = scalar(
                "SELECT COUNT(*) FROM user_activities WHERE user_id = ? AND substr(created_at, 1, 10) = ?",
                &[&uid, &date],
            )?;
            activity_timeline.push(TimelineDay { date, count });
        }

        Ok(Analytics {
            total_notes,
            notes_this_week,
            total_files,
            total_shared,
            ai_operations_count,
            recent_activities,
            notes_by_tag,
            activity_timeline,
        })
    }

    // ============================================================
    // Chat operations
    // ============================================================

    pub fn create_chat_session(&self, user_id: Uuid) -> Result<ChatSession> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO chat_sessions (id, user_id, created_at) VALUES (?, ?, ?)",
            (id.to_string(), user_id.to_string(), ts(now)),
        )?;
        Ok(ChatSession {
            id,
            user_id,
            created_at: now,
        })
    }

    pub fn get_chat_session(&self, user_id: Uuid, id: Uuid) -> Result<Option<ChatSession>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let session = conn
            .query_row(
                "SELECT id, user_id, created_at FROM chat_sessions WHERE id = ? AND user_id = ?",
                [id.to_string(), user_id.to_string()],
                chat_session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    pub fn list_chat_sessions(&self, user_id: Uuid, skip: i64, limit: i64) -> Result<Vec<ChatSession>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, created_at FROM chat_sessions
             WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )?;
        let sessions = stmt
            .query_map(params![user_id.to_string(), limit, skip], chat_session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    pub fn add_chat_message(&self, chat_id: Uuid, role: ChatRole, content: &str) -> Result<ChatMessage> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO chat_messages (id, chat_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
            (id.to_string(), chat_id.to_string(), role.as_str(), content, ts(now)),
        )?;
        Ok(ChatMessage {
            id,
            chat_id,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// The newest `limit` messages, in insertion order.
    pub fn get_chat_messages(&self, chat_id: Uuid, limit: i64) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, created_at FROM (
                 SELECT rowid AS seq, id, chat_id, role, content, created_at FROM chat_messages
                 WHERE chat_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?
             ) ORDER BY created_at ASC, seq ASC",
        )?;
        let messages = stmt
            .query_map(params![chat_id.to_string(), limit], |row| {
                let role: String = row.get(2)?;
                Ok(ChatMessage {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    chat_id: parse_uuid(row.get::<_, String>(1)?),
                    role: ChatRole::from_str(&role).unwrap_or(ChatRole::User),
                    content: row.get(3)?,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
/// Per-connection setup: foreign keys and the Unicode-aware `unicode_lower`
/// used by case-insensitive search. SQLite's own `LOWER` folds ASCII only.
fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

fn live_note(conn: &Connection, user_id: Uuid, id: Uuid) -> rusqlite::Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ? AND user_id = ? AND is_deleted = 0"),
        [id.to_string(), user_id.to_string()],
        note_from_row,
    )
    .optional()
}

fn insert_version(
    conn: &Connection,
    note_id: Uuid,
    version_number: i64,
    title: &str,
    content: Option<&str>,
    tags_json: &str,
    metadata_json: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO note_versions (id, note_id, version_number, title, content, tags, metadata, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            note_id.to_string(),
            version_number,
            title,
            content,
            tags_json,
            metadata_json,
            ts(now),
        ],
    )
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        title: row.get(2)?,
        content: row.get(3)?,
        tags: parse_json_or_default(row.get::<_, String>(4)?),
        metadata: parse_json_or_default(row.get::<_, String>(5)?),
        is_favorite: row.get(6)?,
        is_archived: row.get(7)?,
        is_hidden: row.get(8)?,
        is_locked: row.get(9)?,
        lock_pin_hash: row.get(10)?,
        is_deleted: row.get(11)?,
        deleted_at: row.get::<_, Option<String>>(12)?.map(parse_datetime),
        version: row.get(13)?,
        created_at: parse_datetime(row.get::<_, String>(14)?),
        updated_at: parse_datetime(row.get::<_, String>(15)?),
        files: Vec::new(),
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        avatar_url: row.get(4)?,
        bio: row.get(5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
        updated_at: parse_datetime(row.get::<_, String>(7)?),
        last_login: row.get::<_, Option<String>>(8)?.map(parse_datetime),
    })
}

fn file_from_row(row: &Row) -> rusqlite::Result<FileAttachment> {
    Ok(FileAttachment {
        id: parse_uuid(row.get::<_, String>(0)?),
        note_id: parse_uuid(row.get::<_, String>(1)?),
        filename: row.get(2)?,
        original_filename: row.get(3)?,
        file_type: row.get(4)?,
        file_size: row.get(5)?,
        metadata: parse_json_or_default(row.get::<_, String>(6)?),
        created_at: parse_datetime(row.get::<_, String>(7)?),
    })
}

fn share_from_row(row: &Row) -> rusqlite::Result<SharedLink> {
    Ok(SharedLink {
        id: parse_uuid(row.get::<_, String>(0)?),
        note_id: parse_uuid(row.get::<_, String>(1)?),
        token: row.get(2)?,
        is_active: row.get(3)?,
        expires_at: row.get::<_, Option<String>>(4)?.map(parse_datetime),
        has_password: row.get(5)?,
        view_count: row.get(6)?,
        last_viewed_at: row.get::<_, Option<String>>(7)?.map(parse_datetime),
        created_at: parse_datetime(row.get::<_, String>(8)?),
    })
}

fn chat_session_from_row(row: &Row) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: parse_uuid(row.get::<_, String>(0)?),
        user_id: parse_uuid(row.get::<_, String>(1)?),
        created_at: parse_datetime(row.get::<_, String>(2)?),
    })
}

/// Fixed-width UTC timestamps so string comparison in SQL orders correctly.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_json_or_default<T: serde::de::DeserializeOwned + Default>(s: String) -> T {
    serde_json::from_str(&s).unwrap_or_default()
}
