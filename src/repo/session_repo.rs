use diesel::prelude::*;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::{FlashcoreError, Result};
use crate::models::{Session, SessionChanges, SessionRow};
use crate::schema::sessions;

fn to_session(row: SessionRow) -> Result<Session> {
    let key = row.session_uuid.clone();
    Session::try_from(row).map_err(|source| FlashcoreError::Marshalling {
        entity: "session",
        key,
        source,
    })
}

/// Stores a new session
///
/// ### Returns
///
/// The session with its store-assigned id
///
/// ### Errors
///
/// Returns `ReadOnlyViolation` on a read-only handle and `TransactionFailure`
/// if the insert fails, for example when the session UUID already exists.
#[instrument(skip(db, session), fields(session_uuid = %session.get_session_uuid()))]
pub fn create_session(db: &Database, session: &Session) -> Result<Session> {
    db.ensure_writable("create session")?;

    const OPERATION: &str = "create session";
    let changes = SessionChanges::from(session);
    let session_id = db.with_transaction(OPERATION, |conn| {
        diesel::insert_into(sessions::table)
            .values(&changes)
            .returning(sessions::session_id)
            .get_result::<i32>(conn)
            .map_err(|e| FlashcoreError::storage(OPERATION, e))
    })?;

    let mut created = session.clone();
    created.set_session_id(session_id);
    info!(session_id, "Session created");
    Ok(created)
}

/// Overwrites the stored counters and timestamps of a session
///
/// ### Errors
///
/// Returns `ReadOnlyViolation` on a read-only handle and `SessionNotFound` if
/// no session has this UUID.
#[instrument(skip(db, session), fields(session_uuid = %session.get_session_uuid()))]
pub fn update_session(db: &Database, session: &Session) -> Result<Session> {
    db.ensure_writable("update session")?;

    const OPERATION: &str = "update session";
    let session_uuid = session.get_session_uuid();
    let changes = SessionChanges::from(session);
    let row = db.with_transaction(OPERATION, |conn| {
        let updated = diesel::update(
            sessions::table.filter(sessions::session_uuid.eq(session_uuid.to_string())),
        )
        .set(&changes)
        .execute(conn)
        .map_err(|e| FlashcoreError::storage(OPERATION, e))?;
        if updated == 0 {
            return Err(FlashcoreError::SessionNotFound(session_uuid));
        }
        sessions::table
            .filter(sessions::session_uuid.eq(session_uuid.to_string()))
            .select(SessionRow::as_select())
            .first::<SessionRow>(conn)
            .map_err(|e| FlashcoreError::storage(OPERATION, e))
    })?;

    debug!(cards_reviewed = row.cards_reviewed, "Session updated");
    to_session(row)
}

/// Retrieves one session by UUID
#[instrument(skip(db), fields(session_uuid = %session_uuid))]
pub fn get_session_by_uuid(db: &Database, session_uuid: Uuid) -> Result<Option<Session>> {
    let row = db.with_connection(|conn| {
        sessions::table
            .filter(sessions::session_uuid.eq(session_uuid.to_string()))
            .select(SessionRow::as_select())
            .first::<SessionRow>(conn)
            .optional()
            .map_err(|e| FlashcoreError::storage("get session", e))
    })?;
    row.map(to_session).transpose()
}

/// Lists sessions that have not ended, newest first
///
/// ### Arguments
///
/// * `user_id` - Restrict to one user
#[instrument(skip(db))]
pub fn get_active_sessions(db: &Database, user_id: Option<&str>) -> Result<Vec<Session>> {
    let rows = db.with_connection(|conn| {
        let mut query = sessions::table
            .filter(sessions::end_ts.is_null())
            .select(SessionRow::as_select())
            .into_boxed();
        if let Some(user) = user_id {
            query = query.filter(sessions::user_id.eq(user.to_string()));
        }
        query
            .order((sessions::start_ts.desc(), sessions::session_id.desc()))
            .load::<SessionRow>(conn)
            .map_err(|e| FlashcoreError::storage("get active sessions", e))
    })?;
    rows.into_iter().map(to_session).collect()
}

/// Lists the most recently started sessions, newest first
#[instrument(skip(db))]
pub fn get_recent_sessions(db: &Database, limit: usize, user_id: Option<&str>) -> Result<Vec<Session>> {
    let rows = db.with_connection(|conn| {
        let mut query = sessions::table.select(SessionRow::as_select()).into_boxed();
        if let Some(user) = user_id {
            query = query.filter(sessions::user_id.eq(user.to_string()));
        }
        query
            .order((sessions::start_ts.desc(), sessions::session_id.desc()))
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .load::<SessionRow>(conn)
            .map_err(|e| FlashcoreError::storage("get recent sessions", e))
    })?;
    rows.into_iter().map(to_session).collect()
}
