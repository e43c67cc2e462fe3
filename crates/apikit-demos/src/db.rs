//! In-memory item store and its request-scoped session dependency.
//!
//! A [`DbSession`] is opened once per request and closed by the request's
//! cleanup stack when dispatch finishes, whether the handler succeeded,
//! returned an error or never ran because validation failed. The session
//! counters on [`Database`] make that observable to tests.

use apikit::extract::State;
use apikit::{FromDependency, FromRequest, HttpError, Request, RequestContext};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// A stored item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredItem {
    /// Assigned identifier, starting at 1.
    pub id: u64,
    /// Item name.
    pub name: String,
}

/// An in-memory item table.
#[derive(Debug)]
pub struct Database {
    name: String,
    items: Mutex<Vec<StoredItem>>,
    next_id: AtomicU64,
    next_session: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl Database {
    /// Create an empty database.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            next_session: AtomicU64::new(1),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Open a session. The caller is responsible for closing it.
    #[must_use]
    pub fn open_session(self: &Arc<Self>) -> DbSession {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(database = %self.name, session = id, "session opened");
        DbSession {
            db: Arc::clone(self),
            id,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Copy of every stored item.
    #[must_use]
    pub fn items(&self) -> Vec<StoredItem> {
        self.items.lock().clone()
    }

    /// Sessions opened so far.
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    #[must_use]
    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sessions currently open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.sessions_opened()
            .saturating_sub(self.sessions_closed())
    }
}

/// A database session bound to one request.
#[derive(Debug, Clone)]
pub struct DbSession {
    db: Arc<Database>,
    id: u64,
    closed: Arc<AtomicBool>,
}

impl DbSession {
    /// Open a session on `db` that closes when the request finishes.
    #[must_use]
    pub fn open_scoped(ctx: &RequestContext, db: &Arc<Database>) -> Self {
        let session = db.open_session();
        let on_exit = session.clone();
        ctx.cleanup_stack().push(move || on_exit.close());
        session
    }

    /// Session identifier, unique per database.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the database this session writes to.
    #[must_use]
    pub fn database_name(&self) -> &str {
        self.db.name()
    }

    /// Returns true once the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Insert an item and return it with its new id.
    pub fn insert_item(&self, name: impl Into<String>) -> Result<StoredItem, HttpError> {
        if self.is_closed() {
            tracing::error!(session = self.id, "write on closed session");
            return Err(HttpError::internal().with_detail("Session closed"));
        }
        let item = StoredItem {
            id: self.db.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        };
        self.db.items.lock().push(item.clone());
        Ok(item)
    }

    /// Close the session. Closing twice has no further effect.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.db.closed.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(database = %self.db.name, session = self.id, "session closed");
        }
    }
}

impl FromDependency for DbSession {
    type Error = HttpError;

    async fn from_dependency(ctx: &RequestContext, req: &mut Request) -> Result<Self, Self::Error> {
        let State(db) = State::<Arc<Database>>::from_request(ctx, req).await?;
        Ok(Self::open_scoped(ctx, &db))
    }
}
