//! Versioned schema lifecycle for a single managed connection.
//!
//! [`OpenHelper`] owns one [`Connection`] and brings it to a usable state
//! the first time it is asked for: open, begin a transaction, configure,
//! create or migrate the schema, persist the target version, run the open
//! hook, commit. The sequence runs once for all threads that call
//! [`OpenHelper::prepare`] concurrently; they all see its outcome.
//!
//! # Example
//!
//! ```no_run
//! use sqlhelper_core::{Connection, OpenHelper, Result, SchemaCallbacks};
//! # use sqlhelper_core::ConnectionFactory;
//!
//! struct Champions;
//!
//! impl SchemaCallbacks for Champions {
//!     fn on_create(&self, db: &dyn Connection) -> Result<()> {
//!         db.execute_update(
//!             "CREATE TABLE champions (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
//!             &Default::default(),
//!         )?;
//!         Ok(())
//!     }
//! }
//!
//! # fn run<F: ConnectionFactory>(factory: F) -> Result<()> {
//! let helper = OpenHelper::new(factory, Champions, Some("champions.db"), 1, "/var/lib/app")?;
//! let db = helper.prepare()?;
//! assert!(db.is_open());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionFactory, DatabaseLocation};
use crate::error::{DatabaseError, MigrationPhase, Result};

/// Hooks invoked while a connection is prepared. Every hook defaults to a
/// no-op.
///
/// All hooks run inside the preparation transaction. An error from any of
/// them rolls the transaction back and is returned from
/// [`OpenHelper::prepare`].
pub trait SchemaCallbacks: Send + Sync {
    /// Runs first on every preparation, before the schema version is read.
    fn on_configure(&self, _db: &dyn Connection) -> Result<()> {
        Ok(())
    }

    /// Runs when the persisted schema version is 0.
    fn on_create(&self, _db: &dyn Connection) -> Result<()> {
        Ok(())
    }

    /// Runs when the persisted version is below the target version.
    fn on_upgrade(&self, _db: &dyn Connection, _old_version: u32, _new_version: u32) -> Result<()> {
        Ok(())
    }

    /// Runs when the persisted version is above the target version.
    fn on_downgrade(&self, _db: &dyn Connection, _old_version: u32, _new_version: u32) -> Result<()> {
        Ok(())
    }

    /// Runs last, after the target version has been persisted.
    fn on_open(&self, _db: &dyn Connection) -> Result<()> {
        Ok(())
    }
}

/// Callbacks that do nothing; the schema is managed elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl SchemaCallbacks for NoopCallbacks {}

/// Step of a preparation pass in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparePhase {
    Configuring,
    Creating,
    Upgrading,
    Downgrading,
    PersistingVersion,
    Opening,
}

/// Where the managed connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Preparing(PreparePhase),
    Ready,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Preparing(phase) => write!(f, "preparing ({phase:?})"),
            Self::Ready => f.write_str("ready"),
        }
    }
}

/// Outcome of the last completed preparation pass, guarded by the
/// preparation lock.
#[derive(Debug, Default)]
struct PassRecord {
    completed: u64,
    failure: Option<DatabaseError>,
}

/// Owns one connection and drives it through schema preparation.
pub struct OpenHelper<F: ConnectionFactory, S: SchemaCallbacks = NoopCallbacks> {
    factory: F,
    callbacks: S,
    location: DatabaseLocation,
    version: u32,
    connection: OnceLock<Arc<F::Connection>>,
    ready: AtomicBool,
    passes: AtomicU64,
    prepare_lock: Mutex<PassRecord>,
    state: Mutex<LifecycleState>,
}

impl<F: ConnectionFactory, S: SchemaCallbacks> OpenHelper<F, S> {
    /// Creates a helper for the database `name` at target schema `version`.
    ///
    /// `None` selects an in-memory database and `Some("")` a temporary
    /// one; any other name is resolved under `storage_root`. Nothing is
    /// opened until [`prepare`](Self::prepare) is called.
    pub fn new(
        factory: F,
        callbacks: S,
        name: Option<&str>,
        version: u32,
        storage_root: impl AsRef<Path>,
    ) -> Result<Self> {
        let location = DatabaseLocation::resolve(name, storage_root.as_ref())?;
        Ok(Self::with_location(factory, callbacks, location, version))
    }

    pub fn with_location(factory: F, callbacks: S, location: DatabaseLocation, version: u32) -> Self {
        Self {
            factory,
            callbacks,
            location,
            version,
            connection: OnceLock::new(),
            ready: AtomicBool::new(false),
            passes: AtomicU64::new(0),
            prepare_lock: Mutex::new(PassRecord::default()),
            state: Mutex::new(LifecycleState::Uninitialized),
        }
    }

    /// Target schema version.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    pub fn callbacks(&self) -> &S {
        &self.callbacks
    }

    pub fn state(&self) -> LifecycleState {
        *lock(&self.state)
    }

    /// Returns the managed connection, creating it on first use.
    ///
    /// The connection is neither opened nor prepared; call
    /// [`prepare`](Self::prepare) for a ready-to-use handle.
    pub fn database(&self) -> Arc<F::Connection> {
        Arc::clone(
            self.connection
                .get_or_init(|| Arc::new(self.factory.create(self.location.clone()))),
        )
    }

    /// Prepares the managed connection if it is not ready yet and returns it.
    ///
    /// Callers arriving after a successful preparation return without
    /// locking. Concurrent callers during preparation block until it ends
    /// and share its outcome: if it failed, every one of them receives the
    /// same error and none reruns the hooks. Only a call that starts after
    /// the failure was reported runs the sequence again.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::OpenFailure`] if the database cannot be opened.
    /// - [`DatabaseError::TransactionFailure`] if the transaction cannot be
    ///   started or committed.
    /// - [`DatabaseError::ConfigurationFailure`] if `on_configure` fails.
    /// - [`DatabaseError::MigrationFailure`] if a create, upgrade,
    ///   downgrade, or open hook fails.
    ///
    /// On any failure the transaction is rolled back, the connection is
    /// closed, and the helper returns to [`LifecycleState::Uninitialized`].
    pub fn prepare(&self) -> Result<Arc<F::Connection>> {
        let observed = self.passes.load(Ordering::Acquire);
        let db = self.database();
        if self.is_ready(&db) {
            return Ok(db);
        }

        let mut record = lock(&self.prepare_lock);
        if self.is_ready(&db) {
            return Ok(db);
        }
        if record.completed != observed {
            if let Some(failure) = &record.failure {
                debug!(location = %self.location, "Reporting failure of the pass this call waited on");
                return Err(failure.duplicate());
            }
        }
        self.ready.store(false, Ordering::Release);

        let outcome = self.run_preparation(&db);
        record.completed += 1;
        let result = match outcome {
            Ok(()) => {
                record.failure = None;
                self.set_state(LifecycleState::Ready);
                self.ready.store(true, Ordering::Release);
                debug!(location = %self.location, version = self.version, "Database ready");
                Ok(db)
            }
            Err(err) => {
                self.set_state(LifecycleState::Uninitialized);
                warn!(location = %self.location, error = %err, "Database preparation failed");
                let failure = err.into_shared();
                let reported = failure.duplicate();
                record.failure = Some(failure);
                Err(reported)
            }
        };
        self.passes.store(record.completed, Ordering::Release);
        result
    }

    fn is_ready(&self, db: &F::Connection) -> bool {
        self.ready.load(Ordering::Acquire) && db.is_open()
    }

    /// Closes the managed connection and returns the helper to
    /// [`LifecycleState::Uninitialized`]. A later [`prepare`](Self::prepare)
    /// reopens it.
    pub fn close(&self) -> Result<()> {
        let _guard = lock(&self.prepare_lock);
        self.ready.store(false, Ordering::Release);
        self.set_state(LifecycleState::Uninitialized);
        if let Some(db) = self.connection.get() {
            if db.is_open() {
                db.close()?;
                debug!(location = %self.location, "Database closed");
            }
        }
        Ok(())
    }

    fn run_preparation(&self, db: &F::Connection) -> Result<()> {
        debug!(location = %self.location, "Opening database");
        db.open()?;
        if let Err(err) = db.start_transaction() {
            close_quietly(db);
            return Err(err);
        }

        match self.run_in_transaction(db).and_then(|()| db.commit().map(drop)) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(rollback_err) = db.rollback() {
                    warn!(error = %rollback_err, "Rollback after failed preparation also failed");
                }
                close_quietly(db);
                Err(err)
            }
        }
    }

    fn run_in_transaction(&self, db: &F::Connection) -> Result<()> {
        self.set_state(LifecycleState::Preparing(PreparePhase::Configuring));
        self.callbacks
            .on_configure(db)
            .map_err(|e| DatabaseError::ConfigurationFailure(Box::new(e)))?;

        let current = db.schema_version()?;
        let target = self.version;
        debug!(current, target, "Read schema version");

        if current == 0 {
            self.set_state(LifecycleState::Preparing(PreparePhase::Creating));
            info!(location = %self.location, version = target, "Creating schema");
            self.callbacks
                .on_create(db)
                .map_err(|e| hook_failure(MigrationPhase::Create, e))?;
        } else if current < target {
            self.set_state(LifecycleState::Preparing(PreparePhase::Upgrading));
            info!(location = %self.location, from = current, to = target, "Upgrading schema");
            self.callbacks
                .on_upgrade(db, current, target)
                .map_err(|e| hook_failure(MigrationPhase::Upgrade { from: current, to: target }, e))?;
        } else if current > target {
            self.set_state(LifecycleState::Preparing(PreparePhase::Downgrading));
            info!(location = %self.location, from = current, to = target, "Downgrading schema");
            self.callbacks.on_downgrade(db, current, target).map_err(|e| {
                hook_failure(MigrationPhase::Downgrade { from: current, to: target }, e)
            })?;
        }

        if current != target {
            self.set_state(LifecycleState::Preparing(PreparePhase::PersistingVersion));
            db.set_schema_version(target)?;
        }

        self.set_state(LifecycleState::Preparing(PreparePhase::Opening));
        self.callbacks
            .on_open(db)
            .map_err(|e| hook_failure(MigrationPhase::Open, e))
    }

    fn set_state(&self, state: LifecycleState) {
        *lock(&self.state) = state;
    }
}

impl<F: ConnectionFactory, S: SchemaCallbacks> fmt::Debug for OpenHelper<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenHelper")
            .field("location", &self.location)
            .field("version", &self.version)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Hooks may already report a migration failure with a more precise phase
/// (scripted migrations name the exact step); those pass through unchanged.
fn hook_failure(phase: MigrationPhase, err: DatabaseError) -> DatabaseError {
    match err {
        DatabaseError::MigrationFailure { .. } => err,
        other => DatabaseError::MigrationFailure {
            phase,
            source: Box::new(other),
        },
    }
}

fn close_quietly(db: &dyn Connection) {
    if let Err(err) = db.close() {
        warn!(error = %err, "Failed to close database after failed preparation");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
