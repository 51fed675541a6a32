//! Schema callbacks driven by declarative SQL.
//!
//! A [`MigrationScript`] lists the statements to run for each lifecycle
//! hook, so an application can describe its schema history as data (for
//! example in the YAML file read by [`HelperConfig`](crate::HelperConfig))
//! instead of implementing [`SchemaCallbacks`] by hand.
//!
//! Upgrades are stepwise: moving from version 2 to version 4 runs the step
//! for version 3 and then the step for version 4. Downgrades walk the other
//! way: moving from 4 to 2 runs the step that leaves 4, then the one that
//! leaves 3. Every step on the path must be present.
//!
//! Each entry is a single SQL statement that returns no rows.
//!
//! # Example
//!
//! ```
//! use sqlhelper_core::MigrationScript;
//!
//! let script: MigrationScript = serde_yaml::from_str(r#"
//! configure:
//!   - PRAGMA foreign_keys = ON
//! create:
//!   - CREATE TABLE champions (id INTEGER PRIMARY KEY, name TEXT NOT NULL, level INTEGER)
//! upgrades:
//!   2:
//!     - ALTER TABLE champions ADD COLUMN level INTEGER
//! downgrades:
//!   2:
//!     - ALTER TABLE champions DROP COLUMN level
//! "#).unwrap();
//!
//! assert!(script.covers(1, 2));
//! assert!(!script.covers(2, 3));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{DatabaseError, MigrationPhase, Result};
use crate::helper::SchemaCallbacks;
use crate::value::Parameters;

/// SQL statements for each schema lifecycle hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationScript {
    /// Run on every preparation, before the schema version is read.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub configure: Vec<String>,
    /// Creates the current schema on a fresh database.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<String>,
    /// Step `v` migrates a database from version `v - 1` to `v`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub upgrades: BTreeMap<u32, Vec<String>>,
    /// Step `v` migrates a database from version `v` to `v - 1`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub downgrades: BTreeMap<u32, Vec<String>>,
    /// Run last on every preparation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub open: Vec<String>,
}

impl MigrationScript {
    /// Returns `true` if every step needed to move between the two
    /// versions is present.
    pub fn covers(&self, from: u32, to: u32) -> bool {
        if from == 0 || from == to {
            return true;
        }
        if from < to {
            (from + 1..=to).all(|v| self.upgrades.contains_key(&v))
        } else {
            (to + 1..=from).all(|v| self.downgrades.contains_key(&v))
        }
    }
}

impl SchemaCallbacks for MigrationScript {
    fn on_configure(&self, db: &dyn Connection) -> Result<()> {
        run_all(db, &self.configure)
    }

    fn on_create(&self, db: &dyn Connection) -> Result<()> {
        run_all(db, &self.create)
    }

    fn on_upgrade(&self, db: &dyn Connection, old_version: u32, new_version: u32) -> Result<()> {
        for version in old_version + 1..=new_version {
            let phase = MigrationPhase::Upgrade {
                from: version - 1,
                to: version,
            };
            run_step(db, phase, self.upgrades.get(&version))?;
        }
        Ok(())
    }

    fn on_downgrade(&self, db: &dyn Connection, old_version: u32, new_version: u32) -> Result<()> {
        for version in (new_version + 1..=old_version).rev() {
            let phase = MigrationPhase::Downgrade {
                from: version,
                to: version - 1,
            };
            run_step(db, phase, self.downgrades.get(&version))?;
        }
        Ok(())
    }

    fn on_open(&self, db: &dyn Connection) -> Result<()> {
        run_all(db, &self.open)
    }
}

fn run_step(db: &dyn Connection, phase: MigrationPhase, step: Option<&Vec<String>>) -> Result<()> {
    let Some(statements) = step else {
        return Err(DatabaseError::MigrationFailure {
            phase,
            source: format!("no migration step for {phase}").into(),
        });
    };
    debug!(%phase, statements = statements.len(), "Running migration step");
    run_all(db, statements).map_err(|e| DatabaseError::MigrationFailure {
        phase,
        source: Box::new(e),
    })
}

fn run_all(db: &dyn Connection, statements: &[String]) -> Result<()> {
    for sql in statements {
        db.execute_update(sql, &Parameters::None)?;
    }
    Ok(())
}
