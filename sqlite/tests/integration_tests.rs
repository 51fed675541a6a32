//! Integration tests for the sqlhelper-sqlite crate.

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{TimeZone, Utc};
use sqlhelper_core::{
    Connection, ContentValues, CursorExt, DatabaseError, DatabaseLocation, LifecycleState,
    MigrationPhase, MigrationScript, OpenHelper, Operation, QueryOperation, SchemaCallbacks,
    UpdateOperation, Value, content_values,
};
use sqlhelper_sqlite::{SqliteConnection, SqliteConnectionFactory};
use tempfile::TempDir;

/// Champions schema at version 1, with a version 2 step adding `level`.
fn champions_script() -> MigrationScript {
    MigrationScript {
        configure: vec!["PRAGMA foreign_keys = ON".to_string()],
        create: vec![
            "CREATE TABLE champions (id INTEGER PRIMARY KEY, name TEXT NOT NULL, \
             champion_type TEXT, owned INTEGER NOT NULL DEFAULT 0, level INTEGER)"
                .to_string(),
        ],
        upgrades: BTreeMap::from([(
            2,
            vec!["ALTER TABLE champions ADD COLUMN level INTEGER".to_string()],
        )]),
        downgrades: BTreeMap::new(),
        open: Vec::new(),
    }
}

fn memory_helper() -> OpenHelper<SqliteConnectionFactory, MigrationScript> {
    OpenHelper::with_location(
        SqliteConnectionFactory,
        champions_script(),
        DatabaseLocation::InMemory,
        2,
    )
}

fn insert(db: &dyn Connection, values: ContentValues) -> usize {
    UpdateOperation::new(db)
        .table("champions")
        .content_values(values)
        .execute_insert()
        .unwrap()
}

fn seed(db: &dyn Connection) {
    insert(db, content_values! { "id" => 1, "name" => "Ahri", "champion_type" => "mage", "owned" => true });
    insert(db, content_values! { "id" => 2, "name" => "Braum", "champion_type" => "tank", "owned" => false });
    insert(db, content_values! { "id" => 3, "name" => "Lux", "champion_type" => "mage", "owned" => false });
}

#[test]
fn test_insert_query_update_delete_round_trip() {
    let helper = memory_helper();
    let db = helper.prepare().unwrap();
    seed(db.as_ref());
    assert_eq!(db.last_inserted_row_id(), 3);

    let mut cursor = QueryOperation::new(db.as_ref())
        .table("champions")
        .projection(["id", "name"])
        .selection("champion_type = ?")
        .selection_args(["mage"])
        .unwrap()
        .sort("name")
        .execute_query()
        .unwrap();
    let mut names = Vec::new();
    while cursor.next() {
        names.push(cursor.get_string("name").unwrap());
    }
    cursor.close();
    assert_eq!(names, vec!["Ahri", "Lux"]);

    let updated = UpdateOperation::new(db.as_ref())
        .table("champions")
        .content_value("owned", true)
        .content_value("level", 5)
        .selection("champion_type = :type")
        .named_selection_args(content_values! { "type" => "mage" })
        .unwrap()
        .execute_update()
        .unwrap();
    assert_eq!(updated, 2);
    assert_eq!(db.changes(), 2);

    let updated = UpdateOperation::new(db.as_ref())
        .table("champions")
        .content_value("level", 9)
        .selection("id = ?")
        .selection_args([2])
        .unwrap()
        .execute_update()
        .unwrap();
    assert_eq!(updated, 1);

    let mut cursor = QueryOperation::new(db.as_ref())
        .table("champions")
        .selection("owned = ?")
        .selection_args([true])
        .unwrap()
        .sort("id")
        .execute_query()
        .unwrap();
    assert!(cursor.next());
    assert!(cursor.get_bool("owned").unwrap());
    assert_eq!(cursor.get_i32("level").unwrap(), 5);
    assert!(cursor.next());
    assert!(!cursor.next());

    let deleted = UpdateOperation::new(db.as_ref())
        .table("champions")
        .selection("level > ?")
        .selection_args([6])
        .unwrap()
        .execute_delete()
        .unwrap();
    assert_eq!(deleted, 1);

    let deleted = UpdateOperation::new(db.as_ref())
        .table("champions")
        .execute_delete()
        .unwrap();
    assert_eq!(deleted, 2);
}

#[test]
fn test_named_update_selection_arg_wins_over_content() {
    let helper = memory_helper();
    let db = helper.prepare().unwrap();
    seed(db.as_ref());

    UpdateOperation::new(db.as_ref())
        .table("champions")
        .content_value("name", "Renamed")
        .selection("name = :name")
        .named_selection_args(content_values! { "name" => "Braum" })
        .unwrap()
        .execute_update()
        .unwrap();

    let mut cursor = QueryOperation::new(db.as_ref())
        .table("champions")
        .selection("id = ?")
        .selection_args([2])
        .unwrap()
        .execute_query()
        .unwrap();
    assert!(cursor.move_to_first());
    assert_eq!(cursor.get_string("name").unwrap(), "Braum");
}

#[test]
fn test_grouped_query_and_cursor_navigation() {
    let helper = memory_helper();
    let db = helper.prepare().unwrap();
    seed(db.as_ref());

    let mut cursor = QueryOperation::new(db.as_ref())
        .table("champions")
        .projection(["champion_type", "count(*) AS total"])
        .group_by("champion_type")
        .having("count(*) >= ?")
        .selection_args([1])
        .unwrap()
        .sort("champion_type")
        .execute_query()
        .unwrap();

    assert_eq!(cursor.column_count(), 2);
    assert_eq!(cursor.column_name_for(1), Some("total"));
    assert_eq!(cursor.column_index_for("champion_type"), Some(0));
    assert!(cursor.move_to_position(1));
    assert_eq!(cursor.get_string(0).unwrap(), "tank");
    assert!(cursor.move_by(-1));
    assert_eq!(cursor.get_i64("total").unwrap(), 2);
    assert!(!cursor.move_by(5));
    assert!(matches!(cursor.get_i64(0), Err(DatabaseError::NotOnRow)));
    assert!(cursor.move_to_last());
    cursor.close();
    assert!(matches!(cursor.get_i64(0), Err(DatabaseError::CursorClosed)));
}

#[test]
fn test_join_clause_as_table() {
    let helper = memory_helper();
    let db = helper.prepare().unwrap();
    seed(db.as_ref());
    db.execute_update(
        "CREATE TABLE skins (id INTEGER PRIMARY KEY, champion_id INTEGER REFERENCES champions(id), name TEXT)",
        &Default::default(),
    )
    .unwrap();
    UpdateOperation::new(db.as_ref())
        .table("skins")
        .content_values(content_values! { "champion_id" => 1, "name" => "Star Guardian" })
        .execute_insert()
        .unwrap();

    let mut cursor = QueryOperation::new(db.as_ref())
        .table("champions c JOIN skins s ON s.champion_id = c.id")
        .projection(["c.name AS champion", "s.name AS skin"])
        .execute_query()
        .unwrap();
    assert!(cursor.next());
    assert_eq!(cursor.get_string("champion").unwrap(), "Ahri");
    assert_eq!(cursor.get_string("skin").unwrap(), "Star Guardian");
}

#[test]
fn test_value_kinds_round_trip() {
    let helper = memory_helper();
    let db = helper.prepare().unwrap();
    db.execute_update(
        "CREATE TABLE samples (b INTEGER, u INTEGER, d REAL, t TEXT, x BLOB, ts REAL, n TEXT)",
        &Default::default(),
    )
    .unwrap();
    let when = Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 0).unwrap();
    UpdateOperation::new(db.as_ref())
        .table("samples")
        .content_values(content_values! {
            "b" => true,
            "u" => 42_u64,
            "d" => 2.5,
            "t" => "text",
            "x" => vec![0_u8, 1, 2],
            "ts" => when,
            "n" => None::<String>,
        })
        .execute_insert()
        .unwrap();

    let mut cursor = QueryOperation::new(db.as_ref())
        .table("samples")
        .execute_query()
        .unwrap();
    assert!(cursor.next());
    assert!(cursor.get_bool("b").unwrap());
    assert_eq!(cursor.get_u64("u").unwrap(), 42);
    assert_eq!(cursor.get_f64("d").unwrap(), 2.5);
    assert_eq!(cursor.get_string("t").unwrap(), "text");
    assert_eq!(cursor.get_bytes("x").unwrap(), vec![0, 1, 2]);
    assert_eq!(cursor.get_timestamp("ts").unwrap(), when);
    assert!(cursor.is_null("n").unwrap());
    assert!(matches!(
        cursor.get_string("n"),
        Err(DatabaseError::UnexpectedNull { .. })
    ));
}

#[test]
fn test_unsigned_overflow_is_execution_failure() {
    let helper = memory_helper();
    let db = helper.prepare().unwrap();
    let err = UpdateOperation::new(db.as_ref())
        .table("champions")
        .content_values(content_values! { "name" => "Big", "level" => Value::Unsigned(u64::MAX) })
        .execute_insert()
        .unwrap_err();
    assert!(matches!(err, DatabaseError::ExecutionFailure(_)));
}

#[test]
fn test_version_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("databases");

    let helper = OpenHelper::new(SqliteConnectionFactory, champions_script(), Some("app.db"), 2, &root)
        .unwrap();
    let db = helper.prepare().unwrap();
    assert_eq!(db.schema_version().unwrap(), 2);
    seed(db.as_ref());
    helper.close().unwrap();
    assert!(root.join("app.db").exists());

    let reopened = OpenHelper::new(SqliteConnectionFactory, champions_script(), Some("app.db"), 2, &root)
        .unwrap();
    let db = reopened.prepare().unwrap();
    assert_eq!(db.schema_version().unwrap(), 2);
    let mut cursor = QueryOperation::new(db.as_ref())
        .table("champions")
        .projection(["count(*) AS n"])
        .execute_query()
        .unwrap();
    assert!(cursor.next());
    assert_eq!(cursor.get_i64("n").unwrap(), 3);
}

#[test]
fn test_upgrade_existing_file_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.db");
    {
        let db = SqliteConnection::new(DatabaseLocation::File(path.clone()));
        db.open().unwrap();
        db.execute_update(
            "CREATE TABLE champions (id INTEGER PRIMARY KEY, name TEXT NOT NULL, champion_type TEXT, owned INTEGER NOT NULL DEFAULT 0)",
            &Default::default(),
        )
        .unwrap();
        db.set_schema_version(1).unwrap();
        db.close().unwrap();
    }

    let helper = OpenHelper::with_location(
        SqliteConnectionFactory,
        champions_script(),
        DatabaseLocation::File(path),
        2,
    );
    let db = helper.prepare().unwrap();
    assert_eq!(db.schema_version().unwrap(), 2);
    insert(db.as_ref(), content_values! { "name" => "Ahri", "level" => 4 });
}

#[test]
fn test_failed_migration_rolls_back_and_closes() {
    let dir = TempDir::new().unwrap();
    let mut script = champions_script();
    script.create.push("CREATE TABLE broken (".to_string());

    let helper = OpenHelper::new(SqliteConnectionFactory, script, Some("broken.db"), 1, dir.path())
        .unwrap();
    let err = helper.prepare().unwrap_err();
    assert!(matches!(
        err,
        DatabaseError::MigrationFailure {
            phase: MigrationPhase::Create,
            ..
        }
    ));
    assert_eq!(helper.state(), LifecycleState::Uninitialized);
    let db = helper.database();
    assert!(!db.is_open());

    db.open().unwrap();
    assert_eq!(db.schema_version().unwrap(), 0);
    assert!(
        db.execute_query("SELECT * FROM champions", &Default::default())
            .is_err()
    );
}

#[test]
fn test_missing_upgrade_step_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("old.db");
    {
        let db = SqliteConnection::new(DatabaseLocation::File(path.clone()));
        db.open().unwrap();
        db.execute_update(
            "CREATE TABLE champions (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            &Default::default(),
        )
        .unwrap();
        db.set_schema_version(1).unwrap();
        db.close().unwrap();
    }

    let helper = OpenHelper::with_location(
        SqliteConnectionFactory,
        champions_script(),
        DatabaseLocation::File(path),
        3,
    );
    let err = helper.prepare().unwrap_err();
    assert!(matches!(
        err,
        DatabaseError::MigrationFailure {
            phase: MigrationPhase::Upgrade { from: 2, to: 3 },
            ..
        }
    ));
}

#[test]
fn test_temporary_database() {
    let helper = OpenHelper::new(SqliteConnectionFactory, champions_script(), Some(""), 1, ".")
        .unwrap();
    let db = helper.prepare().unwrap();
    assert_eq!(db.location(), &DatabaseLocation::Temporary);
    assert!(db.path().is_none());
    seed(db.as_ref());
}

#[test]
fn test_concurrent_prepare_on_file_database() {
    struct Counting {
        script: MigrationScript,
        creates: std::sync::atomic::AtomicUsize,
    }

    impl SchemaCallbacks for Counting {
        fn on_create(&self, db: &dyn Connection) -> sqlhelper_core::Result<()> {
            self.creates
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.script.on_create(db)
        }
    }

    const THREADS: usize = 6;
    let dir = TempDir::new().unwrap();
    let helper = Arc::new(
        OpenHelper::new(
            SqliteConnectionFactory,
            Counting {
                script: champions_script(),
                creates: Default::default(),
            },
            Some("shared.db"),
            2,
            dir.path(),
        )
        .unwrap(),
    );
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let helper = Arc::clone(&helper);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let db = helper.prepare().unwrap();
                insert(
                    db.as_ref(),
                    content_values! { "name" => format!("champion-{i}") },
                );
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        helper
            .callbacks()
            .creates
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    let db = helper.prepare().unwrap();
    let mut cursor = QueryOperation::new(db.as_ref())
        .table("champions")
        .projection(["count(*) AS n"])
        .execute_query()
        .unwrap();
    assert!(cursor.next());
    assert_eq!(cursor.get_i64("n").unwrap(), THREADS as i64);
}
