use bbqsync_core::db::migrations::latest_version;
use bbqsync_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "rooms");
    assert_table_exists(&conn, "items");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bbqsync.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "items");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_cost_without_bought_and_done_wishlist_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO rooms (room_id, participants, created_at, updated_at) VALUES ('r', '[]', 0, 0);",
        [],
    )
    .unwrap();

    let unpaid = conn.execute(
        "INSERT INTO items (room_id, id, list_kind, name, category, qty, note, who, want, cost, bought, done, created_at, updated_at)
         VALUES ('r', 'a', 'checklist', 'Charcoal', 'food', 1, '', '', '', 12.5, 0, 0, 0, 0);",
        [],
    );
    assert!(unpaid.is_err());

    let done_wish = conn.execute(
        "INSERT INTO items (room_id, id, list_kind, name, category, qty, note, who, want, cost, bought, done, created_at, updated_at)
         VALUES ('r', 'b', 'wishlist', 'Fan', 'equipment', 1, '', '', '', 0, 0, 1, 0, 0);",
        [],
    );
    assert!(done_wish.is_err());
}

#[test]
fn deleting_a_room_cascades_to_its_items() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO rooms (room_id, participants, created_at, updated_at) VALUES ('r', '[]', 0, 0);
         INSERT INTO items (room_id, id, list_kind, name, category, qty, note, who, want, cost, bought, done, created_at, updated_at)
         VALUES ('r', 'a', 'checklist', 'Tongs', 'equipment', 1, '', '', '', 0, 0, 0, 0, 0);
         DELETE FROM rooms WHERE room_id = 'r';",
    )
    .unwrap();

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM items;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
