//! Database checks shared by the Docker and AMI runners.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::DatabaseExpectations;
use crate::database::{ConnectionTarget, Database};

use super::{CheckOutcome, Checklist};

pub const VERSION_SQL: &str = "SELECT version();";
pub const SELECT_ONE_SQL: &str = "SELECT 1;";
pub const WAL_LEVEL_SQL: &str = "SHOW wal_level;";
pub const REPLICATION_SLOTS_SQL: &str = "SHOW max_replication_slots;";
pub const AVAILABLE_EXTENSIONS_SQL: &str = "SELECT name FROM pg_available_extensions ORDER BY name;";

/// Create, modify and read back a temporary table in one session.
pub const ROUND_TRIP_SQL: &str = "\
CREATE TEMP TABLE pgcompat_probe (id integer PRIMARY KEY, note text NOT NULL); \
INSERT INTO pgcompat_probe VALUES (1, 'alpha'), (2, 'beta'); \
UPDATE pgcompat_probe SET note = 'gamma' WHERE id = 2; \
DELETE FROM pgcompat_probe WHERE id = 1; \
SELECT id, note FROM pgcompat_probe ORDER BY id;";

/// Names of the checks in [`run_sql_checks`] order, for skipping them together.
pub const SQL_CHECK_NAMES: &[&str] = &[
    "client can connect",
    "SELECT version() reports PostgreSQL",
    "SELECT 1 returns 1",
    "DDL/DML round trip",
    "wal_level",
    "max_replication_slots",
    "expected extensions available",
];

/// Everything a SQL check needs.
pub struct SqlContext<'a> {
    pub db: &'a dyn Database,
    pub target: &'a ConnectionTarget,
    pub expectations: &'a DatabaseExpectations,
}

/// Run the full SQL battery.
pub fn run_sql_checks(checklist: &mut Checklist, ctx: &SqlContext<'_>) {
    let (db, target, exp) = (ctx.db, ctx.target, ctx.expectations);

    checklist.run(SQL_CHECK_NAMES[0], || check_connect(db, target));
    checklist.run(SQL_CHECK_NAMES[1], || check_version(db, target));
    checklist.run(SQL_CHECK_NAMES[2], || check_select_one(db, target));
    checklist.run(SQL_CHECK_NAMES[3], || check_round_trip(db, target));
    checklist.run(SQL_CHECK_NAMES[4], || {
        check_wal_level(db, target, exp.wal_level.as_deref())
    });
    checklist.run(SQL_CHECK_NAMES[5], || {
        check_replication_slots(db, target, exp.min_replication_slots)
    });
    checklist.run(SQL_CHECK_NAMES[6], || {
        check_extensions_available(db, target, &exp.extensions)
    });
    for extension in &exp.loadable_extensions {
        checklist.run(format!("extension {} loads", extension), || {
            check_extension_loads(db, target, extension, &exp.extension_schema)
        });
    }
}

/// Record the credential checks: the configured password works and a
/// different one is refused.
pub fn run_credential_checks(
    checklist: &mut Checklist,
    db: &dyn Database,
    target: &ConnectionTarget,
    wrong_password: &str,
) {
    checklist.run("configured password accepted", || check_connect(db, target));
    checklist.run("wrong password rejected", || {
        check_rejects_password(db, target, wrong_password)
    });
}

pub fn check_connect(db: &dyn Database, target: &ConnectionTarget) -> CheckOutcome {
    db.ping(target).into()
}

pub fn check_version(db: &dyn Database, target: &ConnectionTarget) -> CheckOutcome {
    match db.query(target, VERSION_SQL) {
        Ok(rows) => match rows.first_value() {
            Some(v) if v.contains("PostgreSQL") => CheckOutcome::Passed,
            Some(v) => CheckOutcome::failed(format!("unexpected version string: {}", v)),
            None => CheckOutcome::failed("version() returned no rows"),
        },
        Err(e) => CheckOutcome::failed(e.to_string()),
    }
}

pub fn check_select_one(db: &dyn Database, target: &ConnectionTarget) -> CheckOutcome {
    match db.query(target, SELECT_ONE_SQL) {
        Ok(rows) => CheckOutcome::expect(rows.first_value() == Some("1"), || {
            format!("expected 1, got {:?}", rows.first_value())
        }),
        Err(e) => CheckOutcome::failed(e.to_string()),
    }
}

pub fn check_round_trip(db: &dyn Database, target: &ConnectionTarget) -> CheckOutcome {
    match db.query(target, ROUND_TRIP_SQL) {
        Ok(rows) => {
            let got: Vec<Vec<&str>> = rows
                .0
                .iter()
                .map(|r| r.iter().map(|v| v.as_deref().unwrap_or("NULL")).collect())
                .collect();
            CheckOutcome::expect(got == vec![vec!["2", "gamma"]], || {
                format!("expected [[2, gamma]], got {:?}", got)
            })
        }
        Err(e) => CheckOutcome::failed(e.to_string()),
    }
}

pub fn check_wal_level(
    db: &dyn Database,
    target: &ConnectionTarget,
    expected: Option<&str>,
) -> CheckOutcome {
    let Some(expected) = expected else {
        return CheckOutcome::skipped("no wal_level expectation");
    };
    match db.query(target, WAL_LEVEL_SQL) {
        Ok(rows) => {
            let actual = rows.first_value().unwrap_or("");
            CheckOutcome::expect(actual == expected, || {
                format!("wal_level is '{}', expected '{}'", actual, expected)
            })
        }
        Err(e) => CheckOutcome::failed(e.to_string()),
    }
}

pub fn check_replication_slots(
    db: &dyn Database,
    target: &ConnectionTarget,
    minimum: Option<u32>,
) -> CheckOutcome {
    let Some(minimum) = minimum else {
        return CheckOutcome::skipped("no max_replication_slots expectation");
    };
    match db.query(target, REPLICATION_SLOTS_SQL) {
        Ok(rows) => match rows.first_value().and_then(|v| v.parse::<u32>().ok()) {
            Some(slots) => CheckOutcome::expect(slots >= minimum, || {
                format!("max_replication_slots is {}, expected at least {}", slots, minimum)
            }),
            None => CheckOutcome::failed(format!(
                "could not read max_replication_slots: {:?}",
                rows.first_value()
            )),
        },
        Err(e) => CheckOutcome::failed(e.to_string()),
    }
}

pub fn check_extensions_available(
    db: &dyn Database,
    target: &ConnectionTarget,
    expected: &[String],
) -> CheckOutcome {
    if expected.is_empty() {
        return CheckOutcome::skipped("no extensions expected");
    }
    match db.query(target, AVAILABLE_EXTENSIONS_SQL) {
        Ok(rows) => {
            let available = rows.column(0);
            let missing: Vec<&str> = expected
                .iter()
                .map(String::as_str)
                .filter(|ext| !available.contains(ext))
                .collect();
            CheckOutcome::expect(missing.is_empty(), || {
                format!("missing extensions: {}", missing.join(", "))
            })
        }
        Err(e) => CheckOutcome::failed(e.to_string()),
    }
}

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("IDENTIFIER_REGEX must compile")
});

/// Whether `name` is safe to splice into SQL as a quoted identifier.
pub fn is_plain_identifier(name: &str) -> bool {
    IDENTIFIER_REGEX.is_match(name)
}

/// SQL that creates `extension` in `schema`.
pub fn create_extension_sql(extension: &str, schema: &str) -> String {
    format!(
        "CREATE SCHEMA IF NOT EXISTS \"{schema}\"; CREATE EXTENSION IF NOT EXISTS \"{extension}\" WITH SCHEMA \"{schema}\";"
    )
}

/// SQL that looks `extension` up in `pg_extension`.
pub fn installed_extension_sql(extension: &str) -> String {
    format!("SELECT extname FROM pg_extension WHERE extname = '{extension}';")
}

pub fn check_extension_loads(
    db: &dyn Database,
    target: &ConnectionTarget,
    extension: &str,
    schema: &str,
) -> CheckOutcome {
    if !is_plain_identifier(extension) || !is_plain_identifier(schema) {
        return CheckOutcome::failed(format!(
            "refusing to load extension '{}' into schema '{}': not a plain identifier",
            extension, schema
        ));
    }
    if let Err(e) = db.query(target, &create_extension_sql(extension, schema)) {
        return CheckOutcome::failed(format!("failed to load extension {}: {}", extension, e));
    }
    match db.query(target, &installed_extension_sql(extension)) {
        Ok(rows) => CheckOutcome::expect(!rows.is_empty(), || {
            format!("extension {} not listed in pg_extension", extension)
        }),
        Err(e) => CheckOutcome::failed(e.to_string()),
    }
}

pub fn check_rejects_password(
    db: &dyn Database,
    target: &ConnectionTarget,
    wrong_password: &str,
) -> CheckOutcome {
    let wrong = target.clone().with_password(wrong_password);
    match db.ping(&wrong) {
        Ok(()) => CheckOutcome::failed(format!(
            "server accepted password '{}' for user {}",
            wrong_password, target.user
        )),
        Err(_) => CheckOutcome::Passed,
    }
}
