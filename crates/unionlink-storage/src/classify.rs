//! Maps `sqlx` errors onto the store's retry classes.

use unionlink_core::error::StoreError;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Backend {
    #[cfg_attr(not(feature = "sqlite"), allow(dead_code))]
    Sqlite,
    #[cfg_attr(not(feature = "postgres"), allow(dead_code))]
    Postgres,
}

/// Classify a `sqlx` error as transient, conflict, or fatal.
pub(crate) fn classify(backend: Backend, err: sqlx::Error) -> StoreError {
    let message = err.to_string();
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
            match backend {
                Backend::Sqlite => sqlite_code(&code, message),
                Backend::Postgres => postgres_state(&code, message),
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut => StoreError::Transient(message),
        _ => StoreError::Fatal(message),
    }
}

/// SQLite extended result codes; the primary code is the low byte.
fn sqlite_code(code: &str, message: String) -> StoreError {
    let primary = code.parse::<u32>().map(|c| c & 0xff).unwrap_or(0);
    match primary {
        // SQLITE_BUSY, SQLITE_LOCKED
        5 | 6 => StoreError::Transient(message),
        // SQLITE_TOOBIG, SQLITE_CONSTRAINT, SQLITE_MISMATCH
        18 | 19 | 20 => StoreError::Conflict(message),
        _ => StoreError::Fatal(message),
    }
}

/// Postgres SQLSTATE codes, classified by their two-character class.
fn postgres_state(state: &str, message: String) -> StoreError {
    match state.get(..2).unwrap_or("") {
        // connection exception, insufficient resources, operator intervention
        "08" | "53" | "57" => StoreError::Transient(message),
        // transaction rollback (serialization failure, deadlock)
        "40" => StoreError::Transient(message),
        // data exception, integrity constraint violation
        "22" | "23" => StoreError::Conflict(message),
        _ => StoreError::Fatal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_level_errors() {
        let io = sqlx::Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        assert!(classify(Backend::Postgres, io).is_transient());
        assert!(classify(Backend::Sqlite, sqlx::Error::PoolTimedOut).is_transient());
        assert!(classify(Backend::Sqlite, sqlx::Error::PoolClosed).is_fatal());
    }

    #[test]
    fn sqlite_codes() {
        assert!(sqlite_code("5", "busy".into()).is_transient());
        assert!(sqlite_code("517", "busy snapshot".into()).is_transient());
        assert!(matches!(sqlite_code("2067", "unique".into()), StoreError::Conflict(_)));
        assert!(sqlite_code("1", "syntax".into()).is_fatal());
    }

    #[test]
    fn postgres_states() {
        assert!(postgres_state("40001", "serialization".into()).is_transient());
        assert!(postgres_state("08006", "connection failure".into()).is_transient());
        assert!(matches!(postgres_state("22001", "too long".into()), StoreError::Conflict(_)));
        assert!(postgres_state("42P01", "undefined table".into()).is_fatal());
    }
}
