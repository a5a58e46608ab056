use chrono::{DateTime, SecondsFormat};

/// Unix seconds as an RFC3339 UTC string, `None` for non-positive or
/// unrepresentable timestamps.
pub fn unix_to_rfc3339(timestamp_sec: i64) -> Option<String> {
    if timestamp_sec <= 0 {
        return None;
    }
    DateTime::from_timestamp(timestamp_sec, 0).map(|x| x.to_rfc3339_opts(SecondsFormat::Secs, true))
}

pub mod db {
    use anyhow::Result;
    use rusqlite::{OptionalExtension, Transaction};

    pub fn init_metadata_and_get_version(tx: &Transaction) -> Result<i32> {
        let create_db_metadata_sql = "
        CREATE TABLE IF NOT EXISTS `db_metadata` (
            `key`   TEXT NOT NULL,
            `value` TEXT,
            PRIMARY KEY(`key`)
        )";
        tx.execute(create_db_metadata_sql, ())?;
        let version_str: Option<String> = tx
            .query_row(
                "SELECT `value` FROM `db_metadata` WHERE key='version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let version = match version_str {
            None => 0,
            Some(s) => s.parse()?,
        };
        Ok(version)
    }

    pub fn set_version_in_metadata(tx: &Transaction, version: i32) -> Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO `db_metadata` (key, value) VALUES (?1, ?2)",
            ("version", version.to_string()),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::unix_to_rfc3339;

    #[test]
    fn rfc3339() {
        assert_eq!(unix_to_rfc3339(0), None);
        assert_eq!(
            unix_to_rfc3339(1_700_000_000).unwrap(),
            "2023-11-14T22:13:20Z"
        );
    }
}
