use async_trait::async_trait;

use super::LevelError;
use crate::models::levels::ClientLevel;

/// Writes one edited level row.
#[async_trait]
pub trait LevelWriter: Send {
    async fn write_level(&mut self, level: &ClientLevel) -> Result<(), anyhow::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum BulkUpdateError {
    #[error("Invalid level edit: {0}")]
    Invalid(LevelError),
    #[error("Update of level {level_id} (row {row}) failed after {applied} rows: {reason}")]
    RowFailed {
        row: usize,
        level_id: i32,
        applied: usize,
        reason: String,
    },
    #[error("Edited level table is inconsistent: {0}")]
    Inconsistent(LevelError),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Applies rows one at a time and stops at the first failure.
///
/// Rows written before the failure stay written; callers that need all-or-nothing
/// run this inside a transaction and discard it on error.
pub async fn apply_sequential<W>(writer: &mut W, rows: &[ClientLevel]) -> Result<usize, BulkUpdateError>
where
    W: LevelWriter + ?Sized,
{
    for (index, row) in rows.iter().enumerate() {
        if let Err(e) = writer.write_level(row).await {
            log::warn!("Level update stopped at level {}: {}", row.id, e);
            return Err(BulkUpdateError::RowFailed {
                row: index + 1,
                level_id: row.id,
                applied: index,
                reason: e.to_string(),
            });
        }
    }

    Ok(rows.len())
}

#[async_trait]
impl LevelWriter for Vec<ClientLevel> {
    async fn write_level(&mut self, level: &ClientLevel) -> Result<(), anyhow::Error> {
        match self.iter_mut().find(|existing| existing.id == level.id) {
            Some(existing) => {
                *existing = level.clone();
                Ok(())
            }
            None => Err(LevelError::UnknownLevel(level.id).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::loyalty::levels::tests::level;

    struct FailingWriter {
        written: Vec<i32>,
        fail_at: i32,
    }

    #[async_trait]
    impl LevelWriter for FailingWriter {
        async fn write_level(&mut self, level: &ClientLevel) -> Result<(), anyhow::Error> {
            if level.id == self.fail_at {
                anyhow::bail!("connection reset");
            }
            self.written.push(level.id);
            Ok(())
        }
    }

    fn six_rows() -> Vec<ClientLevel> {
        (1..=6).map(|id| level(id, Decimal::from(id * 100))).collect()
    }

    #[tokio::test]
    async fn failure_mid_batch_keeps_earlier_rows() {
        let mut writer = FailingWriter {
            written: Vec::new(),
            fail_at: 3,
        };

        let err = apply_sequential(&mut writer, &six_rows()).await.unwrap_err();

        assert_eq!(writer.written, vec![1, 2]);
        match err {
            BulkUpdateError::RowFailed {
                row,
                level_id,
                applied,
                ..
            } => {
                assert_eq!(row, 3);
                assert_eq!(level_id, 3);
                assert_eq!(applied, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn vec_writer_replaces_rows_in_place() {
        let mut table = six_rows();
        let mut edited = level(4, dec!(450));
        edited.name = "Gold".to_string();

        let applied = apply_sequential(&mut table, &[edited.clone()]).await.unwrap();

        assert_eq!(applied, 1);
        assert_eq!(table[3], edited);
        assert_eq!(table.len(), 6);
    }

    #[tokio::test]
    async fn vec_writer_rejects_unknown_level() {
        let mut table = six_rows();
        let rows = vec![level(1, dec!(5)), level(9, dec!(900))];

        let err = apply_sequential(&mut table, &rows).await.unwrap_err();

        assert!(matches!(err, BulkUpdateError::RowFailed { row: 2, applied: 1, .. }));
        assert_eq!(table[0].required_total, dec!(5));
    }
}
