//! 單一操作的全有或全無保證

use prodplan_core::UnitOfWork;

/// 在保存點內執行操作：成功則保留寫入，失敗則回滾該操作的所有寫入
pub fn atomically<W, T, F>(tx: &mut W, operation: &str, f: F) -> prodplan_core::Result<T>
where
    W: UnitOfWork + ?Sized,
    F: FnOnce(&mut W) -> prodplan_core::Result<T>,
{
    let savepoint = tx.savepoint()?;

    match f(tx) {
        Ok(value) => {
            tx.release_savepoint(savepoint)?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!("{} 失敗，回滾: {}", operation, err);
            if let Err(rollback_err) = tx.rollback_to(savepoint) {
                tracing::error!("{} 回滾失敗: {}", operation, rollback_err);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use prodplan_core::{InventoryLot, InventoryRead, MemoryStore, PlanError};
    use rust_decimal::Decimal;

    fn lot() -> InventoryLot {
        InventoryLot::new(
            "SALT".to_string(),
            Decimal::from(10),
            "g".to_string(),
            Decimal::ONE,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_failure_rolls_back() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();

        let result: prodplan_core::Result<()> = atomically(&mut tx, "test", |tx| {
            tx.insert_lot(lot())?;
            Err(PlanError::Storage("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(tx.lots_for_item("SALT").unwrap().is_empty());
    }

    #[test]
    fn test_success_keeps_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();

        atomically(&mut tx, "test", |tx| tx.insert_lot(lot())).unwrap();
        assert_eq!(tx.lots_for_item("SALT").unwrap().len(), 1);

        // 保存點已釋放，後續操作可再次建立
        let result: prodplan_core::Result<()> = atomically(&mut tx, "test", |tx| {
            tx.insert_lot(lot())?;
            Err(PlanError::Storage("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(tx.lots_for_item("SALT").unwrap().len(), 1);
    }
}
