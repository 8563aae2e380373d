// src/db/pack_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::pack::StockPackGroup};

#[derive(Clone)]
pub struct PackRepository {
    pool: PgPool,
}

impl PackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_pack<'e, E>(
        &self,
        executor: E,
        name: &str,
        barcode: &str,
        item_codes: &[String],
        min_pack_qty: Decimal,
    ) -> Result<StockPackGroup, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, StockPackGroup>(
            r#"
            INSERT INTO stock_pack_groups (name, barcode, item_codes, min_pack_qty)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
            .bind(name)
            .bind(barcode)
            .bind(item_codes)
            .bind(min_pack_qty)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return AppError::BarcodeAlreadyExists(barcode.to_string());
                    }
                }
                e.into()
            })
    }

    pub async fn list_packs<'e, E>(&self, executor: E) -> Result<Vec<StockPackGroup>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let packs = sqlx::query_as::<_, StockPackGroup>("SELECT * FROM stock_pack_groups ORDER BY name ASC")
            .fetch_all(executor)
            .await?;
        Ok(packs)
    }

    pub async fn find_by_barcode<'e, E>(
        &self,
        executor: E,
        barcode: &str,
    ) -> Result<Option<StockPackGroup>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pack = sqlx::query_as::<_, StockPackGroup>("SELECT * FROM stock_pack_groups WHERE barcode = $1")
            .bind(barcode)
            .fetch_optional(executor)
            .await?;
        Ok(pack)
    }

    pub async fn delete_pack<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM stock_pack_groups WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::PackNotFound(id));
        }
        Ok(())
    }
}
