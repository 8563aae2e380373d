// src/db/batch_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::batch::{Batch, BatchKind, WeighingType},
};

#[derive(Clone)]
pub struct BatchRepository {
    pool: PgPool,
}

impl BatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_batch<'e, E>(
        &self,
        executor: E,
        item_code: &str,
        kind: BatchKind,
        weighing_type: WeighingType,
        initial_qty: Decimal,
        notes: Option<&str>,
        created_by: Uuid,
    ) -> Result<Batch, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let batch = sqlx::query_as::<_, Batch>(
            r#"
            INSERT INTO batches (item_code, kind, weighing_type, initial_qty, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
            .bind(item_code)
            .bind(kind)
            .bind(weighing_type)
            .bind(initial_qty)
            .bind(notes)
            .bind(created_by)
            .fetch_one(executor)
            .await?;

        Ok(batch)
    }

    /// Lotes abertos dos itens, do mais antigo para o mais novo (FIFO), travados.
    pub async fn lock_open_batches<'e, E>(
        &self,
        executor: E,
        item_codes: &[String],
    ) -> Result<Vec<Batch>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE item_code = ANY($1)
              AND deleted_at IS NULL
              AND used_qty < initial_qty
            ORDER BY created_at, id
            FOR UPDATE
            "#,
        )
            .bind(item_codes)
            .fetch_all(executor)
            .await?;

        Ok(batches)
    }

    /// Mesma consulta, sem trava (pré-visualização e saldo do pool).
    pub async fn open_batches<'e, E>(
        &self,
        executor: E,
        item_codes: &[String],
    ) -> Result<Vec<Batch>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE item_code = ANY($1)
              AND deleted_at IS NULL
              AND used_qty < initial_qty
            ORDER BY created_at, id
            "#,
        )
            .bind(item_codes)
            .fetch_all(executor)
            .await?;

        Ok(batches)
    }

    pub async fn list_batches<'e, E>(
        &self,
        executor: E,
        item_code: Option<&str>,
        include_depleted: bool,
        limit: i64,
    ) -> Result<Vec<Batch>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE deleted_at IS NULL
              AND ($1::text IS NULL OR item_code = $1)
              AND ($2 OR used_qty < initial_qty)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
            .bind(item_code)
            .bind(include_depleted)
            .bind(limit)
            .fetch_all(executor)
            .await?;

        Ok(batches)
    }

    /// Pesagens horárias vivas do item criadas desde `since`, travadas.
    pub async fn lock_recent_hourly<'e, E>(
        &self,
        executor: E,
        item_code: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Batch>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE item_code = $1
              AND kind = 'PESAGEM'
              AND weighing_type = 'HOURLY'
              AND deleted_at IS NULL
              AND created_at >= $2
            ORDER BY created_at DESC
            FOR UPDATE
            "#,
        )
            .bind(item_code)
            .bind(since)
            .fetch_all(executor)
            .await?;

        Ok(batches)
    }

    /// Corrige a leitura de uma pesagem horária. O consumo já feito é mantido,
    /// limitado ao novo valor.
    pub async fn replace_reading<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        initial_qty: Decimal,
        used_qty: Decimal,
        notes: Option<&str>,
    ) -> Result<Batch, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Batch>(
            r#"
            UPDATE batches SET
                initial_qty = $2,
                used_qty = $3,
                notes = COALESCE($4, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(initial_qty)
            .bind(used_qty)
            .bind(notes)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::BatchNotFound(id))
    }

    pub async fn add_used_qty<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        amount: Decimal,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // LEAST garante used_qty <= initial_qty mesmo se o plano estiver desatualizado
        let result = sqlx::query(
            r#"
            UPDATE batches SET used_qty = LEAST(initial_qty, used_qty + $2), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
            .bind(id)
            .bind(amount)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BatchNotFound(id));
        }
        Ok(())
    }

    /// Exclusão lógica. Não mexe no livro-razão.
    pub async fn soft_delete<'e, E>(&self, executor: E, id: Uuid) -> Result<Batch, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Batch>(
            r#"
            UPDATE batches SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::BatchNotFound(id))
    }
}
