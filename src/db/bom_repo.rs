// src/db/bom_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgConnection, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::bom::{Bom, BomLine, BomSummary},
};

#[derive(Clone)]
pub struct BomRepository {
    pool: PgPool,
}

impl BomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Devolve a ficha técnica do produto, ou `None` se ele não tiver linhas.
    pub async fn find_bom(
        &self,
        conn: &mut PgConnection,
        product_code: &str,
    ) -> Result<Option<Bom>, AppError> {
        let lines = sqlx::query_as::<_, BomLine>(
            r#"
            SELECT stock_item_code, qty_per_pack, from_weighing, substitute_code, position
            FROM bom_lines
            WHERE product_code = $1
            ORDER BY position, stock_item_code
            "#,
        )
            .bind(product_code)
            .fetch_all(&mut *conn)
            .await?;

        if lines.is_empty() {
            return Ok(None);
        }

        let updated_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(updated_at) FROM bom_lines WHERE product_code = $1",
        )
            .bind(product_code)
            .fetch_one(&mut *conn)
            .await?;

        Ok(Some(Bom {
            product_code: product_code.to_string(),
            lines,
            updated_at,
        }))
    }

    pub async fn list_boms<'e, E>(&self, executor: E) -> Result<Vec<BomSummary>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let boms = sqlx::query_as::<_, BomSummary>(
            r#"
            SELECT product_code,
                   COUNT(*) AS line_count,
                   MAX(stock_item_code) FILTER (WHERE from_weighing) AS primary_code,
                   MAX(updated_at) AS updated_at
            FROM bom_lines
            GROUP BY product_code
            ORDER BY product_code
            "#,
        )
            .fetch_all(executor)
            .await?;

        Ok(boms)
    }

    /// Substitui TODAS as linhas da ficha. Deve rodar dentro de uma transação.
    pub async fn replace_lines(
        &self,
        conn: &mut PgConnection,
        product_code: &str,
        lines: &[BomLine],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM bom_lines WHERE product_code = $1")
            .bind(product_code)
            .execute(&mut *conn)
            .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO bom_lines (
                    product_code, position, stock_item_code, qty_per_pack, from_weighing, substitute_code
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
                .bind(product_code)
                .bind(line.position)
                .bind(&line.stock_item_code)
                .bind(line.qty_per_pack)
                .bind(line.from_weighing)
                .bind(&line.substitute_code)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    /// Move a marca de linha primária. Limpa antes de marcar, por causa do índice único parcial.
    pub async fn set_primary(
        &self,
        conn: &mut PgConnection,
        product_code: &str,
        stock_item_code: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE bom_lines SET from_weighing = FALSE, updated_at = NOW() WHERE product_code = $1 AND from_weighing",
        )
            .bind(product_code)
            .execute(&mut *conn)
            .await?;

        if let Some(code) = stock_item_code {
            sqlx::query(
                r#"
                UPDATE bom_lines SET from_weighing = TRUE, updated_at = NOW()
                WHERE product_code = $1 AND stock_item_code = $2
                "#,
            )
                .bind(product_code)
                .bind(code)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    pub async fn delete_bom<'e, E>(&self, executor: E, product_code: &str) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM bom_lines WHERE product_code = $1")
            .bind(product_code)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
