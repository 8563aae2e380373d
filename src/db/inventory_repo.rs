// src/db/inventory_repo.rs

use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{Executor, PgConnection, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::inventory::{
        ItemDetails, ItemKind, LedgerDrift, MovementOrigin, NewMovement, StockItem, StockItemRow,
        StockMovement, StockUnit,
    },
};

#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

// Campos descritivos editáveis sem passar pelo livro-razão
#[derive(Debug, Clone)]
pub struct ItemDescriptor<'a> {
    pub name: &'a str,
    pub unit: StockUnit,
    pub substitute_product_code: Option<&'a str>,
    pub details: &'a ItemDetails,
}

fn into_items(rows: Vec<StockItemRow>) -> Result<Vec<StockItem>, AppError> {
    rows.into_iter().map(StockItem::try_from).collect()
}

// Converte violações de unicidade em erros amigáveis
fn map_item_write_error(e: sqlx::Error, code: &str, barcode: Option<&str>) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default();
            if constraint.contains("barcode") {
                return AppError::BarcodeAlreadyExists(barcode.unwrap_or_default().to_string());
            }
            return AppError::CodeAlreadyExists(code.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return AppError::StockItemNotFound(code.to_string());
        }
    }
    e.into()
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---
    // Funções de "Leitura" (Getters)
    // ---

    pub async fn find_by_code<'e, E>(
        &self,
        executor: E,
        code: &str,
    ) -> Result<Option<StockItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, StockItemRow>("SELECT * FROM stock_items WHERE code = $1")
            .bind(code)
            .fetch_optional(executor)
            .await?;

        row.map(StockItem::try_from).transpose()
    }

    pub async fn get_by_code<'e, E>(&self, executor: E, code: &str) -> Result<StockItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.find_by_code(executor, code)
            .await?
            .ok_or_else(|| AppError::StockItemNotFound(code.to_string()))
    }

    pub async fn find_by_codes<'e, E>(
        &self,
        executor: E,
        codes: &[String],
    ) -> Result<Vec<StockItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, StockItemRow>(
            "SELECT * FROM stock_items WHERE code = ANY($1) ORDER BY code",
        )
            .bind(codes)
            .fetch_all(executor)
            .await?;

        into_items(rows)
    }

    /// Trava as linhas dos itens (SELECT ... FOR UPDATE), sempre na ordem do código
    /// para que duas produções concorrentes não entrem em deadlock.
    pub async fn lock_by_codes<'e, E>(
        &self,
        executor: E,
        codes: &[String],
    ) -> Result<Vec<StockItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, StockItemRow>(
            "SELECT * FROM stock_items WHERE code = ANY($1) ORDER BY code FOR UPDATE",
        )
            .bind(codes)
            .fetch_all(executor)
            .await?;

        into_items(rows)
    }

    pub async fn find_by_barcode<'e, E>(
        &self,
        executor: E,
        barcode: &str,
    ) -> Result<Option<StockItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, StockItemRow>("SELECT * FROM stock_items WHERE barcode = $1")
            .bind(barcode)
            .fetch_optional(executor)
            .await?;

        row.map(StockItem::try_from).transpose()
    }

    pub async fn list_items<'e, E>(
        &self,
        executor: E,
        kind: Option<ItemKind>,
        below_minimum: bool,
    ) -> Result<Vec<StockItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, StockItemRow>(
            r#"
            SELECT * FROM stock_items
            WHERE ($1::item_kind IS NULL OR kind = $1)
              AND (NOT $2 OR current_qty < min_qty)
            ORDER BY name ASC
            "#,
        )
            .bind(kind)
            .bind(below_minimum)
            .fetch_all(executor)
            .await?;

        into_items(rows)
    }

    /// Verifica se o item é usado por alguma ficha técnica (saída, entrada ou
    /// substituto) ou por um lote ainda aberto.
    pub async fn is_referenced<'e, E>(&self, executor: E, code: &str) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bom_lines
                WHERE product_code = $1 OR stock_item_code = $1 OR substitute_code = $1
            ) OR EXISTS (
                SELECT 1 FROM batches
                WHERE item_code = $1 AND deleted_at IS NULL AND used_qty < initial_qty
            ) OR EXISTS (
                SELECT 1 FROM stock_items WHERE substitute_product_code = $1 AND code <> $1
            )
            "#,
        )
            .bind(code)
            .fetch_one(executor)
            .await?;

        Ok(referenced)
    }

    // ---
    // Funções de "Escrita"
    // ---

    /// Cria o item com saldo zero. O saldo inicial, se houver, entra pelo livro-razão.
    pub async fn create_item<'e, E>(
        &self,
        executor: E,
        code: &str,
        descriptor: &ItemDescriptor<'_>,
        min_qty: Decimal,
    ) -> Result<StockItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let columns = descriptor.details.to_columns();

        let row = sqlx::query_as::<_, StockItemRow>(
            r#"
            INSERT INTO stock_items (
                code, kind, name, unit, min_qty, category, color, product_type,
                barcode, expedition_items, substitute_product_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
            .bind(code)
            .bind(columns.kind)
            .bind(descriptor.name)
            .bind(descriptor.unit)
            .bind(min_qty)
            .bind(&columns.category)
            .bind(&columns.color)
            .bind(&columns.product_type)
            .bind(&columns.barcode)
            .bind(Json(&columns.expedition_items))
            .bind(descriptor.substitute_product_code)
            .fetch_one(executor)
            .await
            .map_err(|e| map_item_write_error(e, code, columns.barcode.as_deref()))?;

        StockItem::try_from(row)
    }

    /// Atualiza apenas campos descritivos. O tipo (kind) do item não muda.
    pub async fn update_descriptor<'e, E>(
        &self,
        executor: E,
        code: &str,
        descriptor: &ItemDescriptor<'_>,
    ) -> Result<StockItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let columns = descriptor.details.to_columns();

        let row = sqlx::query_as::<_, StockItemRow>(
            r#"
            UPDATE stock_items SET
                name = $2, unit = $3, category = $4, color = $5, product_type = $6,
                barcode = $7, expedition_items = $8, substitute_product_code = $9,
                updated_at = NOW()
            WHERE code = $1 AND kind = $10
            RETURNING *
            "#,
        )
            .bind(code)
            .bind(descriptor.name)
            .bind(descriptor.unit)
            .bind(&columns.category)
            .bind(&columns.color)
            .bind(&columns.product_type)
            .bind(&columns.barcode)
            .bind(Json(&columns.expedition_items))
            .bind(descriptor.substitute_product_code)
            .bind(columns.kind)
            .fetch_optional(executor)
            .await
            .map_err(|e| map_item_write_error(e, code, columns.barcode.as_deref()))?
            .ok_or_else(|| AppError::StockItemNotFound(code.to_string()))?;

        StockItem::try_from(row)
    }

    pub async fn set_min_qty<'e, E>(
        &self,
        executor: E,
        code: &str,
        min_qty: Decimal,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("UPDATE stock_items SET min_qty = $2, updated_at = NOW() WHERE code = $1")
            .bind(code)
            .bind(min_qty)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::StockItemNotFound(code.to_string()));
        }
        Ok(())
    }

    pub async fn delete_item<'e, E>(&self, executor: E, code: &str) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM stock_items WHERE code = $1")
            .bind(code)
            .execute(executor)
            .await
            .map_err(|e| {
                // Ainda existe histórico apontando para o item
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::ItemInUse(code.to_string());
                    }
                }
                AppError::from(e)
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::StockItemNotFound(code.to_string()));
        }
        Ok(())
    }

    // ---
    // Livro-razão
    // ---

    /// Grava uma movimentação e atualiza o saldo em cache na mesma conexão.
    /// Deve rodar dentro de uma transação: é o único caminho que altera current_qty.
    pub async fn post_movement(
        &self,
        conn: &mut PgConnection,
        movement: &NewMovement,
        origin: MovementOrigin,
        reference: &str,
        group_id: Uuid,
        created_by: Option<Uuid>,
    ) -> Result<StockMovement, AppError> {
        let posted = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements (
                stock_item_code, origin, qty_delta, ref, group_id, batch_id, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
            .bind(&movement.stock_item_code)
            .bind(origin)
            .bind(movement.qty_delta)
            .bind(reference)
            .bind(group_id)
            .bind(movement.batch_id)
            .bind(&movement.notes)
            .bind(created_by)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_foreign_key_violation() {
                        return AppError::StockItemNotFound(movement.stock_item_code.clone());
                    }
                }
                AppError::from(e)
            })?;

        sqlx::query(
            "UPDATE stock_items SET current_qty = current_qty + $2, updated_at = NOW() WHERE code = $1",
        )
            .bind(&movement.stock_item_code)
            .bind(movement.qty_delta)
            .execute(&mut *conn)
            .await?;

        Ok(posted)
    }

    pub async fn list_movements<'e, E>(
        &self,
        executor: E,
        code: &str,
        limit: i64,
    ) -> Result<Vec<StockMovement>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE stock_item_code = $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
        )
            .bind(code)
            .bind(limit)
            .fetch_all(executor)
            .await?;

        Ok(movements)
    }

    /// Movimentações das últimas `limit` transações agrupadas (produção e BIP),
    /// mais recentes primeiro.
    pub async fn list_grouped_movements<'e, E>(
        &self,
        executor: E,
        limit: i64,
    ) -> Result<Vec<StockMovement>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            WITH recent AS (
                SELECT group_id, MIN(created_at) AS started_at
                FROM stock_movements
                WHERE origin IN ('PRODUCAO_MANUAL', 'PRODUCAO_INTERNA', 'BIP')
                GROUP BY group_id
                ORDER BY started_at DESC
                LIMIT $1
            )
            SELECT m.* FROM stock_movements m
            JOIN recent r ON r.group_id = m.group_id
            ORDER BY r.started_at DESC, m.group_id, m.qty_delta DESC
            "#,
        )
            .bind(limit)
            .fetch_all(executor)
            .await?;

        Ok(movements)
    }

    pub async fn lock_movement<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<StockMovement, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, StockMovement>("SELECT * FROM stock_movements WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::MovementNotFound(id))
    }

    /// Apaga a movimentação e desfaz o seu efeito no saldo, na mesma conexão.
    pub async fn delete_movement(
        &self,
        conn: &mut PgConnection,
        movement: &StockMovement,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM stock_movements WHERE id = $1")
            .bind(movement.id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "UPDATE stock_items SET current_qty = current_qty - $2, updated_at = NOW() WHERE code = $1",
        )
            .bind(&movement.stock_item_code)
            .bind(movement.qty_delta)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Itens cujo saldo em cache difere da soma do livro-razão.
    pub async fn ledger_drift<'e, E>(&self, executor: E) -> Result<Vec<LedgerDrift>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let drift = sqlx::query_as::<_, LedgerDrift>(
            r#"
            SELECT i.code,
                   i.current_qty AS cached_qty,
                   COALESCE(SUM(m.qty_delta), 0) AS ledger_qty
            FROM stock_items i
            LEFT JOIN stock_movements m ON m.stock_item_code = i.code
            GROUP BY i.code, i.current_qty
            HAVING i.current_qty <> COALESCE(SUM(m.qty_delta), 0)
            ORDER BY i.code
            "#,
        )
            .fetch_all(executor)
            .await?;

        Ok(drift)
    }

    pub async fn set_cached_qty<'e, E>(
        &self,
        executor: E,
        code: &str,
        qty: Decimal,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE stock_items SET current_qty = $2, updated_at = NOW() WHERE code = $1")
            .bind(code)
            .bind(qty)
            .execute(executor)
            .await?;
        Ok(())
    }
}
