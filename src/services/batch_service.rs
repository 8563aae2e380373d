// src/services/batch_service.rs

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgConnection;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{BatchRepository, InventoryRepository, SettingsRepository},
    models::{
        auth::User,
        batch::{Batch, BatchKind, BatchView, PoolBalance, RecordBatchOutcome, WeighingType},
        inventory::{ItemKind, NewMovement},
        settings::GeneralSettings,
    },
};

/// Como uma nova pesagem/moagem entra no pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    // Sempre cria um lote novo
    Accumulating,
    // Corrige a pesagem horária do mesmo item feita dentro da janela
    WindowedReplace { window_minutes: i64 },
}

impl BatchPolicy {
    pub fn select(kind: BatchKind, weighing_type: WeighingType, settings: &GeneralSettings) -> Self {
        match (kind, weighing_type) {
            (BatchKind::Pesagem, WeighingType::Hourly) => BatchPolicy::WindowedReplace {
                window_minutes: i64::from(settings.hourly_window_minutes),
            },
            _ => BatchPolicy::Accumulating,
        }
    }

    /// Início da janela de substituição, se a política tiver uma.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            BatchPolicy::Accumulating => None,
            BatchPolicy::WindowedReplace { window_minutes } => {
                Some(now - Duration::minutes(*window_minutes))
            }
        }
    }

    /// Escolhe, entre os candidatos, o lote que a nova leitura deve substituir.
    pub fn replacement_target<'a>(
        &self,
        item_code: &str,
        candidates: &'a [Batch],
        now: DateTime<Utc>,
    ) -> Option<&'a Batch> {
        let since = self.window_start(now)?;
        candidates
            .iter()
            .filter(|b| {
                b.item_code == item_code
                    && b.kind == BatchKind::Pesagem
                    && b.weighing_type == WeighingType::Hourly
                    && b.deleted_at.is_none()
                    && b.created_at >= since
            })
            .max_by_key(|b| b.created_at)
    }
}

/// Efeito de uma leitura sobre o lote: valores finais e o delta do livro-razão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingOutcome {
    pub initial_qty: Decimal,
    pub used_qty: Decimal,
    pub posted_delta: Decimal,
}

/// Uma leitura nova cria o lote; a correção de uma leitura anterior lança só
/// `novo - antigo` e o consumo nunca fica acima do novo valor.
pub fn apply_reading(previous: Option<&Batch>, new_qty: Decimal) -> ReadingOutcome {
    match previous {
        Some(prev) => ReadingOutcome {
            initial_qty: new_qty,
            used_qty: prev.used_qty.min(new_qty),
            posted_delta: new_qty - prev.initial_qty,
        },
        None => ReadingOutcome {
            initial_qty: new_qty,
            used_qty: Decimal::ZERO,
            posted_delta: new_qty,
        },
    }
}

// Mudanças de lote que podem chegar ao livro-razão
#[derive(Debug, Clone, Copy)]
pub enum BatchChange<'a> {
    Reading { batch: &'a Batch, outcome: ReadingOutcome },
    Deleted(&'a Batch),
}

/// Linha do livro-razão gerada pela mudança, se houver.
/// Excluir um lote não estorna nada: o estoque já entrou na pesagem.
pub fn ledger_movement(change: BatchChange<'_>) -> Option<NewMovement> {
    match change {
        BatchChange::Reading { batch, outcome } if outcome.posted_delta != Decimal::ZERO => {
            Some(NewMovement {
                stock_item_code: batch.item_code.clone(),
                qty_delta: outcome.posted_delta,
                batch_id: Some(batch.id),
                notes: batch.notes.clone(),
            })
        }
        BatchChange::Reading { .. } | BatchChange::Deleted(_) => None,
    }
}

// Quanto foi retirado de um lote específico
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolDraw {
    pub batch_id: Uuid,
    pub item_code: String,
    #[schema(value_type = f64)]
    pub qty: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolConsumption {
    pub draws: Vec<PoolDraw>,
    pub drawn: Decimal,
    pub shortfall: Decimal,
}

/// Consome `amount` dos lotes do item, do mais antigo para o mais novo.
///
/// Atualiza `used_qty` em memória (nunca acima de `initial_qty`) e devolve o
/// que faltou em vez de deixar o saldo negativo. Os lotes devem vir em ordem FIFO.
pub fn consume_fifo(batches: &mut [Batch], item_code: &str, amount: Decimal) -> PoolConsumption {
    let mut remaining = amount.max(Decimal::ZERO);
    let mut draws = Vec::new();

    for batch in batches
        .iter_mut()
        .filter(|b| b.item_code == item_code && b.deleted_at.is_none())
    {
        if remaining <= Decimal::ZERO {
            break;
        }

        let available = batch.remaining();
        if available <= Decimal::ZERO {
            continue;
        }

        let take = available.min(remaining);
        batch.used_qty += take;
        remaining -= take;

        draws.push(PoolDraw {
            batch_id: batch.id,
            item_code: item_code.to_string(),
            qty: take,
        });
    }

    PoolConsumption {
        drawn: amount.max(Decimal::ZERO) - remaining,
        shortfall: remaining,
        draws,
    }
}

pub fn pool_available(batches: &[Batch], item_code: &str) -> Decimal {
    batches
        .iter()
        .filter(|b| b.item_code == item_code && b.deleted_at.is_none())
        .map(Batch::remaining)
        .sum()
}

#[derive(Clone)]
pub struct BatchService {
    batch_repo: BatchRepository,
    inventory_repo: InventoryRepository,
    settings_repo: SettingsRepository,
}

impl BatchService {
    pub fn new(
        batch_repo: BatchRepository,
        inventory_repo: InventoryRepository,
        settings_repo: SettingsRepository,
    ) -> Self {
        Self { batch_repo, inventory_repo, settings_repo }
    }

    /// Registra uma pesagem ou moagem e lança a entrada correspondente no livro-razão.
    pub async fn record_batch(
        &self,
        actor: &User,
        item_code: &str,
        initial_qty: Decimal,
        kind: BatchKind,
        weighing_type: WeighingType,
        notes: Option<&str>,
    ) -> Result<RecordBatchOutcome, AppError> {
        if initial_qty <= Decimal::ZERO {
            return Err(AppError::NonPositiveQuantity);
        }

        // Moagem não tem leitura horária
        let weighing_type = match kind {
            BatchKind::Moagem => WeighingType::Daily,
            BatchKind::Pesagem => weighing_type,
        };

        let settings = self.settings_repo.get_settings(self.batch_repo.pool()).await?;
        let policy = BatchPolicy::select(kind, weighing_type, &settings);
        let now = Utc::now();

        let mut tx = self.batch_repo.pool().begin().await?;

        // 1. Trava o item (serializa pesagens concorrentes do mesmo código)
        let item = self
            .inventory_repo
            .lock_by_codes(&mut *tx, &[item_code.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::StockItemNotFound(item_code.to_string()))?;

        if item.kind() == ItemKind::Produto {
            return Err(AppError::BatchNotAllowed(item.code));
        }

        // 2. Política: acumular ou corrigir a leitura recente
        let candidates = match policy.window_start(now) {
            Some(since) => self.batch_repo.lock_recent_hourly(&mut *tx, item_code, since).await?,
            None => Vec::new(),
        };

        let previous = policy.replacement_target(item_code, &candidates, now);
        let outcome = apply_reading(previous, initial_qty);
        let replaced = previous.is_some();

        let batch = match previous {
            Some(previous) => {
                self.batch_repo
                    .replace_reading(&mut *tx, previous.id, outcome.initial_qty, outcome.used_qty, notes)
                    .await?
            }
            None => {
                self.batch_repo
                    .insert_batch(&mut *tx, item_code, kind, weighing_type, outcome.initial_qty, notes, actor.id)
                    .await?
            }
        };

        // 3. Livro-razão (a correção lança só a diferença)
        if let Some(movement) = ledger_movement(BatchChange::Reading { batch: &batch, outcome }) {
            let reference = format!("LOTE {}", batch.id);
            self.inventory_repo
                .post_movement(&mut *tx, &movement, kind.origin(), &reference, Uuid::new_v4(), Some(actor.id))
                .await?;
        }
        let delta = outcome.posted_delta;

        tx.commit().await?;

        tracing::info!(
            "⚖️ {:?} de {} registrada: lote {} ({}), delta {}",
            kind,
            item_code,
            batch.id,
            if replaced { "substituída" } else { "nova" },
            delta
        );

        Ok(RecordBatchOutcome {
            batch: BatchView::from(batch),
            replaced,
            posted_delta: delta,
        })
    }

    /// Grava no banco as retiradas calculadas pelo planejamento de produção.
    pub async fn apply_draws(
        &self,
        conn: &mut PgConnection,
        draws: &[PoolDraw],
    ) -> Result<(), AppError> {
        for draw in draws {
            self.batch_repo.add_used_qty(&mut *conn, draw.batch_id, draw.qty).await?;
        }
        Ok(())
    }

    pub async fn list_batches(
        &self,
        item_code: Option<&str>,
        include_depleted: bool,
        limit: i64,
    ) -> Result<Vec<BatchView>, AppError> {
        let batches = self
            .batch_repo
            .list_batches(self.batch_repo.pool(), item_code, include_depleted, limit)
            .await?;

        Ok(batches.into_iter().map(BatchView::from).collect())
    }

    pub async fn pool_balance(&self, item_code: &str) -> Result<PoolBalance, AppError> {
        self.inventory_repo
            .get_by_code(self.batch_repo.pool(), item_code)
            .await?;

        let batches = self
            .batch_repo
            .open_batches(self.batch_repo.pool(), &[item_code.to_string()])
            .await?;

        Ok(PoolBalance {
            item_code: item_code.to_string(),
            available: pool_available(&batches, item_code),
            open_batches: batches.len(),
        })
    }

    /// Exclusão (SUPER_ADMIN). O estoque lançado pelo lote NÃO é revertido.
    pub async fn delete_batch(&self, actor: &User, id: Uuid) -> Result<BatchView, AppError> {
        let mut tx = self.batch_repo.pool().begin().await?;
        let batch = self.batch_repo.soft_delete(&mut *tx, id).await?;

        if let Some(movement) = ledger_movement(BatchChange::Deleted(&batch)) {
            self.inventory_repo
                .post_movement(
                    &mut *tx,
                    &movement,
                    batch.kind.origin(),
                    &format!("LOTE {}", batch.id),
                    Uuid::new_v4(),
                    Some(actor.id),
                )
                .await?;
        }

        tx.commit().await?;

        tracing::warn!(
            "🗑️ Lote {} de {} excluído por {} (saldo restante {} continua no estoque)",
            batch.id,
            batch.item_code,
            actor.login,
            batch.remaining()
        );

        Ok(BatchView::from(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn batch(code: &str, initial: Decimal, used: Decimal, minutes_ago: i64, weighing_type: WeighingType) -> Batch {
        let created = Utc::now() - Duration::minutes(minutes_ago);
        Batch {
            id: Uuid::new_v4(),
            item_code: code.into(),
            kind: BatchKind::Pesagem,
            weighing_type,
            initial_qty: initial,
            used_qty: used,
            notes: None,
            created_by: None,
            created_at: created,
            updated_at: created,
            deleted_at: None,
        }
    }

    #[test]
    fn fifo_draws_oldest_batches_first() {
        let mut batches = vec![
            batch("MASSA", dec!(2), dec!(0), 120, WeighingType::Daily),
            batch("MASSA", dec!(5), dec!(1), 60, WeighingType::Daily),
        ];
        let oldest = batches[0].id;

        let result = consume_fifo(&mut batches, "MASSA", dec!(4));

        assert_eq!(result.drawn, dec!(4));
        assert_eq!(result.shortfall, Decimal::ZERO);
        assert_eq!(result.draws[0].batch_id, oldest);
        assert_eq!(result.draws[0].qty, dec!(2));
        assert_eq!(result.draws[1].qty, dec!(2));
        assert_eq!(batches[0].remaining(), Decimal::ZERO);
        assert_eq!(batches[1].used_qty, dec!(3));
    }

    #[test]
    fn consuming_more_than_available_returns_shortfall() {
        let mut batches = vec![batch("MASSA", dec!(3), dec!(0), 10, WeighingType::Daily)];

        let result = consume_fifo(&mut batches, "MASSA", dec!(5));

        assert_eq!(result.drawn, dec!(3));
        assert_eq!(result.shortfall, dec!(2));
        // used_qty nunca passa de initial_qty
        assert_eq!(batches[0].used_qty, batches[0].initial_qty);
        assert_eq!(batches[0].remaining(), Decimal::ZERO);
    }

    #[test]
    fn other_items_and_deleted_batches_are_ignored() {
        let mut deleted = batch("MASSA", dec!(10), dec!(0), 30, WeighingType::Daily);
        deleted.deleted_at = Some(Utc::now());
        let mut batches = vec![deleted, batch("OUTRA", dec!(10), dec!(0), 20, WeighingType::Daily)];

        let result = consume_fifo(&mut batches, "MASSA", dec!(1));

        assert!(result.draws.is_empty());
        assert_eq!(result.shortfall, dec!(1));
        assert_eq!(pool_available(&batches, "MASSA"), Decimal::ZERO);
        assert_eq!(pool_available(&batches, "OUTRA"), dec!(10));
    }

    #[test]
    fn hourly_weighing_selects_windowed_replace() {
        let settings = GeneralSettings::default();
        assert_eq!(
            BatchPolicy::select(BatchKind::Pesagem, WeighingType::Hourly, &settings),
            BatchPolicy::WindowedReplace { window_minutes: 60 }
        );
        assert_eq!(
            BatchPolicy::select(BatchKind::Pesagem, WeighingType::Daily, &settings),
            BatchPolicy::Accumulating
        );
        assert_eq!(
            BatchPolicy::select(BatchKind::Moagem, WeighingType::Hourly, &settings),
            BatchPolicy::Accumulating
        );
    }

    #[test]
    fn hourly_reading_inside_window_is_replaced() {
        let policy = BatchPolicy::WindowedReplace { window_minutes: 60 };
        let recent = batch("MASSA", dec!(8), dec!(0), 20, WeighingType::Hourly);
        let old = batch("MASSA", dec!(8), dec!(0), 90, WeighingType::Hourly);
        let candidates = vec![old, recent.clone()];

        let target = policy.replacement_target("MASSA", &candidates, Utc::now());
        assert_eq!(target.map(|b| b.id), Some(recent.id));
    }

    #[test]
    fn hourly_reading_outside_window_accumulates() {
        let policy = BatchPolicy::WindowedReplace { window_minutes: 60 };
        let candidates = vec![batch("MASSA", dec!(8), dec!(0), 61, WeighingType::Hourly)];

        assert!(policy.replacement_target("MASSA", &candidates, Utc::now()).is_none());
    }

    #[test]
    fn daily_batches_never_replace() {
        let candidates = vec![batch("MASSA", dec!(8), dec!(0), 5, WeighingType::Hourly)];
        assert!(BatchPolicy::Accumulating
            .replacement_target("MASSA", &candidates, Utc::now())
            .is_none());

        // Uma pesagem diária recente também não é alvo da política horária
        let daily = vec![batch("MASSA", dec!(8), dec!(0), 5, WeighingType::Daily)];
        let policy = BatchPolicy::WindowedReplace { window_minutes: 60 };
        assert!(policy.replacement_target("MASSA", &daily, Utc::now()).is_none());
    }

    #[test]
    fn corrected_reading_keeps_stock_equal_to_the_ledger() {
        // Estoque do item começa em 0; a soma dos deltas lançados deve bater com o lote
        let first = apply_reading(None, dec!(8));
        assert_eq!(first, ReadingOutcome { initial_qty: dec!(8), used_qty: dec!(0), posted_delta: dec!(8) });

        let mut previous = batch("MASSA", first.initial_qty, dec!(2), 10, WeighingType::Hourly);
        let lower = apply_reading(Some(&previous), dec!(5));
        assert_eq!(lower.posted_delta, dec!(-3));
        assert_eq!(lower.used_qty, dec!(2));
        assert_eq!(first.posted_delta + lower.posted_delta, lower.initial_qty);

        previous.initial_qty = lower.initial_qty;
        previous.used_qty = dec!(5);
        let lowest = apply_reading(Some(&previous), dec!(3));
        assert_eq!(lowest.posted_delta, dec!(-2));
        assert_eq!(lowest.used_qty, dec!(3));
        assert_eq!(
            first.posted_delta + lower.posted_delta + lowest.posted_delta,
            lowest.initial_qty
        );
    }

    #[test]
    fn unchanged_reading_posts_nothing() {
        let previous = batch("MASSA", dec!(8), dec!(0), 10, WeighingType::Hourly);
        let outcome = apply_reading(Some(&previous), dec!(8));

        assert!(ledger_movement(BatchChange::Reading { batch: &previous, outcome }).is_none());
    }

    #[test]
    fn reading_movement_points_to_its_batch() {
        let recorded = batch("MASSA", dec!(4), dec!(0), 0, WeighingType::Daily);
        let outcome = apply_reading(None, dec!(4));

        let movement = ledger_movement(BatchChange::Reading { batch: &recorded, outcome }).unwrap();
        assert_eq!(movement.stock_item_code, "MASSA");
        assert_eq!(movement.qty_delta, dec!(4));
        assert_eq!(movement.batch_id, Some(recorded.id));
    }

    #[test]
    fn deleting_a_batch_posts_nothing() {
        let mut deleted = batch("MASSA", dec!(10), dec!(3), 30, WeighingType::Daily);
        deleted.deleted_at = Some(Utc::now());

        assert!(ledger_movement(BatchChange::Deleted(&deleted)).is_none());
    }
}
