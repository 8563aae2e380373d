// src/models/batch.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::inventory::MovementOrigin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "batch_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchKind {
    Pesagem,
    Moagem,
}

impl BatchKind {
    pub fn origin(self) -> MovementOrigin {
        match self {
            BatchKind::Pesagem => MovementOrigin::Pesagem,
            BatchKind::Moagem => MovementOrigin::Moagem,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "weighing_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeighingType {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Open,
    Depleted,
    Deleted,
}

// --- Lote de Pesagem / Moagem ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: Uuid,
    pub item_code: String,
    pub kind: BatchKind,
    pub weighing_type: WeighingType,
    #[schema(value_type = f64, example = 25.0)]
    pub initial_qty: Decimal,
    // Só cresce. Nunca passa de initial_qty.
    #[schema(value_type = f64, example = 10.0)]
    pub used_qty: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Batch {
    pub fn remaining(&self) -> Decimal {
        (self.initial_qty - self.used_qty).max(Decimal::ZERO)
    }

    pub fn status(&self) -> BatchStatus {
        if self.deleted_at.is_some() {
            BatchStatus::Deleted
        } else if self.remaining() > Decimal::ZERO {
            BatchStatus::Open
        } else {
            BatchStatus::Depleted
        }
    }
}

// Lote com os campos derivados, para a API
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: Batch,
    #[schema(value_type = f64)]
    pub remaining: Decimal,
    pub status: BatchStatus,
}

impl From<Batch> for BatchView {
    fn from(batch: Batch) -> Self {
        Self {
            remaining: batch.remaining(),
            status: batch.status(),
            batch,
        }
    }
}

// Resultado de uma pesagem/moagem
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordBatchOutcome {
    pub batch: BatchView,
    // true quando uma pesagem horária recente foi corrigida em vez de somada
    pub replaced: bool,
    #[schema(value_type = f64)]
    pub posted_delta: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolBalance {
    pub item_code: String,
    #[schema(value_type = f64)]
    pub available: Decimal,
    pub open_batches: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn batch(initial: Decimal, used: Decimal) -> Batch {
        Batch {
            id: Uuid::new_v4(),
            item_code: "MASSA".into(),
            kind: BatchKind::Pesagem,
            weighing_type: WeighingType::Daily,
            initial_qty: initial,
            used_qty: used,
            notes: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn status_follows_remaining_balance() {
        assert_eq!(batch(dec!(10), dec!(4)).status(), BatchStatus::Open);
        assert_eq!(batch(dec!(10), dec!(10)).status(), BatchStatus::Depleted);

        let mut deleted = batch(dec!(10), dec!(0));
        deleted.deleted_at = Some(Utc::now());
        assert_eq!(deleted.status(), BatchStatus::Deleted);
    }

    #[test]
    fn remaining_never_goes_negative() {
        assert_eq!(batch(dec!(3), dec!(5)).remaining(), Decimal::ZERO);
    }
}
