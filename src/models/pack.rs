// src/models/pack.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Grupo de Pack (vários SKUs vendidos juntos) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockPackGroup {
    pub id: Uuid,
    #[schema(example = "Kit Verão")]
    pub name: String,
    #[schema(example = "7891234567895")]
    pub barcode: String,
    pub item_codes: Vec<String>,
    #[schema(value_type = f64, example = 20.0)]
    pub min_pack_qty: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackGroupView {
    #[serde(flatten)]
    pub pack: StockPackGroup,
    // Soma do estoque atual de todos os membros
    #[schema(value_type = f64)]
    pub total_stock: Decimal,
    pub below_minimum: bool,
}

impl PackGroupView {
    pub fn new(pack: StockPackGroup, member_stock: &[Decimal]) -> Self {
        let total_stock: Decimal = member_stock.iter().copied().sum();
        Self {
            below_minimum: total_stock < pack.min_pack_qty,
            total_stock,
            pack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn alert_uses_sum_of_member_stock() {
        let pack = StockPackGroup {
            id: Uuid::new_v4(),
            name: "Kit".into(),
            barcode: "789".into(),
            item_codes: vec!["A".into(), "B".into()],
            min_pack_qty: dec!(10),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let view = PackGroupView::new(pack.clone(), &[dec!(4), dec!(5)]);
        assert_eq!(view.total_stock, dec!(9));
        assert!(view.below_minimum);

        let view = PackGroupView::new(pack, &[dec!(4), dec!(6)]);
        assert!(!view.below_minimum);
    }
}
