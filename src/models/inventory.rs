// src/models/inventory.rs

use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- 1. Tipo do Item ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "item_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Insumo,
    Processado,
    Produto,
}

impl ItemKind {
    /// Insumos e processados alimentam fichas técnicas.
    pub fn can_be_input(self) -> bool {
        matches!(self, ItemKind::Insumo | ItemKind::Processado)
    }

    /// Só processados e produtos possuem ficha técnica.
    pub fn can_have_bom(self) -> bool {
        matches!(self, ItemKind::Processado | ItemKind::Produto)
    }
}

// --- 2. Unidade de Medida ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stock_unit")]
pub enum StockUnit {
    #[sqlx(rename = "KG")]
    #[serde(rename = "kg")]
    Kg,
    #[sqlx(rename = "UN")]
    #[serde(rename = "un")]
    Un,
    #[sqlx(rename = "M")]
    #[serde(rename = "m")]
    M,
    #[sqlx(rename = "L")]
    #[serde(rename = "L")]
    L,
}

// Acessório fixo que acompanha um produto na expedição
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpeditionItem {
    pub code: String,
    #[schema(value_type = f64, example = 1.0)]
    pub qty: Decimal,
}

// --- 3. Campos específicos de cada tipo ---
// Cada variante carrega apenas os campos que fazem sentido para ela.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemDetails {
    #[serde(rename_all = "camelCase")]
    Insumo {
        category: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Processado {
        category: Option<String>,
        color: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Produto {
        product_type: Option<String>,
        color: Option<String>,
        barcode: Option<String>,
        #[serde(default)]
        expedition_items: Vec<ExpeditionItem>,
    },
}

impl ItemDetails {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemDetails::Insumo { .. } => ItemKind::Insumo,
            ItemDetails::Processado { .. } => ItemKind::Processado,
            ItemDetails::Produto { .. } => ItemKind::Produto,
        }
    }

    pub fn barcode(&self) -> Option<&str> {
        match self {
            ItemDetails::Produto { barcode, .. } => barcode.as_deref(),
            _ => None,
        }
    }

    pub fn expedition_items(&self) -> &[ExpeditionItem] {
        match self {
            ItemDetails::Produto { expedition_items, .. } => expedition_items,
            _ => &[],
        }
    }

    /// Desmonta a variante nas colunas da tabela 'stock_items'.
    pub fn to_columns(&self) -> ItemColumns {
        match self.clone() {
            ItemDetails::Insumo { category } => ItemColumns {
                kind: ItemKind::Insumo,
                category,
                ..Default::default()
            },
            ItemDetails::Processado { category, color } => ItemColumns {
                kind: ItemKind::Processado,
                category,
                color,
                ..Default::default()
            },
            ItemDetails::Produto { product_type, color, barcode, expedition_items } => ItemColumns {
                kind: ItemKind::Produto,
                color,
                product_type,
                barcode,
                expedition_items,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemColumns {
    pub kind: ItemKind,
    pub category: Option<String>,
    pub color: Option<String>,
    pub product_type: Option<String>,
    pub barcode: Option<String>,
    pub expedition_items: Vec<ExpeditionItem>,
}

impl Default for ItemColumns {
    fn default() -> Self {
        Self {
            kind: ItemKind::Insumo,
            category: None,
            color: None,
            product_type: None,
            barcode: None,
            expedition_items: Vec::new(),
        }
    }
}

// --- 4. Item de Estoque ---
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub unit: StockUnit,
    // Cache da soma do livro-razão. Só muda junto com uma movimentação.
    #[schema(value_type = f64, example = 120.5)]
    pub current_qty: Decimal,
    #[schema(value_type = f64, example = 10.0)]
    pub min_qty: Decimal,
    pub substitute_product_code: Option<String>,
    #[serde(flatten)]
    pub details: ItemDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    pub fn kind(&self) -> ItemKind {
        self.details.kind()
    }

    pub fn is_below_minimum(&self) -> bool {
        self.current_qty < self.min_qty
    }
}

// Linha crua da tabela 'stock_items'
#[derive(Debug, Clone, FromRow)]
pub struct StockItemRow {
    pub id: Uuid,
    pub code: String,
    pub kind: ItemKind,
    pub name: String,
    pub unit: StockUnit,
    pub current_qty: Decimal,
    pub min_qty: Decimal,
    pub category: Option<String>,
    pub color: Option<String>,
    pub product_type: Option<String>,
    pub barcode: Option<String>,
    pub expedition_items: Json<Vec<ExpeditionItem>>,
    pub substitute_product_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<StockItemRow> for StockItem {
    type Error = AppError;

    fn try_from(row: StockItemRow) -> Result<Self, Self::Error> {
        let details = match row.kind {
            ItemKind::Insumo => {
                if row.barcode.is_some() || !row.expedition_items.0.is_empty() {
                    return Err(AppError::CorruptedItemRow(row.code));
                }
                ItemDetails::Insumo { category: row.category }
            }
            ItemKind::Processado => {
                if row.barcode.is_some() || !row.expedition_items.0.is_empty() {
                    return Err(AppError::CorruptedItemRow(row.code));
                }
                ItemDetails::Processado { category: row.category, color: row.color }
            }
            ItemKind::Produto => ItemDetails::Produto {
                product_type: row.product_type,
                color: row.color,
                barcode: row.barcode,
                expedition_items: row.expedition_items.0,
            },
        };

        Ok(StockItem {
            id: row.id,
            code: row.code,
            name: row.name,
            unit: row.unit,
            current_qty: row.current_qty,
            min_qty: row.min_qty,
            substitute_product_code: row.substitute_product_code,
            details,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// --- 5. Movimentações de Estoque (Livro-razão) ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "movement_origin", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementOrigin {
    AjusteManual,
    ProducaoManual,
    Bip,
    Pesagem,
    Moagem,
    ImportXml,
    ProducaoInterna,
}

impl MovementOrigin {
    /// Origens que agrupam várias linhas numa única transação lógica.
    pub fn is_grouped(self) -> bool {
        matches!(
            self,
            MovementOrigin::ProducaoManual | MovementOrigin::ProducaoInterna | MovementOrigin::Bip
        )
    }

    pub fn is_production(self) -> bool {
        matches!(self, MovementOrigin::ProducaoManual | MovementOrigin::ProducaoInterna)
    }

    /// Origens aceitas no ajuste avulso.
    pub fn is_adjustment(self) -> bool {
        matches!(
            self,
            MovementOrigin::AjusteManual
                | MovementOrigin::Pesagem
                | MovementOrigin::Moagem
                | MovementOrigin::ImportXml
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub stock_item_code: String,
    pub origin: MovementOrigin,
    #[schema(value_type = f64, example = -2.5)]
    pub qty_delta: Decimal,
    #[serde(rename = "ref")]
    #[sqlx(rename = "ref")]
    pub r#ref: String,
    pub group_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Linha ainda não gravada
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub stock_item_code: String,
    pub qty_delta: Decimal,
    pub batch_id: Option<Uuid>,
    pub notes: Option<String>,
}

// Várias movimentações que compartilham o mesmo 'group_id'
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupedTransaction {
    pub group_id: Uuid,
    #[serde(rename = "ref")]
    pub r#ref: String,
    pub origin: MovementOrigin,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub movements: Vec<StockMovement>,
}

/// Agrupa as movimentações por 'group_id', preservando a ordem de chegada dos grupos.
pub fn group_movements(movements: Vec<StockMovement>) -> Vec<GroupedTransaction> {
    let mut groups: Vec<GroupedTransaction> = Vec::new();

    for movement in movements {
        match groups.iter_mut().find(|g| g.group_id == movement.group_id) {
            Some(group) => {
                if movement.created_at < group.created_at {
                    group.created_at = movement.created_at;
                }
                group.movements.push(movement);
            }
            None => groups.push(GroupedTransaction {
                group_id: movement.group_id,
                r#ref: movement.r#ref.clone(),
                origin: movement.origin,
                created_at: movement.created_at,
                created_by: movement.created_by,
                movements: vec![movement],
            }),
        }
    }

    groups
}

// Divergência entre o saldo em cache e a soma do livro-razão
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDrift {
    pub code: String,
    #[schema(value_type = f64)]
    pub cached_qty: Decimal,
    #[schema(value_type = f64)]
    pub ledger_qty: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(kind: ItemKind) -> StockItemRow {
        StockItemRow {
            id: Uuid::new_v4(),
            code: "X-1".into(),
            kind,
            name: "Item".into(),
            unit: StockUnit::Kg,
            current_qty: dec!(5),
            min_qty: dec!(10),
            category: Some("Resinas".into()),
            color: Some("Azul".into()),
            product_type: None,
            barcode: None,
            expedition_items: Json(Vec::new()),
            substitute_product_code: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_becomes_tagged_variant() {
        let item = StockItem::try_from(row(ItemKind::Processado)).unwrap();
        assert_eq!(item.kind(), ItemKind::Processado);
        assert_eq!(
            item.details,
            ItemDetails::Processado { category: Some("Resinas".into()), color: Some("Azul".into()) }
        );
        assert!(item.is_below_minimum());
    }

    #[test]
    fn insumo_with_barcode_is_rejected() {
        let mut r = row(ItemKind::Insumo);
        r.barcode = Some("789".into());
        assert!(matches!(StockItem::try_from(r), Err(AppError::CorruptedItemRow(_))));
    }

    #[test]
    fn details_serialize_with_kind_tag() {
        let details = ItemDetails::Produto {
            product_type: Some("Kit".into()),
            color: None,
            barcode: Some("789000".into()),
            expedition_items: vec![ExpeditionItem { code: "CAIXA".into(), qty: dec!(1) }],
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "PRODUTO");
        assert_eq!(json["barcode"], "789000");
        assert_eq!(json["expeditionItems"][0]["code"], "CAIXA");

        let back: ItemDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ItemKind::Produto);
    }

    #[test]
    fn movements_are_grouped_by_group_id() {
        let group = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc::now();
        let mk = |code: &str, delta: Decimal, g: Uuid| StockMovement {
            id: Uuid::new_v4(),
            stock_item_code: code.into(),
            origin: MovementOrigin::ProducaoManual,
            qty_delta: delta,
            r#ref: "OP-1".into(),
            group_id: g,
            batch_id: None,
            notes: None,
            created_by: None,
            created_at: now,
        };

        // Mesmo 'ref', grupos diferentes: continuam separados
        let groups = group_movements(vec![
            mk("PROD-A", dec!(10), group),
            mk("X", dec!(-5), group),
            mk("PROD-A", dec!(10), other),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].movements.len(), 2);
        assert_eq!(groups[1].movements.len(), 1);
        assert_eq!(groups[0].r#ref, groups[1].r#ref);
    }

    #[test]
    fn only_insumo_and_processado_feed_a_bom() {
        assert!(ItemKind::Insumo.can_be_input());
        assert!(ItemKind::Processado.can_be_input());
        assert!(!ItemKind::Produto.can_be_input());
        assert!(!ItemKind::Insumo.can_have_bom());
    }
}
