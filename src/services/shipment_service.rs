// src/services/shipment_service.rs

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{error::AppError, validation::scaled},
    db::{InventoryRepository, PackRepository},
    models::{
        auth::User,
        inventory::{MovementOrigin, NewMovement, StockItem, StockMovement},
        pack::StockPackGroup,
    },
};

// O que o código de barras bipado identificou
#[derive(Debug, Clone)]
pub enum ShipmentTarget {
    Product(StockItem),
    Pack(StockPackGroup),
}

/// Débitos da expedição: o produto e seus acessórios, ou cada membro do pack.
/// Códigos repetidos são somados numa linha só.
pub fn shipment_movements(target: &ShipmentTarget, quantity: Decimal) -> Result<Vec<NewMovement>, AppError> {
    let mut debits: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();

    let mut add = |code: &str, qty: Decimal| -> Result<(), AppError> {
        if !debits.contains_key(code) {
            order.push(code.to_string());
        }
        let total = debits.entry(code.to_string()).or_insert(Decimal::ZERO);
        *total = total.checked_add(qty).ok_or(AppError::QuantityOutOfRange)?;
        Ok(())
    };

    match target {
        ShipmentTarget::Product(item) => {
            add(&item.code, quantity)?;
            for accessory in item.details.expedition_items() {
                add(&accessory.code, scaled(accessory.qty, quantity)?)?;
            }
        }
        ShipmentTarget::Pack(pack) => {
            for code in &pack.item_codes {
                add(code, quantity)?;
            }
        }
    }

    Ok(order
        .into_iter()
        .map(|code| NewMovement {
            qty_delta: -debits.get(&code).copied().unwrap_or(Decimal::ZERO),
            stock_item_code: code,
            batch_id: None,
            notes: None,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentResult {
    pub group_id: Uuid,
    #[serde(rename = "ref")]
    pub r#ref: String,
    pub movements: Vec<StockMovement>,
    // Itens que ficaram negativos (apenas aviso)
    pub negative_codes: Vec<String>,
}

#[derive(Clone)]
pub struct ShipmentService {
    inventory_repo: InventoryRepository,
    pack_repo: PackRepository,
}

impl ShipmentService {
    pub fn new(inventory_repo: InventoryRepository, pack_repo: PackRepository) -> Self {
        Self { inventory_repo, pack_repo }
    }

    async fn resolve(&self, barcode: &str) -> Result<ShipmentTarget, AppError> {
        if let Some(item) = self
            .inventory_repo
            .find_by_barcode(self.inventory_repo.pool(), barcode)
            .await?
        {
            return Ok(ShipmentTarget::Product(item));
        }

        self.pack_repo
            .find_by_barcode(self.inventory_repo.pool(), barcode)
            .await?
            .map(ShipmentTarget::Pack)
            .ok_or_else(|| AppError::BarcodeNotFound(barcode.to_string()))
    }

    /// Expedição por bipagem: um grupo BIP com todos os débitos.
    pub async fn scan_shipment(
        &self,
        actor: &User,
        barcode: &str,
        quantity: Decimal,
        reference: Option<&str>,
    ) -> Result<ShipmentResult, AppError> {
        if quantity <= Decimal::ZERO {
            return Err(AppError::NonPositiveQuantity);
        }

        let target = self.resolve(barcode).await?;
        let planned = shipment_movements(&target, quantity)?;
        let reference = reference.map(str::to_string).unwrap_or_else(|| format!("BIP {barcode}"));

        let mut tx = self.inventory_repo.pool().begin().await?;

        let mut codes: Vec<String> = planned.iter().map(|m| m.stock_item_code.clone()).collect();
        codes.sort();
        let locked = self.inventory_repo.lock_by_codes(&mut *tx, &codes).await?;
        if let Some(missing) = codes.iter().find(|c| !locked.iter().any(|i| &i.code == *c)) {
            return Err(AppError::StockItemNotFound(missing.clone()));
        }

        let group_id = Uuid::new_v4();
        let mut movements = Vec::with_capacity(planned.len());
        for movement in &planned {
            let posted = self
                .inventory_repo
                .post_movement(&mut *tx, movement, MovementOrigin::Bip, &reference, group_id, Some(actor.id))
                .await?;
            movements.push(posted);
        }

        tx.commit().await?;

        let negative_codes: Vec<String> = locked
            .iter()
            .filter(|item| {
                let debit: Decimal = planned
                    .iter()
                    .filter(|m| m.stock_item_code == item.code)
                    .map(|m| m.qty_delta)
                    .sum();
                item.current_qty + debit < Decimal::ZERO
            })
            .map(|item| item.code.clone())
            .collect();

        if negative_codes.is_empty() {
            tracing::info!("📤 Expedição '{}' gravada: {} linhas (grupo {})", reference, movements.len(), group_id);
        } else {
            tracing::warn!("📤 Expedição '{}' deixou estoque negativo em {:?}", reference, negative_codes);
        }

        Ok(ShipmentResult {
            group_id,
            r#ref: reference,
            movements,
            negative_codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::{ExpeditionItem, ItemDetails, StockUnit};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product(expedition_items: Vec<ExpeditionItem>) -> StockItem {
        StockItem {
            id: Uuid::new_v4(),
            code: "VASO".into(),
            name: "Vaso".into(),
            unit: StockUnit::Un,
            current_qty: dec!(10),
            min_qty: Decimal::ZERO,
            substitute_product_code: None,
            details: ItemDetails::Produto {
                product_type: None,
                color: None,
                barcode: Some("789".into()),
                expedition_items,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn product_scan_debits_product_and_accessories() {
        let target = ShipmentTarget::Product(product(vec![
            ExpeditionItem { code: "CAIXA".into(), qty: dec!(1) },
            ExpeditionItem { code: "PRATO".into(), qty: dec!(2) },
        ]));

        let rows: Vec<(String, Decimal)> = shipment_movements(&target, dec!(3))
            .unwrap()
            .into_iter()
            .map(|m| (m.stock_item_code, m.qty_delta))
            .collect();

        assert_eq!(
            rows,
            vec![
                ("VASO".to_string(), dec!(-3)),
                ("CAIXA".to_string(), dec!(-3)),
                ("PRATO".to_string(), dec!(-6)),
            ]
        );
    }

    #[test]
    fn pack_scan_debits_each_member_once_per_unit() {
        let pack = StockPackGroup {
            id: Uuid::new_v4(),
            name: "Kit".into(),
            barcode: "555".into(),
            item_codes: vec!["A".into(), "B".into(), "A".into()],
            min_pack_qty: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let rows = shipment_movements(&ShipmentTarget::Pack(pack), dec!(2)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].stock_item_code, "A");
        assert_eq!(rows[0].qty_delta, dec!(-4));
        assert_eq!(rows[1].qty_delta, dec!(-2));
    }

    #[test]
    fn oversized_accessory_debit_is_rejected() {
        let target = ShipmentTarget::Product(product(vec![
            ExpeditionItem { code: "CAIXA".into(), qty: dec!(1000000000) },
        ]));
        let quantity: Decimal = serde_json::from_str("1e20").unwrap();

        assert!(matches!(
            shipment_movements(&target, quantity),
            Err(AppError::QuantityOutOfRange)
        ));
    }
}
