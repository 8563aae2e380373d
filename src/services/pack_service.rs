// src/services/pack_service.rs

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{InventoryRepository, PackRepository},
    models::{
        auth::User,
        inventory::StockItem,
        pack::{PackGroupView, StockPackGroup},
    },
};

/// Um código de barras aponta para um único alvo de bipagem: produto ou pack.
/// Recebe o dono encontrado na outra tabela, se houver.
pub fn ensure_barcode_unclaimed(
    barcode: &str,
    product: Option<&StockItem>,
    pack: Option<&StockPackGroup>,
) -> Result<(), AppError> {
    if product.is_some() || pack.is_some() {
        return Err(AppError::BarcodeAlreadyExists(barcode.to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PackService {
    pack_repo: PackRepository,
    inventory_repo: InventoryRepository,
}

impl PackService {
    pub fn new(pack_repo: PackRepository, inventory_repo: InventoryRepository) -> Self {
        Self { pack_repo, inventory_repo }
    }

    pub async fn create_pack(
        &self,
        actor: &User,
        name: &str,
        barcode: &str,
        item_codes: &[String],
        min_pack_qty: Decimal,
    ) -> Result<PackGroupView, AppError> {
        let product = self
            .inventory_repo
            .find_by_barcode(self.pack_repo.pool(), barcode)
            .await?;
        ensure_barcode_unclaimed(barcode, product.as_ref(), None)?;

        let mut codes = item_codes.to_vec();
        codes.sort();
        codes.dedup();

        let members = self
            .inventory_repo
            .find_by_codes(self.pack_repo.pool(), &codes)
            .await?;

        if let Some(missing) = codes.iter().find(|c| !members.iter().any(|m| &m.code == *c)) {
            return Err(AppError::StockItemNotFound(missing.clone()));
        }

        let pack = self
            .pack_repo
            .create_pack(self.pack_repo.pool(), name, barcode, &codes, min_pack_qty)
            .await?;

        tracing::info!("🎁 Pack '{}' criado por {} ({} itens)", pack.name, actor.login, codes.len());

        let stock: Vec<Decimal> = members.iter().map(|m| m.current_qty).collect();
        Ok(PackGroupView::new(pack, &stock))
    }

    /// Packs com o estoque somado dos membros e o alerta de mínimo.
    pub async fn list_packs(&self) -> Result<Vec<PackGroupView>, AppError> {
        let packs = self.pack_repo.list_packs(self.pack_repo.pool()).await?;

        let mut codes: Vec<String> = packs.iter().flat_map(|p| p.item_codes.clone()).collect();
        codes.sort();
        codes.dedup();

        let stock: HashMap<String, Decimal> = self
            .inventory_repo
            .find_by_codes(self.pack_repo.pool(), &codes)
            .await?
            .into_iter()
            .map(|i| (i.code, i.current_qty))
            .collect();

        Ok(packs
            .into_iter()
            .map(|pack| {
                let member_stock = member_stock(&pack, &stock);
                PackGroupView::new(pack, &member_stock)
            })
            .collect())
    }

    pub async fn delete_pack(&self, actor: &User, id: Uuid) -> Result<(), AppError> {
        self.pack_repo.delete_pack(self.pack_repo.pool(), id).await?;
        tracing::info!("🗑️ Pack {} excluído por {}", id, actor.login);
        Ok(())
    }
}

// Membro sem cadastro conta como zero
fn member_stock(pack: &StockPackGroup, stock: &HashMap<String, Decimal>) -> Vec<Decimal> {
    pack.item_codes
        .iter()
        .map(|code| stock.get(code).copied().unwrap_or(Decimal::ZERO))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_members_count_as_zero() {
        let pack = StockPackGroup {
            id: Uuid::new_v4(),
            name: "Kit".into(),
            barcode: "789".into(),
            item_codes: vec!["A".into(), "B".into()],
            min_pack_qty: dec!(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let stock = HashMap::from([("A".to_string(), dec!(3))]);

        assert_eq!(member_stock(&pack, &stock), vec![dec!(3), Decimal::ZERO]);
    }

    #[test]
    fn pack_barcode_cannot_reuse_a_product_barcode() {
        use crate::models::inventory::{ItemDetails, StockUnit};

        let vaso = StockItem {
            id: Uuid::new_v4(),
            code: "VASO".into(),
            name: "Vaso".into(),
            unit: StockUnit::Un,
            current_qty: dec!(1),
            min_qty: Decimal::ZERO,
            substitute_product_code: None,
            details: ItemDetails::Produto {
                product_type: None,
                color: None,
                barcode: Some("789".into()),
                expedition_items: Vec::new(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(matches!(
            ensure_barcode_unclaimed("789", Some(&vaso), None),
            Err(AppError::BarcodeAlreadyExists(code)) if code == "789"
        ));
        assert!(ensure_barcode_unclaimed("555", None, None).is_ok());
    }
}
