// src/services/bom_service.rs

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    db::{BomRepository, InventoryRepository},
    models::{
        auth::User,
        bom::{Bom, BomLine, BomSummary},
        inventory::StockItem,
    },
};

/// Regras da ficha técnica, checadas antes de qualquer escrita.
///
/// `catalog` deve conter os itens já carregados para todas as entradas e substitutos.
pub fn validate_bom(output: &StockItem, lines: &[BomLine], catalog: &[StockItem]) -> Result<(), AppError> {
    if !output.kind().can_have_bom() {
        return Err(AppError::InvalidBomOutput(output.code.clone()));
    }
    // Ficha vazia se remove com delete_bom
    if lines.is_empty() {
        return Err(AppError::EmptyBom(output.code.clone()));
    }

    let by_code: HashMap<&str, &StockItem> = catalog.iter().map(|i| (i.code.as_str(), i)).collect();
    let mut seen = HashSet::new();
    let mut primary_count = 0;

    for line in lines {
        let code = line.stock_item_code.as_str();

        if !seen.insert(code) {
            return Err(AppError::DuplicateBomLine(code.to_string()));
        }
        if line.qty_per_pack < Decimal::ZERO {
            return Err(AppError::NegativeQtyPerPack(code.to_string()));
        }
        if line.from_weighing {
            primary_count += 1;
            if primary_count > 1 {
                return Err(AppError::MultiplePrimaryLines);
            }
        }

        let input = by_code
            .get(code)
            .ok_or_else(|| AppError::StockItemNotFound(code.to_string()))?;

        // O produto não pode consumir a si mesmo
        if code == output.code || !input.kind().can_be_input() {
            return Err(AppError::IncompatibleInput(code.to_string()));
        }

        if let Some(substitute_code) = line.substitute_code.as_deref() {
            let substitute = by_code
                .get(substitute_code)
                .ok_or_else(|| AppError::StockItemNotFound(substitute_code.to_string()))?;

            if substitute_code == code || substitute.kind() != input.kind() {
                return Err(AppError::InvalidSubstitute {
                    input: code.to_string(),
                    substitute: substitute_code.to_string(),
                });
            }
        }
    }

    Ok(())
}

#[derive(Clone)]
pub struct BomService {
    bom_repo: BomRepository,
    inventory_repo: InventoryRepository,
}

impl BomService {
    pub fn new(bom_repo: BomRepository, inventory_repo: InventoryRepository) -> Self {
        Self { bom_repo, inventory_repo }
    }

    /// Substitui a ficha inteira (apaga e reinsere as linhas) numa transação.
    pub async fn save_bom(
        &self,
        actor: &User,
        product_code: &str,
        mut lines: Vec<BomLine>,
    ) -> Result<Bom, AppError> {
        let mut tx = self.bom_repo.pool().begin().await?;

        // Trava o produto: duas gravações da mesma ficha não se intercalam
        let output = self
            .inventory_repo
            .lock_by_codes(&mut *tx, &[product_code.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::StockItemNotFound(product_code.to_string()))?;

        let referenced: Vec<String> = lines
            .iter()
            .flat_map(|l| std::iter::once(l.stock_item_code.clone()).chain(l.substitute_code.clone()))
            .collect();
        let catalog = self.inventory_repo.find_by_codes(&mut *tx, &referenced).await?;

        validate_bom(&output, &lines, &catalog)?;

        for (position, line) in lines.iter_mut().enumerate() {
            line.position = i32::try_from(position).unwrap_or(i32::MAX);
        }

        self.bom_repo.replace_lines(&mut *tx, product_code, &lines).await?;
        let saved = self
            .bom_repo
            .find_bom(&mut *tx, product_code)
            .await?
            .ok_or_else(|| AppError::BomNotFound(product_code.to_string()))?;

        tx.commit().await?;

        tracing::info!(
            "📋 Ficha técnica de {} salva por {} ({} linhas)",
            product_code,
            actor.login,
            saved.lines.len()
        );

        Ok(saved)
    }

    pub async fn get_bom(&self, product_code: &str) -> Result<Bom, AppError> {
        let mut conn = self.bom_repo.pool().acquire().await?;
        self.bom_repo
            .find_bom(&mut *conn, product_code)
            .await?
            .ok_or_else(|| AppError::BomNotFound(product_code.to_string()))
    }

    pub async fn list_boms(&self) -> Result<Vec<BomSummary>, AppError> {
        self.bom_repo.list_boms(self.bom_repo.pool()).await
    }

    /// Marca a linha que sai da pesagem. `None` desmarca todas.
    pub async fn set_primary_line(
        &self,
        product_code: &str,
        stock_item_code: Option<&str>,
    ) -> Result<Bom, AppError> {
        let mut tx = self.bom_repo.pool().begin().await?;

        let mut bom = self
            .bom_repo
            .find_bom(&mut *tx, product_code)
            .await?
            .ok_or_else(|| AppError::BomNotFound(product_code.to_string()))?;

        if !bom.set_primary(stock_item_code) {
            return Err(AppError::BomLineNotFound(stock_item_code.unwrap_or_default().to_string()));
        }

        self.bom_repo.set_primary(&mut *tx, product_code, stock_item_code).await?;
        tx.commit().await?;

        Ok(bom)
    }

    pub async fn delete_bom(&self, actor: &User, product_code: &str) -> Result<(), AppError> {
        let removed = self.bom_repo.delete_bom(self.bom_repo.pool(), product_code).await?;
        if removed == 0 {
            return Err(AppError::BomNotFound(product_code.to_string()));
        }

        tracing::info!("🗑️ Ficha técnica de {} excluída por {}", product_code, actor.login);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::{ItemDetails, StockUnit};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(code: &str, details: ItemDetails) -> StockItem {
        StockItem {
            id: Uuid::new_v4(),
            code: code.into(),
            name: code.into(),
            unit: StockUnit::Un,
            current_qty: Decimal::ZERO,
            min_qty: Decimal::ZERO,
            substitute_product_code: None,
            details,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn insumo(code: &str) -> StockItem {
        item(code, ItemDetails::Insumo { category: None })
    }

    fn processado(code: &str) -> StockItem {
        item(code, ItemDetails::Processado { category: None, color: None })
    }

    fn produto(code: &str) -> StockItem {
        item(
            code,
            ItemDetails::Produto { product_type: None, color: None, barcode: None, expedition_items: vec![] },
        )
    }

    fn line(code: &str, qty: Decimal, primary: bool, substitute: Option<&str>) -> BomLine {
        BomLine {
            stock_item_code: code.into(),
            qty_per_pack: qty,
            from_weighing: primary,
            substitute_code: substitute.map(Into::into),
            position: 0,
        }
    }

    fn catalog() -> Vec<StockItem> {
        vec![insumo("X"), insumo("X2"), processado("MASSA"), produto("OUTRO")]
    }

    #[test]
    fn accepts_a_well_formed_bom() {
        let lines = vec![line("X", dec!(0.5), true, Some("X2")), line("MASSA", dec!(2), false, None)];
        assert!(validate_bom(&produto("PROD-A"), &lines, &catalog()).is_ok());
    }

    #[test]
    fn insumo_cannot_have_a_bom() {
        let result = validate_bom(&insumo("X"), &[], &catalog());
        assert!(matches!(result, Err(AppError::InvalidBomOutput(code)) if code == "X"));
    }

    #[test]
    fn rejects_an_empty_line_list() {
        assert!(matches!(
            validate_bom(&produto("PROD-A"), &[], &catalog()),
            Err(AppError::EmptyBom(code)) if code == "PROD-A"
        ));
    }

    #[test]
    fn rejects_duplicate_lines() {
        let lines = vec![line("X", dec!(1), false, None), line("X", dec!(2), false, None)];
        assert!(matches!(
            validate_bom(&produto("PROD-A"), &lines, &catalog()),
            Err(AppError::DuplicateBomLine(code)) if code == "X"
        ));
    }

    #[test]
    fn rejects_negative_quantity_but_accepts_zero() {
        let negative = vec![line("X", dec!(-1), false, None)];
        assert!(matches!(
            validate_bom(&produto("PROD-A"), &negative, &catalog()),
            Err(AppError::NegativeQtyPerPack(_))
        ));

        let zero = vec![line("X", dec!(0), false, None)];
        assert!(validate_bom(&produto("PROD-A"), &zero, &catalog()).is_ok());
    }

    #[test]
    fn rejects_two_primary_lines() {
        let lines = vec![line("X", dec!(1), true, None), line("MASSA", dec!(1), true, None)];
        assert!(matches!(
            validate_bom(&produto("PROD-A"), &lines, &catalog()),
            Err(AppError::MultiplePrimaryLines)
        ));
    }

    #[test]
    fn rejects_products_and_self_reference_as_inputs() {
        let product_input = vec![line("OUTRO", dec!(1), false, None)];
        assert!(matches!(
            validate_bom(&produto("PROD-A"), &product_input, &catalog()),
            Err(AppError::IncompatibleInput(code)) if code == "OUTRO"
        ));

        let mut items = catalog();
        items.push(processado("MASSA-2"));
        let self_input = vec![line("MASSA-2", dec!(1), false, None)];
        assert!(matches!(
            validate_bom(&processado("MASSA-2"), &self_input, &items),
            Err(AppError::IncompatibleInput(_))
        ));
    }

    #[test]
    fn rejects_unknown_inputs() {
        let lines = vec![line("NAO-EXISTE", dec!(1), false, None)];
        assert!(matches!(
            validate_bom(&produto("PROD-A"), &lines, &catalog()),
            Err(AppError::StockItemNotFound(code)) if code == "NAO-EXISTE"
        ));
    }

    #[test]
    fn substitute_must_share_the_input_kind() {
        let lines = vec![line("X", dec!(1), false, Some("MASSA"))];
        assert!(matches!(
            validate_bom(&produto("PROD-A"), &lines, &catalog()),
            Err(AppError::InvalidSubstitute { .. })
        ));

        let itself = vec![line("X", dec!(1), false, Some("X"))];
        assert!(matches!(
            validate_bom(&produto("PROD-A"), &itself, &catalog()),
            Err(AppError::InvalidSubstitute { .. })
        ));
    }
}
