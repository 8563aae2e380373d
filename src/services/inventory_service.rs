// src/services/inventory_service.rs

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{error::AppError, validation::MAX_QUANTITY},
    db::{inventory_repo::ItemDescriptor, InventoryRepository, PackRepository},
    models::{
        auth::User,
        inventory::{
            group_movements, GroupedTransaction, ItemKind, LedgerDrift, MovementOrigin, NewMovement,
            StockItem, StockMovement,
        },
    },
    services::{auth::AuthService, pack_service::ensure_barcode_unclaimed},
};

/// Regras do cadastro: substituto do mesmo tipo e acessórios de expedição válidos.
pub fn validate_item(
    code: &str,
    descriptor: &ItemDescriptor<'_>,
    substitute: Option<&StockItem>,
    expedition_catalog: &[StockItem],
) -> Result<(), AppError> {
    if let Some(substitute_code) = descriptor.substitute_product_code {
        let valid = substitute_code != code
            && substitute.is_some_and(|s| s.code == substitute_code && s.kind() == descriptor.details.kind());

        if !valid {
            return Err(AppError::InvalidSubstitute {
                input: code.to_string(),
                substitute: substitute_code.to_string(),
            });
        }
    }

    for accessory in descriptor.details.expedition_items() {
        if accessory.qty <= Decimal::ZERO {
            return Err(AppError::NonPositiveQuantity);
        }
        if accessory.qty > MAX_QUANTITY {
            return Err(AppError::QuantityOutOfRange);
        }
        if accessory.code == code || !expedition_catalog.iter().any(|i| i.code == accessory.code) {
            return Err(AppError::IncompatibleInput(accessory.code.clone()));
        }
    }

    Ok(())
}

/// Origens aceitas num ajuste avulso e se exigem confirmação de administrador.
pub fn adjustment_requires_admin(origin: MovementOrigin, delta: Decimal) -> Result<bool, AppError> {
    if delta == Decimal::ZERO {
        return Err(AppError::ZeroDelta);
    }
    if !origin.is_adjustment() {
        return Err(AppError::OriginNotAllowed(format!("{origin:?}")));
    }
    Ok(origin == MovementOrigin::AjusteManual)
}

#[derive(Clone)]
pub struct InventoryService {
    inventory_repo: InventoryRepository,
    pack_repo: PackRepository,
    auth_service: AuthService,
}

impl InventoryService {
    pub fn new(inventory_repo: InventoryRepository, pack_repo: PackRepository, auth_service: AuthService) -> Self {
        Self { inventory_repo, pack_repo, auth_service }
    }

    async fn check_descriptor(&self, code: &str, descriptor: &ItemDescriptor<'_>) -> Result<(), AppError> {
        let substitute = match descriptor.substitute_product_code {
            Some(substitute_code) => {
                self.inventory_repo
                    .find_by_code(self.inventory_repo.pool(), substitute_code)
                    .await?
            }
            None => None,
        };

        let accessory_codes: Vec<String> = descriptor
            .details
            .expedition_items()
            .iter()
            .map(|e| e.code.clone())
            .collect();
        let catalog = if accessory_codes.is_empty() {
            Vec::new()
        } else {
            self.inventory_repo
                .find_by_codes(self.inventory_repo.pool(), &accessory_codes)
                .await?
        };

        validate_item(code, descriptor, substitute.as_ref(), &catalog)?;

        // Código de barras de produto não pode esconder um pack na bipagem
        if let Some(barcode) = descriptor.details.barcode() {
            let pack = self
                .pack_repo
                .find_by_barcode(self.inventory_repo.pool(), barcode)
                .await?;
            ensure_barcode_unclaimed(barcode, None, pack.as_ref())?;
        }

        Ok(())
    }

    /// Cadastra o item. O saldo inicial entra como AJUSTE_MANUAL no livro-razão.
    pub async fn create_item(
        &self,
        actor: &User,
        code: &str,
        descriptor: &ItemDescriptor<'_>,
        min_qty: Decimal,
        initial_qty: Decimal,
    ) -> Result<StockItem, AppError> {
        self.check_descriptor(code, descriptor).await?;

        let mut tx = self.inventory_repo.pool().begin().await?;

        let mut item = self
            .inventory_repo
            .create_item(&mut *tx, code, descriptor, min_qty)
            .await?;

        if initial_qty != Decimal::ZERO {
            self.inventory_repo
                .post_movement(
                    &mut *tx,
                    &NewMovement {
                        stock_item_code: item.code.clone(),
                        qty_delta: initial_qty,
                        batch_id: None,
                        notes: Some("Saldo inicial".to_string()),
                    },
                    MovementOrigin::AjusteManual,
                    "ESTOQUE INICIAL",
                    Uuid::new_v4(),
                    Some(actor.id),
                )
                .await?;
            item.current_qty = initial_qty;
        }

        tx.commit().await?;

        tracing::info!("📦 Item {} ({:?}) criado por {}", item.code, item.kind(), actor.login);
        Ok(item)
    }

    pub async fn get_item(&self, code: &str) -> Result<StockItem, AppError> {
        self.inventory_repo
            .get_by_code(self.inventory_repo.pool(), code)
            .await
    }

    pub async fn list_items(
        &self,
        kind: Option<ItemKind>,
        below_minimum: bool,
    ) -> Result<Vec<StockItem>, AppError> {
        self.inventory_repo
            .list_items(self.inventory_repo.pool(), kind, below_minimum)
            .await
    }

    /// Edita só os campos descritivos. Saldo e mínimo têm caminhos próprios.
    pub async fn update_item(
        &self,
        code: &str,
        descriptor: &ItemDescriptor<'_>,
    ) -> Result<StockItem, AppError> {
        let current = self.get_item(code).await?;
        if current.kind() != descriptor.details.kind() {
            return Err(AppError::KindChangeNotAllowed(code.to_string()));
        }

        self.check_descriptor(code, descriptor).await?;

        self.inventory_repo
            .update_descriptor(self.inventory_repo.pool(), code, descriptor)
            .await
    }

    pub async fn delete_item(&self, actor: &User, code: &str) -> Result<(), AppError> {
        if self
            .inventory_repo
            .is_referenced(self.inventory_repo.pool(), code)
            .await?
        {
            return Err(AppError::ItemInUse(code.to_string()));
        }

        self.inventory_repo
            .delete_item(self.inventory_repo.pool(), code)
            .await?;

        tracing::warn!("🗑️ Item {} excluído por {}", code, actor.login);
        Ok(())
    }

    /// Ajuste avulso de saldo. AJUSTE_MANUAL exige ADMIN e a senha dele.
    pub async fn adjust_stock(
        &self,
        actor: &User,
        code: &str,
        delta: Decimal,
        origin: MovementOrigin,
        reason: &str,
        admin_password: Option<&str>,
    ) -> Result<StockMovement, AppError> {
        if adjustment_requires_admin(origin, delta)? {
            let password = admin_password.ok_or(AppError::AdminPasswordMismatch)?;
            self.auth_service.confirm_admin_password(actor, password).await?;
        }

        let mut tx = self.inventory_repo.pool().begin().await?;

        // Garante que o item existe e serializa com produções concorrentes
        self.inventory_repo
            .lock_by_codes(&mut *tx, &[code.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::StockItemNotFound(code.to_string()))?;

        let movement = self
            .inventory_repo
            .post_movement(
                &mut *tx,
                &NewMovement {
                    stock_item_code: code.to_string(),
                    qty_delta: delta,
                    batch_id: None,
                    notes: Some(reason.to_string()),
                },
                origin,
                reason,
                Uuid::new_v4(),
                Some(actor.id),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            "✏️ Ajuste {:?} de {} em {} por {} (grupo {})",
            origin,
            delta,
            code,
            actor.login,
            movement.group_id
        );
        Ok(movement)
    }

    /// Edição direta de saldo e mínimo (ADMIN + senha).
    ///
    /// O novo saldo vira uma linha AJUSTE_MANUAL com a diferença, então a soma
    /// do livro-razão continua batendo com o saldo em cache.
    pub async fn admin_edit_levels(
        &self,
        actor: &User,
        code: &str,
        current_qty: Option<Decimal>,
        min_qty: Option<Decimal>,
        admin_password: &str,
    ) -> Result<StockItem, AppError> {
        self.auth_service.confirm_admin_password(actor, admin_password).await?;

        let mut tx = self.inventory_repo.pool().begin().await?;

        let item = self
            .inventory_repo
            .lock_by_codes(&mut *tx, &[code.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::StockItemNotFound(code.to_string()))?;

        if let Some(target) = current_qty {
            let delta = target - item.current_qty;
            if delta != Decimal::ZERO {
                self.inventory_repo
                    .post_movement(
                        &mut *tx,
                        &NewMovement {
                            stock_item_code: code.to_string(),
                            qty_delta: delta,
                            batch_id: None,
                            notes: Some(format!("Saldo ajustado de {} para {}", item.current_qty, target)),
                        },
                        MovementOrigin::AjusteManual,
                        "EDICAO ADMIN",
                        Uuid::new_v4(),
                        Some(actor.id),
                    )
                    .await?;
            }
        }

        if let Some(min_qty) = min_qty {
            self.inventory_repo.set_min_qty(&mut *tx, code, min_qty).await?;
        }

        let updated = self.inventory_repo.get_by_code(&mut *tx, code).await?;
        tx.commit().await?;

        tracing::info!(
            "✏️ Níveis de {} editados por {}: saldo {}, mínimo {}",
            code,
            actor.login,
            updated.current_qty,
            updated.min_qty
        );
        Ok(updated)
    }

    pub async fn list_movements(&self, code: &str, limit: i64) -> Result<Vec<StockMovement>, AppError> {
        self.get_item(code).await?;
        self.inventory_repo
            .list_movements(self.inventory_repo.pool(), code, limit)
            .await
    }

    /// Produções e expedições recentes, uma entrada por grupo.
    pub async fn list_transactions(&self, limit: i64) -> Result<Vec<GroupedTransaction>, AppError> {
        let movements = self
            .inventory_repo
            .list_grouped_movements(self.inventory_repo.pool(), limit)
            .await?;

        Ok(group_movements(movements))
    }

    /// Apaga uma linha do livro-razão e desfaz o efeito dela no saldo (SUPER_ADMIN).
    pub async fn delete_movement(&self, actor: &User, id: Uuid) -> Result<StockMovement, AppError> {
        let mut tx = self.inventory_repo.pool().begin().await?;

        let movement = self.inventory_repo.lock_movement(&mut *tx, id).await?;
        self.inventory_repo.delete_movement(&mut *tx, &movement).await?;

        tx.commit().await?;

        tracing::warn!(
            "🗑️ Movimentação {} ({} {:?} {}) excluída por {}",
            movement.id,
            movement.stock_item_code,
            movement.origin,
            movement.qty_delta,
            actor.login
        );
        Ok(movement)
    }

    /// Recalcula o saldo a partir do livro-razão e corrige os itens divergentes.
    pub async fn reconcile(&self, actor: &User) -> Result<Vec<LedgerDrift>, AppError> {
        let mut tx = self.inventory_repo.pool().begin().await?;

        sqlx::query("LOCK TABLE stock_items IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let drift = self.inventory_repo.ledger_drift(&mut *tx).await?;
        for entry in &drift {
            self.inventory_repo
                .set_cached_qty(&mut *tx, &entry.code, entry.ledger_qty)
                .await?;
        }

        tx.commit().await?;

        if drift.is_empty() {
            tracing::info!("🧮 Conciliação feita por {}: nenhuma divergência", actor.login);
        } else {
            tracing::warn!(
                "🧮 Conciliação feita por {}: {} itens corrigidos",
                actor.login,
                drift.len()
            );
        }
        Ok(drift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::{ExpeditionItem, ItemDetails, StockUnit};
    use chrono::Utc;
    use rust_decimal_macros::dec;

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

    fn insumo_details() -> ItemDetails {
        ItemDetails::Insumo { category: Some("Resinas".into()) }
    }

    #[test]
    fn substitute_must_exist_and_share_kind() {
        let details = insumo_details();
        let descriptor = ItemDescriptor {
            name: "Resina",
            unit: StockUnit::Kg,
            substitute_product_code: Some("R2"),
            details: &details,
        };

        let same_kind = item("R2", insumo_details());
        assert!(validate_item("R1", &descriptor, Some(&same_kind), &[]).is_ok());

        let other_kind = item("R2", ItemDetails::Processado { category: None, color: None });
        assert!(matches!(
            validate_item("R1", &descriptor, Some(&other_kind), &[]),
            Err(AppError::InvalidSubstitute { .. })
        ));
        assert!(matches!(
            validate_item("R1", &descriptor, None, &[]),
            Err(AppError::InvalidSubstitute { .. })
        ));
    }

    #[test]
    fn item_cannot_substitute_itself() {
        let details = insumo_details();
        let descriptor = ItemDescriptor {
            name: "Resina",
            unit: StockUnit::Kg,
            substitute_product_code: Some("R1"),
            details: &details,
        };
        let same = item("R1", insumo_details());

        assert!(validate_item("R1", &descriptor, Some(&same), &[]).is_err());
    }

    #[test]
    fn expedition_items_must_exist_with_positive_quantity() {
        let details = ItemDetails::Produto {
            product_type: None,
            color: None,
            barcode: Some("789".into()),
            expedition_items: vec![ExpeditionItem { code: "CAIXA".into(), qty: dec!(1) }],
        };
        let descriptor = ItemDescriptor {
            name: "Vaso",
            unit: StockUnit::Un,
            substitute_product_code: None,
            details: &details,
        };

        let caixa = item("CAIXA", insumo_details());
        assert!(validate_item("VASO", &descriptor, None, &[caixa]).is_ok());
        assert!(matches!(
            validate_item("VASO", &descriptor, None, &[]),
            Err(AppError::IncompatibleInput(code)) if code == "CAIXA"
        ));
    }

    #[test]
    fn manual_adjustment_is_privileged() {
        assert!(adjustment_requires_admin(MovementOrigin::AjusteManual, dec!(5)).unwrap());
        assert!(!adjustment_requires_admin(MovementOrigin::Pesagem, dec!(-1)).unwrap());
        assert!(!adjustment_requires_admin(MovementOrigin::ImportXml, dec!(3)).unwrap());
    }

    #[test]
    fn adjustment_rejects_zero_and_grouped_origins() {
        assert!(matches!(
            adjustment_requires_admin(MovementOrigin::AjusteManual, Decimal::ZERO),
            Err(AppError::ZeroDelta)
        ));
        assert!(matches!(
            adjustment_requires_admin(MovementOrigin::ProducaoManual, dec!(1)),
            Err(AppError::OriginNotAllowed(_))
        ));
        assert!(matches!(
            adjustment_requires_admin(MovementOrigin::Bip, dec!(-1)),
            Err(AppError::OriginNotAllowed(_))
        ));
    }
}
