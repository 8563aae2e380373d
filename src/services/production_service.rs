// src/services/production_service.rs

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgConnection;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{error::AppError, validation::scaled},
    db::{BatchRepository, BomRepository, InventoryRepository, SettingsRepository},
    models::{
        auth::User,
        batch::Batch,
        bom::{Bom, BomLine},
        inventory::{MovementOrigin, NewMovement, StockItem, StockMovement},
        settings::ShortfallPolicy,
    },
    services::batch_service::{BatchService, PoolDraw, consume_fifo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionSource {
    // Saiu dos lotes de pesagem/moagem
    Pool,
    // Saiu do saldo do item
    Raw,
}

// Uma linha de débito do plano
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlannedConsumption {
    pub stock_item_code: String,
    #[schema(value_type = f64)]
    pub qty: Decimal,
    pub source: ConsumptionSource,
    // Preenchido quando o débito caiu no substituto de outra linha
    pub substitute_for: Option<String>,
    // Preenchido quando o débito saiu de um único lote
    pub batch_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShortfallWarning {
    pub stock_item_code: String,
    pub source: ConsumptionSource,
    #[schema(value_type = f64)]
    pub required: Decimal,
    #[schema(value_type = f64)]
    pub missing: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductionPlan {
    pub output_code: String,
    #[schema(value_type = f64)]
    pub quantity: Decimal,
    pub consumptions: Vec<PlannedConsumption>,
    pub batch_draws: Vec<PoolDraw>,
    pub warnings: Vec<ShortfallWarning>,
}

impl ProductionPlan {
    /// Linhas do livro-razão: a entrada do produto primeiro, depois os débitos.
    pub fn movements(&self) -> Vec<NewMovement> {
        let output = NewMovement {
            stock_item_code: self.output_code.clone(),
            qty_delta: self.quantity,
            batch_id: None,
            notes: None,
        };

        std::iter::once(output)
            .chain(self.consumptions.iter().map(|c| NewMovement {
                stock_item_code: c.stock_item_code.clone(),
                qty_delta: -c.qty,
                batch_id: c.batch_id,
                notes: consumption_note(c),
            }))
            .collect()
    }

    /// Prepara a gravação sob um 'group_id' novo. O 'ref' é só rótulo: duas
    /// produções com o mesmo 'ref' continuam sendo grupos distintos.
    pub fn posting(&self, reference: &str, origin: MovementOrigin) -> PlannedPosting {
        PlannedPosting {
            group_id: Uuid::new_v4(),
            r#ref: reference.to_string(),
            origin,
            movements: self.movements(),
        }
    }

    /// Aplica a política de falta. STRICT recusa o plano inteiro no primeiro aviso.
    pub fn enforce(&self, policy: ShortfallPolicy) -> Result<(), AppError> {
        match (policy, self.warnings.first()) {
            (ShortfallPolicy::Strict, Some(warning)) => Err(AppError::InsufficientStock {
                code: warning.stock_item_code.clone(),
                missing: warning.missing,
            }),
            _ => Ok(()),
        }
    }
}

// Linhas prontas para o livro-razão, todas no mesmo grupo
#[derive(Debug, Clone)]
pub struct PlannedPosting {
    pub group_id: Uuid,
    pub r#ref: String,
    pub origin: MovementOrigin,
    pub movements: Vec<NewMovement>,
}

fn consumption_note(consumption: &PlannedConsumption) -> Option<String> {
    match (&consumption.substitute_for, consumption.source) {
        (Some(original), ConsumptionSource::Pool) => Some(format!("Pesagem (substituto de {original})")),
        (Some(original), ConsumptionSource::Raw) => Some(format!("Substituto de {original}")),
        (None, ConsumptionSource::Pool) => Some("Pesagem".to_string()),
        (None, ConsumptionSource::Raw) => None,
    }
}

/// Saldos, substitutos e lotes abertos vistos pelo planejamento.
///
/// Os débitos planejados são descontados aqui mesmo, então duas linhas que
/// tocam o mesmo estoque nunca contam o mesmo saldo duas vezes.
#[derive(Debug, Clone, Default)]
pub struct StockSnapshot {
    balances: HashMap<String, Decimal>,
    substitutes: HashMap<String, String>,
    batches: Vec<Batch>,
}

impl StockSnapshot {
    // `batches` devem vir em ordem FIFO
    pub fn new(items: &[StockItem], batches: Vec<Batch>) -> Self {
        Self {
            balances: items.iter().map(|i| (i.code.clone(), i.current_qty)).collect(),
            substitutes: items
                .iter()
                .filter_map(|i| {
                    i.substitute_product_code
                        .clone()
                        .filter(|s| *s != i.code)
                        .map(|s| (i.code.clone(), s))
                })
                .collect(),
            batches,
        }
    }

    pub fn available(&self, code: &str) -> Decimal {
        self.balances
            .get(code)
            .copied()
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO)
    }

    fn debit(&mut self, code: &str, qty: Decimal) {
        *self.balances.entry(code.to_string()).or_insert(Decimal::ZERO) -= qty;
    }

    /// Substituto da linha; se a linha não define, o do próprio item.
    fn substitute_for(&self, line: &BomLine) -> Option<String> {
        line.substitute_code
            .clone()
            .or_else(|| self.substitutes.get(&line.stock_item_code).cloned())
            .filter(|s| *s != line.stock_item_code)
    }

    /// Códigos cujos lotes interessam à ficha (linha primária e seu substituto).
    pub fn pool_codes(bom: &Bom, items: &[StockItem]) -> Vec<String> {
        let Some(primary) = bom.primary_line() else {
            return Vec::new();
        };

        let item_substitute = items
            .iter()
            .find(|i| i.code == primary.stock_item_code)
            .and_then(|i| i.substitute_product_code.clone());

        let mut codes = vec![primary.stock_item_code.clone()];
        codes.extend(primary.substitute_code.clone().or(item_substitute));
        codes.sort();
        codes.dedup();
        codes
    }
}

struct Planner<'a> {
    snapshot: &'a mut StockSnapshot,
    consumptions: Vec<PlannedConsumption>,
    batch_draws: Vec<PoolDraw>,
    warnings: Vec<ShortfallWarning>,
}

impl Planner<'_> {
    fn push(
        &mut self,
        code: &str,
        qty: Decimal,
        source: ConsumptionSource,
        substitute_for: Option<&str>,
        batch_id: Option<Uuid>,
    ) {
        if qty <= Decimal::ZERO {
            return;
        }
        self.snapshot.debit(code, qty);
        self.consumptions.push(PlannedConsumption {
            stock_item_code: code.to_string(),
            qty,
            source,
            substitute_for: substitute_for.map(str::to_string),
            batch_id,
        });
    }

    // Retira do pool do item e devolve quanto faltou
    fn draw_pool(&mut self, code: &str, amount: Decimal, substitute_for: Option<&str>) -> Decimal {
        let consumption = consume_fifo(&mut self.snapshot.batches, code, amount);
        let single_batch = match consumption.draws.as_slice() {
            [only] => Some(only.batch_id),
            _ => None,
        };

        self.push(code, consumption.drawn, ConsumptionSource::Pool, substitute_for, single_batch);
        self.batch_draws.extend(consumption.draws);
        consumption.shortfall
    }

    fn plan_pool_line(&mut self, line: &BomLine, required: Decimal) {
        let input = line.stock_item_code.as_str();
        let mut remaining = self.draw_pool(input, required, None);

        if remaining > Decimal::ZERO {
            if let Some(substitute) = self.snapshot.substitute_for(line) {
                remaining = self.draw_pool(&substitute, remaining, Some(input));
            }
        }

        // O que o pool não cobriu sai do saldo do próprio item
        if remaining > Decimal::ZERO {
            self.push(input, remaining, ConsumptionSource::Raw, None, None);
            self.warnings.push(ShortfallWarning {
                stock_item_code: input.to_string(),
                source: ConsumptionSource::Pool,
                required,
                missing: remaining,
            });
        }
    }

    fn plan_raw_line(&mut self, line: &BomLine, required: Decimal) {
        let input = line.stock_item_code.as_str();
        let available = self.snapshot.available(input);

        if available >= required {
            self.push(input, required, ConsumptionSource::Raw, None, None);
            return;
        }

        if let Some(substitute) = self.snapshot.substitute_for(line) {
            let substitute_available = self.snapshot.available(&substitute);
            if available + substitute_available >= required {
                self.push(input, available, ConsumptionSource::Raw, None, None);
                self.push(&substitute, required - available, ConsumptionSource::Raw, Some(input), None);
                return;
            }
        }

        // Sem cobertura: debita tudo do item (pode ficar negativo) e avisa
        self.push(input, required, ConsumptionSource::Raw, None, None);
        self.warnings.push(ShortfallWarning {
            stock_item_code: input.to_string(),
            source: ConsumptionSource::Raw,
            required,
            missing: required - available,
        });
    }
}

/// Planeja a produção de `quantity` unidades sem tocar no banco.
pub fn plan_production(
    bom: &Bom,
    quantity: Decimal,
    snapshot: &mut StockSnapshot,
) -> Result<ProductionPlan, AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::NonPositiveQuantity);
    }

    let mut planner = Planner {
        snapshot,
        consumptions: Vec::new(),
        batch_draws: Vec::new(),
        warnings: Vec::new(),
    };

    for line in &bom.lines {
        let required = scaled(line.qty_per_pack, quantity)?;
        if required <= Decimal::ZERO {
            continue;
        }

        if line.from_weighing {
            planner.plan_pool_line(line, required);
        } else {
            planner.plan_raw_line(line, required);
        }
    }

    Ok(ProductionPlan {
        output_code: bom.product_code.clone(),
        quantity,
        consumptions: planner.consumptions,
        batch_draws: planner.batch_draws,
        warnings: planner.warnings,
    })
}

// Resultado de uma produção gravada
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductionResult {
    pub group_id: Uuid,
    #[serde(rename = "ref")]
    pub r#ref: String,
    pub origin: MovementOrigin,
    pub movements: Vec<StockMovement>,
    pub batch_draws: Vec<PoolDraw>,
    pub warnings: Vec<ShortfallWarning>,
}

#[derive(Clone)]
pub struct ProductionService {
    bom_repo: BomRepository,
    inventory_repo: InventoryRepository,
    batch_repo: BatchRepository,
    settings_repo: SettingsRepository,
    batch_service: BatchService,
}

impl ProductionService {
    pub fn new(
        bom_repo: BomRepository,
        inventory_repo: InventoryRepository,
        batch_repo: BatchRepository,
        settings_repo: SettingsRepository,
        batch_service: BatchService,
    ) -> Self {
        Self { bom_repo, inventory_repo, batch_repo, settings_repo, batch_service }
    }

    /// Carrega ficha, itens e lotes. Com `lock`, trava tudo até o fim da transação.
    async fn load(
        &self,
        conn: &mut PgConnection,
        output_code: &str,
        lock: bool,
    ) -> Result<(Bom, StockSnapshot), AppError> {
        let bom = self
            .bom_repo
            .find_bom(&mut *conn, output_code)
            .await?
            .ok_or_else(|| AppError::BomNotFound(output_code.to_string()))?;

        // Os substitutos cadastrados no item só são conhecidos depois de ler as entradas
        let mut codes = bom.referenced_codes();
        let inputs = self.inventory_repo.find_by_codes(&mut *conn, &codes).await?;
        codes.extend(inputs.iter().filter_map(|i| i.substitute_product_code.clone()));
        codes.push(output_code.to_string());
        codes.sort();
        codes.dedup();

        let items = if lock {
            self.inventory_repo.lock_by_codes(&mut *conn, &codes).await?
        } else {
            self.inventory_repo.find_by_codes(&mut *conn, &codes).await?
        };

        if !items.iter().any(|i| i.code == output_code) {
            return Err(AppError::StockItemNotFound(output_code.to_string()));
        }

        let pool_codes = StockSnapshot::pool_codes(&bom, &items);
        let batches = if pool_codes.is_empty() {
            Vec::new()
        } else if lock {
            self.batch_repo.lock_open_batches(&mut *conn, &pool_codes).await?
        } else {
            self.batch_repo.open_batches(&mut *conn, &pool_codes).await?
        };

        Ok((bom, StockSnapshot::new(&items, batches)))
    }

    /// Mostra o que a produção faria, sem gravar nada.
    pub async fn preview_production(
        &self,
        output_code: &str,
        quantity: Decimal,
    ) -> Result<ProductionPlan, AppError> {
        if quantity <= Decimal::ZERO {
            return Err(AppError::NonPositiveQuantity);
        }

        let mut conn = self.bom_repo.pool().acquire().await?;
        let (bom, mut snapshot) = self.load(&mut *conn, output_code, false).await?;

        plan_production(&bom, quantity, &mut snapshot)
    }

    /// Executa a produção numa única transação: entrada do produto, débitos e
    /// baixa dos lotes são gravados juntos ou nada é gravado.
    pub async fn run_production(
        &self,
        actor: &User,
        output_code: &str,
        quantity: Decimal,
        reference: &str,
        origin: Option<MovementOrigin>,
    ) -> Result<ProductionResult, AppError> {
        if quantity <= Decimal::ZERO {
            return Err(AppError::NonPositiveQuantity);
        }

        let settings = self.settings_repo.get_settings(self.bom_repo.pool()).await?;
        let origin = origin.unwrap_or(settings.default_production_origin);
        if !origin.is_production() {
            return Err(AppError::OriginNotAllowed(format!("{origin:?}")));
        }

        let mut tx = self.bom_repo.pool().begin().await?;

        // 1. Trava itens e lotes e planeja
        let (bom, mut snapshot) = self.load(&mut *tx, output_code, true).await?;
        let plan = plan_production(&bom, quantity, &mut snapshot)?;

        // 2. Política de falta (STRICT aborta antes de qualquer escrita)
        plan.enforce(settings.shortfall_policy)?;

        // 3. Livro-razão: todas as linhas no mesmo grupo
        let posting = plan.posting(reference, origin);
        let mut movements = Vec::with_capacity(posting.movements.len());
        for movement in &posting.movements {
            let posted = self
                .inventory_repo
                .post_movement(&mut *tx, movement, posting.origin, &posting.r#ref, posting.group_id, Some(actor.id))
                .await?;
            movements.push(posted);
        }

        // 4. Baixa nos lotes
        self.batch_service.apply_draws(&mut *tx, &plan.batch_draws).await?;

        tx.commit().await?;

        if plan.warnings.is_empty() {
            tracing::info!(
                "🏭 Produção '{}' gravada: {} x {} ({} linhas)",
                reference,
                quantity,
                output_code,
                movements.len()
            );
        } else {
            tracing::warn!(
                "🏭 Produção '{}' gravada com falta de estoque: {:?}",
                reference,
                plan.warnings
            );
        }

        Ok(ProductionResult {
            group_id: posting.group_id,
            r#ref: posting.r#ref,
            origin: posting.origin,
            movements,
            batch_draws: plan.batch_draws,
            warnings: plan.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        batch::{BatchKind, WeighingType},
        inventory::{ItemDetails, StockUnit},
    };
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn item(code: &str, qty: Decimal, substitute: Option<&str>) -> StockItem {
        StockItem {
            id: Uuid::new_v4(),
            code: code.into(),
            name: code.into(),
            unit: StockUnit::Kg,
            current_qty: qty,
            min_qty: Decimal::ZERO,
            substitute_product_code: substitute.map(Into::into),
            details: ItemDetails::Insumo { category: None },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn pool_batch(code: &str, initial: Decimal, minutes_ago: i64) -> Batch {
        let created = Utc::now() - Duration::minutes(minutes_ago);
        Batch {
            id: Uuid::new_v4(),
            item_code: code.into(),
            kind: BatchKind::Pesagem,
            weighing_type: WeighingType::Daily,
            initial_qty: initial,
            used_qty: Decimal::ZERO,
            notes: None,
            created_by: None,
            created_at: created,
            updated_at: created,
            deleted_at: None,
        }
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

    fn bom(lines: Vec<BomLine>) -> Bom {
        Bom { product_code: "PROD-A".into(), lines, updated_at: None }
    }

    fn deltas(plan: &ProductionPlan) -> Vec<(String, Decimal)> {
        plan.movements()
            .into_iter()
            .map(|m| (m.stock_item_code, m.qty_delta))
            .collect()
    }

    #[test]
    fn single_line_with_enough_stock_posts_two_rows() {
        let mut snapshot = StockSnapshot::new(&[item("PROD-A", dec!(0), None), item("X", dec!(100), None)], vec![]);
        let plan = plan_production(&bom(vec![line("X", dec!(1.5), false, None)]), dec!(4), &mut snapshot).unwrap();

        assert_eq!(
            deltas(&plan),
            vec![("PROD-A".to_string(), dec!(4)), ("X".to_string(), dec!(-6.0))]
        );
        assert!(plan.warnings.is_empty());
        assert!(plan.enforce(ShortfallPolicy::Strict).is_ok());
    }

    #[test]
    fn weighing_pool_shortfall_spills_into_raw_stock() {
        // Ficha PROD-A = [X 0.5 (pesagem), Y 2.0], 10 unidades, pool de X com 3 kg
        let mut snapshot = StockSnapshot::new(
            &[item("PROD-A", dec!(0), None), item("X", dec!(3), None), item("Y", dec!(50), None)],
            vec![pool_batch("X", dec!(3), 30)],
        );
        let recipe = bom(vec![line("X", dec!(0.5), true, None), line("Y", dec!(2.0), false, None)]);

        let plan = plan_production(&recipe, dec!(10), &mut snapshot).unwrap();

        assert_eq!(
            deltas(&plan),
            vec![
                ("PROD-A".to_string(), dec!(10)),
                ("X".to_string(), dec!(-3)),
                ("X".to_string(), dec!(-2.0)),
                ("Y".to_string(), dec!(-20.0)),
            ]
        );
        assert_eq!(plan.consumptions[0].source, ConsumptionSource::Pool);
        assert_eq!(plan.consumptions[1].source, ConsumptionSource::Raw);
        assert_eq!(plan.batch_draws.len(), 1);
        assert_eq!(plan.batch_draws[0].qty, dec!(3));
        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(plan.warnings[0].missing, dec!(2.0));
        assert!(plan.enforce(ShortfallPolicy::Permissive).is_ok());
    }

    #[test]
    fn strict_policy_refuses_a_plan_with_shortfall() {
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(1), None)], vec![]);
        let plan = plan_production(&bom(vec![line("X", dec!(2), false, None)]), dec!(1), &mut snapshot).unwrap();

        match plan.enforce(ShortfallPolicy::Strict) {
            Err(AppError::InsufficientStock { code, missing }) => {
                assert_eq!(code, "X");
                assert_eq!(missing, dec!(1));
            }
            other => panic!("esperava InsufficientStock, veio {other:?}"),
        }
    }

    #[test]
    fn raw_shortfall_splits_between_input_and_substitute() {
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(4), None), item("Y", dec!(10), None)], vec![]);
        let plan = plan_production(&bom(vec![line("X", dec!(1), false, Some("Y"))]), dec!(7), &mut snapshot).unwrap();

        let debit_x: Decimal = plan.consumptions.iter().filter(|c| c.stock_item_code == "X").map(|c| c.qty).sum();
        let debit_y: Decimal = plan.consumptions.iter().filter(|c| c.stock_item_code == "Y").map(|c| c.qty).sum();

        assert_eq!(debit_x + debit_y, dec!(7));
        assert!(debit_x <= dec!(4));
        assert_eq!(debit_y, dec!(3));
        assert_eq!(plan.consumptions[1].substitute_for.as_deref(), Some("X"));
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn item_level_substitute_is_used_when_line_has_none() {
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(0), Some("Y")), item("Y", dec!(5), None)], vec![]);
        let plan = plan_production(&bom(vec![line("X", dec!(1), false, None)]), dec!(5), &mut snapshot).unwrap();

        assert_eq!(plan.consumptions.len(), 1);
        assert_eq!(plan.consumptions[0].stock_item_code, "Y");
        assert_eq!(plan.consumptions[0].qty, dec!(5));
    }

    #[test]
    fn insufficient_combined_stock_debits_everything_from_the_input() {
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(2), None), item("Y", dec!(1), None)], vec![]);
        let plan = plan_production(&bom(vec![line("X", dec!(1), false, Some("Y"))]), dec!(5), &mut snapshot).unwrap();

        assert_eq!(deltas(&plan)[1..], [("X".to_string(), dec!(-5))]);
        assert_eq!(plan.warnings[0].missing, dec!(3));
    }

    #[test]
    fn pool_shortfall_is_covered_by_the_substitute_pool() {
        let mut snapshot = StockSnapshot::new(
            &[item("X", dec!(2), None), item("Z", dec!(10), None)],
            vec![pool_batch("X", dec!(2), 50), pool_batch("Z", dec!(10), 40)],
        );
        let plan = plan_production(&bom(vec![line("X", dec!(1), true, Some("Z"))]), dec!(5), &mut snapshot).unwrap();

        assert_eq!(plan.consumptions.len(), 2);
        assert_eq!(plan.consumptions[1].stock_item_code, "Z");
        assert_eq!(plan.consumptions[1].qty, dec!(3));
        assert_eq!(plan.consumptions[1].source, ConsumptionSource::Pool);
        assert!(plan.warnings.is_empty());
        let drawn: Decimal = plan.batch_draws.iter().map(|d| d.qty).sum();
        assert_eq!(drawn, dec!(5));
    }

    #[test]
    fn two_lines_on_the_same_stock_do_not_double_count() {
        // Y é entrada de uma linha e substituto da outra
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(0), None), item("Y", dec!(6), None)], vec![]);
        let recipe = bom(vec![line("Y", dec!(4), false, None), line("X", dec!(4), false, Some("Y"))]);

        let plan = plan_production(&recipe, dec!(1), &mut snapshot).unwrap();

        // Y já foi usado pela primeira linha: sobram 2, insuficiente para a segunda
        assert_eq!(deltas(&plan)[1..], [("Y".to_string(), dec!(-4)), ("X".to_string(), dec!(-4))]);
        assert_eq!(plan.warnings.len(), 1);
        assert_eq!(plan.warnings[0].stock_item_code, "X");
    }

    #[test]
    fn fifo_draw_spans_batches_oldest_first() {
        let older = pool_batch("X", dec!(1), 90);
        let newer = pool_batch("X", dec!(5), 10);
        let older_id = older.id;
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(6), None)], vec![older, newer]);

        let plan = plan_production(&bom(vec![line("X", dec!(3), true, None)]), dec!(1), &mut snapshot).unwrap();

        assert_eq!(plan.batch_draws[0].batch_id, older_id);
        assert_eq!(plan.batch_draws[0].qty, dec!(1));
        assert_eq!(plan.batch_draws[1].qty, dec!(2));
        // Mais de um lote: a linha do livro-razão não aponta para nenhum
        assert_eq!(plan.consumptions[0].batch_id, None);
    }

    #[test]
    fn zero_quantity_lines_are_skipped_and_zero_runs_rejected() {
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(1), None)], vec![]);
        let recipe = bom(vec![line("X", dec!(0), false, None)]);

        let plan = plan_production(&recipe, dec!(3), &mut snapshot).unwrap();
        assert_eq!(plan.movements().len(), 1);

        assert!(matches!(
            plan_production(&recipe, dec!(0), &mut snapshot),
            Err(AppError::NonPositiveQuantity)
        ));
    }

    #[test]
    fn repeated_reference_still_gets_a_fresh_group() {
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(10), None)], vec![]);
        let recipe = bom(vec![line("X", dec!(1), false, None)]);
        let plan = plan_production(&recipe, dec!(2), &mut snapshot).unwrap();

        let first = plan.posting("OP-7", MovementOrigin::ProducaoManual);
        let second = plan.posting("OP-7", MovementOrigin::ProducaoManual);

        assert_ne!(first.group_id, second.group_id);
        assert_eq!(first.r#ref, second.r#ref);
        assert_eq!(first.movements.len(), 2);
        assert_eq!(first.movements[0].qty_delta, dec!(2));
    }

    #[test]
    fn oversized_runs_fail_validation_instead_of_overflowing() {
        let mut snapshot = StockSnapshot::new(&[item("X", dec!(1), None)], vec![]);
        let recipe = bom(vec![line("X", dec!(1000000000), false, None)]);
        let quantity: Decimal = serde_json::from_str("1e20").unwrap();

        assert!(matches!(
            plan_production(&recipe, quantity, &mut snapshot),
            Err(AppError::QuantityOutOfRange)
        ));
    }

    #[test]
    fn pool_codes_include_the_item_level_substitute() {
        let recipe = bom(vec![line("X", dec!(1), true, None), line("Y", dec!(1), false, None)]);
        let items = vec![item("X", dec!(0), Some("W"))];

        assert_eq!(StockSnapshot::pool_codes(&recipe, &items), vec!["W".to_string(), "X".to_string()]);
        assert!(StockSnapshot::pool_codes(&bom(vec![line("Y", dec!(1), false, None)]), &items).is_empty());
    }
}
