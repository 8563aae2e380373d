// src/models/bom.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- Linha da Ficha Técnica ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BomLine {
    #[schema(example = "RESINA-01")]
    pub stock_item_code: String,
    // Quanto deste insumo é consumido por unidade do produto
    #[schema(value_type = f64, example = 0.5)]
    pub qty_per_pack: Decimal,
    // Linha primária: consumida do pool de pesagem/moagem
    pub from_weighing: bool,
    pub substitute_code: Option<String>,
    pub position: i32,
}

// --- Produto Combinado (Ficha Técnica completa) ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bom {
    #[schema(example = "PROD-A")]
    pub product_code: String,
    pub lines: Vec<BomLine>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bom {
    pub fn primary_line(&self) -> Option<&BomLine> {
        self.lines.iter().find(|l| l.from_weighing)
    }

    /// Marca uma única linha como primária (comportamento de "radio button").
    /// `None` limpa todas. Retorna `false` se o código não pertence à ficha.
    pub fn set_primary(&mut self, stock_item_code: Option<&str>) -> bool {
        if let Some(code) = stock_item_code {
            if !self.lines.iter().any(|l| l.stock_item_code == code) {
                return false;
            }
        }

        for line in &mut self.lines {
            line.from_weighing = Some(line.stock_item_code.as_str()) == stock_item_code;
        }
        true
    }

    /// Todos os códigos tocados pela ficha (entradas e substitutos).
    pub fn referenced_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .lines
            .iter()
            .flat_map(|l| std::iter::once(l.stock_item_code.clone()).chain(l.substitute_code.clone()))
            .collect();
        codes.sort();
        codes.dedup();
        codes
    }
}

// Resumo para listagem
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BomSummary {
    pub product_code: String,
    pub line_count: i64,
    pub primary_code: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(code: &str, primary: bool, sub: Option<&str>) -> BomLine {
        BomLine {
            stock_item_code: code.into(),
            qty_per_pack: dec!(1),
            from_weighing: primary,
            substitute_code: sub.map(Into::into),
            position: 0,
        }
    }

    #[test]
    fn setting_primary_clears_the_previous_one() {
        let mut bom = Bom {
            product_code: "PROD-A".into(),
            lines: vec![line("A", true, None), line("B", false, None)],
            updated_at: None,
        };

        assert!(bom.set_primary(Some("B")));
        assert_eq!(bom.primary_line().map(|l| l.stock_item_code.as_str()), Some("B"));
        assert_eq!(bom.lines.iter().filter(|l| l.from_weighing).count(), 1);

        assert!(bom.set_primary(None));
        assert!(bom.primary_line().is_none());
    }

    #[test]
    fn unknown_primary_code_changes_nothing() {
        let mut bom = Bom {
            product_code: "PROD-A".into(),
            lines: vec![line("A", true, None)],
            updated_at: None,
        };

        assert!(!bom.set_primary(Some("Z")));
        assert!(bom.lines[0].from_weighing);
    }

    #[test]
    fn referenced_codes_include_substitutes() {
        let bom = Bom {
            product_code: "PROD-A".into(),
            lines: vec![line("A", false, Some("A2")), line("B", false, Some("A2"))],
            updated_at: None,
        };
        assert_eq!(bom.referenced_codes(), vec!["A", "A2", "B"]);
    }
}
