// src/common/validation.rs

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::common::error::AppError;

// Teto de qualquer quantidade recebida pela API
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

pub fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() && !val.is_zero() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

pub fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param("exclusive_min".into(), &0.0);
        err.message = Some("O valor deve ser maior que zero.".into());
        return Err(err);
    }
    Ok(())
}

fn check_upper_bound(val: &Decimal) -> Result<(), ValidationError> {
    if val.abs() > MAX_QUANTITY {
        let mut err = ValidationError::new("range");
        err.add_param("max".into(), &1_000_000_000.0);
        err.message = Some("O valor excede o limite de 1.000.000.000.".into());
        return Err(err);
    }
    Ok(())
}

/// Quantidade positiva e dentro do teto.
pub fn validate_quantity(val: &Decimal) -> Result<(), ValidationError> {
    validate_positive(val)?;
    check_upper_bound(val)
}

/// Quantidade não negativa e dentro do teto.
pub fn validate_stock_qty(val: &Decimal) -> Result<(), ValidationError> {
    validate_not_negative(val)?;
    check_upper_bound(val)
}

/// Variação de estoque (pode ser negativa) dentro do teto.
pub fn validate_delta(val: &Decimal) -> Result<(), ValidationError> {
    check_upper_bound(val)
}

/// Multiplicação que vira erro de validação em vez de estourar.
pub fn scaled(qty: Decimal, factor: Decimal) -> Result<Decimal, AppError> {
    qty.checked_mul(factor).ok_or(AppError::QuantityOutOfRange)
}

// Limite das listagens: padrão 50, teto 500
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn not_negative_accepts_zero() {
        assert!(validate_not_negative(&dec!(0)).is_ok());
        assert!(validate_not_negative(&dec!(2.5)).is_ok());
        assert!(validate_not_negative(&dec!(-0.01)).is_err());
    }

    #[test]
    fn positive_rejects_zero() {
        assert!(validate_positive(&dec!(0)).is_err());
        assert!(validate_positive(&dec!(0.001)).is_ok());
    }

    #[test]
    fn quantities_above_the_ceiling_are_rejected() {
        assert!(validate_quantity(&dec!(1000000000)).is_ok());
        assert!(validate_quantity(&dec!(1000000000.01)).is_err());
        assert!(validate_stock_qty(&dec!(0)).is_ok());
        assert!(validate_delta(&dec!(-1000000001)).is_err());

        let huge: Decimal = serde_json::from_str("1e20").unwrap();
        assert!(validate_quantity(&huge).is_err());
    }

    #[test]
    fn scaled_reports_overflow_as_error() {
        assert_eq!(scaled(dec!(2.5), dec!(4)).unwrap(), dec!(10));
        assert!(matches!(scaled(Decimal::MAX, dec!(2)), Err(AppError::QuantityOutOfRange)));
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), 500);
    }
}
