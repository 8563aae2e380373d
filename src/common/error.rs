use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::middleware::i18n::Locale;

// Nosso tipo de erro, agora com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Validação (rejeitada antes de qualquer escrita) ---
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("A quantidade deve ser maior que zero")]
    NonPositiveQuantity,

    #[error("Quantidade fora do intervalo permitido")]
    QuantityOutOfRange,

    #[error("A ficha técnica precisa de ao menos uma linha: {0}")]
    EmptyBom(String),

    #[error("A quantidade por pack não pode ser negativa: {0}")]
    NegativeQtyPerPack(String),

    #[error("Linha duplicada na ficha técnica: {0}")]
    DuplicateBomLine(String),

    #[error("Mais de uma linha marcada como primária")]
    MultiplePrimaryLines,

    #[error("O item {0} não pode ter ficha técnica")]
    InvalidBomOutput(String),

    #[error("O item {0} não pode ser usado como entrada")]
    IncompatibleInput(String),

    #[error("Substituto inválido para {input}: {substitute}")]
    InvalidSubstitute { input: String, substitute: String },

    #[error("Origem de movimentação não permitida: {0}")]
    OriginNotAllowed(String),

    #[error("A variação de estoque não pode ser zero")]
    ZeroDelta,

    #[error("Pesagem/moagem não se aplica ao item {0}")]
    BatchNotAllowed(String),

    #[error("O tipo do item não pode ser alterado: {0}")]
    KindChangeNotAllowed(String),

    // --- Não encontrado ---
    #[error("Ficha técnica não encontrada: {0}")]
    BomNotFound(String),

    #[error("Linha não pertence à ficha técnica: {0}")]
    BomLineNotFound(String),

    #[error("Item de estoque não encontrado: {0}")]
    StockItemNotFound(String),

    #[error("Lote não encontrado: {0}")]
    BatchNotFound(Uuid),

    #[error("Movimentação não encontrada: {0}")]
    MovementNotFound(Uuid),

    #[error("Pack não encontrado: {0}")]
    PackNotFound(Uuid),

    #[error("Código de barras não encontrado: {0}")]
    BarcodeNotFound(String),

    // --- Conflitos ---
    #[error("Código já existe: {0}")]
    CodeAlreadyExists(String),

    #[error("Código de barras já existe: {0}")]
    BarcodeAlreadyExists(String),

    #[error("Login já existe")]
    LoginAlreadyExists,

    #[error("Item em uso: {0}")]
    ItemInUse(String),

    // --- Estoque (somente com a política STRICT) ---
    #[error("Estoque insuficiente para {code}: faltam {missing}")]
    InsufficientStock { code: String, missing: Decimal },

    // --- Autenticação / Autorização ---
    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Permissão insuficiente")]
    Forbidden,

    #[error("Senha de administrador incorreta")]
    AdminPasswordMismatch,

    #[error("Registro de item inconsistente: {0}")]
    CorruptedItemRow(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// Erro já pronto para a resposta HTTP
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::NonPositiveQuantity
            | AppError::QuantityOutOfRange
            | AppError::EmptyBom(_)
            | AppError::NegativeQtyPerPack(_)
            | AppError::DuplicateBomLine(_)
            | AppError::MultiplePrimaryLines
            | AppError::InvalidBomOutput(_)
            | AppError::IncompatibleInput(_)
            | AppError::InvalidSubstitute { .. }
            | AppError::OriginNotAllowed(_)
            | AppError::ZeroDelta
            | AppError::BatchNotAllowed(_)
            | AppError::KindChangeNotAllowed(_) => StatusCode::BAD_REQUEST,

            AppError::BomNotFound(_)
            | AppError::BomLineNotFound(_)
            | AppError::StockItemNotFound(_)
            | AppError::BatchNotFound(_)
            | AppError::MovementNotFound(_)
            | AppError::PackNotFound(_)
            | AppError::BarcodeNotFound(_)
            | AppError::UserNotFound => StatusCode::NOT_FOUND,

            AppError::CodeAlreadyExists(_)
            | AppError::BarcodeAlreadyExists(_)
            | AppError::LoginAlreadyExists
            | AppError::ItemInUse(_) => StatusCode::CONFLICT,

            AppError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::AdminPasswordMismatch => StatusCode::FORBIDDEN,

            AppError::CorruptedItemRow(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Mensagem curta para o usuário, no idioma pedido ('pt' é o padrão).
    pub fn message(&self, lang: &str) -> String {
        let en = lang == "en";
        match self {
            AppError::ValidationError(_) => pick(en, "Um ou mais campos são inválidos.", "One or more fields are invalid."),
            AppError::NonPositiveQuantity => pick(en, "A quantidade deve ser maior que zero.", "Quantity must be greater than zero."),
            AppError::QuantityOutOfRange => pick(en, "A quantidade excede o limite permitido.", "Quantity exceeds the allowed limit."),
            AppError::EmptyBom(code) => if en {
                format!("The bill of materials for '{code}' needs at least one line.")
            } else {
                format!("A ficha técnica de '{code}' precisa de ao menos uma linha.")
            },
            AppError::NegativeQtyPerPack(code) => if en {
                format!("Quantity per pack for '{code}' cannot be negative.")
            } else {
                format!("A quantidade por pack de '{code}' não pode ser negativa.")
            },
            AppError::DuplicateBomLine(code) => if en {
                format!("Item '{code}' appears more than once in the bill of materials.")
            } else {
                format!("O item '{code}' aparece mais de uma vez na ficha técnica.")
            },
            AppError::MultiplePrimaryLines => pick(en, "Apenas uma linha pode vir da pesagem.", "Only one line can come from weighing."),
            AppError::InvalidBomOutput(code) => if en {
                format!("Item '{code}' cannot have a bill of materials.")
            } else {
                format!("O item '{code}' não pode ter ficha técnica.")
            },
            AppError::IncompatibleInput(code) => if en {
                format!("Item '{code}' cannot be used as an input.")
            } else {
                format!("O item '{code}' não pode ser usado como entrada.")
            },
            AppError::InvalidSubstitute { input, substitute } => if en {
                format!("'{substitute}' is not a valid substitute for '{input}'.")
            } else {
                format!("'{substitute}' não é um substituto válido para '{input}'.")
            },
            AppError::OriginNotAllowed(origin) => if en {
                format!("Origin '{origin}' is not allowed here.")
            } else {
                format!("A origem '{origin}' não é permitida aqui.")
            },
            AppError::ZeroDelta => pick(en, "A variação de estoque não pode ser zero.", "Stock delta cannot be zero."),
            AppError::BatchNotAllowed(code) => if en {
                format!("Item '{code}' cannot be weighed or ground.")
            } else {
                format!("O item '{code}' não pode ser pesado nem moído.")
            },
            AppError::KindChangeNotAllowed(code) => if en {
                format!("The kind of item '{code}' cannot be changed.")
            } else {
                format!("O tipo do item '{code}' não pode ser alterado.")
            },
            AppError::BomNotFound(code) => if en {
                format!("No bill of materials for '{code}'.")
            } else {
                format!("Ficha técnica de '{code}' não encontrada.")
            },
            AppError::BomLineNotFound(code) => if en {
                format!("Item '{code}' is not a line of this bill of materials.")
            } else {
                format!("O item '{code}' não é uma linha desta ficha técnica.")
            },
            AppError::StockItemNotFound(code) => if en {
                format!("Stock item '{code}' not found.")
            } else {
                format!("Item de estoque '{code}' não encontrado.")
            },
            AppError::BatchNotFound(_) => pick(en, "Lote não encontrado.", "Batch not found."),
            AppError::MovementNotFound(_) => pick(en, "Movimentação não encontrada.", "Movement not found."),
            AppError::PackNotFound(_) => pick(en, "Pack não encontrado.", "Pack not found."),
            AppError::BarcodeNotFound(code) => if en {
                format!("Barcode '{code}' not found.")
            } else {
                format!("Código de barras '{code}' não encontrado.")
            },
            AppError::CodeAlreadyExists(code) => if en {
                format!("Code '{code}' is already in use.")
            } else {
                format!("O código '{code}' já está em uso.")
            },
            AppError::BarcodeAlreadyExists(code) => if en {
                format!("Barcode '{code}' is already in use.")
            } else {
                format!("O código de barras '{code}' já está em uso.")
            },
            AppError::LoginAlreadyExists => pick(en, "Este login já está em uso.", "This login is already taken."),
            AppError::ItemInUse(code) => if en {
                format!("Item '{code}' is referenced by a bill of materials or an open batch.")
            } else {
                format!("O item '{code}' está em uso por uma ficha técnica ou lote aberto.")
            },
            AppError::InsufficientStock { code, missing } => if en {
                format!("Insufficient stock for '{code}': {missing} missing.")
            } else {
                format!("Estoque insuficiente para '{code}': faltam {missing}.")
            },
            AppError::InvalidCredentials => pick(en, "Login ou senha inválidos.", "Invalid login or password."),
            AppError::InvalidToken => pick(en, "Token de autenticação inválido ou ausente.", "Missing or invalid authentication token."),
            AppError::UserNotFound => pick(en, "Usuário não encontrado.", "User not found."),
            AppError::Forbidden => pick(en, "Você não tem permissão para esta ação.", "You are not allowed to perform this action."),
            AppError::AdminPasswordMismatch => pick(en, "Senha de administrador incorreta.", "Wrong administrator password."),
            AppError::CorruptedItemRow(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => pick(en, "Ocorreu um erro inesperado.", "An unexpected error occurred."),
        }
    }

    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let status = self.status();

        // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Erro Interno do Servidor: {:?}", self);
        }

        let details = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            Value::String(
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string()),
                            )
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                Some(Value::Object(details))
            }
            AppError::InsufficientStock { code, missing } => Some(json!({
                "code": code,
                "missing": missing,
            })),
            _ => None,
        };

        ApiError {
            status,
            error: self.message(&locale.0),
            details,
        }
    }
}

fn pick(en: bool, pt: &str, english: &str) -> String {
    if en { english.to_string() } else { pt.to_string() }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(AppError::MultiplePrimaryLines.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::BomNotFound("X".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::ItemInUse("X".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::AdminPasswordMismatch.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::InsufficientStock { code: "X".into(), missing: dec!(2) }.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::InternalServerError(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_follow_the_locale() {
        let err = AppError::BomNotFound("PROD-A".into());
        let pt = err.to_api_error(&Locale("pt".into()));
        let en = err.to_api_error(&Locale("en".into()));

        assert_eq!(pt.error, "Ficha técnica de 'PROD-A' não encontrada.");
        assert_eq!(en.error, "No bill of materials for 'PROD-A'.");
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::InternalServerError(anyhow::anyhow!("senha do banco: 123"));
        let api = err.to_api_error(&Locale::default());
        assert!(!api.error.contains("123"));
        assert!(api.details.is_none());
    }
}
