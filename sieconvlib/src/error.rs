//! Единый тип ошибок публичного API.

use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SieError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Нарушение лексики или блочной структуры. Разбор всего файла
    /// прерывается: частично прочитанный документ не возвращается.
    #[error("line {line}: {message}: {content:?}")]
    Malformed {
        line: usize,
        message: String,
        content: String,
    },

    #[error("invalid date {0:?}, expected YYYYMMDD")]
    InvalidDate(String),

    /// Повторное вхождение поля, допустимого только один раз.
    #[error("field {0} is set already")]
    DuplicateField(String),

    /// Обязательные поля отсутствуют — документ нельзя сериализовать.
    #[error("document incomplete, missing fields: {0}")]
    Incomplete(String),

    /// Дебет и кредит верификации не сходятся.
    #[error("verification {series}{number} out of balance by {diff}")]
    Unbalanced {
        series: String,
        number: String,
        diff: Decimal,
    },

    /// Целевой файл уже существует, а перезапись не разрешена.
    #[error("destination {} already exists", .0.display())]
    DestinationExists(PathBuf),

    /// Ключ не найден в таблице соответствий. Разрешение — на вызывающей
    /// стороне (другая таблица, другой код, интерактивно).
    #[error("key {key:?} missing in table {table}")]
    KeyMissing { table: String, key: String },

    #[error("CP437 encoding failed: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, SieError>;
