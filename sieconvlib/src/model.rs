//! Доменные модели — единый «нормализованный» слой между форматами.
//!
//! Инварианты живут здесь: одиночные поля (`DuplicateField`), полнота
//! документа (`is_complete`), баланс верификации (`in_balance`).

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SieError};

pub const VER: &str = "#VER";
pub const TRANS: &str = "#TRANS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldGroup {
    Ident,
    Account,
    Balance,
    Control,
}

/// Метаданные одной SIE-записи: группа, одиночность, обязательность.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub group: FieldGroup,
    pub single: bool,
    pub required: bool,
}

const fn spec(name: &'static str, group: FieldGroup, single: bool, required: bool) -> FieldSpec {
    FieldSpec { name, group, single, required }
}

/// Закрытый перечень SIE-записей. Порядок элементов задаёт канонический
/// порядок секций при выводе.
pub const FIELD_SPECS: &[FieldSpec] = &[
    spec("#FLAGGA", FieldGroup::Ident, true, true),
    spec("#PROGRAM", FieldGroup::Ident, true, true),
    spec("#FORMAT", FieldGroup::Ident, true, true),
    spec("#GEN", FieldGroup::Ident, true, true),
    spec("#SIETYP", FieldGroup::Ident, true, true),
    spec("#PROSA", FieldGroup::Ident, false, false),
    spec("#FTYP", FieldGroup::Ident, false, false),
    spec("#FNR", FieldGroup::Ident, false, false),
    spec("#ORGNR", FieldGroup::Ident, true, false),
    spec("#BKOD", FieldGroup::Ident, false, false),
    spec("#ADRESS", FieldGroup::Ident, false, false),
    spec("#FNAMN", FieldGroup::Ident, true, true),
    spec("#RAR", FieldGroup::Ident, false, false),
    spec("#TAXAR", FieldGroup::Ident, false, false),
    spec("#OMFATTN", FieldGroup::Ident, false, false),
    spec("#KPTYP", FieldGroup::Ident, false, false),
    spec("#VALUTA", FieldGroup::Ident, false, false),
    spec("#KONTO", FieldGroup::Account, false, true),
    spec("#KTYP", FieldGroup::Account, false, false),
    spec("#ENHET", FieldGroup::Account, false, false),
    spec("#SRU", FieldGroup::Account, false, false),
    spec("#DIM", FieldGroup::Account, false, false),
    spec("#UNDERDIM", FieldGroup::Account, false, false),
    spec("#OBJEKT", FieldGroup::Account, false, false),
    spec("#IB", FieldGroup::Balance, false, false),
    spec("#UB", FieldGroup::Balance, false, false),
    spec("#OIB", FieldGroup::Balance, false, false),
    spec("#OUB", FieldGroup::Balance, false, false),
    spec("#RES", FieldGroup::Balance, false, false),
    spec("#PSALDO", FieldGroup::Balance, false, false),
    spec("#PBUDGET", FieldGroup::Balance, false, false),
    spec(VER, FieldGroup::Balance, false, false),
    spec("#KSUMMA", FieldGroup::Control, false, false),
];

pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELD_SPECS.iter().find(|s| s.name == name)
}

/// Календарная дата, которая может отсутствовать. Отсутствие — валидное
/// состояние: выводится пустой строкой и равно другой отсутствующей дате.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SieDate(Option<NaiveDate>);

impl SieDate {
    pub fn empty() -> Self {
        SieDate(None)
    }

    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(SieDate(None));
        }
        let d = NaiveDate::parse_from_str(s, "%Y%m%d")
            .map_err(|_| SieError::InvalidDate(s.to_string()))?;
        Ok(SieDate(Some(d)))
    }

    pub fn from_date(d: NaiveDate) -> Self {
        SieDate(Some(d))
    }

    pub fn has_date(&self) -> bool {
        self.0.is_some()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.0
    }
}

impl std::fmt::Display for SieDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(d) => write!(f, "{}", d.format("%Y%m%d")),
            None => Ok(()),
        }
    }
}

impl std::str::FromStr for SieDate {
    type Err = SieError;

    fn from_str(s: &str) -> Result<Self> {
        SieDate::parse(s)
    }
}

/// Сумма/количество как текст с двумя знаками, хвостовые нули и точка
/// отбрасываются: 50.00 -> "50", 50.10 -> "50.1".
pub fn format_amount(d: Decimal) -> String {
    let s = format!("{:.2}", d.round_dp(2));
    let t = s.trim_end_matches('0').trim_end_matches('.');
    if t.is_empty() || t == "-" {
        "0".to_string()
    } else {
        t.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataField {
    pub name: String,
    pub values: Vec<String>,
}

impl DataField {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        DataField { name: name.into(), values }
    }

    pub fn from_tokens(mut tokens: Vec<String>) -> Self {
        let name = tokens.remove(0);
        DataField { name, values: tokens }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub account: String,
    /// Объектный список: пары тег/значение ("1" — центр затрат, "6" — проект);
    /// порядок пар не гарантирован, смысл определяет тег.
    pub objects: Vec<String>,
    pub amount: Decimal,
    pub date: SieDate,
    pub text: String,
    pub quantity: Option<Decimal>,
    pub sign: String,
}

impl Transaction {
    pub fn new(account: impl Into<String>, objects: Vec<String>, amount: Decimal) -> Self {
        Transaction {
            account: account.into(),
            objects,
            amount,
            date: SieDate::empty(),
            text: String::new(),
            quantity: None,
            sign: String::new(),
        }
    }

    pub fn debit(&self) -> Decimal {
        if self.amount > Decimal::ZERO {
            self.amount
        } else {
            Decimal::ZERO
        }
    }

    pub fn credit(&self) -> Decimal {
        if self.amount < Decimal::ZERO {
            -self.amount
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub series: String,
    pub number: String,
    pub date: SieDate,
    pub text: String,
    pub reg_date: SieDate,
    pub sign: String,
    pub transactions: Vec<Transaction>,
}

impl Verification {
    pub fn new(series: impl Into<String>, number: impl Into<String>, date: SieDate) -> Self {
        Verification {
            series: series.into(),
            number: number.into(),
            date,
            text: String::new(),
            reg_date: SieDate::empty(),
            sign: String::new(),
            transactions: Vec::new(),
        }
    }

    pub fn add_transaction(&mut self, t: Transaction) {
        self.transactions.push(t);
    }

    pub fn is_complete(&self) -> bool {
        !self.transactions.is_empty()
    }

    pub fn balance_diff(&self) -> Decimal {
        self.transactions.iter().map(|t| t.amount).sum()
    }

    /// Баланс с точностью до цента.
    pub fn in_balance(&self) -> bool {
        self.balance_diff().abs() < Decimal::new(1, 2)
    }

    pub fn sum_debit(&self) -> Decimal {
        self.transactions.iter().map(Transaction::debit).sum()
    }

    pub fn sum_credit(&self) -> Decimal {
        self.transactions.iter().map(Transaction::credit).sum()
    }
}

/// Документ: все поля и верификации одного SIE-файла.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SieData {
    fields: HashMap<String, Vec<DataField>>,
    verifications: Vec<Verification>,
}

impl SieData {
    pub fn new() -> Self {
        SieData::default()
    }

    /// Сохраняет поле. Второе вхождение одиночного поля — ошибка.
    pub fn add_field(&mut self, field: DataField) -> Result<()> {
        let single = field_spec(&field.name).is_some_and(|s| s.single);
        let entry = self.fields.entry(field.name.clone()).or_default();
        if single && !entry.is_empty() {
            return Err(SieError::DuplicateField(field.name));
        }
        entry.push(field);
        Ok(())
    }

    pub fn add_verification(&mut self, v: Verification) {
        self.verifications.push(v);
    }

    pub fn fields(&self, name: &str) -> &[DataField] {
        self.fields.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn first(&self, name: &str) -> Option<&DataField> {
        self.fields(name).first()
    }

    pub fn verifications(&self) -> &[Verification] {
        &self.verifications
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        FIELD_SPECS
            .iter()
            .filter(|s| s.required && self.fields(s.name).is_empty())
            .map(|s| s.name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}
