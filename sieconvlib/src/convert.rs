//! Высокоуровневые сценарии конвертации между SIE и Petra.

use crate::{
    error::Result,
    formats::{
        petra::{PetraReader, PetraWriter},
        sie::Sie,
    },
    model::{DataField, SieData, SieDate},
    traits::{ReadFormat, WriteFormat},
};
use std::io::{BufRead, Write};

/// Идентификационные поля, которыми дополняется документ, собранный
/// из импорта Petra. Значения задаются явно — никаких встроенных умолчаний.
#[derive(Debug, Clone)]
pub struct SieHeader {
    pub program: String,
    pub company: String,
    pub gen_date: SieDate,
    pub sie_type: String,
    pub format: String,
    pub flag: String,
}

impl SieHeader {
    pub fn new(program: impl Into<String>, company: impl Into<String>, gen_date: SieDate) -> Self {
        SieHeader {
            program: program.into(),
            company: company.into(),
            gen_date,
            sie_type: "4".to_string(),
            format: "PC8".to_string(),
            flag: "0".to_string(),
        }
    }
}

/// SIE-файл -> пакет журналов Petra.
pub fn sie_to_petra<R: BufRead, W: Write>(r: R, w: W, writer: &PetraWriter) -> Result<()> {
    let doc = Sie.read(r)?;
    writer.write(w, &doc)
}

/// Экспорт Petra -> полный SIE-файл с заголовком.
pub fn petra_to_sie<R: BufRead, W: Write>(
    r: R,
    w: W,
    reader: &PetraReader,
    header: &SieHeader,
) -> Result<()> {
    let doc = with_header(reader.read(r)?, header)?;
    Sie.write(w, &doc)
}

/// Дополняет документ обязательными идентификационными полями и одной
/// записью `#KONTO` на каждый встреченный счёт, чтобы он прошёл проверку
/// полноты перед записью.
pub fn with_header(mut doc: SieData, h: &SieHeader) -> Result<SieData> {
    doc.add_field(DataField::new("#FLAGGA", vec![h.flag.clone()]))?;
    doc.add_field(DataField::new("#PROGRAM", vec![h.program.clone()]))?;
    doc.add_field(DataField::new("#FORMAT", vec![h.format.clone()]))?;
    doc.add_field(DataField::new("#GEN", vec![h.gen_date.to_string()]))?;
    doc.add_field(DataField::new("#SIETYP", vec![h.sie_type.clone()]))?;
    doc.add_field(DataField::new("#FNAMN", vec![h.company.clone()]))?;

    let mut accounts: Vec<String> = doc
        .verifications()
        .iter()
        .flat_map(|v| v.transactions.iter().map(|t| t.account.clone()))
        .collect();
    accounts.sort();
    accounts.dedup();
    for account in accounts {
        doc.add_field(DataField::new("#KONTO", vec![account, String::new()]))?;
    }
    Ok(doc)
}
