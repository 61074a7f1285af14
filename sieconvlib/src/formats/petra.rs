//! Petra batch CSV: строки `B`/`J`/`T` через `;`. Запись — UTF-8 с BOM,
//! чтение экспорта Petra — Latin-1.

use crate::{
    error::{Result, SieError},
    model::{format_amount, SieData, SieDate, Transaction, Verification},
    table::CsvTable,
    traits::{ReadFormat, WriteFormat},
};
use chrono::{Datelike, NaiveDate};
use csv::{ReaderBuilder, WriterBuilder};
use rust_decimal::Decimal;
use std::fs;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

/// Три таблицы соответствий: счета, центры затрат, проекты.
#[derive(Debug, Clone)]
pub struct Tables {
    pub account: CsvTable,
    pub cost_center: CsvTable,
    pub project: CsvTable,
}

/// Пары объектного списка: тег "1" — центр затрат (код на `K`),
/// тег "6" — проект (код на `P-`). Порядок пар не гарантирован.
fn split_objects(objects: &[String]) -> (Option<&str>, Option<&str>) {
    let mut cost_center = None;
    let mut project = None;
    for pair in objects.chunks(2) {
        let [tag, value] = pair else { continue };
        if tag == "1" && value.starts_with('K') {
            cost_center = Some(value.as_str());
        } else if tag == "6" && value.starts_with("P-") {
            project = Some(value.as_str());
        }
    }
    (cost_center, project)
}

/* -------------------------------- WRITE ---------------------------------- */

/// Пишет документ как пакет журналов Petra. Коды переводятся через таблицы;
/// центр затрат по умолчанию и «пустой» код проекта задаются явно.
pub struct PetraWriter {
    tables: Tables,
    default_cost_center: String,
    /// Код проекта, при котором берётся центр затрат, а не проект.
    ignored_project: Option<String>,
}

impl PetraWriter {
    pub fn new(tables: Tables, default_cost_center: impl Into<String>) -> Self {
        PetraWriter {
            tables,
            default_cost_center: default_cost_center.into(),
            ignored_project: None,
        }
    }

    pub fn ignore_project(mut self, code: impl Into<String>) -> Self {
        self.ignored_project = Some(code.into());
        self
    }

    pub fn write_file(&self, path: impl AsRef<Path>, doc: &SieData, overwrite: bool) -> Result<()> {
        let file = super::sie::create_dest(path.as_ref(), overwrite)?;
        self.write(BufWriter::new(file), doc)
    }

    fn rows(&self, doc: &SieData) -> Result<Vec<[String; 8]>> {
        let verifications = doc.verifications();
        let program = doc
            .first("#PROGRAM")
            .and_then(|f| f.values.first())
            .and_then(|v| v.split_whitespace().next())
            .ok_or_else(|| SieError::Incomplete("#PROGRAM".to_string()))?
            .to_string();
        let ver_date = verifications
            .iter()
            .find_map(|v| v.date.date())
            .ok_or_else(|| SieError::Incomplete("#VER".to_string()))?;

        let month = ver_date.format("%Y-%m");
        let checksum: Decimal = verifications.iter().map(Verification::sum_debit).sum();
        let last_day = last_day_of_month(ver_date);

        let mut rows = Vec::new();
        rows.push(row([
            "", "CC", "Account", "Narrative", "Reference", "Date", "Dt", "Ct",
        ]));
        rows.push(row([
            "B",
            &format!("Imported from {program} {month}"),
            &format_amount(checksum),
            &format!("{:02}/{:02}/{}", last_day, ver_date.month(), ver_date.year()),
            "",
            "",
            "",
            "",
        ]));

        for ver in verifications {
            if !ver.in_balance() {
                return Err(SieError::Unbalanced {
                    series: ver.series.clone(),
                    number: ver.number.clone(),
                    diff: ver.balance_diff(),
                });
            }
            let reference = format!("Visma Ver {}{}", ver.series, ver.number);
            let date = petra_date(&ver.date);
            rows.push(row([
                "J",
                &format!("{} - {}", reference, ver.text),
                "GL",
                "STD",
                "SEK",
                "1",
                &date,
                "",
            ]));
            rows.push(row(["", "", "", "", "", "", "", ""]));

            let mut narrative = ver.text.clone();
            for trans in &ver.transactions {
                let cc = self.cost_center_for(trans)?;
                let account = self.tables.account.get(&trans.account)?;
                match (&trans.text, &trans.quantity) {
                    (text, Some(q)) if !text.is_empty() && !q.is_zero() => {
                        narrative = format!("{} {}", text, format_amount(*q));
                    }
                    (text, _) if !text.is_empty() => narrative = text.clone(),
                    _ => {}
                }
                rows.push(row([
                    "T",
                    &cc,
                    account,
                    &narrative,
                    &reference,
                    &date,
                    &format_amount(trans.debit()),
                    &format_amount(trans.credit()),
                ]));
            }
            rows.push(row(["", "", "", "", "", "", "", ""]));
        }
        Ok(rows)
    }

    /// Проект в объектном списке берёт верх над центром затрат, кроме
    /// игнорируемого кода; без объектов действует центр по умолчанию.
    fn cost_center_for(&self, trans: &Transaction) -> Result<String> {
        let (cc, project) = split_objects(&trans.objects);
        let ignored = |p: &str| self.ignored_project.as_deref() == Some(p);
        match project {
            Some(p) if !ignored(p) => Ok(self.tables.project.get(p)?.to_string()),
            _ => match cc {
                Some(c) => Ok(self.tables.cost_center.get(c)?.to_string()),
                None => Ok(self.default_cost_center.clone()),
            },
        }
    }
}

impl WriteFormat for PetraWriter {
    fn write<W: Write>(&self, mut w: W, doc: &SieData) -> Result<()> {
        let rows = self.rows(doc)?;
        w.write_all("\u{feff}".as_bytes())?;
        let mut wrt = WriterBuilder::new().delimiter(b';').from_writer(&mut w);
        for r in &rows {
            wrt.write_record(r.iter().map(String::as_str))?;
        }
        wrt.flush()?;
        Ok(())
    }
}

fn row(vals: [&str; 8]) -> [String; 8] {
    vals.map(str::to_string)
}

fn petra_date(d: &SieDate) -> String {
    d.date()
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

fn last_day_of_month(d: NaiveDate) -> u32 {
    let leap = NaiveDate::from_ymd_opt(d.year(), 2, 29).is_some();
    match d.month() {
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => 31,
    }
}

/* -------------------------------- READ ----------------------------------- */

/// Читает экспорт Petra (строки `B`/`J`/`T`) и строит документ: один журнал —
/// одна верификация. Коды переводятся обратными таблицами.
pub struct PetraReader {
    tables: Tables,
    series: String,
    /// Счёт для кодов Petra, отсутствующих в таблице счетов.
    fallback_account: Option<String>,
}

impl PetraReader {
    pub fn new(tables: Tables, series: impl Into<String>) -> Self {
        PetraReader {
            tables,
            series: series.into(),
            fallback_account: None,
        }
    }

    pub fn fallback_account(mut self, account: impl Into<String>) -> Self {
        self.fallback_account = Some(account.into());
        self
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<SieData> {
        let bytes = fs::read(path)?;
        self.parse(&decode_latin1(&bytes))
    }

    fn parse(&self, text: &str) -> Result<SieData> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut doc = SieData::new();
        let mut journal: Option<(String, Vec<Vec<String>>)> = None;
        let mut number = 0;

        for (i, rec) in rdr.records().enumerate() {
            let rec = rec?;
            let cell = |n: usize| rec.get(n).unwrap_or("").to_string();
            match rec.get(0) {
                Some("B") | Some("J") => {
                    if let Some(j) = journal.take() {
                        number += 1;
                        doc.add_verification(self.journal_to_verification(j, number)?);
                    }
                    if rec.get(0) == Some("J") {
                        journal = Some((cell(1), Vec::new()));
                    }
                }
                Some("T") => match &mut journal {
                    Some((_, rows)) => rows.push((0..8).map(cell).collect()),
                    None => {
                        return Err(SieError::Malformed {
                            line: i + 1,
                            message: "transaction row outside a journal".to_string(),
                            content: rec.iter().collect::<Vec<_>>().join(";"),
                        })
                    }
                },
                _ => {}
            }
        }
        if let Some(j) = journal.take() {
            number += 1;
            doc.add_verification(self.journal_to_verification(j, number)?);
        }
        Ok(doc)
    }

    fn journal_to_verification(
        &self,
        (text, rows): (String, Vec<Vec<String>>),
        number: usize,
    ) -> Result<Verification> {
        let date = rows
            .first()
            .map(|r| parse_petra_date(&r[5]))
            .transpose()?
            .unwrap_or_default();
        let mut ver = Verification::new(&self.series, number.to_string(), date);
        ver.text = text;
        ver.reg_date = date;

        for r in rows {
            let account = match self.tables.account.get(&r[2]) {
                Ok(a) => a.to_string(),
                Err(SieError::KeyMissing { .. }) if self.fallback_account.is_some() => {
                    self.fallback_account.clone().unwrap_or_default()
                }
                Err(e) => return Err(e),
            };
            let mut objects = vec!["1".to_string(), self.tables.cost_center.get(&r[1])?.to_string()];
            if let Some(project) = self.tables.project.lookup(&r[1]) {
                objects.push("6".to_string());
                objects.push(project.to_string());
            }
            let amount = parse_petra_amount(&r[6])? - parse_petra_amount(&r[7])?;
            let mut trans = Transaction::new(account, objects, amount);
            trans.date = parse_petra_date(&r[5])?;
            trans.text = r[3].clone();
            ver.add_transaction(trans);
        }
        Ok(ver)
    }
}

impl ReadFormat for PetraReader {
    fn read<R: BufRead>(&self, mut r: R) -> Result<SieData> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;
        self.parse(&decode_latin1(&bytes))
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Суммы Petra используют запятую как десятичный разделитель; пустая
/// ячейка значит ноль.
fn parse_petra_amount(s: &str) -> Result<Decimal> {
    if s.is_empty() {
        return Ok(Decimal::ZERO);
    }
    s.replace(',', ".")
        .parse()
        .map_err(|_| SieError::Malformed {
            line: 0,
            message: "invalid amount".to_string(),
            content: s.to_string(),
        })
}

/// Даты Petra записаны как `дд/мм/гггг`; пустая ячейка — нет даты.
fn parse_petra_date(s: &str) -> Result<SieDate> {
    if s.is_empty() {
        return Ok(SieDate::empty());
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y")
        .map(SieDate::from_date)
        .map_err(|_| SieError::InvalidDate(s.to_string()))
}
