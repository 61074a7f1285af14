//! Минимальная таблица соответствий код→код поверх CSV (разделитель `;`).
//! Не движок CSV: ровно контракт «ключ есть / ключа нет».

use crate::error::{Result, SieError};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Таблица соответствий из двухколоночного CSV с заголовком.
///
/// Если первая ячейка заголовка совпадает с ожидаемым именем ключевой
/// колонки, таблица прямая (ключ слева), иначе — перевёрнутая (ключ справа).
/// Так одна и та же таблица обслуживает оба направления конвертации.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    name: String,
    map: HashMap<String, String>,
}

impl CsvTable {
    pub fn from_path(path: impl AsRef<Path>, key_header: &str) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::open(path.as_ref())?;
        Self::from_reader(name, file, key_header)
    }

    pub fn from_reader<R: Read>(name: impl Into<String>, r: R, key_header: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(r);
        let name = name.into();
        let mut map = HashMap::new();
        let mut forward = true;
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec?;
            if i == 0 {
                forward = rec.get(0) == Some(key_header);
                continue;
            }
            let (key, value) = if forward {
                (rec.get(0), rec.get(1))
            } else {
                (rec.get(1), rec.get(0))
            };
            if let (Some(key), Some(value)) = (key, value) {
                if !key.is_empty() {
                    map.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(CsvTable { name, map })
    }

    /// Перевод кода. Отсутствие ключа — различимая ошибка `KeyMissing`,
    /// которую вызывающая сторона может разрешить сама.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.map
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| SieError::KeyMissing {
                table: self.name.clone(),
                key: key.to_string(),
            })
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
