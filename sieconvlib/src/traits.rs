//! Унифицированные трэйты чтения/записи на основе std::io::{BufRead, Write}.
//!
//! Методы принимают &self: форматы с конфигурацией (таблицы соответствий
//! Petra) реализуют их наравне с бесконфигурационным SIE.

use crate::{error::Result, model::SieData};
use std::io::{BufRead, Write};

pub trait ReadFormat {
    fn read<R: BufRead>(&self, r: R) -> Result<SieData>;
}

pub trait WriteFormat {
    fn write<W: Write>(&self, w: W, doc: &SieData) -> Result<()>;
}
