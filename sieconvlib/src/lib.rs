//! sieconvlib — библиотека для чтения/записи бухгалтерских данных
//! в форматах SIE (Visma) и Petra batch CSV.

pub mod convert;
pub mod error;
pub mod model;
pub mod table;
pub mod traits;

pub mod formats {
    pub mod petra;
    pub mod sie;
}
