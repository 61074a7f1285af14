use clap::{Parser, ValueEnum};
use sieconvlib::{
    convert::{self, with_header, SieHeader},
    error::{Result, SieError},
    formats::{
        petra::{PetraReader, PetraWriter, Tables},
        sie::{self, Sie},
    },
    model::{SieData, SieDate},
    table::CsvTable,
    traits::{ReadFormat, WriteFormat},
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum InFmt {
    Sie,
    Petra,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutFmt {
    Sie,
    Petra,
    Dump,
}

#[derive(Parser, Debug)]
#[command(name = "sieconv", version, about = "Конвертация бухгалтерских данных между Visma (SIE) и Petra")]
struct Cli {
    /// Входной файл (по умолчанию stdin)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Выходной файл (по умолчанию stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Формат входа
    #[arg(long = "in-format", value_enum)]
    in_format: InFmt,

    /// Формат выхода
    #[arg(long = "out-format", value_enum)]
    out_format: OutFmt,

    /// Таблица счетов (CSV через ';')
    #[arg(long)]
    account_table: Option<PathBuf>,

    /// Таблица центров затрат
    #[arg(long)]
    cost_center_table: Option<PathBuf>,

    /// Таблица проектов
    #[arg(long)]
    project_table: Option<PathBuf>,

    /// Центр затрат Petra по умолчанию
    #[arg(long, default_value = "3200")]
    default_cost_center: String,

    /// Код проекта, трактуемый как его отсутствие
    #[arg(long)]
    ignore_project: Option<String>,

    /// Серия верификаций, импортированных из Petra
    #[arg(long, default_value = "P")]
    series: String,

    /// Счёт для кодов Petra, отсутствующих в таблице
    #[arg(long)]
    fallback_account: Option<String>,

    /// Название компании для заголовка SIE (#FNAMN)
    #[arg(long, default_value = "")]
    company: String,

    /// Перезаписывать существующий выходной файл
    #[arg(long)]
    overwrite: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let input: Box<dyn io::Read> = match &cli.input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };
    let br = BufReader::new(input);

    // прямые конвертации идут через библиотечные сценарии
    match (cli.in_format, cli.out_format) {
        (InFmt::Sie, OutFmt::Petra) => {
            convert::sie_to_petra(br, out_writer(&cli)?, &petra_writer(&cli)?)
        }
        (InFmt::Petra, OutFmt::Sie) => {
            convert::petra_to_sie(br, out_writer(&cli)?, &petra_reader(&cli)?, &header(&cli))
        }
        _ => {
            let doc = read_doc(&cli, br)?;
            write_doc(&cli, &doc)
        }
    }
}

fn read_doc(cli: &Cli, br: impl BufRead) -> Result<SieData> {
    match cli.in_format {
        InFmt::Sie => Sie.read(br),
        InFmt::Petra => with_header(petra_reader(cli)?.read(br)?, &header(cli)),
    }
}

fn write_doc(cli: &Cli, doc: &SieData) -> Result<()> {
    match (cli.out_format, &cli.output) {
        (OutFmt::Sie, Some(path)) => Sie::write_file(path, doc, cli.overwrite),
        (OutFmt::Sie, None) => Sie.write(io::stdout(), doc),
        (OutFmt::Petra, output) => {
            let writer = petra_writer(cli)?;
            match output {
                Some(path) => writer.write_file(path, doc, cli.overwrite),
                None => writer.write(io::stdout(), doc),
            }
        }
        (OutFmt::Dump, _) => {
            let mut w = out_writer(cli)?;
            writeln!(w, "{doc:#?}")?;
            w.flush()?;
            Ok(())
        }
    }
}

fn out_writer(cli: &Cli) -> Result<Box<dyn Write>> {
    Ok(match &cli.output {
        Some(path) => Box::new(BufWriter::new(sie::create_dest(path, cli.overwrite)?)),
        None => Box::new(io::stdout()),
    })
}

fn header(cli: &Cli) -> SieHeader {
    SieHeader::new(
        "sieconv",
        &cli.company,
        SieDate::from_date(chrono::Local::now().date_naive()),
    )
}

fn petra_reader(cli: &Cli) -> Result<PetraReader> {
    let reader = PetraReader::new(tables(cli, ["P_Kto", "P_Kst", "P_Kst_P"])?, &cli.series);
    Ok(match &cli.fallback_account {
        Some(a) => reader.fallback_account(a),
        None => reader,
    })
}

fn petra_writer(cli: &Cli) -> Result<PetraWriter> {
    let writer = PetraWriter::new(tables(cli, ["V_Kto", "V_Kst", "V_Proj"])?, &cli.default_cost_center);
    Ok(match &cli.ignore_project {
        Some(p) => writer.ignore_project(p),
        None => writer,
    })
}

/// Загружает три таблицы соответствий; ключевые заголовки зависят от
/// направления конвертации.
fn tables(cli: &Cli, key_headers: [&str; 3]) -> Result<Tables> {
    let load = |path: &Option<PathBuf>, key: &str, flag: &str| -> Result<CsvTable> {
        let path = path.as_ref().ok_or_else(|| {
            SieError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{flag} is required for petra conversion"),
            ))
        })?;
        CsvTable::from_path(path, key)
    };
    Ok(Tables {
        account: load(&cli.account_table, key_headers[0], "--account-table")?,
        cost_center: load(&cli.cost_center_table, key_headers[1], "--cost-center-table")?,
        project: load(&cli.project_table, key_headers[2], "--project-table")?,
    })
}
