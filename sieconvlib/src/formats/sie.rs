//! SIE — строчно-блочный ледгер-формат Visma: токены в кавычках по правилам
//! shell, блоки верификаций в фигурных скобках, кодировка CP437 (IBM PC-8).

use crate::{
    error::{Result, SieError},
    model::{format_amount, DataField, SieData, SieDate, Transaction, Verification, FIELD_SPECS, TRANS, VER},
    traits::{ReadFormat, WriteFormat},
};
use codepage_437::{FromCp437, ToCp437, CP437_CONTROL};
use rust_decimal::Decimal;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

pub struct Sie;

/* -------------------------------- READ ---------------------------------- */

impl ReadFormat for Sie {
    fn read<R: BufRead>(&self, mut r: R) -> Result<SieData> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;
        parse(&String::from_cp437(bytes, &CP437_CONTROL))
    }
}

/// Разбирает целый SIE-текст в документ. Любая испорченная строка
/// прерывает разбор — половинных документов не бывает.
pub fn parse(input: &str) -> Result<SieData> {
    let mut doc = SieData::new();
    let mut current: Option<Verification> = None;
    let mut last_line = 0;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let tokens = tokenize(raw).map_err(|e| at(e, line_no))?;
        let Some(name) = tokens.first().cloned() else { continue };

        match name.as_str() {
            VER if current.is_none() => {
                current = Some(parse_verification(&tokens).map_err(|e| at(e, line_no))?);
            }
            // скобка открывает блок транзакций только что начатой верификации
            "{" => {}
            TRANS => match current.as_mut() {
                Some(ver) => {
                    let t = parse_transaction(&tokens).map_err(|e| at(e, line_no))?;
                    ver.add_transaction(t);
                }
                None => {
                    return Err(structure(line_no, raw, "transaction outside a verification block"));
                }
            },
            "}" => match current.take() {
                Some(done) => doc.add_verification(done),
                None => {
                    return Err(structure(line_no, raw, "unmatched } outside a verification"));
                }
            },
            _ if current.is_some() => {
                return Err(structure(line_no, raw, "unexpected record inside a verification block"));
            }
            _ => doc.add_field(DataField::from_tokens(tokens))?,
        }
    }

    if current.is_some() {
        return Err(structure(last_line, "", "unterminated verification block"));
    }
    Ok(doc)
}

/// Делит строку на токены по правилам shell: разделитель — пробельные
/// символы, двойные кавычки сохраняют пробелы, внутри кавычек допустимы
/// экраны `\"` и `\\`. `{` и `}` здесь — обычные токены.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut pending = false;
    let mut in_quotes = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => in_quotes = false,
                '\\' => match chars.next() {
                    Some(e @ ('"' | '\\')) => current.push(e),
                    _ => return Err(lex(line, "malformed escape")),
                },
                _ => current.push(c),
            }
        } else if c == '"' {
            in_quotes = true;
            pending = true;
        } else if c.is_whitespace() {
            if pending {
                tokens.push(std::mem::take(&mut current));
                pending = false;
            }
        } else {
            current.push(c);
            pending = true;
        }
    }

    if in_quotes {
        return Err(lex(line, "unterminated quote"));
    }
    if pending {
        tokens.push(current);
    }
    Ok(tokens)
}

/// `#VER серия номер дата [текст] [дата-рег] [подпись]`
fn parse_verification(tokens: &[String]) -> Result<Verification> {
    if tokens.len() < 4 {
        return Err(lex(&tokens.join(" "), "verification header needs series, number and date"));
    }
    if tokens.len() > 7 {
        return Err(lex(&tokens.join(" "), "too many fields in verification header"));
    }
    let mut v = Verification::new(&tokens[1], &tokens[2], SieDate::parse(&tokens[3])?);
    v.text = tokens.get(4).cloned().unwrap_or_default();
    v.reg_date = SieDate::parse(tokens.get(5).map_or("", String::as_str))?;
    v.sign = tokens.get(6).cloned().unwrap_or_default();
    Ok(v)
}

/// `#TRANS счёт {объекты} сумма [дата] [текст] [количество] [подпись]`
fn parse_transaction(tokens: &[String]) -> Result<Transaction> {
    let line = || tokens.join(" ");
    let account = tokens
        .get(1)
        .ok_or_else(|| lex(&line(), "transaction needs an account"))?;
    let (objects, next) = parse_objects(tokens, 2)?;

    let amount_tok = tokens
        .get(next)
        .ok_or_else(|| lex(&line(), "transaction needs an amount"))?;
    let amount: Decimal = amount_tok
        .parse()
        .map_err(|_| lex(&line(), "invalid amount"))?;

    if tokens.len() > next + 5 {
        return Err(lex(&line(), "too many fields in transaction"));
    }

    let mut t = Transaction::new(account, objects, amount);
    t.date = SieDate::parse(tokens.get(next + 1).map_or("", String::as_str))?;
    t.text = tokens.get(next + 2).cloned().unwrap_or_default();
    t.quantity = match tokens.get(next + 3).map_or("", String::as_str) {
        "" => None,
        q => Some(q.parse().map_err(|_| lex(&line(), "invalid quantity"))?),
    };
    t.sign = tokens.get(next + 4).cloned().unwrap_or_default();
    Ok(t)
}

/// Объектный список `{v1 v2 ...}`. Скобки могут быть приклеены к первому и
/// последнему значению (`{}`, `{2}`, `{"10" P-12345}`) или стоять отдельно:
/// сканируем вперёд до токена, оканчивающегося на `}`.
fn parse_objects(tokens: &[String], start: usize) -> Result<(Vec<String>, usize)> {
    let line = || tokens.join(" ");
    let first = tokens
        .get(start)
        .ok_or_else(|| lex(&line(), "transaction needs an object list"))?;
    let Some(mut piece) = first.strip_prefix('{') else {
        return Err(lex(&line(), "object list must start with {"));
    };

    let mut objects = Vec::new();
    let mut idx = start;
    loop {
        if let Some(stripped) = piece.strip_suffix('}') {
            if !stripped.is_empty() {
                objects.push(stripped.to_string());
            }
            return Ok((objects, idx + 1));
        }
        if !piece.is_empty() {
            objects.push(piece.to_string());
        }
        idx += 1;
        piece = tokens
            .get(idx)
            .ok_or_else(|| lex(&line(), "unterminated object list"))?
            .as_str();
    }
}

fn lex(content: &str, message: &str) -> SieError {
    SieError::Malformed {
        line: 0,
        message: message.to_string(),
        content: content.to_string(),
    }
}

fn structure(line: usize, content: &str, message: &str) -> SieError {
    SieError::Malformed {
        line,
        message: message.to_string(),
        content: content.to_string(),
    }
}

fn at(mut err: SieError, line_no: usize) -> SieError {
    if let SieError::Malformed { line, .. } = &mut err {
        *line = line_no;
    }
    err
}

/* -------------------------------- WRITE --------------------------------- */

impl WriteFormat for Sie {
    fn write<W: Write>(&self, mut w: W, doc: &SieData) -> Result<()> {
        let text = render(doc)?;
        let bytes = text
            .to_cp437(&CP437_CONTROL)
            .map_err(|_| SieError::Encoding("character outside CP437 in output".to_string()))?;
        w.write_all(&bytes)?;
        Ok(())
    }
}

/// Сериализует документ в SIE-текст. Повторный разбор результата даёт
/// документ, равный исходному; повторная сериализация — тот же байтовый
/// вывод. Неполный документ не выводится вовсе.
pub fn render(doc: &SieData) -> Result<String> {
    let missing = doc.missing_fields();
    if !missing.is_empty() {
        return Err(SieError::Incomplete(missing.join(" ")));
    }

    let mut out = String::new();
    // канонический порядок секций, а не порядок добавления
    for spec in FIELD_SPECS {
        if spec.name == VER {
            for v in doc.verifications() {
                render_verification(&mut out, v);
            }
        } else {
            for f in doc.fields(spec.name) {
                render_field(&mut out, f);
            }
        }
    }
    Ok(out)
}

fn render_field(out: &mut String, f: &DataField) {
    out.push_str(&f.name);
    for v in &f.values {
        out.push(' ');
        out.push_str(&quote(v));
    }
    out.push('\n');
}

fn render_verification(out: &mut String, v: &Verification) {
    let vals = [
        v.series.clone(),
        v.number.clone(),
        v.date.to_string(),
        v.text.clone(),
        v.reg_date.to_string(),
        v.sign.clone(),
    ];
    out.push_str(VER);
    push_trimmed(out, &vals);
    out.push_str("\n{\n");
    for t in &v.transactions {
        render_transaction(out, t);
    }
    out.push_str("}\n");
}

fn render_transaction(out: &mut String, t: &Transaction) {
    out.push_str("   ");
    out.push_str(TRANS);
    out.push(' ');
    out.push_str(&quote(&t.account));
    out.push_str(" {");
    let objs: Vec<String> = t.objects.iter().map(|o| quote(o)).collect();
    out.push_str(&objs.join(" "));
    out.push('}');
    let tail = [
        format_amount(t.amount),
        t.date.to_string(),
        t.text.clone(),
        t.quantity.map(format_amount).unwrap_or_default(),
        t.sign.clone(),
    ];
    push_trimmed(out, &tail);
    out.push('\n');
}

/// Значения записи фиксированной арности: хвостовой ряд пустых значений
/// опускается целиком, пустое значение в середине выводится как `""`.
fn push_trimmed(out: &mut String, vals: &[String]) {
    let end = vals.iter().rposition(|v| !v.is_empty()).map_or(0, |i| i + 1);
    for v in &vals[..end] {
        out.push(' ');
        out.push_str(&quote(v));
    }
}

/// Значение берётся в кавычки, если пусто или содержит пробелы, кавычки
/// либо обратную косую; иначе выводится как есть.
fn quote(value: &str) -> String {
    let needs = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs {
        return value.to_string();
    }
    let mut q = String::with_capacity(value.len() + 2);
    q.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            q.push('\\');
        }
        q.push(c);
    }
    q.push('"');
    q
}

/* ------------------------------ FILE I/O --------------------------------- */

impl Sie {
    /// Читает SIE-файл в кодировке CP437.
    pub fn read_file(path: impl AsRef<Path>) -> Result<SieData> {
        let bytes = fs::read(path)?;
        parse(&String::from_cp437(bytes, &CP437_CONTROL))
    }

    /// Пишет SIE-файл. Существующий файл назначения без `overwrite`
    /// не трогается.
    pub fn write_file(path: impl AsRef<Path>, doc: &SieData, overwrite: bool) -> Result<()> {
        let file = create_dest(path.as_ref(), overwrite)?;
        Sie.write(BufWriter::new(file), doc)
    }
}

/// Открывает файл назначения. Без `overwrite` существующий файл — ошибка
/// `DestinationExists`, устранимая на вызывающей стороне.
pub fn create_dest(path: &Path, overwrite: bool) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true);
    if overwrite {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    opts.open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::AlreadyExists => SieError::DestinationExists(path.to_path_buf()),
        _ => SieError::Io(e),
    })
}
