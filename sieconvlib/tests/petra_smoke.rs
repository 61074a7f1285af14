use rust_decimal::Decimal;
use sieconvlib::error::SieError;
use sieconvlib::formats::petra::{PetraReader, PetraWriter, Tables};
use sieconvlib::formats::sie::parse;
use sieconvlib::model::{SieData, SieDate, Transaction, Verification};
use sieconvlib::table::CsvTable;
use sieconvlib::traits::{ReadFormat, WriteFormat};
use std::io::Cursor;

const ACCOUNTS: &str = "V_Kto;P_Kto\n1930;5601\n3010;8500\n";
const COST_CENTERS: &str = "V_Kst;P_Kst\nK2612;1200\n";
const PROJECTS: &str = "V_Proj;P_Kst\nP-12345;1300\n";

fn tables(key_headers: [&str; 3]) -> Tables {
    Tables {
        account: CsvTable::from_reader("konto", ACCOUNTS.as_bytes(), key_headers[0])
            .expect("accounts"),
        cost_center: CsvTable::from_reader("kst", COST_CENTERS.as_bytes(), key_headers[1])
            .expect("cost centers"),
        project: CsvTable::from_reader("proj", PROJECTS.as_bytes(), key_headers[2])
            .expect("projects"),
    }
}

fn forward_tables() -> Tables {
    tables(["V_Kto", "V_Kst", "V_Proj"])
}

fn reversed_tables() -> Tables {
    tables(["P_Kto", "P_Kst", "P_Kst"])
}

const SAMPLE: &str = r#"#FLAGGA 0
#PROGRAM "Visma Administration 2000" 20.1
#FORMAT PC8
#GEN 20170131
#SIETYP 4
#FNAMN Firma
#KONTO 1930 Bank
#KONTO 3010 Sales
#VER A 170001 20170131 "Lön januari"
{
   #TRANS 1930 {} -50.5
   #TRANS 3010 {1 K2612} 50.5 20170131 "Lön"
}
"#;

fn write_rows(writer: &PetraWriter, doc: &SieData) -> Vec<String> {
    let mut out = Vec::new();
    writer.write(&mut out, doc).expect("write");
    let text = String::from_utf8(out).expect("utf-8");
    let text = text.strip_prefix('\u{feff}').expect("BOM").to_string();
    text.lines().map(str::to_string).collect()
}

#[test]
fn writer_produces_batch_journal_and_transaction_rows() {
    let doc = parse(SAMPLE).expect("parse");
    let writer = PetraWriter::new(forward_tables(), "3200");
    let lines = write_rows(&writer, &doc);

    assert_eq!(lines[0], ";CC;Account;Narrative;Reference;Date;Dt;Ct");
    assert_eq!(lines[1], "B;Imported from Visma 2017-01;50.5;31/01/2017;;;;");
    assert_eq!(
        lines[2],
        "J;Visma Ver A170001 - Lön januari;GL;STD;SEK;1;31/01/2017;"
    );
    assert_eq!(lines[3], ";;;;;;;");
    assert_eq!(
        lines[4],
        "T;3200;5601;Lön januari;Visma Ver A170001;31/01/2017;0;50.5"
    );
    assert_eq!(
        lines[5],
        "T;1200;8500;Lön;Visma Ver A170001;31/01/2017;50.5;0"
    );
    assert_eq!(lines[6], ";;;;;;;");
}

#[test]
fn project_object_overrides_cost_center() {
    let mut doc = parse(SAMPLE).expect("parse");
    let mut ver = Verification::new("A", "2", SieDate::parse("20170131").expect("date"));
    let objects = ["1", "K2612", "6", "P-12345"].map(str::to_string).to_vec();
    ver.add_transaction(Transaction::new("1930", objects.clone(), "50".parse().expect("dec")));
    ver.add_transaction(Transaction::new("3010", vec![], "-50".parse().expect("dec")));
    doc.add_verification(ver);

    let writer = PetraWriter::new(forward_tables(), "3200");
    let lines = write_rows(&writer, &doc);
    assert!(lines.iter().any(|l| l.starts_with("T;1300;5601;")), "{lines:?}");

    // игнорируемый код проекта отдаёт приоритет центру затрат
    let writer = PetraWriter::new(forward_tables(), "3200").ignore_project("P-12345");
    let lines = write_rows(&writer, &doc);
    assert!(lines.iter().any(|l| l.starts_with("T;1200;5601;")), "{lines:?}");
    assert!(!lines.iter().any(|l| l.starts_with("T;1300;")), "{lines:?}");
}

#[test]
fn zero_quantity_is_left_out_of_the_narrative() {
    let mut doc = parse(SAMPLE).expect("parse");
    let mut ver = Verification::new("A", "170002", SieDate::parse("20170131").expect("date"));
    let mut debit = Transaction::new("1930", vec![], "50".parse().expect("dec"));
    debit.text = "Fee".to_string();
    debit.quantity = Some(Decimal::ZERO);
    ver.add_transaction(debit);
    let mut credit = Transaction::new("3010", vec![], "-50".parse().expect("dec"));
    credit.text = "Fee".to_string();
    credit.quantity = Some("2".parse().expect("dec"));
    ver.add_transaction(credit);
    doc.add_verification(ver);

    let writer = PetraWriter::new(forward_tables(), "3200");
    let lines = write_rows(&writer, &doc);
    assert!(lines.iter().any(|l| l.starts_with("T;3200;5601;Fee;")), "{lines:?}");
    assert!(lines.iter().any(|l| l.starts_with("T;3200;8500;Fee 2;")), "{lines:?}");
}

#[test]
fn unbalanced_verification_is_rejected() {
    let mut doc = parse(SAMPLE).expect("parse");
    let mut ver = Verification::new("A", "170002", SieDate::parse("20170131").expect("date"));
    ver.add_transaction(Transaction::new("1930", vec![], "-50.00".parse().expect("dec")));
    ver.add_transaction(Transaction::new("3010", vec![], "49.99".parse().expect("dec")));
    doc.add_verification(ver);

    let writer = PetraWriter::new(forward_tables(), "3200");
    let err = writer.write(Vec::new(), &doc).unwrap_err();
    match err {
        SieError::Unbalanced { series, number, diff } => {
            assert_eq!(series, "A");
            assert_eq!(number, "170002");
            assert_eq!(diff, "-0.01".parse::<Decimal>().expect("dec"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_account_code_is_a_key_missing_error() {
    let mut doc = parse(SAMPLE).expect("parse");
    let mut ver = Verification::new("A", "170003", SieDate::parse("20170131").expect("date"));
    ver.add_transaction(Transaction::new("9999", vec![], "50".parse().expect("dec")));
    ver.add_transaction(Transaction::new("1930", vec![], "-50".parse().expect("dec")));
    doc.add_verification(ver);

    let writer = PetraWriter::new(forward_tables(), "3200");
    let err = writer.write(Vec::new(), &doc).unwrap_err();
    match err {
        SieError::KeyMissing { key, .. } => assert_eq!(key, "9999"),
        other => panic!("unexpected error: {other}"),
    }
}

const PETRA_EXPORT: &str = "\
;CC;Account;Narrative;Reference;Date;Dt;Ct\n\
J;Payroll January;GL;STD;SEK;1;31/01/2017;\n\
;;;;;;;\n\
T;1200;5601;Salary;ref;31/01/2017;;50,5\n\
T;1200;8500;Salary;ref;31/01/2017;50,5;\n\
;;;;;;;\n";

#[test]
fn reader_builds_one_verification_per_journal() {
    let reader = PetraReader::new(reversed_tables(), "P");
    let doc = reader
        .read(Cursor::new(PETRA_EXPORT.as_bytes().to_vec()))
        .expect("read");

    let vers = doc.verifications();
    assert_eq!(vers.len(), 1);
    let ver = &vers[0];
    assert_eq!(ver.series, "P");
    assert_eq!(ver.number, "1");
    assert_eq!(ver.text, "Payroll January");
    assert_eq!(ver.date.to_string(), "20170131");
    assert!(ver.in_balance());

    assert_eq!(ver.transactions.len(), 2);
    let first = &ver.transactions[0];
    assert_eq!(first.account, "1930");
    assert_eq!(first.objects, vec!["1", "K2612"]);
    assert_eq!(first.amount, "-50.5".parse::<Decimal>().expect("dec"));
    assert_eq!(first.text, "Salary");
    let second = &ver.transactions[1];
    assert_eq!(second.account, "3010");
    assert_eq!(second.amount, "50.5".parse::<Decimal>().expect("dec"));
}

#[test]
fn reader_numbers_journals_sequentially() {
    let two = format!("{PETRA_EXPORT}{}", &PETRA_EXPORT[PETRA_EXPORT.find('J').expect("J")..]);
    let reader = PetraReader::new(reversed_tables(), "P");
    let doc = reader.read(Cursor::new(two.into_bytes())).expect("read");
    let numbers: Vec<&str> = doc.verifications().iter().map(|v| v.number.as_str()).collect();
    assert_eq!(numbers, vec!["1", "2"]);
}

#[test]
fn reader_falls_back_for_unknown_account() {
    let input = PETRA_EXPORT.replace("5601", "4444");
    let reader = PetraReader::new(reversed_tables(), "P");
    let err = reader.read(Cursor::new(input.clone().into_bytes())).unwrap_err();
    assert!(matches!(err, SieError::KeyMissing { .. }), "{err}");

    let reader = PetraReader::new(reversed_tables(), "P").fallback_account("9999");
    let doc = reader.read(Cursor::new(input.into_bytes())).expect("read");
    assert_eq!(doc.verifications()[0].transactions[0].account, "9999");
}

#[test]
fn transaction_row_outside_journal_is_fatal() {
    let input = ";CC;Account;Narrative;Reference;Date;Dt;Ct\nT;1200;5601;x;ref;31/01/2017;1;\n";
    let reader = PetraReader::new(reversed_tables(), "P");
    let err = reader.read(Cursor::new(input.as_bytes().to_vec())).unwrap_err();
    assert!(matches!(err, SieError::Malformed { .. }), "{err}");
}
