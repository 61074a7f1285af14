use sieconvlib::error::SieError;
use sieconvlib::table::CsvTable;

const KONTO: &str = "V_Kto;P_Acct\n1930;5601\n3010;8500\n";

#[test]
fn forward_orientation_when_key_header_matches() {
    let table = CsvTable::from_reader("konto", KONTO.as_bytes(), "V_Kto").expect("table");
    assert_eq!(table.get("1930").expect("1930"), "5601");
    assert_eq!(table.get("3010").expect("3010"), "8500");
    assert_eq!(table.len(), 2);
}

#[test]
fn reversed_orientation_when_key_is_second_column() {
    let table = CsvTable::from_reader("konto", KONTO.as_bytes(), "P_Acct").expect("table");
    assert_eq!(table.get("5601").expect("5601"), "1930");
    assert!(table.lookup("1930").is_none());
}

#[test]
fn missing_key_is_distinguishable() {
    let table = CsvTable::from_reader("konto", KONTO.as_bytes(), "V_Kto").expect("table");
    let err = table.get("9999").unwrap_err();
    match err {
        SieError::KeyMissing { table, key } => {
            assert_eq!(table, "konto");
            assert_eq!(key, "9999");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rows_with_empty_keys_are_skipped() {
    let table =
        CsvTable::from_reader("konto", "V_Kto;P_Acct\n;5601\n1930;1111\n".as_bytes(), "V_Kto")
            .expect("table");
    assert_eq!(table.len(), 1);
    assert!(table.contains("1930"));
}
