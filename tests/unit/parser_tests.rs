use nomina::assert_logged;
use nomina::ingest::{BulkLoader, LoadMode, RecordParser, TextEncoding};
use nomina::test_utils::fixtures::{CsvRow, HEADER, SourceFixture, record_line};
use nomina::test_utils::logging::capture_logs;
use nomina::test_utils::{TestCase, run_table_tests};
use tracing::Level;

#[test]
fn test_pair_extraction_table() {
    let cases = vec![
        TestCase {
            name: "scalar columns only",
            input: CsvRow::new("ABCD800101AAA", "UNO").to_line_with_columns(11),
            expected: Some(0),
        },
        TestCase {
            name: "too few columns",
            input: "0701,A1,ABCD800101AAA".to_string(),
            expected: None,
        },
        TestCase {
            name: "48 columns never reach the amount region",
            input: CsvRow::new("ABCD800101AAA", "UNO")
                .with_item(0, "SUELDO", "100")
                .to_line_with_columns(48),
            expected: Some(0),
        },
        TestCase {
            name: "one pair",
            input: record_line("ABCD800101AAA", "UNO", &[("SUELDO", "100")]),
            expected: Some(1),
        },
        TestCase {
            name: "blank and nan labels skipped",
            input: CsvRow::new("ABCD800101AAA", "UNO")
                .with_item(0, "SUELDO", "100")
                .with_item(1, "NaN", "5")
                .with_item(3, "ISR", "-10")
                .to_line(),
            expected: Some(2),
        },
        TestCase {
            name: "quotes stripped from labels",
            input: CsvRow::new("ABCD800101AAA", "UNO")
                .with_item(0, "\"BONO\"", "\"50\"")
                .to_line(),
            expected: Some(1),
        },
        TestCase {
            name: "extra trailing columns ignored",
            input: CsvRow::new("ABCD800101AAA", "UNO")
                .with_item(36, "ULTIMO", "1")
                .to_line_with_columns(120),
            expected: Some(1),
        },
    ];

    let parser = RecordParser::default();
    run_table_tests(cases, |line| {
        parser.parse_line(&line).map(|record| {
            assert_eq!(record.conceptos().len(), record.importes().len());
            record.conceptos().len()
        })
    })
    .unwrap();
}

#[test]
fn test_scalars_survive_trimming() {
    let line = " 0701 , A1 ,\"ABCD800101AAA\", JUAN PEREZ ,150000,15DPR0001Z,1000001,DOCENTE,20240101,20240115,ORD";
    let record = RecordParser::default().parse_line(line).unwrap();
    assert_eq!(record.rfc(), "ABCD800101AAA");
    assert_eq!(record.nombre(), "JUAN PEREZ");
    assert!((record.liquido_pesos() - 1500.0).abs() < f64::EPSILON);
    assert_eq!(record.period_label(), "20240101 al 20240115");
}

#[test]
fn test_latin1_source_decodes() {
    let fixture = SourceFixture::new();
    let mut bytes = HEADER.as_bytes().to_vec();
    bytes.push(b'\n');
    bytes.extend_from_slice(b"0701,A1,PEMA800101AAA,JOS\xC9 PE\xD1A,100,15DPR0001Z,1,D,20240101,20240115,ORD\n");
    let path = fixture.write_bytes("latin1.csv", &bytes);

    let (records, report) = BulkLoader::for_path(path).load_all().unwrap();
    assert_eq!(report.mode, LoadMode::Whole);
    assert_eq!(report.encoding, Some(TextEncoding::Latin1));
    assert_eq!(records[0].nombre(), "JOSÉ PEÑA");
}

#[test]
fn test_windows_1252_source_decodes() {
    let fixture = SourceFixture::new();
    let mut bytes = HEADER.as_bytes().to_vec();
    bytes.push(b'\n');
    // 0x93/0x94 are curly quotes in cp1252 and C1 controls in Latin-1.
    bytes.extend_from_slice(b"0701,A1,PEMA800101AAA,\x93PEPE\x94,100,15DPR0001Z,1,D,20240101,20240115,ORD\n");
    let path = fixture.write_bytes("cp1252.csv", &bytes);

    let (records, report) = BulkLoader::for_path(path).load_all().unwrap();
    assert_eq!(report.encoding, Some(TextEncoding::Windows1252));
    assert_eq!(records[0].nombre(), "\u{201C}PEPE\u{201D}");
}

#[test]
fn test_non_utf8_source_logs_fallback() {
    let fixture = SourceFixture::new();
    let mut bytes = HEADER.as_bytes().to_vec();
    bytes.extend_from_slice(b"\n0701,A1,PEMA800101AAA,MU\xD1OZ,100,15DPR0001Z,1,D,20240101,20240115,ORD\n");
    let path = fixture.write_bytes("fallback.csv", &bytes);

    let (loaded, logs) = capture_logs(Level::DEBUG, || BulkLoader::for_path(path).load_all());
    assert_eq!(loaded.unwrap().0.len(), 1);
    assert_logged!(logs, Level::WARN, "decoded with fallback");

    let summary = logs.find(Level::INFO, "payroll source loaded").unwrap();
    assert_eq!(summary.field("records"), Some("1"));
}

#[test]
fn test_header_and_blank_lines_are_skipped() {
    let fixture = SourceFixture::new();
    let path = fixture.write_source(
        "blank.csv",
        &[
            String::new(),
            record_line("ABCD800101AAA", "UNO", &[]),
            "   ".to_string(),
            record_line("EFGH800101AAA", "DOS", &[]),
        ],
    );

    let (records, report) = BulkLoader::for_path(path).load_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(report.stats.rejected, 0);
}
