mod common;

use std::fs::File;

use common::{build_statement, date, ingest_str, line};
use rust_decimal_macros::dec;
use statement_ingest::error::{EngineError, ParseErrorKind, StorageFault, ValidationError};
use statement_ingest::ingest_statement;
use statement_ingest::ingestor::Ingestor;
use statement_ingest::models::DocumentId;
use statement_ingest::persistence::{InMemoryGateway, PersistenceGateway};
use statement_ingest::query::{QueryEngine, QueryRequest};
use statement_ingest::sqlite::SqliteGateway;
use statement_ingest::write_page_csv;

fn ana_and_bia() -> String {
    build_statement(&[
        line("Ana", "11144477735", "2024-01-10", "150.00"),
        line("Bia", "22255588846", "2024-02-05", "-20.50"),
    ])
}

#[test]
fn test_ana_bia_scenario() {
    let gateway = InMemoryGateway::new();
    let report = ingest_str(&gateway, &ana_and_bia());

    assert_eq!(report.inserted_count, 2);
    assert!(report.line_errors.is_empty());

    let engine = QueryEngine::new(&gateway);

    let by_document = engine
        .query(QueryRequest {
            document_id: Some("11144477735".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_document.transactions.len(), 1);
    assert_eq!(by_document.transactions[0].client_name, "Ana");
    assert_eq!(by_document.transactions[0].amount, dec!(150.00));
    assert_eq!(by_document.transactions[0].date, date(2024, 1, 10));

    let since_february = engine
        .query(QueryRequest {
            start_date: Some(date(2024, 2, 1)),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(since_february.transactions.len(), 1);
    assert_eq!(since_february.transactions[0].client_name, "Bia");
    assert_eq!(since_february.transactions[0].document_id.as_str(), "22255588846");
    assert_eq!(since_february.transactions[0].amount, dec!(-20.50));
}

#[test]
fn test_malformed_amount_among_valid_lines() {
    let gateway = InMemoryGateway::new();
    let statement = build_statement(&[
        line("Ana", "11144477735", "2024-01-10", "150.00"),
        line("Ana", "11144477735", "2024-01-11", "cento e vinte"),
        line("Bia", "22255588846", "2024-02-05", "-20.50"),
    ]);

    let report = ingest_str(&gateway, &statement);

    assert_eq!(report.inserted_count, 2);
    assert_eq!(report.line_errors.len(), 1);
    assert_eq!(report.line_errors[0].line_number, 2);
    assert_eq!(report.line_errors[0].kind, ParseErrorKind::InvalidAmount);
}

#[test]
fn test_fixture_file() {
    let gateway = InMemoryGateway::new();
    let input = File::open("tests/fixtures/statement.txt").unwrap();

    let report = ingest_statement(input, &gateway).unwrap();

    assert_eq!(report.inserted_count, 4);
    assert_eq!(report.clients_resolved, 3);
    assert_eq!(report.lines_read, 9);

    let errors: Vec<(usize, ParseErrorKind)> = report
        .line_errors
        .iter()
        .map(|e| (e.line_number, e.kind))
        .collect();
    assert_eq!(
        errors,
        vec![
            (6, ParseErrorKind::InvalidDocumentId),
            (7, ParseErrorKind::InvalidDate),
            (8, ParseErrorKind::InvalidAmount),
            (9, ParseErrorKind::MalformedLine),
        ]
    );

    let padaria = gateway
        .find_client(&DocumentId::normalize("11222333000181").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(padaria.name, "Padaria Pão Quente Ltda");
}

#[test]
fn test_same_document_on_many_lines_creates_one_client() {
    let gateway = InMemoryGateway::new();
    let statement = build_statement(&[
        line("Ana", "11144477735", "2024-01-10", "1.00"),
        line("Ana", "111.444.777-35", "2024-01-11", "2.00"),
        line("Ana", "111 444 777 35", "2024-01-12", "3.00"),
    ]);

    let report = ingest_str(&gateway, &statement);

    assert_eq!(report.inserted_count, 3);
    assert_eq!(report.clients_resolved, 1);
    assert_eq!(gateway.client_count(), 1);
}

#[test]
fn test_reingestion_corrects_name_keeps_identity() {
    let gateway = InMemoryGateway::new();
    ingest_str(&gateway, &line("Ana", "11144477735", "2024-01-10", "1.00"));
    ingest_str(&gateway, &line("Ana Souza", "11144477735", "2024-01-11", "2.00"));

    assert_eq!(gateway.client_count(), 1);

    let page = QueryEngine::new(&gateway)
        .query(QueryRequest::default())
        .unwrap();
    assert_eq!(page.transactions.len(), 2);
    assert!(page.transactions.iter().all(|t| t.client_name == "Ana Souza"));
}

#[test]
fn test_valid_and_invalid_counts_independent_of_order() {
    let valid = vec![
        line("Ana", "11144477735", "2024-01-10", "1.00"),
        line("Bia", "22255588846", "2024-01-11", "2.00"),
        line("Ana", "11144477735", "2024-01-12", "3.00"),
    ];
    let invalid = vec![
        line("Ana", "123", "2024-01-10", "1.00"),
        line("Ana", "11144477735", "2024-13-10", "1.00"),
        "only;three;fields".to_string(),
    ];

    let orderings: Vec<Vec<String>> = vec![
        valid.iter().chain(&invalid).cloned().collect(),
        invalid.iter().chain(&valid).cloned().collect(),
        valid
            .iter()
            .zip(&invalid)
            .flat_map(|(v, i)| [i.clone(), v.clone()])
            .collect(),
    ];

    for lines in orderings {
        let gateway = InMemoryGateway::new();
        let report = ingest_str(&gateway, &build_statement(&lines));
        assert_eq!(report.inserted_count, 3);
        assert_eq!(report.line_errors.len(), 3);
    }
}

#[test]
fn test_blank_lines_are_not_errors() {
    let gateway = InMemoryGateway::new();
    let statement = format!(
        "\n{}\n   \n\r\n{}\n\n",
        line("Ana", "11144477735", "2024-01-10", "1.00"),
        line("Bia", "22255588846", "2024-01-11", "2.00")
    );

    let report = ingest_str(&gateway, &statement);

    assert_eq!(report.inserted_count, 2);
    assert!(report.line_errors.is_empty());
}

#[test]
fn test_write_fault_leaves_no_rows() {
    let gateway = InMemoryGateway::new();
    gateway.fail_writes(true);

    let result = Ingestor::new(&gateway).ingest(ana_and_bia().as_bytes());
    assert!(matches!(result, Err(EngineError::Storage(_))));
    assert_eq!(gateway.transaction_count(), 0);

    gateway.fail_writes(false);
    let page = QueryEngine::new(&gateway)
        .query(QueryRequest::default())
        .unwrap();
    assert!(page.transactions.is_empty());
    assert_eq!(page.total_pages, 1);
}

#[test]
fn test_failed_upload_does_not_rename_client() {
    let gateway = InMemoryGateway::new();
    ingest_str(&gateway, &ana_and_bia());

    gateway.fail_writes(true);
    let renamed = build_statement(&[
        line("Ana Souza", "11144477735", "2024-03-01", "9.00"),
        line("Bia Lima", "22255588846", "2024-03-02", "8.00"),
    ]);
    assert!(Ingestor::new(&gateway).ingest(renamed.as_bytes()).is_err());
    gateway.fail_writes(false);

    let page = QueryEngine::new(&gateway)
        .query(QueryRequest::default())
        .unwrap();
    assert_eq!(page.total_count, 2);
    let names: Vec<&str> = page
        .transactions
        .iter()
        .map(|t| t.client_name.as_str())
        .collect();
    assert_eq!(names, vec!["Ana", "Bia"]);
}

#[test]
fn test_inverted_range_rejected_before_storage() {
    /// Gateway that fails on any read, proving validation short-circuits
    struct Unreachable;

    impl PersistenceGateway for Unreachable {
        fn upsert_client(
            &self,
            _: &DocumentId,
            _: &str,
        ) -> Result<statement_ingest::models::ClientRef, StorageFault> {
            unreachable!()
        }
        fn insert_transactions(
            &self,
            _: &[statement_ingest::models::NewTransaction],
        ) -> Result<Vec<statement_ingest::models::TransactionId>, StorageFault> {
            unreachable!()
        }
        fn find_client(
            &self,
            _: &DocumentId,
        ) -> Result<Option<statement_ingest::models::Client>, StorageFault> {
            unreachable!()
        }
        fn clients_by_refs(
            &self,
            _: &[statement_ingest::models::ClientRef],
        ) -> Result<Vec<statement_ingest::models::Client>, StorageFault> {
            unreachable!()
        }
        fn query_transactions(
            &self,
            _: &statement_ingest::persistence::TransactionFilter,
            _: u32,
            _: u32,
        ) -> Result<(Vec<statement_ingest::models::Transaction>, u64), StorageFault> {
            unreachable!()
        }
    }

    let result = QueryEngine::new(&Unreachable).query(QueryRequest {
        start_date: Some(date(2024, 3, 1)),
        end_date: Some(date(2024, 1, 1)),
        ..Default::default()
    });

    match result {
        Err(EngineError::Validation(ValidationError::InvalidDateRange { start, end })) => {
            assert_eq!(start, date(2024, 3, 1));
            assert_eq!(end, date(2024, 1, 1));
        }
        other => panic!("expected InvalidDateRange, got {:?}", other),
    }
}

#[test]
fn test_sqlite_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statements.db");

    {
        let gateway = SqliteGateway::open(&path).unwrap();
        let report = ingest_str(&gateway, &ana_and_bia());
        assert_eq!(report.inserted_count, 2);
    }

    // Reopen to check the data survived
    let gateway = SqliteGateway::open(&path).unwrap();
    let engine = QueryEngine::new(&gateway);

    let page = engine
        .query(QueryRequest {
            document_id: Some("111.444.777-35".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.transactions.len(), 1);
    assert_eq!(page.transactions[0].client_name, "Ana");
    assert_eq!(page.transactions[0].amount, dec!(150.00));

    let page = engine
        .query(QueryRequest {
            start_date: Some(date(2024, 2, 1)),
            end_date: Some(date(2024, 2, 29)),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.transactions.len(), 1);
    assert_eq!(page.transactions[0].client_name, "Bia");
}

#[test]
fn test_sqlite_same_document_across_uploads() {
    let gateway = SqliteGateway::open_in_memory().unwrap();
    ingest_str(&gateway, &ana_and_bia());
    ingest_str(&gateway, &ana_and_bia());

    let ana = gateway
        .find_client(&DocumentId::normalize("11144477735").unwrap())
        .unwrap()
        .unwrap();
    let page = QueryEngine::new(&gateway)
        .query(QueryRequest {
            document_id: Some("11144477735".to_string()),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(page.total_count, 2);
    assert!(page
        .transactions
        .iter()
        .all(|t| t.document_id == ana.document_id));
}

#[test]
fn test_sqlite_oversized_amount_is_a_line_error() {
    let gateway = SqliteGateway::open_in_memory().unwrap();
    let statement = build_statement(&[
        line("Ana", "11144477735", "2024-01-10", "150.00"),
        line("Bia", "22255588846", "2024-02-05", "100000000000000000000.00"),
    ]);

    let report = ingest_str(&gateway, &statement);

    assert_eq!(report.inserted_count, 1);
    assert_eq!(report.line_errors.len(), 1);
    assert_eq!(report.line_errors[0].line_number, 2);
    assert_eq!(report.line_errors[0].kind, ParseErrorKind::InvalidAmount);

    let page = QueryEngine::new(&gateway)
        .query(QueryRequest::default())
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.transactions[0].amount, dec!(150.00));
}

#[test]
fn test_sqlite_rejects_out_of_range_years() {
    let gateway = SqliteGateway::open_in_memory().unwrap();
    let statement = build_statement(&[
        line("Ana", "11144477735", "+12345-01-10", "1.00"),
        line("Ana", "11144477735", "2024-01-10", "2.00"),
        line("Ana", "11144477735", "9999-12-31", "3.00"),
    ]);

    let report = ingest_str(&gateway, &statement);
    assert_eq!(report.inserted_count, 2);
    assert_eq!(report.line_errors.len(), 1);
    assert_eq!(report.line_errors[0].kind, ParseErrorKind::InvalidDate);

    let page = QueryEngine::new(&gateway)
        .query(QueryRequest {
            start_date: Some(date(2024, 1, 1)),
            end_date: Some(date(2024, 12, 31)),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.transactions[0].amount, dec!(2.00));
}

#[test]
fn test_csv_output() {
    let gateway = InMemoryGateway::new();
    ingest_str(&gateway, &ana_and_bia());
    let page = QueryEngine::new(&gateway)
        .query(QueryRequest::default())
        .unwrap();

    let mut output = Vec::new();
    write_page_csv(&page, &mut output).unwrap();
    let output = String::from_utf8(output).unwrap();

    assert!(output.starts_with("id,clientName,documentId,date,amount\n"));
    assert!(output.contains("1,Ana,11144477735,2024-01-10,150.00"));
    assert!(output.contains("2,Bia,22255588846,2024-02-05,-20.50"));
}

#[test]
fn test_json_report_shape() {
    let gateway = InMemoryGateway::new();
    let report = ingest_str(
        &gateway,
        &build_statement(&[line("Ana", "123", "2024-01-10", "1.00")]),
    );

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["insertedCount"], 0);
    assert_eq!(json["lineErrors"][0]["lineNumber"], 1);
    assert_eq!(json["lineErrors"][0]["kind"], "InvalidDocumentId");
    assert!(json["elapsedMillis"].is_u64());
}
