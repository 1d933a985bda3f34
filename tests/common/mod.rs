#![allow(dead_code)]

use chrono::NaiveDate;
use statement_ingest::ingestor::{IngestReport, Ingestor};
use statement_ingest::persistence::PersistenceGateway;

/// Helper to build a calendar date
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper to format one statement line
pub fn line(name: &str, document: &str, date: &str, amount: &str) -> String {
    format!("{};{};{};{}", name, document, date, amount)
}

/// Join statement lines into file contents
pub fn build_statement(lines: &[String]) -> String {
    let mut statement = String::new();
    for line in lines {
        statement.push_str(line);
        statement.push('\n');
    }
    statement
}

/// Ingest a statement string into `gateway`, panicking on storage faults
pub fn ingest_str<G: PersistenceGateway>(gateway: &G, statement: &str) -> IngestReport {
    Ingestor::new(gateway)
        .ingest(statement.as_bytes())
        .expect("ingestion should not hit a storage fault")
}

/// `count` valid lines for one client, one per day starting 2024-01-01
pub fn daily_lines(name: &str, document: &str, count: u32) -> Vec<String> {
    (0..count)
        .map(|i| {
            let day = date(2024, 1, 1) + chrono::Duration::days(i64::from(i));
            line(name, document, &day.to_string(), &format!("{}.00", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_statement() {
        let statement = build_statement(&[
            line("Ana", "11144477735", "2024-01-10", "150.00"),
            line("Bia", "22255588846", "2024-02-05", "-20.50"),
        ]);

        assert_eq!(
            statement,
            "Ana;11144477735;2024-01-10;150.00\nBia;22255588846;2024-02-05;-20.50\n"
        );
    }

    #[test]
    fn test_daily_lines() {
        let lines = daily_lines("Ana", "11144477735", 3);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "Ana;11144477735;2024-01-03;3.00");
    }
}
