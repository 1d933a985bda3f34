//! Statement line decoding
//!
//! A statement is a text file with one transaction per line:
//!
//! ```text
//! name;document id;date;amount
//! Ana Souza;111.444.777-35;2024-01-10;150.00
//! "Padaria Pão; Cia";11.222.333/0001-81;05/02/2024;-20.50
//! ```
//!
//! Fields are trimmed and may be double-quoted. Dates are ISO (`YYYY-MM-DD`)
//! or day-first (`DD/MM/YYYY`). Amounts carry at most two fractional digits.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::error::{ParseError, ParseErrorKind};
use crate::models::DocumentId;

/// Separator between the four fields of a statement line
pub const FIELD_DELIMITER: u8 = b';';

/// Fractional digits of a currency amount (minor units)
pub const AMOUNT_SCALE: u32 = 2;

const FIELD_COUNT: usize = 4;
/// Four-digit years only, so stored `YYYY-MM-DD` text sorts chronologically
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const UTF8_BOM: &str = "\u{feff}";

/// One successfully decoded statement line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub line_number: usize,
    pub name: String,
    pub document_id: DocumentId,
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// Parse outcomes of one uploaded file, in line order
#[derive(Debug, Default)]
pub struct UploadBatch {
    pub lines_read: usize,
    pub records: Vec<ParsedRecord>,
    pub line_errors: Vec<ParseError>,
}

/// Decode raw upload bytes to text.
///
/// Strips a UTF-8 byte order mark. Bytes that are not valid UTF-8 are read as
/// ISO-8859-1, which is what most Brazilian bank exports use.
pub fn decode_statement(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    };

    match text.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

/// Parse every line of a decoded statement.
///
/// Line numbers are 1-based. Blank lines count towards numbering but produce
/// neither a record nor an error.
pub fn parse_statement(text: &str) -> UploadBatch {
    let mut batch = UploadBatch::default();

    for (index, line) in text.lines().enumerate() {
        batch.lines_read += 1;
        match parse_line(index + 1, line) {
            Ok(Some(record)) => batch.records.push(record),
            Ok(None) => {}
            Err(error) => batch.line_errors.push(error),
        }
    }

    batch
}

/// Parse a single statement line.
///
/// Returns `Ok(None)` for blank lines. Pure: no I/O, no shared state.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<ParsedRecord>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let fields = split_fields(line);
    if fields.len() != FIELD_COUNT {
        return Err(ParseError::new(
            line_number,
            ParseErrorKind::MalformedLine,
            format!("expected {} fields, found {}", FIELD_COUNT, fields.len()),
        ));
    }

    let name = fields[0].clone();
    if name.is_empty() {
        return Err(ParseError::new(
            line_number,
            ParseErrorKind::MalformedLine,
            "client name is empty",
        ));
    }

    let document_id = DocumentId::normalize(&fields[1]).ok_or_else(|| {
        ParseError::new(
            line_number,
            ParseErrorKind::InvalidDocumentId,
            format!("'{}' is neither a CPF nor a CNPJ", fields[1]),
        )
    })?;

    let date = parse_date(&fields[2]).ok_or_else(|| {
        ParseError::new(
            line_number,
            ParseErrorKind::InvalidDate,
            format!("'{}' is not a calendar date", fields[2]),
        )
    })?;

    let amount = parse_amount(&fields[3]).ok_or_else(|| {
        ParseError::new(
            line_number,
            ParseErrorKind::InvalidAmount,
            format!("'{}' is not a currency amount", fields[3]),
        )
    })?;

    Ok(Some(ParsedRecord {
        line_number,
        name,
        document_id,
        date,
        amount,
    }))
}

/// Split a line on the field delimiter, honouring double quotes
fn split_fields(line: &str) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => record.iter().map(str::to_string).collect(),
        // A non-empty line always yields a record; anything else is unusable
        _ => Vec::new(),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .filter(|date| YEAR_RANGE.contains(&date.year()))
}

/// Signed decimal with at most `AMOUNT_SCALE` fractional digits, rescaled to exactly that.
///
/// The value must also fit in `i64` minor units.
fn parse_amount(raw: &str) -> Option<Decimal> {
    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty()
            || frac.len() > AMOUNT_SCALE as usize
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
    }

    let mut amount = Decimal::from_str(unsigned).ok()?;
    amount.rescale(AMOUNT_SCALE);
    if amount.scale() != AMOUNT_SCALE || i64::try_from(amount.mantissa()).is_err() {
        return None;
    }
    if negative {
        amount.set_sign_negative(true);
    }
    Some(amount)
}
