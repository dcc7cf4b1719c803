//! Claim table parsing from CSV uploads

use crate::error::{IntakeError, Result};
use crate::types::claim::ClaimRow;
use tracing::warn;

pub const CLAIM_AMOUNT: &str = "Claim Amount";
pub const DIAGNOSIS: &str = "Diagnosis";
pub const DATE_OF_SERVICE: &str = "Date of Service";
pub const CLAIM_FREQUENCY: &str = "Claim Frequency";

/// Columns every claim table must have
pub const REQUIRED_COLUMNS: [&str; 3] = [CLAIM_AMOUNT, DIAGNOSIS, DATE_OF_SERVICE];

struct ColumnIndex {
    claim_amount: usize,
    diagnosis: usize,
    date_of_service: usize,
    claim_frequency: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let names: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .collect();
        let find = |column: &str| names.iter().position(|h| *h == column);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| find(**c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(IntakeError::MissingColumns(missing));
        }

        Ok(Self {
            claim_amount: find(CLAIM_AMOUNT).unwrap_or_default(),
            diagnosis: find(DIAGNOSIS).unwrap_or_default(),
            date_of_service: find(DATE_OF_SERVICE).unwrap_or_default(),
            claim_frequency: find(CLAIM_FREQUENCY),
        })
    }
}

/// Parse an uploaded claim table.
///
/// Required columns are checked before any row is read; extra columns are
/// ignored. A blank or non-numeric amount leaves that row without an amount
/// rather than failing the table. Row numbers in errors are 1-based data rows.
pub fn parse_claims(bytes: &[u8]) -> Result<Vec<ClaimRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| IntakeError::InvalidInput(format!("Unreadable CSV header: {e}")))?
        .clone();
    let columns = ColumnIndex::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let line = i + 1;
        let record =
            record.map_err(|e| IntakeError::InvalidInput(format!("Unreadable CSV row {line}: {e}")))?;
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        rows.push(ClaimRow {
            claim_amount: parse_amount(cell(columns.claim_amount), line),
            diagnosis: cell(columns.diagnosis).to_string(),
            date_of_service: cell(columns.date_of_service).to_string(),
            claim_frequency: columns
                .claim_frequency
                .map(|idx| parse_frequency(cell(idx), line))
                .transpose()?
                .flatten(),
        });
    }

    if rows.is_empty() {
        return Err(IntakeError::InvalidInput(
            "CSV contains no claim rows".to_string(),
        ));
    }

    Ok(rows)
}

fn parse_amount(raw: &str, line: usize) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    let amount = raw.parse::<f64>().ok().filter(|v| v.is_finite());
    if amount.is_none() {
        warn!(row = line, value = %raw, "Unreadable claim amount, row kept without it");
    }
    amount
}

/// Empty cells mean "absent"; integral floats such as `2.0` are accepted.
fn parse_frequency(raw: &str, line: usize) -> Result<Option<u32>> {
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = raw.parse::<u32>() {
        return Ok(Some(v));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&v) => Ok(Some(v as u32)),
        _ => Err(IntakeError::InvalidInput(format!(
            "Invalid {CLAIM_FREQUENCY} '{raw}' in row {line}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_required_columns() {
        let csv = "Invoice ID,Claim Amount,Diagnosis,Date of Service\n\
                   INV-1,500,Flu,2024-01-01\n\
                   INV-2,5000.50,Surgery,2024-01-10\n";

        let rows = parse_claims(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ClaimRow::new(500.0, "Flu", "2024-01-01"));
        assert_eq!(rows[1].claim_amount, Some(5000.5));
        assert_eq!(rows[1].claim_frequency, None);
    }

    #[test]
    fn test_missing_diagnosis_column_is_named() {
        let csv = "Claim Amount,Date of Service\n500,2024-01-01\n";

        match parse_claims(csv.as_bytes()) {
            Err(IntakeError::MissingColumns(cols)) => assert_eq!(cols, vec!["Diagnosis"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_all_missing_columns_listed() {
        let csv = "Patient Name\nJane\n";
        let err = parse_claims(csv.as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required columns: Claim Amount, Diagnosis, Date of Service"
        );
    }

    #[test]
    fn test_claim_frequency_column() {
        let csv = "Claim Amount,Diagnosis,Date of Service,Claim Frequency\n\
                   100,Flu,2024-01-01,3\n\
                   100,Flu,2024-01-01,\n\
                   100,Flu,2024-01-01,2.0\n";

        let rows = parse_claims(csv.as_bytes()).unwrap();
        let freqs: Vec<Option<u32>> = rows.iter().map(|r| r.claim_frequency).collect();
        assert_eq!(freqs, vec![Some(3), None, Some(2)]);
    }

    #[test]
    fn test_unreadable_amounts_stay_in_table() {
        let csv = "Claim Amount,Diagnosis,Date of Service\n\
                   500,Flu,2024-01-01\n\
                   ,Flu,2024-01-02\n\
                   abc,Surgery,2024-01-03\n\
                   700,Flu,2024-01-04\n";

        let rows = parse_claims(csv.as_bytes()).unwrap();
        let amounts: Vec<Option<f64>> = rows.iter().map(|r| r.claim_amount).collect();
        assert_eq!(amounts, vec![Some(500.0), None, None, Some(700.0)]);
        assert_eq!(rows[1], ClaimRow::without_amount("Flu", "2024-01-02"));
    }

    #[test]
    fn test_header_only_is_rejected() {
        let csv = "Claim Amount,Diagnosis,Date of Service\n";
        assert!(matches!(
            parse_claims(csv.as_bytes()),
            Err(IntakeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bom_and_whitespace_in_headers() {
        let csv = "\u{feff}Claim Amount , Diagnosis,Date of Service\n 250 , Flu ,2024-02-01\n";
        let rows = parse_claims(csv.as_bytes()).unwrap();
        assert_eq!(rows[0], ClaimRow::new(250.0, "Flu", "2024-02-01"));
    }
}
