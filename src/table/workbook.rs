use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

use super::{Table, Value};
use crate::datetime;
use crate::error::{PipelineError, Result};

/// Read the first worksheet of an `.xlsx` or `.xls` workbook. The first row
/// holds the column names; fully blank rows are skipped.
pub fn read_workbook(bytes: &[u8]) -> Result<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| PipelineError::parse("workbook", e))?;

    let sheet_names = workbook.sheet_names();
    debug!(?sheet_names, "opened workbook");

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::parse("workbook", "workbook has no worksheets"))?
        .map_err(|e| PipelineError::parse("workbook", e))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| PipelineError::parse("workbook", "missing header row"))?;
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| header_name(i, cell))
        .collect();

    let records: Vec<Vec<Value>> = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|v| !v.is_null()))
        .collect();

    Table::new(columns, records)
}

fn header_name(index: usize, cell: &Data) -> String {
    let name = match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    };
    if name.is_empty() {
        format!("column_{}", index + 1)
    } else {
        name
    }
}

/// Map a workbook cell onto the table's scalar type. Whole-number floats
/// become integers, the way spreadsheets store them.
pub(crate) fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Bool(b) => Value::Bool(*b),
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::Int(*f as i64),
        Data::Float(f) => Value::Float(*f),
        Data::String(s) => match s.trim() {
            "" => Value::Null,
            t => Value::Text(t.to_string()),
        },
        Data::DateTime(dt) if dt.is_duration() => Value::Float(dt.as_f64()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Value::DateTime)
            .unwrap_or(Value::Float(dt.as_f64())),
        Data::DateTimeIso(s) => datetime::parse_datetime(s)
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Text(s.clone())),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::build_payload;
    use crate::table::load_table;
    use calamine::CellErrorType;
    use chrono::NaiveDate;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    /// Header, one full row, a blank row, then a row holding only a ticket.
    fn tickets_xlsx() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let stamp = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        sheet.write_string(0, 0, "TicketNumber").unwrap();
        sheet.write_string(0, 1, "msdyn_receiveddate").unwrap();
        sheet.write_string(0, 2, "Priority").unwrap();
        sheet.write_string(1, 0, "T-1").unwrap();
        let received = ExcelDateTime::parse_from_str("2024-05-01T12:30:00").unwrap();
        sheet.write_datetime_with_format(1, 1, &received, &stamp).unwrap();
        sheet.write_number(1, 2, 2.0).unwrap();
        sheet.write_string(3, 0, "T-3").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn cells_map_to_values() {
        assert_eq!(cell_value(&Data::Empty), Value::Null);
        assert_eq!(cell_value(&Data::Error(CellErrorType::Div0)), Value::Null);
        assert_eq!(cell_value(&Data::Float(3.0)), Value::Int(3));
        assert_eq!(cell_value(&Data::Float(3.25)), Value::Float(3.25));
        assert_eq!(cell_value(&Data::Int(9)), Value::Int(9));
        assert_eq!(
            cell_value(&Data::String(" T-1 ".into())),
            Value::Text("T-1".into())
        );
        assert_eq!(cell_value(&Data::String("   ".into())), Value::Null);
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-05-01T12:30:00".into())),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 5, 1)
                    .unwrap()
                    .and_hms_opt(12, 30, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn header_names_fill_blanks() {
        assert_eq!(header_name(0, &Data::String(" TicketNumber ".into())), "TicketNumber");
        assert_eq!(header_name(2, &Data::Empty), "column_3");
        assert_eq!(header_name(1, &Data::Int(7)), "7");
    }

    #[test]
    fn reads_a_written_workbook() {
        let bytes = tickets_xlsx();
        let table = load_table(&bytes, "tickets.xlsx").unwrap();
        assert_eq!(table.columns(), ["TicketNumber", "msdyn_receiveddate", "Priority"]);
        assert_eq!(table.len(), 2);

        let first = table.record(0).unwrap();
        let received = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(first.get("msdyn_receiveddate"), Some(&Value::DateTime(received)));
        assert_eq!(first.get("Priority"), Some(&Value::Int(2)));

        let short: Vec<(&str, &Value)> = table.record(1).unwrap().iter().collect();
        assert_eq!(
            short,
            [
                ("TicketNumber", &Value::Text("T-3".into())),
                ("msdyn_receiveddate", &Value::Null),
                ("Priority", &Value::Null),
            ]
        );

        let payload = build_payload(&table, 1).unwrap();
        assert_eq!(payload.body["msdyn_receiveddate"], "2024-05-01T12:30:00");
        assert_eq!(payload.body["Priority"], 2);
        assert!(payload
            .text
            .contains("\"msdyn_receiveddate\": \"2024-05-01T12:30:00\""));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = read_workbook(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }
}
