use super::Value;

/// Column types recognised in delimited files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
}

/// Trim whitespace and strip one pair of outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Cell text that spreadsheets and exports write for a missing value.
const MISSING_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "-NaN", "-nan", "#N/A", "#N/A N/A",
    "#NA", "<NA>", "None", "-1.#IND", "1.#IND", "-1.#QNAN", "1.#QNAN",
];

/// Empty cells and missing-value markers carry no value.
fn is_missing(cell: &str) -> bool {
    cell.is_empty() || MISSING_MARKERS.contains(&cell)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Pick the narrowest type every present cell fits. A column with no
/// values at all is text.
pub fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut present = cells.filter(|s| !is_missing(s)).peekable();
    if present.peek().is_none() {
        return ColumnType::Text;
    }
    let present: Vec<&str> = present.collect();

    if present.iter().all(|s| parse_bool(s).is_some()) {
        ColumnType::Bool
    } else if present.iter().all(|s| s.parse::<i64>().is_ok()) {
        ColumnType::Int
    } else if present.iter().all(|s| s.parse::<f64>().is_ok()) {
        ColumnType::Float
    } else {
        ColumnType::Text
    }
}

/// Convert one cleaned cell to the column's type. Missing cells are null.
pub fn convert_cell(cell: &str, ty: ColumnType) -> Value {
    if is_missing(cell) {
        return Value::Null;
    }
    match ty {
        ColumnType::Bool => parse_bool(cell).map(Value::Bool).unwrap_or(Value::Null),
        ColumnType::Int => cell.parse().map(Value::Int).unwrap_or(Value::Null),
        ColumnType::Float => cell.parse().map(Value::Float).unwrap_or(Value::Null),
        ColumnType::Text => Value::Text(cell.to_string()),
    }
}
