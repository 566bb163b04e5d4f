//! Terminal rendering: result tables and annotated error reports.

use owo_colors::OwoColorize;
use serde_json::Value;

/// Render a JSON array of row objects as an aligned table. Column order
/// follows first appearance across the rows.
pub fn render_table(rows: &[Value]) -> String {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    if columns.is_empty() {
        return String::from("(no rows)\n");
    }

    let cell = |row: &Value, column: &str| -> String {
        match row.get(column) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    };

    let mut widths: Vec<usize> = columns.iter().map(String::len).collect();
    for row in rows {
        for (i, column) in columns.iter().enumerate() {
            widths[i] = widths[i].max(cell(row, column).len());
        }
    }

    let mut out = String::new();
    for (i, column) in columns.iter().enumerate() {
        out.push_str(&format!("{:<width$}  ", column, width = widths[i]));
    }
    out.push('\n');
    for (i, _) in columns.iter().enumerate() {
        out.push_str(&"-".repeat(widths[i]));
        out.push_str("  ");
    }
    out.push('\n');
    for row in rows {
        for (i, column) in columns.iter().enumerate() {
            out.push_str(&format!("{:<width$}  ", cell(row, column), width = widths[i]));
        }
        out.push('\n');
    }
    out
}

/// Print an error report to stderr, with a caret marking the offending
/// spot in the query when a position is known.
pub fn print_error(
    query: &str,
    code: &str,
    message: &str,
    position: Option<usize>,
    hint: Option<&str>,
) {
    eprintln!(
        "{}{}{}{} {}",
        "error[".red().bold(),
        code.red().bold(),
        "]".red().bold(),
        ":".bold(),
        message.bold()
    );
    if let Some(offset) = position {
        if let Some((line, column)) = locate(query, offset) {
            eprintln!("  {}", line);
            eprintln!("  {}{}", " ".repeat(column), "^".yellow().bold());
        }
    }
    if let Some(hint) = hint {
        eprintln!("{} {}", "hint:".cyan().bold(), hint);
    }
}

/// The line containing `offset` and the column of `offset` within it.
/// `offset` counts characters, the way the lexer positions tokens, so
/// indexing happens over chars rather than bytes.
fn locate(query: &str, offset: usize) -> Option<(String, usize)> {
    let chars: Vec<char> = query.chars().collect();
    let offset = offset.min(chars.len());
    let start = chars[..offset]
        .iter()
        .rposition(|&c| c == '\n')
        .map_or(0, |i| i + 1);
    let end = chars[offset..]
        .iter()
        .position(|&c| c == '\n')
        .map_or(chars.len(), |i| offset + i);
    Some((chars[start..end].iter().collect(), offset - start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_keeps_first_seen_column_order() {
        let rows = vec![
            json!({"device_id": "d1", "value": 42.5}),
            json!({"device_id": "d2", "value": 7, "site": "dc-east"}),
        ];
        let table = render_table(&rows);
        let header = table.lines().next().unwrap();
        assert!(header.find("device_id").unwrap() < header.find("value").unwrap());
        assert!(header.find("value").unwrap() < header.find("site").unwrap());
        assert!(table.contains("dc-east"));
    }

    #[test]
    fn test_empty_result_renders_placeholder() {
        assert_eq!(render_table(&[]), "(no rows)\n");
    }

    #[test]
    fn test_locate_points_into_the_right_line() {
        let query = "STREAM metrics\nWHERE bogus = 1";
        let (line, column) = locate(query, 21).unwrap();
        assert_eq!(line, "WHERE bogus = 1");
        assert_eq!(column, 6);
    }

    #[test]
    fn test_locate_handles_multibyte_literals() {
        // Lexer offsets count chars, so a position after a multi-byte
        // string literal must not land mid-codepoint.
        let query = "STREAM devices WHERE site = '日日日日' AND bogus = 1";
        let offset = query.chars().count() - "bogus = 1".chars().count();
        let (line, column) = locate(query, offset).unwrap();
        assert_eq!(line, query);
        assert_eq!(column, offset);

        // The full report path stays panic-free too.
        print_error(query, "SRQL-2002", "Unknown field 'bogus'", Some(offset), None);
    }
}
