//! Output formatting helpers for human-readable and JSON output.

use serde_json::json;
use treesync::{Document, Element, events::Event};

use crate::cli::OutputFormat;

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line: Vec<String> = cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    line.join("  ").trim_end().to_string()
}

/// Print a table with aligned columns in human-readable format.
///
/// `headers` and each row in `rows` must have the same length.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }

    // Column width is the widest of the header and every cell
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    println!("{}", render_row(headers.iter().copied(), &widths));
    for row in rows {
        println!("{}", render_row(row.iter().map(String::as_str), &widths));
    }
}

/// Render a three-state value for display.
fn display_value(value: Option<&str>) -> String {
    match value {
        None => "-".to_string(),
        Some("") => "\"\"".to_string(),
        Some(text) => text.to_string(),
    }
}

fn flatten(prefix: &str, elements: &[Element], rows: &mut Vec<(String, Option<String>)>) {
    for element in elements {
        let step = element.step().to_string();
        let path = if prefix.is_empty() {
            step
        } else {
            format!("{prefix}.{step}")
        };
        rows.push((path.clone(), element.value().map(str::to_string)));
        flatten(&path, &element.children, rows);
    }
}

/// Every node of `document` with its value, in document order.
pub fn document_rows(document: &Document) -> Vec<(String, Option<String>)> {
    let mut rows = Vec::new();
    flatten("", &document.elements, &mut rows);
    rows
}

/// Print a whole document, one node per line.
pub fn print_document(document: &Document, format: OutputFormat) {
    let rows = document_rows(document);
    match format {
        OutputFormat::Human => {
            let rows: Vec<Vec<String>> = rows
                .into_iter()
                .map(|(path, value)| vec![path, display_value(value.as_deref())])
                .collect();
            print_table(&["PATH", "VALUE"], &rows);
        }
        OutputFormat::Json => {
            for (path, value) in rows {
                println!("{}", json!({ "path": path, "value": value }));
            }
        }
    }
}

/// Render one event.
pub fn format_event(event: &Event, format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => match event {
            Event::Content { node, new, old } => format!(
                "content {}: {} -> {}",
                node.path,
                display_value(old.as_deref()),
                display_value(new.as_deref())
            ),
            other => other.to_string(),
        },
        OutputFormat::Json => {
            let value = match event {
                Event::Added { parent, node } => json!({
                    "event": "add", "parent": parent, "path": node.path, "name": node.name, "id": node.id,
                }),
                Event::Removed { parent, node } => json!({
                    "event": "remove", "parent": parent, "path": node.path, "name": node.name, "id": node.id,
                }),
                Event::Content { node, new, old } => json!({
                    "event": "content", "path": node.path, "new": new, "old": old,
                }),
                Event::Loaded => json!({ "event": "load" }),
            };
            value.to_string()
        }
    }
}
