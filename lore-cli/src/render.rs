//! Plain-text rendering of extracted entities.

use std::fmt::Write;

use lore_rag::ExtractedEntity;

const HEADERS: [&str; 3] = ["Name", "Description", "Personality"];
const MAX_COLUMN_WIDTH: usize = 60;

/// Render entities as an aligned three-column table.
///
/// Cells longer than the column limit are truncated with an ellipsis, and
/// line breaks inside a cell are flattened to spaces.
pub fn entity_table(entities: &[ExtractedEntity]) -> String {
    if entities.is_empty() {
        return "No entities found.\n".to_string();
    }

    let rows: Vec<[String; 3]> = entities
        .iter()
        .map(|e| [cell(&e.name), cell(&e.description), cell(&e.personality)])
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, value) in widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    push_row(&mut out, &widths.map(|w| "-".repeat(w)), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn cell(value: &str) -> String {
    let flat = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_COLUMN_WIDTH {
        return flat;
    }
    let mut truncated: String = flat.chars().take(MAX_COLUMN_WIDTH - 1).collect();
    truncated.push('…');
    truncated
}

fn push_row(out: &mut String, row: &[String; 3], widths: &[usize; 3]) {
    let line = row
        .iter()
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_columns() {
        let table = entity_table(&[
            ExtractedEntity::new("Ahab", "Captain of the Pequod", "Obsessive"),
            ExtractedEntity::new("Ishmael", "Narrator", "Reflective"),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Name     Description            Personality");
        assert_eq!(lines[2], "Ahab     Captain of the Pequod  Obsessive");
        assert_eq!(lines[3], "Ishmael  Narrator               Reflective");
        assert!(lines[1].starts_with("-------  "));
    }

    #[test]
    fn empty_list_has_a_message() {
        assert_eq!(entity_table(&[]), "No entities found.\n");
    }

    #[test]
    fn long_and_multiline_cells_are_flattened() {
        let long = "x".repeat(100);
        let table = entity_table(&[ExtractedEntity::new("Queequeg", "Harpooneer\nfrom Kokovoko", long)]);
        let row = table.lines().nth(2).unwrap();
        assert!(row.contains("Harpooneer from Kokovoko"));
        assert!(row.ends_with('…'));
        assert_eq!(row.split("  ").last().unwrap().chars().count(), MAX_COLUMN_WIDTH);
    }
}
