//! Loading document elements from disk.

use crate::error::{CliError, Result};
use pactum_domain::{DocumentElement, TableMeta};
use std::fs;
use std::path::Path;

/// Load elements from a JSON element array or from plain text.
///
/// Plain text is split into blocks on blank lines. A block whose lines all
/// start with `|` becomes a table element; a preceding `## ` heading line
/// is kept as its title.
pub fn load_elements(path: &Path) -> Result<Vec<DocumentElement>> {
    let contents = fs::read_to_string(path)?;
    if contents.trim_start().starts_with('[') {
        let elements: Vec<DocumentElement> = serde_json::from_str(&contents)?;
        return Ok(elements);
    }
    Ok(parse_text(&contents))
}

/// Split plain text into text and table elements.
pub fn parse_text(contents: &str) -> Vec<DocumentElement> {
    let mut elements = Vec::new();
    let mut tables = 0usize;

    for block in contents.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        let lines: Vec<&str> = block.lines().collect();
        let (title, body) = match lines.split_first() {
            Some((first, rest)) if first.starts_with("## ") && !rest.is_empty() => {
                (Some(*first), rest)
            }
            _ => (None, lines.as_slice()),
        };

        if !body.is_empty() && body.iter().all(|l| l.trim_start().starts_with('|')) {
            let columns = body[0].trim().trim_matches('|').split('|').count();
            let rows = body.len().saturating_sub(2);
            let title = title
                .map(str::to_string)
                .unwrap_or_else(|| format!("## Table {}", tables + 1));
            let content = format!("{}\n\n{}", title, body.join("\n"));
            elements.push(DocumentElement::table(
                content,
                TableMeta {
                    index: tables,
                    row_count: rows,
                    column_count: columns,
                },
            ));
            tables += 1;
        } else {
            elements.push(DocumentElement::text(block));
        }
    }

    elements
}

/// Fail early on an input with nothing to extract.
pub fn require_content(elements: &[DocumentElement], path: &Path) -> Result<()> {
    if elements.iter().all(|e| e.content.trim().is_empty()) {
        return Err(CliError::InvalidInput(format!(
            "{} contains no text",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactum_domain::ElementKind;
    use tempfile::TempDir;

    #[test]
    fn test_parse_text_blocks() {
        let text = "ДОГОВОР № 15/24\n\nИсполнитель обязуется оказать услуги.\n\n\
                    ## Спецификация\n| Наименование | Кол-во |\n| --- | --- |\n| Уборка | 1 |\n| Вывоз | 2 |";
        let elements = parse_text(text);

        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].kind, ElementKind::Text);
        assert_eq!(elements[2].kind, ElementKind::Table);
        assert!(elements[2].content.starts_with("## Спецификация\n\n| Наименование"));
        let meta = elements[2].table_meta.unwrap();
        assert_eq!(meta.row_count, 2);
        assert_eq!(meta.column_count, 2);
    }

    #[test]
    fn test_untitled_table_gets_numbered_title() {
        let elements = parse_text("| a | b |\n| --- | --- |\n| 1 | 2 |");
        assert!(elements[0].content.starts_with("## Table 1\n\n"));
    }

    #[test]
    fn test_load_json_elements() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        let elements = vec![
            DocumentElement::text("Preamble"),
            DocumentElement::table_from_rows(0, &["Name"], &[vec!["Row"]]),
        ];
        fs::write(&path, serde_json::to_string(&elements).unwrap()).unwrap();

        assert_eq!(load_elements(&path).unwrap(), elements);
    }

    #[test]
    fn test_blank_input_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.txt");
        fs::write(&path, "\n\n   \n").unwrap();

        let elements = load_elements(&path).unwrap();
        assert!(matches!(
            require_content(&elements, &path),
            Err(CliError::InvalidInput(_))
        ));
    }
}
