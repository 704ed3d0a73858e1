//! Document elements - the ordered input units of the pipeline

use serde::{Deserialize, Serialize};

/// Kind of a document element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A prose block; may be split on word boundaries
    Text,
    /// A markdown table; atomic unless split into whole-row parts
    Table,
}

/// Shape of a table element as reported by the document loader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Zero-based position of the table in the document
    pub index: usize,

    /// Number of data rows (header excluded)
    pub row_count: usize,

    /// Number of columns
    pub column_count: usize,
}

/// An ordered atomic unit of the source document
///
/// Elements arrive in reading order and every chunk produced from them
/// preserves that order.
///
/// # Examples
///
/// ```
/// use pactum_domain::{DocumentElement, ElementKind};
///
/// let para = DocumentElement::text("Исполнитель обязуется оказать услуги.");
/// assert_eq!(para.kind, ElementKind::Text);
/// assert!(para.is_splittable());
/// assert_eq!(para.size(), 37);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentElement {
    /// Element kind
    pub kind: ElementKind,

    /// Raw content; tables are markdown including a title line
    pub content: String,

    /// Table shape, present only for tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_meta: Option<TableMeta>,
}

impl DocumentElement {
    /// Create a prose element
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Text,
            content: content.into(),
            table_meta: None,
        }
    }

    /// Create a table element from already rendered markdown
    pub fn table(content: impl Into<String>, meta: TableMeta) -> Self {
        Self {
            kind: ElementKind::Table,
            content: content.into(),
            table_meta: Some(meta),
        }
    }

    /// Render a table element from a header row and data rows
    ///
    /// Rows shorter than the header are padded with empty cells, longer rows
    /// are cut to the header width.
    ///
    /// # Examples
    ///
    /// ```
    /// use pactum_domain::DocumentElement;
    ///
    /// let table = DocumentElement::table_from_rows(
    ///     0,
    ///     &["Name", "Price"],
    ///     &[vec!["Toner refill", "1 079,00"]],
    /// );
    /// assert!(table.content.starts_with("## Table 1"));
    /// assert!(table.content.contains("| --- | --- |"));
    /// assert_eq!(table.table_meta.unwrap().row_count, 1);
    /// ```
    pub fn table_from_rows<H, C>(index: usize, headers: &[H], rows: &[Vec<C>]) -> Self
    where
        H: AsRef<str>,
        C: AsRef<str>,
    {
        let width = headers.len();
        let mut lines = Vec::with_capacity(rows.len() + 4);

        lines.push(format!("## Table {}", index + 1));
        lines.push(String::new());
        lines.push(markdown_row(headers.iter().map(|h| h.as_ref())));
        lines.push(markdown_row(std::iter::repeat("---").take(width)));

        for row in rows {
            let cells = row
                .iter()
                .map(|c| c.as_ref())
                .chain(std::iter::repeat(""))
                .take(width);
            lines.push(markdown_row(cells));
        }

        Self::table(
            lines.join("\n"),
            TableMeta {
                index,
                row_count: rows.len(),
                column_count: width,
            },
        )
    }

    /// Character length of the content
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }

    /// Whether the element may be broken apart on word boundaries
    pub fn is_splittable(&self) -> bool {
        self.kind == ElementKind::Text
    }

    /// Whether the element is a table
    pub fn is_table(&self) -> bool {
        self.kind == ElementKind::Table
    }
}

fn markdown_row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let cells: Vec<&str> = cells.map(str::trim).collect();
    format!("| {} |", cells.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_counts_characters_not_bytes() {
        let element = DocumentElement::text("Договор");
        assert_eq!(element.size(), 7);
        assert!(element.content.len() > 7);
    }

    #[test]
    fn test_table_is_not_splittable() {
        let table = DocumentElement::table_from_rows(2, &["a"], &[vec!["1"]]);
        assert!(table.is_table());
        assert!(!table.is_splittable());
        assert_eq!(table.table_meta.unwrap().index, 2);
    }

    #[test]
    fn test_table_rows_padded_to_header_width() {
        let table = DocumentElement::table_from_rows(0, &["a", "b", "c"], &[vec!["1"]]);
        let last = table.content.lines().last().unwrap();
        assert_eq!(last, "| 1 |  |  |");
    }

    #[test]
    fn test_table_rows_cut_to_header_width() {
        let table = DocumentElement::table_from_rows(0, &["a"], &[vec!["1", "2"]]);
        assert_eq!(table.content.lines().last().unwrap(), "| 1 |");
        assert_eq!(table.table_meta.unwrap().column_count, 1);
    }

    #[test]
    fn test_element_json_shape() {
        let json = r#"{"kind": "text", "content": "hello"}"#;
        let element: DocumentElement = serde_json::from_str(json).unwrap();
        assert_eq!(element, DocumentElement::text("hello"));
    }
}
