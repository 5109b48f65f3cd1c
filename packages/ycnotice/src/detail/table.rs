use std::collections::BTreeMap;

use scraper::ElementRef;

use crate::dom;

const CELL_MAX_CHARS: usize = 24;
const RENDER_MAX_WIDTH: usize = 90;
const MIN_COLUMN_WIDTH: usize = 6;
const COLUMN_SEPARATOR: &str = " | ";
const ELLIPSIS: char = '…';

const MAX_COLSPAN: usize = 1000;
const MAX_ROWSPAN: usize = 65534;

/// Rectangular cell matrix of an HTML table with spans expanded.
///
/// A spanning cell's text lives only in its top-left position; every other
/// position it covers holds an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn from_table<'a, F>(table: ElementRef<'a>, skip: &F) -> Self
    where
        F: Fn(ElementRef<'a>) -> bool,
    {
        // column -> rows still covered by a vertical span from above
        let mut pending: BTreeMap<usize, usize> = BTreeMap::new();
        let mut rows = Vec::new();

        for tr in own_rows(table) {
            let mut row: Vec<String> = Vec::new();

            for cell in tr.child_elements().filter(is_cell) {
                fill_pending(&mut row, &mut pending);

                let text = dom::collapse_whitespace(&dom::text_nodes(cell, skip).join(" "));
                let colspan = span_attr(cell, "colspan", MAX_COLSPAN);
                let rowspan = span_attr(cell, "rowspan", MAX_ROWSPAN);

                for offset in 0..colspan {
                    if rowspan > 1 {
                        pending.insert(row.len(), rowspan - 1);
                    }
                    row.push(if offset == 0 { text.clone() } else { String::new() });
                }
            }

            // spans past the last real cell; one fill covers adjacent columns
            while let Some(col) = pending.range(row.len()..).next().map(|(col, _)| *col) {
                row.resize(col, String::new());
                fill_pending(&mut row, &mut pending);
            }

            rows.push(row);
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(String::is_empty))
    }

    /// Renders the grid as a fixed-width text block: the first row, a rule,
    /// then the remaining rows.
    pub fn render(&self) -> String {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| clip(&dom::collapse_whitespace(cell), CELL_MAX_CHARS))
                    .collect()
            })
            .collect();

        let columns = cells.first().map_or(0, Vec::len);
        let mut widths = vec![0; columns];
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        shrink_to_fit(&mut widths);

        let format_row = |row: &Vec<String>| {
            row.iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{:<width$}", clip(cell, width)))
                .collect::<Vec<_>>()
                .join(COLUMN_SEPARATOR)
                .trim_end()
                .to_string()
        };

        let mut lines = Vec::with_capacity(cells.len() + 1);
        let mut iter = cells.iter();
        if let Some(header) = iter.next() {
            lines.push(format_row(header));
            lines.push(
                widths
                    .iter()
                    .map(|&width| "-".repeat(width))
                    .collect::<Vec<_>>()
                    .join("-+-"),
            );
        }
        lines.extend(iter.map(format_row));
        lines.join("\n")
    }
}

/// Rows belonging to `table` itself, not to a table nested in one of its
/// cells.
fn own_rows(table: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .filter(move |tr| {
            tr.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "table")
                == Some(table)
        })
}

fn is_cell(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "td" | "th")
}

fn span_attr(cell: ElementRef<'_>, name: &str, max: usize) -> usize {
    cell.attr(name)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, max)
}

/// Pushes blank placeholders while the next column is covered from above.
fn fill_pending(row: &mut Vec<String>, pending: &mut BTreeMap<usize, usize>) {
    while let Some(remaining) = pending.get_mut(&row.len()) {
        *remaining -= 1;
        if *remaining == 0 {
            pending.remove(&row.len());
        }
        row.push(String::new());
    }
}

fn shrink_to_fit(widths: &mut [usize]) {
    let separators = COLUMN_SEPARATOR.len() * widths.len().saturating_sub(1);
    while widths.iter().sum::<usize>() + separators > RENDER_MAX_WIDTH {
        let Some(widest) = widths
            .iter_mut()
            .max_by_key(|width| **width)
            .filter(|width| **width > MIN_COLUMN_WIDTH)
        else {
            break;
        };
        *widest -= 1;
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
    clipped.push(ELLIPSIS);
    clipped
}
