//! Concrete extraction strategies

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::{Document, Strategy};
use crate::app::models::Field;

/// Text of an element, falling back to its `value` attribute and then to
/// the first non-empty `data-*` attribute
fn element_value(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect::<Vec<_>>().join(" ");
    if !text.trim().is_empty() {
        return text.trim().to_string();
    }
    if let Some(value) = element.value().attr("value") {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    element
        .value()
        .attrs()
        .find(|(name, value)| name.starts_with("data-") && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_default()
}

/// Strategy 1: attribute of an element addressed by a stable selector
#[derive(Debug)]
pub struct ElementAttribute {
    rules: Vec<(Field, Selector, &'static str)>,
}

impl ElementAttribute {
    pub fn new(rules: Vec<(Field, Selector, &'static str)>) -> Self {
        Self { rules }
    }
}

impl Strategy for ElementAttribute {
    fn name(&self) -> &'static str {
        "element-attribute"
    }

    fn try_fill(&self, doc: &Document<'_>, wanted: &[Field]) -> Vec<(Field, String)> {
        let html = doc.html();
        self.rules
            .iter()
            .filter(|(field, _, _)| wanted.contains(field))
            .filter_map(|(field, selector, attr)| {
                html.select(selector)
                    .next()
                    .and_then(|element| element.value().attr(attr))
                    .map(|value| (*field, value.trim().to_string()))
            })
            .collect()
    }
}

/// Strategy 1 for AJAX replies: string value at a JSON pointer
#[derive(Debug)]
pub struct JsonField {
    rules: Vec<(Field, &'static str)>,
}

impl JsonField {
    pub fn new(rules: Vec<(Field, &'static str)>) -> Self {
        Self { rules }
    }
}

impl Strategy for JsonField {
    fn name(&self) -> &'static str {
        "json-field"
    }

    fn try_fill(&self, doc: &Document<'_>, wanted: &[Field]) -> Vec<(Field, String)> {
        let Some(json) = doc.json() else {
            return Vec::new();
        };
        self.rules
            .iter()
            .filter(|(field, _)| wanted.contains(field))
            .filter_map(|(field, pointer)| {
                json.pointer(pointer)
                    .and_then(|value| value.as_str())
                    .map(|value| (*field, value.trim().to_string()))
            })
            .collect()
    }
}

/// Strategy 2: cells of the first table row wide enough to hold every column
#[derive(Debug)]
pub struct TableCell {
    rows: Selector,
    cells: Selector,
    columns: Vec<(Field, usize)>,
}

impl TableCell {
    pub fn new(rows: Selector, cells: Selector, columns: Vec<(Field, usize)>) -> Self {
        Self {
            rows,
            cells,
            columns,
        }
    }
}

impl Strategy for TableCell {
    fn name(&self) -> &'static str {
        "table-cell"
    }

    fn try_fill(&self, doc: &Document<'_>, wanted: &[Field]) -> Vec<(Field, String)> {
        let needed = self.columns.iter().map(|(_, index)| *index).max().unwrap_or(0);

        for row in doc.html().select(&self.rows) {
            let cells: Vec<String> = row
                .select(&self.cells)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect();
            if cells.len() <= needed {
                continue;
            }
            return self
                .columns
                .iter()
                .filter(|(field, _)| wanted.contains(field))
                .map(|(field, index)| (*field, cells[*index].clone()))
                .collect();
        }
        Vec::new()
    }
}

/// Strategy 3: class names and data attributes commonly used for a field
#[derive(Debug)]
pub struct CssHeuristic {
    rules: Vec<(Field, Selector)>,
}

impl CssHeuristic {
    pub fn new(rules: Vec<(Field, Selector)>) -> Self {
        Self { rules }
    }
}

impl Strategy for CssHeuristic {
    fn name(&self) -> &'static str {
        "css-heuristic"
    }

    fn try_fill(&self, doc: &Document<'_>, wanted: &[Field]) -> Vec<(Field, String)> {
        let html = doc.html();
        let mut found = Vec::new();
        for (field, selector) in &self.rules {
            if !wanted.contains(field) {
                continue;
            }
            if let Some(value) = html
                .select(selector)
                .map(element_value)
                .find(|value| field.accepts(value))
            {
                found.push((*field, value));
            }
        }
        found
    }
}

/// Strategy 4: first capture group of a label-adjacent pattern over the
/// visible text
#[derive(Debug)]
pub struct TextPattern {
    rules: Vec<(Field, Regex)>,
}

impl TextPattern {
    pub fn new(rules: Vec<(Field, Regex)>) -> Self {
        Self { rules }
    }
}

impl Strategy for TextPattern {
    fn name(&self) -> &'static str {
        "text-pattern"
    }

    fn try_fill(&self, doc: &Document<'_>, wanted: &[Field]) -> Vec<(Field, String)> {
        let text = doc.text();
        let mut found: Vec<(Field, String)> = Vec::new();
        for (field, pattern) in &self.rules {
            if !wanted.contains(field) || found.iter().any(|(f, _)| f == field) {
                continue;
            }
            let value = pattern
                .captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .find(|value| field.accepts(value));
            if let Some(value) = value {
                found.push((*field, value));
            }
        }
        found
    }
}
