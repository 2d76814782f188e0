//! Classification of the portal page reached after submitting a search.

use scraper::{ElementRef, Html, Selector};

use super::selectors;
use crate::models::ProfessionalRecord;

/// What the post-submit page says about the searched CPF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// The portal's "no records" alert is shown.
    NoRecords,
    /// First result row, read cell by cell.
    Record(ProfessionalRecord),
    /// Neither a recognizable alert nor a result row: markup drifted.
    Unrecognized(String),
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::error!("Invalid portal selector '{}': {:?}", selector, e);
            None
        }
    }
}

/// Whitespace-collapsed, trimmed text content of an element.
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = parse_selector(selector)?;
    document.select(&sel).next()
}

/// Whether `html` contains an element matching `selector`.
pub fn contains(html: &str, selector: &str) -> bool {
    let document = Html::parse_document(html);
    first_match(&document, selector).is_some()
}

/// Reads the post-submit page.
///
/// A "no records" alert wins; otherwise the first result row is read. An
/// alert with any other wording (maintenance, throttling) falls through to the
/// row lookup and, with no row present, ends up `Unrecognized`.
pub fn classify(html: &str) -> PageState {
    let document = Html::parse_document(html);

    if let Some(alert) = first_match(&document, selectors::ALERT) {
        let text = element_text(&alert);
        if selectors::is_no_records_message(&text) {
            return PageState::NoRecords;
        }
        tracing::debug!("Portal alert is not a no-records message: {}", text);
    }

    let Some(row) = first_match(&document, selectors::FIRST_RESULT_ROW) else {
        return PageState::Unrecognized(format!(
            "no element matches '{}'",
            selectors::FIRST_RESULT_ROW
        ));
    };
    let Some(cell_selector) = parse_selector(selectors::RESULT_CELL) else {
        return PageState::Unrecognized(format!(
            "invalid cell selector '{}'",
            selectors::RESULT_CELL
        ));
    };

    let cells: Vec<String> = row.select(&cell_selector).map(|c| element_text(&c)).collect();
    let cell = |i: usize| cells.get(i).filter(|s| !s.is_empty()).cloned();

    PageState::Record(ProfessionalRecord {
        nome: cell(selectors::NAME_CELL),
        situacao: cell(selectors::STATUS_CELL),
        titulo: cell(selectors::TITLE_CELL),
    })
}
