//! Every markup-coupled string of the CREA-MG portal flow.
//!
//! When the portal changes its HTML, this is the file to update.

use regex::Regex;
use std::sync::LazyLock;

/// CPF/CNPJ text input on the search page.
pub const CPF_INPUT: &str = "#cpfcnpj";

/// Search form submit control.
pub const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

/// Present once the portal renders a results table.
pub const RESULTS_TABLE: &str = ".table-responsive table";

/// Banner the portal shows for empty results (and other notices).
pub const ALERT: &str = ".alert";

/// First data row of the results table.
pub const FIRST_RESULT_ROW: &str = ".table-responsive tbody tr";

/// Cells within a result row.
pub const RESULT_CELL: &str = "td";

// Column 0 holds the registration number.
pub const NAME_CELL: usize = 1;
pub const STATUS_CELL: usize = 2;
pub const TITLE_CELL: usize = 3;

/// Both markers the post-submit wait races on.
pub const RESULT_MARKERS: [&str; 2] = [RESULTS_TABLE, ALERT];

static NO_RECORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)nenhum\s+(registro|profissional|resultado)|n[ãa]o\s+foram\s+encontrad")
        .expect("no-records pattern compiles")
});

/// Whether an alert's text is the portal's "no records" phrasing.
pub fn is_no_records_message(text: &str) -> bool {
    NO_RECORDS_RE.is_match(text)
}
