//! Joining extracted text units into a single corpus.

use tracing::warn;

/// Separator placed between documents. Only meaningful as a boundary.
pub const DOCUMENT_BREAK: &str = "\n\n===== DOCUMENT BREAK =====\n\n";

/// The marker line without its surrounding blank lines.
const MARKER_LINE: &str = "===== DOCUMENT BREAK =====";

/// Join units in order, separated by [`DOCUMENT_BREAK`].
///
/// Empty units (skipped documents) are kept so positions line up with the
/// input listing. A unit that already contains the marker line has it
/// stripped so the boundary stays unambiguous.
pub fn combine(units: &[String]) -> String {
    let cleaned: Vec<std::borrow::Cow<'_, str>> = units
        .iter()
        .enumerate()
        .map(|(index, unit)| {
            if unit.contains(MARKER_LINE) {
                warn!(index, "document text contains the boundary marker, stripping it");
                std::borrow::Cow::Owned(strip_marker(unit))
            } else {
                std::borrow::Cow::Borrowed(unit.as_str())
            }
        })
        .collect();

    cleaned.join(DOCUMENT_BREAK)
}

/// Remove the marker until none is left; one pass can splice a new one.
fn strip_marker(unit: &str) -> String {
    let mut text = unit.replace(MARKER_LINE, "");
    while text.contains(MARKER_LINE) {
        text = text.replace(MARKER_LINE, "");
    }
    text
}

/// Whether the corpus has no content besides boundary markers and whitespace.
pub fn is_blank(corpus: &str) -> bool {
    corpus
        .split(MARKER_LINE)
        .all(|piece| piece.trim().is_empty())
}
