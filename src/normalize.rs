//! Raw blob ⇄ render-ready tree
//!
//! The backend serializes an order's chapter grouping into a single
//! string field. `parse` turns that string into a [`ChapterTree`] and is
//! deliberately forgiving: an absent, empty, or malformed blob simply
//! means the order has no chapters yet. Parse failures are logged and
//! swallowed — they never reach the caller as errors.

use crate::order::{Chapter, ChapterTree, Line, LineId, Section};
use serde_json::{Map, Value};
use tracing::warn;

/// Parse the chapter-grouped blob into a render-ready tree.
///
/// Key order in the blob is display order and is preserved. Unknown keys
/// are ignored; records with missing or wrong-typed fields degrade to
/// defaults; line records without a usable id are skipped. Never fails.
pub fn parse(raw: Option<&str>) -> ChapterTree {
    let raw = match raw {
        Some(s) if !s.trim().is_empty() => s,
        _ => return ChapterTree::new(),
    };

    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "discarding malformed chapter blob");
            return ChapterTree::new();
        }
    };

    let map = match value {
        Value::Object(map) => map,
        other => {
            warn!(found = %json_kind(&other), "chapter blob is not an object, treating as empty");
            return ChapterTree::new();
        }
    };

    let chapters = map
        .iter()
        .map(|(name, data)| parse_chapter(name, data))
        .collect();

    ChapterTree { chapters }
}

/// Serialize a tree back to the wire shape with canonical field names.
///
/// `parse(Some(&to_raw(tree)))` reproduces `tree` structurally.
pub fn to_raw(tree: &ChapterTree) -> String {
    let mut root = Map::new();
    for chapter in &tree.chapters {
        let mut sections = Map::new();
        for section in &chapter.sections {
            sections.insert(section.name.clone(), section_value(section));
        }
        let mut body = Map::new();
        body.insert("sections".into(), Value::Object(sections));
        body.insert("total".into(), json_number(chapter.total));
        root.insert(chapter.name.clone(), Value::Object(body));
    }
    Value::Object(root).to_string()
}

fn parse_chapter(name: &str, data: &Value) -> Chapter {
    let mut chapter = Chapter::new(name);

    if let Some(sections) = data.get("sections").and_then(Value::as_object) {
        for (section_name, section_data) in sections {
            chapter
                .sections
                .push(parse_section(section_name, section_data));
        }
    }

    // The backend is the authority for the chapter total; fall back to
    // summing line subtotals when the blob did not carry one.
    chapter.total = match lenient_f64(data.get("total")) {
        Some(total) => total,
        None => chapter.computed_total(),
    };

    chapter
}

fn parse_section(name: &str, data: &Value) -> Section {
    let mut section = Section::new(name);

    section.category_id = lenient_i64(data.get("category_id"));
    section.conditions = data
        .get("condiciones_particulares")
        .and_then(Value::as_str)
        .map(str::to_string);
    section.locked = data
        .get("locked")
        .or_else(|| data.get("es_fija"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if let Some(lines) = data.get("lines").and_then(Value::as_array) {
        section.lines.extend(lines.iter().filter_map(parse_line));
    }

    section
}

fn parse_line(data: &Value) -> Option<Line> {
    // Older blobs carried `line_id` instead of `id`.
    let id = lenient_i64(data.get("id")).or_else(|| lenient_i64(data.get("line_id")))?;

    let name = data
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let quantity = lenient_f64(data.get("quantity"))
        .or_else(|| lenient_f64(data.get("product_uom_qty")))
        .unwrap_or(0.0);
    let unit_price = lenient_f64(data.get("price_unit"))
        .or_else(|| lenient_f64(data.get("unit_price")))
        .unwrap_or(0.0);

    // The subtotal is always rederived, even when the blob carried one.
    Some(Line::new(LineId::new(id), name, quantity, unit_price))
}

fn section_value(section: &Section) -> Value {
    let lines = section
        .lines
        .iter()
        .map(|line| {
            let mut obj = Map::new();
            obj.insert("id".into(), Value::from(line.id.raw()));
            obj.insert("name".into(), Value::from(line.name.clone()));
            obj.insert("quantity".into(), json_number(line.quantity));
            obj.insert("price_unit".into(), json_number(line.unit_price));
            obj.insert("subtotal".into(), json_number(line.subtotal));
            Value::Object(obj)
        })
        .collect();

    let mut obj = Map::new();
    obj.insert("lines".into(), Value::Array(lines));
    if let Some(category) = section.category_id {
        obj.insert("category_id".into(), Value::from(category));
    }
    if let Some(conditions) = &section.conditions {
        obj.insert(
            "condiciones_particulares".into(),
            Value::from(conditions.clone()),
        );
    }
    if section.locked {
        obj.insert("locked".into(), Value::Bool(true));
    }
    Value::Object(obj)
}

/// Accept a JSON number or a numeric string.
fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-finite floats have no JSON representation; clamp them to zero so
/// serialization cannot fail.
fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::SectionKey;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    // === Scenario: absent, empty and trivially-empty blobs ===
    #[test]
    fn empty_inputs_yield_empty_tree() {
        assert!(parse(None).is_empty());
        assert!(parse(Some("")).is_empty());
        assert!(parse(Some("   ")).is_empty());
        assert!(parse(Some("{}")).is_empty());
    }

    // === Scenario: malformed input never throws ===
    #[test]
    fn malformed_input_yields_empty_tree() {
        assert!(parse(Some("{not valid json")).is_empty());
        assert!(parse(Some("[1, 2, 3]")).is_empty());
        assert!(parse(Some("\"just a string\"")).is_empty());
        assert!(parse(Some("null")).is_empty());
    }

    // === Scenario: the canonical one-chapter, one-section, one-line blob ===
    #[test]
    fn parses_single_chapter_blob() {
        let raw = r#"{"Cap A": {"sections": {"Sec 1": {"lines":
            [{"id": 10, "name": "Widget", "quantity": 2, "price_unit": 5}]}},
            "total": 10}}"#;
        let tree = parse(Some(raw));

        assert_eq!(tree.chapters.len(), 1);
        let chapter = tree.chapter("Cap A").unwrap();
        assert_eq!(chapter.sections.len(), 1);
        assert!(approx_eq(chapter.total, 10.0));

        let section = tree.section(&SectionKey::new("Cap A", "Sec 1")).unwrap();
        assert_eq!(section.lines.len(), 1);
        let line = &section.lines[0];
        assert_eq!(line.id, LineId::new(10));
        assert_eq!(line.name, "Widget");
        assert!(approx_eq(line.subtotal, 10.0));
    }

    // === Scenario: key order in the blob is display order ===
    #[test]
    fn preserves_encounter_order() {
        let raw = r#"{"Zeta": {"sections": {"B": {"lines": []}, "A": {"lines": []}}},
                      "Alpha": {"sections": {}}}"#;
        let tree = parse(Some(raw));

        let names: Vec<&str> = tree.chapters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
        let sections: Vec<&str> = tree.chapters[0]
            .sections
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(sections, vec!["B", "A"]);
    }

    // === Scenario: idempotence through the wire shape ===
    #[test]
    fn round_trip_is_structurally_stable() {
        let raw = r#"{"Cap A": {"sections": {
                "Sec 1": {"lines": [
                    {"id": 10, "name": "Widget", "quantity": 2, "price_unit": 5},
                    {"id": 11, "name": "Bolt", "quantity": 4, "price_unit": 0.5}
                ], "category_id": 3, "condiciones_particulares": "montaña"},
                "Sec 2": {"lines": [], "locked": true}
            }, "total": 12},
            "Cap B": {"sections": {}}}"#;

        let once = parse(Some(raw));
        let twice = parse(Some(&to_raw(&once)));
        assert_eq!(once, twice);
    }

    // === Scenario: every line subtotal obeys the derivation invariant ===
    #[test]
    fn subtotals_are_rederived() {
        // Blob claims a stale subtotal; the parse recomputes it.
        let raw = r#"{"Cap": {"sections": {"Sec": {"lines":
            [{"id": 1, "name": "X", "quantity": 3, "price_unit": 1.5, "subtotal": 99.0}]}}}}"#;
        let tree = parse(Some(raw));
        let line = &tree.section(&SectionKey::new("Cap", "Sec")).unwrap().lines[0];
        assert!(approx_eq(line.subtotal, 4.5));
        assert!(approx_eq(line.subtotal, line.computed_subtotal()));
    }

    // === Scenario: chapter total falls back to the line sum ===
    #[test]
    fn chapter_total_falls_back_to_computed() {
        let raw = r#"{"Cap": {"sections": {"Sec": {"lines":
            [{"id": 1, "name": "X", "quantity": 2, "price_unit": 3}]}}}}"#;
        let tree = parse(Some(raw));
        assert!(approx_eq(tree.chapter("Cap").unwrap().total, 6.0));

        // But a supplied total is authoritative even when it disagrees.
        let raw = r#"{"Cap": {"sections": {"Sec": {"lines":
            [{"id": 1, "name": "X", "quantity": 2, "price_unit": 3}]}}, "total": 7.5}}"#;
        let tree = parse(Some(raw));
        assert!(approx_eq(tree.chapter("Cap").unwrap().total, 7.5));
    }

    // === Scenario: lenient field handling ===
    #[test]
    fn tolerates_legacy_and_stringly_fields() {
        let raw = r#"{"Cap": {"sections": {"Sec": {"lines": [
            {"line_id": 5, "name": "Legacy", "product_uom_qty": "2.5", "unit_price": "4"},
            {"name": "No id, skipped", "quantity": 1, "price_unit": 1},
            {"id": 6, "quantity": true}
        ]}}}}"#;
        let tree = parse(Some(raw));
        let lines = &tree.section(&SectionKey::new("Cap", "Sec")).unwrap().lines;

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].id, LineId::new(5));
        assert!(approx_eq(lines[0].subtotal, 10.0));
        // Wrong-typed fields degrade to defaults rather than dropping the record.
        assert_eq!(lines[1].id, LineId::new(6));
        assert_eq!(lines[1].name, "");
        assert!(approx_eq(lines[1].quantity, 0.0));
    }

    // === Scenario: section metadata survives the parse ===
    #[test]
    fn reads_section_metadata() {
        let raw = r#"{"Cap": {"sections": {"Sec": {
            "lines": [], "category_id": 12,
            "condiciones_particulares": "pago a 30 días", "es_fija": true}}}}"#;
        let tree = parse(Some(raw));
        let section = tree.section(&SectionKey::new("Cap", "Sec")).unwrap();

        assert_eq!(section.category_id, Some(12));
        assert_eq!(section.conditions.as_deref(), Some("pago a 30 días"));
        assert!(section.locked);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let raw = r#"{"Cap A": {"sections": {"Sec 1": {"lines":
            [{"id": 10, "name": "Widget", "quantity": 2, "price_unit": 5}]}}, "total": 10}}"#;
        assert_eq!(parse(Some(raw)), parse(Some(raw)));
    }
}
