use serde_json::json;

use super::*;

#[test]
fn resolves_nested_dotted_path() {
    let root = json!({"args": {"path": {"to": {"value": "hello"}}}});
    assert_eq!(render_template("{{ args.path.to.value }}", &root), "hello");
}

#[test]
fn missing_path_renders_empty_string() {
    let root = json!({"args": {}});
    assert_eq!(render_template("before[{{ args.missing }}]after", &root), "before[]after");
}

#[test]
fn multiple_placeholders_in_one_template() {
    let root = json!({"name": "Ferret", "count": 3});
    assert_eq!(render_template("{{ name }} x {{ count }}", &root), "Ferret x 3");
}

#[test]
fn literal_text_without_placeholders_is_unchanged() {
    let root = json!({});
    assert_eq!(render_template("no placeholders here", &root), "no placeholders here");
}

#[test]
fn unterminated_placeholder_is_emitted_verbatim() {
    let root = json!({});
    assert_eq!(render_template("broken {{ oops", &root), "broken {{ oops");
}
