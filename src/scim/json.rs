use serde_json::Value;

/// Looks up the ListResponse `Resources` key case-insensitively.
/// RFC 7644 uses a capital R but plenty of servers return `resources`.
#[must_use]
pub fn get_resources(json: &Value) -> Option<&Value> {
    json.get("Resources").or_else(|| json.get("resources"))
}

/// Pulls the `id` attribute out of a resource body.
#[must_use]
pub fn extract_id(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("id")
        .and_then(Value::as_str)
        .map(std::borrow::ToOwned::to_owned)
}

/// Resolves a dotted attribute path like `name.givenName` or
/// `emails[0].value` against a resource.
#[must_use]
pub fn resolve_attribute_path(json: &Value, path: &str) -> Option<Value> {
    let mut current = json.clone();
    for segment in path.split('.') {
        current = match parse_segment(segment) {
            Segment::Key(key) => current.get(key)?.clone(),
            Segment::Indexed(key, idx) => current.get(key)?.as_array()?.get(idx)?.clone(),
        };
    }
    Some(current)
}

enum Segment<'seg> {
    Key(&'seg str),
    Indexed(&'seg str, usize),
}

fn parse_segment(segment: &str) -> Segment<'_> {
    if let Some((key, rest)) = segment.split_once('[')
        && let Some(idx_str) = rest.strip_suffix(']')
        && let Ok(idx) = idx_str.parse::<usize>()
    {
        return Segment::Indexed(key, idx);
    }
    Segment::Key(segment)
}
