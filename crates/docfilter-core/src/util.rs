/// Turns a field path into a display label: `publication_date` becomes
/// `Publication Date`, `title.raw` becomes `Title Raw`.
pub fn humanize(field: &str) -> String {
    field
        .split(|c: char| c == '_' || c == '.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes a declared field path to dotted form, so `primary_accounts__Number_of_Employees`
/// and `primary_accounts.Number_of_Employees` address the same field.
pub fn field_path(path: &str) -> String {
    path.replace("__", ".")
}

/// Resolves a dotted path against a JSON value, descending into arrays so
/// that `primary_accounts.employees` yields one value per nested object.
pub fn lookup_path<'a>(value: &'a serde_json::Value, path: &str) -> Vec<&'a serde_json::Value> {
    let mut current = vec![value];
    for part in path.split('.').filter(|p| !p.is_empty()) {
        let mut next = Vec::new();
        for v in current {
            collect_child(v, part, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

fn collect_child<'a>(value: &'a serde_json::Value, key: &str, out: &mut Vec<&'a serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(child) = map.get(key) {
                out.push(child);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_child(item, key, out);
            }
        }
        _ => {}
    }
}
