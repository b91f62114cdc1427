use serde_json::Value;

/// Follows `path` through nested JSON objects.
///
/// Returns `None` as soon as a step is missing or the value at that step is not
/// an object. An empty path yields `value` itself.
pub fn extract_field<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(key.as_ref()))
}
