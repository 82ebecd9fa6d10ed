// ---------------------------------------------------------------------------
// Segment naming
// ---------------------------------------------------------------------------

/// Media segment file extension.
pub const SEGMENT_EXT: &str = ".ts";

/// Numeric index embedded in a segment filename: `"12.ts"` is 12.
pub fn segment_index(filename: &str) -> Option<u64> {
    filename.strip_suffix(SEGMENT_EXT)?.parse().ok()
}

/// Last path component of an object key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Sort segment filenames by their numeric index.
///
/// Names without a numeric index sort after all numbered ones, by name.
pub fn sort_numerically(names: &mut [String]) {
    names.sort_by(|a, b| {
        let key = |s: &str| (segment_index(s).map_or((1, 0), |i| (0, i)), s.to_string());
        key(a).cmp(&key(b))
    });
}

/// Segment filenames from a prefix listing: `.ts` objects only, ordered by index.
pub fn segment_filenames(keys: &[String]) -> Vec<String> {
    let mut names: Vec<String> = keys
        .iter()
        .map(|k| file_name(k))
        .filter(|name| name.ends_with(SEGMENT_EXT))
        .map(str::to_string)
        .collect();
    sort_numerically(&mut names);
    names
}
