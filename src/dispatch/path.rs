//! Path tokenization.
//!
//! # Responsibilities
//! - Strip the query component
//! - Split on `/` and drop empty segments
//! - Guarantee a non-empty result (root maps to `[""]`)

/// Split a raw request path into its non-empty segments.
///
/// Everything from the first `?` onward is ignored. Repeated, leading and
/// trailing slashes collapse. The root path yields a single empty segment so
/// that root handlers (`get_`, `ws_`, ...) have a key to match on.
pub fn tokenize(raw: &str) -> Vec<String> {
    let path = raw.split('?').next().unwrap_or_default();

    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect();

    if segments.is_empty() {
        vec![String::new()]
    } else {
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_paths() {
        assert_eq!(tokenize(""), vec![""]);
        assert_eq!(tokenize("/"), vec![""]);
        assert_eq!(tokenize("///"), vec![""]);
        assert_eq!(tokenize("/?x=1"), vec![""]);
    }

    #[test]
    fn test_segments() {
        assert_eq!(tokenize("/hop/bola"), vec!["hop", "bola"]);
        assert_eq!(tokenize("hop/bola/"), vec!["hop", "bola"]);
        assert_eq!(tokenize("//a//b"), vec!["a", "b"]);
    }

    #[test]
    fn test_query_is_ignored() {
        for path in ["/", "/echo", "/hop/gato", "a//b/"] {
            assert_eq!(tokenize(&format!("{}?x=1", path)), tokenize(path));
        }
        assert_eq!(tokenize("/echo?next=/a/b"), vec!["echo"]);
    }

    #[test]
    fn test_case_is_preserved() {
        assert_eq!(tokenize("/Hop/GATO"), vec!["Hop", "GATO"]);
    }
}
