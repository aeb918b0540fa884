//! `${key}` string interpolation. A single, non-recursive pass: an
//! interpolated value is never itself re-scanned for further `${...}`
//! tokens, so a context value containing a literal `${x}` is substituted
//! verbatim rather than expanded again.

use std::collections::BTreeMap;

/// Replaces every `${key}` occurrence in `template` using `context`.
/// An unknown key is left untouched — leaving the token in place makes a
/// typo visible in the output rather than silently eating it.
pub fn interpolate(template: &str, context: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = template[i + 2..].find('}') {
                let key = &template[i + 2..i + 2 + end];
                match context.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&template[i..i + 2 + end + 1]),
                }
                i += 2 + end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().expect("i < bytes.len()");
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_known_keys() {
        let context = ctx(&[("name", "pod"), ("version", "1.0.0")]);
        assert_eq!(
            interpolate("${name}-${version}.tar.gz", &context),
            "pod-1.0.0.tar.gz"
        );
    }

    #[test]
    fn leaves_unknown_keys_untouched() {
        let context = ctx(&[("name", "pod")]);
        assert_eq!(interpolate("${name}/${missing}", &context), "pod/${missing}");
    }

    #[test]
    fn does_not_recursively_expand_substituted_values() {
        let context = ctx(&[("a", "${b}"), ("b", "real")]);
        assert_eq!(interpolate("${a}", &context), "${b}");
    }

    #[test]
    fn unterminated_token_is_left_as_is() {
        let context = ctx(&[("name", "pod")]);
        assert_eq!(interpolate("${name is unterminated", &context), "${name is unterminated");
    }
}
