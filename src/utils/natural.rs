//! String comparison primitives for the sort engine.
//!
//! - [`natural_cmp`]: digit runs compare by numeric value (`item9 < item10`)
//! - [`collation_key`]: locale-style key (transliterated, lowercased) with
//!   optional zero-padding of digit runs so natural order survives a plain
//!   byte comparison
//! - [`numeric_value`]: numeric view of a string for regular ordering

use std::cmp::Ordering;

/// Width digit runs are padded to inside collation keys.
const PAD_WIDTH: usize = 32;

/// Compare two strings in natural order.
///
/// Leading zeros in a digit run are ignored for the value comparison; on a
/// tie the run with more leading zeros sorts first so the order stays total.
pub fn natural_cmp(a: &str, b: &str, fold_case: bool) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let ra = take_digits(&mut ai);
                let rb = take_digits(&mut bi);
                let ord = cmp_digit_runs(&ra, &rb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = if fold_case {
                    ca.to_lowercase().cmp(cb.to_lowercase())
                } else {
                    ca.cmp(&cb)
                };
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

/// Build a comparison-only key for locale-aware collation.
///
/// Accented characters are transliterated to ASCII and case is folded. With
/// `natural`, every digit run is left-padded with zeros to a fixed width.
pub fn collation_key(s: &str, natural: bool) -> String {
    let folded = deunicode::deunicode(s).to_lowercase();
    if !natural {
        return folded;
    }

    let mut out = String::with_capacity(folded.len() + PAD_WIDTH);
    let mut chars = folded.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            let run = take_digits(&mut chars);
            if run.len() < PAD_WIDTH {
                out.extend(std::iter::repeat_n('0', PAD_WIDTH - run.len()));
            }
            out.push_str(&run);
        } else {
            out.push(c);
            chars.next();
        }
    }
    out
}

/// Parse a string as a number the way loose header values are written.
pub fn numeric_value(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let ta = a.trim_start_matches('0');
    let tb = b.trim_start_matches('0');
    ta.len()
        .cmp(&tb.len())
        .then_with(|| ta.cmp(tb))
        .then_with(|| b.len().cmp(&a.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_numbers() {
        assert_eq!(natural_cmp("item9", "item10", false), Ordering::Less);
        assert_eq!(natural_cmp("item10", "item9", false), Ordering::Greater);
        assert_eq!(natural_cmp("a2b3", "a2b3", false), Ordering::Equal);
    }

    #[test]
    fn test_natural_leading_zeros() {
        assert_eq!(natural_cmp("v007", "v7", false), Ordering::Less);
        assert_eq!(natural_cmp("v010", "v9", false), Ordering::Greater);
    }

    #[test]
    fn test_natural_case() {
        assert_eq!(natural_cmp("Banana", "apple", false), Ordering::Less);
        assert_eq!(natural_cmp("Banana", "apple", true), Ordering::Greater);
        assert_eq!(natural_cmp("ABC", "abc", true), Ordering::Equal);
    }

    #[test]
    fn test_natural_prefix() {
        assert_eq!(natural_cmp("post", "post-a", true), Ordering::Less);
        assert_eq!(natural_cmp("", "a", true), Ordering::Less);
    }

    #[test]
    fn test_collation_key_transliterates() {
        assert_eq!(collation_key("Élan", false), "elan");
        assert!(collation_key("éclair", false) < collation_key("Fig", false));
    }

    #[test]
    fn test_collation_key_pads_numbers() {
        let k9 = collation_key("item9", true);
        let k10 = collation_key("item10", true);
        assert!(k9 < k10);
        assert_eq!(k9.len(), "item".len() + PAD_WIDTH);
        // without padding the byte order is wrong
        assert!(collation_key("item9", false) > collation_key("item10", false));
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value("42"), Some(42.0));
        assert_eq!(numeric_value(" 1.5 "), Some(1.5));
        assert_eq!(numeric_value("-3"), Some(-3.0));
        assert_eq!(numeric_value("abc"), None);
        assert_eq!(numeric_value(""), None);
        assert_eq!(numeric_value("NaN"), None);
    }
}
