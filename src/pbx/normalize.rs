//! Separator and blank-line repair for edited manifests.
//!
//! Span deletions can leave a list with a comma before its closing
//! parenthesis, a comma directly after its opening parenthesis, doubled
//! commas, or runs of blank lines where definitions used to be. Four textual
//! rules repair those seams. The rules are applied in order and rerun until
//! the text stops changing, so [`normalize`] is idempotent by construction.
//!
//! Every rule drops or rewrites ASCII punctuation only, and slices around
//! single ASCII bytes, so multibyte text in comments passes through intact.

/// Repair separator damage. Returns the input unchanged (modulo allocation)
/// when there is nothing to fix.
pub fn normalize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(text: &str) -> String {
    let pass = strip_trailing_commas(text);
    let pass = strip_leading_commas(&pass);
    let pass = collapse_blank_runs(&pass);
    collapse_duplicate_commas(&pass)
}

/// `,` preceding a `)` on a later line is dropped; the whitespace stays.
fn strip_trailing_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut seg = 0;
    for i in 0..bytes.len() {
        if bytes[i] != b',' {
            continue;
        }
        let mut j = i + 1;
        let mut saw_newline = false;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            saw_newline |= bytes[j] == b'\n';
            j += 1;
        }
        if saw_newline && j < bytes.len() && bytes[j] == b')' {
            out.push_str(&text[seg..i]);
            seg = i + 1;
        }
    }
    out.push_str(&text[seg..]);
    out
}

/// `(` followed on a later line by a leading `,` loses the comma, and the
/// run of whitespace between them becomes a single newline.
fn strip_leading_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut seg = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'(' {
            let mut j = i + 1;
            let mut saw_newline = false;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                saw_newline |= bytes[j] == b'\n';
                j += 1;
            }
            if saw_newline && j < bytes.len() && bytes[j] == b',' {
                out.push_str(&text[seg..i + 1]);
                out.push('\n');
                seg = j + 1;
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[seg..]);
    out
}

/// Three or more consecutive newlines collapse to exactly two (one blank
/// line).
fn collapse_blank_runs(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut seg = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            let mut j = i;
            while j < bytes.len() && bytes[j] == b'\n' {
                j += 1;
            }
            if j - i >= 3 {
                out.push_str(&text[seg..i]);
                out.push_str("\n\n");
                seg = j;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    out.push_str(&text[seg..]);
    out
}

/// A comma followed (across whitespace) by more commas keeps only the first.
fn collapse_duplicate_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut seg = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b',' {
            let mut last_comma = i;
            let mut j = i + 1;
            loop {
                let mut k = j;
                while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                    k += 1;
                }
                if k < bytes.len() && bytes[k] == b',' {
                    last_comma = k;
                    j = k + 1;
                } else {
                    break;
                }
            }
            if last_comma != i {
                out.push_str(&text[seg..i + 1]);
                seg = last_comma + 1;
                i = last_comma + 1;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&text[seg..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_trailing_comma_before_close_paren() {
        let input = "files = (\n\t\t\t\tA1 /* a */,\n\t\t\t);\n";
        let expected = "files = (\n\t\t\t\tA1 /* a */\n\t\t\t);\n";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_inline_trailing_comma_is_kept() {
        // No newline between the comma and the parenthesis, so nothing to fix.
        let input = "settings = (a, b,);\n";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn test_leading_comma_after_open_paren() {
        let input = "children = (\n\t\t\t\t,\n\t\t\t\tA1 /* a */\n\t\t\t);\n";
        // The comma goes; the newline that followed it stays, leaving one
        // blank line (which is under the collapse threshold).
        let expected = "children = (\n\n\t\t\t\tA1 /* a */\n\t\t\t);\n";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_blank_runs_collapse_to_one_blank_line() {
        assert_eq!(normalize("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize("a\n\n\nb\n\n\n\n\nc"), "a\n\nb\n\nc");
        // A single blank line is already canonical.
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_duplicate_commas_collapse() {
        assert_eq!(normalize("a,,b"), "a,b");
        assert_eq!(normalize("a, , b"), "a, b");
        assert_eq!(normalize("a,,,,b"), "a,b");
    }

    #[test]
    fn test_deletion_residue_converges() {
        // A lone comma left where a list entry used to be. The first pass
        // drops it, which exposes the previous entry's comma to the same
        // rule; the fixpoint loop catches that too. The whitespace-only
        // line is not the normalizer's business.
        let input = "\t\t\tfiles = (\n\t\t\t\tA1 /* a */,\n\t\t\t\t,\n\t\t\t);\n";
        let expected = "\t\t\tfiles = (\n\t\t\t\tA1 /* a */\n\t\t\t\t\n\t\t\t);\n";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_last_entry_loses_its_trailing_comma() {
        // Interior commas are separators and stay; only the one before the
        // closing parenthesis is dropped.
        let input = "{\n\tobjects = {\n\t\tfiles = (\n\t\t\tA1 /* a */,\n\t\t\tB2 /* b */,\n\t\t);\n\t};\n}\n";
        let expected = "{\n\tobjects = {\n\t\tfiles = (\n\t\t\tA1 /* a */,\n\t\t\tB2 /* b */\n\t\t);\n\t};\n}\n";
        assert_eq!(normalize(input), expected);
    }

    #[test]
    fn test_text_without_list_damage_is_untouched() {
        let input = "{\n\tarchiveVersion = 1;\n\tobjectVersion = 46;\n}\n";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn test_normalize_is_idempotent_on_fixtures() {
        for input in [
            "files = (\n\t\tA1,\n\t\t,,\n\t);\n",
            "(\n,\n,\n)",
            "a\n\n\n\n\nb,,c",
            "",
            ",",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(input in "[ \t\n(),;A-Za-z/*]{0,64}") {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_preserves_non_separator_bytes(input in "[A-Za-z0-9 \t\n(),]{0,64}") {
            let out = normalize(&input);
            let strip = |s: &str| {
                s.chars()
                    .filter(|c| !matches!(c, ',' | ' ' | '\t' | '\n' | '\r'))
                    .collect::<String>()
            };
            prop_assert_eq!(strip(&out), strip(&input));
        }
    }
}
