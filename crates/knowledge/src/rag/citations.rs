//! `[DocN]` citation checks on generated answers.

const TAG_PREFIX: &str = "Doc";

/// Remove citations whose N is not in `1..=max_rank`.
///
/// Besides the plain `[DocN]` tag, the bracket forms `[Doc N]` and
/// `[Doc1, Doc3]` (comma or semicolon separated) are recognised. Kept
/// references are rewritten as plain tags, so `[Doc1, Doc3]` becomes
/// `[Doc1][Doc3]`. A bracket group whose references are all dropped is
/// removed together with a space directly before it.
///
/// Returns the cleaned text and the removed tags in `[DocN]` form.
pub fn strip_dangling_citations(text: &str, max_rank: usize) -> (String, Vec<String>) {
    let mut out = String::with_capacity(text.len());
    let mut removed = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let (before, tail) = rest.split_at(open);
        let Some(close) = tail.find(']') else {
            break;
        };

        let Some(numbers) = citation_numbers(&tail[1..close]) else {
            out.push_str(before);
            out.push('[');
            rest = &tail[1..];
            continue;
        };

        let mut kept = String::new();
        for digits in numbers {
            let tag = format!("[{}{}]", TAG_PREFIX, digits);
            let valid = digits
                .parse::<usize>()
                .is_ok_and(|n| (1..=max_rank).contains(&n));
            if valid {
                kept.push_str(&tag);
            } else {
                removed.push(tag);
            }
        }

        if kept.is_empty() {
            out.push_str(before.strip_suffix(' ').unwrap_or(before));
        } else {
            out.push_str(before);
            out.push_str(&kept);
        }
        rest = &tail[close + 1..];
    }

    out.push_str(rest);
    (out, removed)
}

/// The reference numbers of a bracket body like `Doc1` or `Doc 1, Doc 3`,
/// or `None` when the body is not a citation list.
fn citation_numbers(body: &str) -> Option<Vec<&str>> {
    body.split([',', ';'])
        .map(|item| {
            let digits = item.trim().strip_prefix(TAG_PREFIX)?.trim_start();
            let all_digits = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
            all_digits.then_some(digits)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_citations_untouched() {
        let text = "Leave lasts sixteen weeks [Doc1] and is paid [Doc2].";
        let (cleaned, removed) = strip_dangling_citations(text, 2);
        assert_eq!(cleaned, text);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_out_of_range_citations_removed() {
        let (cleaned, removed) =
            strip_dangling_citations("Badges are blue [Doc3]. Desks are free [Doc0] [Doc1].", 2);
        assert_eq!(cleaned, "Badges are blue. Desks are free [Doc1].");
        assert_eq!(removed, vec!["[Doc3]".to_string(), "[Doc0]".to_string()]);
    }

    #[test]
    fn test_lookalikes_are_left_alone() {
        let text = "See [Doc] or [DocX] or [Doc12 for details.";
        let (cleaned, removed) = strip_dangling_citations(text, 5);
        assert_eq!(cleaned, text);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_huge_numbers_are_dangling() {
        let (cleaned, removed) =
            strip_dangling_citations("Odd [Doc99999999999999999999999]", 3);
        assert_eq!(cleaned, "Odd");
        assert_eq!(removed.len(), 1);
    }

    #[test]
    fn test_multibyte_text_around_tags() {
        let (cleaned, removed) = strip_dangling_citations("Congés payés [Doc1] : règle [Doc4]", 1);
        assert_eq!(cleaned, "Congés payés [Doc1] : règle");
        assert_eq!(removed, vec!["[Doc4]".to_string()]);
    }

    #[test]
    fn test_spaced_and_grouped_citations_checked() {
        let (cleaned, removed) = strip_dangling_citations(
            "Leave is paid [Doc1, Doc7] and lasts sixteen weeks [Doc 2]. Badges [Doc 9].",
            2,
        );
        assert_eq!(cleaned, "Leave is paid [Doc1] and lasts sixteen weeks [Doc2]. Badges.");
        assert_eq!(
            removed,
            vec!["[Doc7]".to_string(), "[Doc9]".to_string()]
        );
    }

    #[test]
    fn test_group_of_valid_citations_split_into_tags() {
        let (cleaned, removed) = strip_dangling_citations("Both apply [Doc1; Doc2].", 2);
        assert_eq!(cleaned, "Both apply [Doc1][Doc2].");
        assert!(removed.is_empty());
    }

    #[test]
    fn test_mixed_bracket_text_is_not_a_citation() {
        let text = "See [Doc1, appendix] and [note].";
        let (cleaned, removed) = strip_dangling_citations(text, 1);
        assert_eq!(cleaned, text);
        assert!(removed.is_empty());
    }
}
