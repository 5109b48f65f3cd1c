//! Body text extraction and the reformatting of "noisy" flyer-like text.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::ElementRef;

use crate::dom;

const NOISY_MIN_LINES: usize = 40;
const SHORT_LINE_MAX_CHARS: usize = 2;
const SHORT_LINE_RATIO: f64 = 0.35;
const NOISY_MIN_NEWLINES: usize = 120;

/// Extracts the readable body below `root`, skipping subtrees for which
/// `skip` returns true.
///
/// The text is first taken line by line. When that rendition looks like a
/// table or flyer exploded into fragments, the single-line rendition is
/// reformatted by [`normalize_broken_text`] instead.
pub fn extract_body_text<'a, F>(root: ElementRef<'a>, skip: &F) -> String
where
    F: Fn(ElementRef<'a>) -> bool,
{
    let nodes = dom::text_nodes(root, skip);
    let by_line = nodes.join("\n");
    if !is_noisy_text(&by_line) {
        return clean_text(&by_line);
    }
    tracing::debug!(lines = nodes.len(), "reformatting noisy body text");
    normalize_broken_text(&nodes.join(" "))
}

/// Trims every line and drops the blank ones.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A text is noisy when most of its many lines are one or two characters
/// long, or when it simply has a very large number of line breaks.
pub fn is_noisy_text(text: &str) -> bool {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() >= NOISY_MIN_LINES {
        let short = lines
            .iter()
            .filter(|line| line.chars().count() <= SHORT_LINE_MAX_CHARS)
            .count();
        if short as f64 / lines.len() as f64 >= SHORT_LINE_RATIO {
            return true;
        }
    }

    text.matches('\n').count() >= NOISY_MIN_NEWLINES
}

macro_rules! regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new($pattern).expect(concat!("Failed to compile ", stringify!($name)))
        });
    };
}

regex!(WHITESPACE_RE, r"\s+");
regex!(
    FULL_DATE_RE,
    r"([0-9]{4})\s*\.\s*([0-9]{1,2})\s*\.\s*([0-9]{1,2})\s*\."
);
regex!(
    SHORT_DATE_RE,
    r"([0-9]{2})\s*\.\s*([0-9]{1,2})\s*\.\s*([0-9]{1,2})\s*\."
);
regex!(UNIT_RE, r"([0-9])\s+(시|분|초|호|일|월|년)");
regex!(PHONE_RE, r"\(([0-9]{2,4})\s+([0-9]{3,4})\s+([0-9]{4})\)");
regex!(TILDE_RE, r"\s*~\s*");
regex!(SPACE_BEFORE_PUNCT_RE, r"\s+([:;,.!?])");
regex!(OPEN_PAREN_RE, r"\(\s+");
regex!(CLOSE_PAREN_RE, r"\s+\)");
regex!(SECTION_RE, r"\s*■\s*");
regex!(STARRED_RE, r"\s*(★{3}\s*[^★]+?\s*★{3})\s*");
regex!(CIRCLED_RE, r"\s*([①②③④⑤⑥⑦⑧⑨⑩])\s*");
regex!(LIST_MARKER_RE, r"([1-9][0-9]?)\.");
regex!(DASH_ITEM_RE, r"\s+-\s+");
regex!(NOTE_RE, r"\s*※\s*");
regex!(CONTACT_RE, r"\s*(문의처\s*:)");
regex!(EXCESS_NEWLINES_RE, r"\n{3,}");

/// Rebuilds readable prose from whitespace-collapsed flyer text.
///
/// The passes run in a fixed order and each one sees the output of the
/// previous ones: list detection relies on dates already being joined and
/// on spaces before punctuation already being removed.
pub fn normalize_broken_text(text: &str) -> String {
    let t = WHITESPACE_RE.replace_all(text, " ");
    let t = t.trim();

    // 2025 . 11 . 26 . -> 2025.11.26.
    let t = FULL_DATE_RE.replace_all(t, "${1}.${2}.${3}.");
    // 25 . 11 . 26 . -> 25.11.26.
    let t = replace_checked(&t, &SHORT_DATE_RE, |haystack, caps| {
        let m = caps.get(0)?;
        if preceding_char(haystack, m.start()).is_some_and(|c| c.is_ascii_digit()) {
            return None;
        }
        Some((m.end(), format!("{}.{}.{}.", &caps[1], &caps[2], &caps[3])))
    });

    // 15 시 -> 15시
    let t = UNIT_RE.replace_all(&t, "${1}${2}");
    // (055 751 2088) -> (055-751-2088)
    let t = PHONE_RE.replace_all(&t, "(${1}-${2}-${3})");

    let t = TILDE_RE.replace_all(&t, "~");
    let t = SPACE_BEFORE_PUNCT_RE.replace_all(&t, "${1}");
    let t = OPEN_PAREN_RE.replace_all(&t, "(");
    let t = CLOSE_PAREN_RE.replace_all(&t, ")");

    let t = SECTION_RE.replace_all(&t, "\n■ ");
    let t = STARRED_RE.replace_all(&t, "\n\n**${1}**\n");
    let t = CIRCLED_RE.replace_all(&t, "\n${1} ");
    let t = break_numbered_items(&t);

    let t = DASH_ITEM_RE.replace_all(&t, "\n- ");
    let t = NOTE_RE.replace_all(&t, "\n※ ");
    let t = CONTACT_RE.replace_all(&t, "\n${1}");

    let t = EXCESS_NEWLINES_RE.replace_all(&t, "\n\n");
    t.trim().to_string()
}

/// Starts a new line at `1.` .. `99.` list markers.
///
/// A marker is left alone when it directly follows a letter, digit or
/// Hangul syllable, when it follows `<digit>.` (the tail of a joined date),
/// or when it is glued to a following `N.`/`NN.` fragment without any
/// whitespace in between.
fn break_numbered_items(text: &str) -> String {
    replace_checked(text, &LIST_MARKER_RE, |haystack, caps| {
        let m = caps.get(0)?;
        let mut before = haystack[..m.start()].chars().rev();
        match before.next() {
            Some(c) if is_word_char(c) => return None,
            Some('.') if before.next().is_some_and(|c| c.is_ascii_digit()) => return None,
            _ => {}
        }

        let rest = &haystack[m.end()..];
        let whitespace: Vec<char> = rest.chars().take_while(|c| c.is_whitespace()).collect();
        let whitespace_len: usize = whitespace.iter().map(|c| c.len_utf8()).sum();
        let consumed = if starts_with_date_fragment(&rest[whitespace_len..]) {
            // keep one separator so the fragment is not read as a date
            whitespace_len - whitespace.last()?.len_utf8()
        } else {
            whitespace_len
        };

        Some((m.end() + consumed, format!("\n{}. ", &caps[1])))
    })
}

/// `N.` or `NN.` at the start of `text`.
fn starts_with_date_fragment(text: &str) -> bool {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    (1..=2).contains(&digits) && text[digits..].starts_with('.')
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || ('가'..='힣').contains(&c)
}

fn preceding_char(text: &str, index: usize) -> Option<char> {
    text[..index].chars().next_back()
}

/// Like `Regex::replace_all`, but every match goes through `rewrite`, which
/// sees the whole haystack. Returning `None` vetoes the match and the scan
/// resumes one character after its start. Returning `Some((end, s))`
/// replaces `start..end` with `s`, where `end` may extend past the match.
fn replace_checked<F>(text: &str, re: &Regex, mut rewrite: F) -> String
where
    F: FnMut(&str, &Captures<'_>) -> Option<(usize, String)>,
{
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(caps) = re.captures_at(text, pos) {
        let Some(m) = caps.get(0) else { break };
        match rewrite(text, &caps) {
            Some((end, replacement)) if end > m.start() => {
                out.push_str(&text[copied..m.start()]);
                out.push_str(&replacement);
                copied = end;
                pos = end;
            }
            _ => {
                pos = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
        }
        if pos > text.len() {
            break;
        }
    }

    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_with_short(total: usize, short: usize) -> String {
        (0..total)
            .map(|i| {
                if i < short {
                    "가".to_string()
                } else {
                    format!("충분히 긴 안내 문장 {i}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_noisy_when_many_short_lines() {
        // 20 of 45 lines (44%) are short
        assert!(is_noisy_text(&lines_with_short(45, 20)));
        // 10 of 45 lines (22%) are short
        assert!(!is_noisy_text(&lines_with_short(45, 10)));
    }

    #[test]
    fn test_noisy_needs_enough_lines() {
        // 100% short but fewer than 40 lines
        assert!(!is_noisy_text(&lines_with_short(39, 39)));
    }

    #[test]
    fn test_noisy_when_many_newlines() {
        let text = "긴 문장입니다\n".repeat(120);
        assert!(is_noisy_text(&text));
        assert!(!is_noisy_text(&"긴 문장입니다\n".repeat(119)));
    }

    #[test]
    fn test_clean_text_trims_and_drops_blank_lines() {
        assert_eq!(clean_text("  첫 줄 \n\n \t\n 둘째 줄"), "첫 줄\n둘째 줄");
    }

    #[test]
    fn test_date_joining_is_idempotent() {
        let once = normalize_broken_text("2025 . 11 . 26 .");
        assert_eq!(once, "2025.11.26.");
        assert_eq!(normalize_broken_text(&once), once);
    }

    #[test]
    fn test_short_year_dates_are_joined() {
        assert_eq!(
            normalize_broken_text("기간 25 . 3 . 4 . 까지"),
            "기간 25.3.4. 까지"
        );
    }

    #[test]
    fn test_units_phone_and_punctuation() {
        assert_eq!(
            normalize_broken_text("15 시 30 분 (055 751 2088) 접수 , 마감 !"),
            "15시 30분 (055-751-2088) 접수, 마감!"
        );
        assert_eq!(normalize_broken_text("3월 2일 ~ 3월 6일"), "3월 2일~3월 6일");
    }

    #[test]
    fn test_section_star_and_circled_markers() {
        assert_eq!(
            normalize_broken_text("안내 ■ 대상 재학생 ★★★ 필독 ★★★ ① 서류 ② 면접"),
            "안내\n■ 대상 재학생\n\n**★★★ 필독 ★★★**\n① 서류\n② 면접"
        );
    }

    #[test]
    fn test_numbered_items_break_lines() {
        assert_eq!(
            normalize_broken_text("신청 방법 1. 서류 제출 2. 면접 10. 발표"),
            "신청 방법 \n1. 서류 제출 \n2. 면접 \n10. 발표"
        );
    }

    #[test]
    fn test_numbered_items_leave_dates_and_words_alone() {
        assert_eq!(
            normalize_broken_text("일시 2025.11.26. 및 25.12.1. 버전v2. 참고"),
            "일시 2025.11.26. 및 25.12.1. 버전v2. 참고"
        );
    }

    #[test]
    fn test_dash_note_and_contact_lines() {
        assert_eq!(
            normalize_broken_text("준비물 - 신분증 - 사진 ※ 지참 필수 문의처 : 학생처"),
            "준비물\n- 신분증\n- 사진\n※ 지참 필수\n문의처: 학생처"
        );
    }

    #[test]
    fn test_excess_newlines_collapse() {
        assert_eq!(normalize_broken_text("■ ■ ■ 끝"), "■ \n■ \n■ 끝");
        assert!(!normalize_broken_text("★★★ 가 ★★★ ■ 나").contains("\n\n\n"));
    }

    #[test]
    fn test_replace_checked_resumes_after_veto() {
        let re = Regex::new("ab").unwrap();
        let out = replace_checked("xab ab", &re, |haystack, caps| {
            let m = caps.get(0)?;
            (m.start() > 0 && &haystack[m.start() - 1..m.start()] == " ")
                .then(|| (m.end(), "AB".to_string()))
        });
        assert_eq!(out, "xab AB");
    }
}
