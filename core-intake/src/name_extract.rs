//! Best-effort candidate name extraction from resume filenames.
//!
//! Recruiters receive files like `张三_简历.pdf`, `【Java开发】李四.docx` or
//! `John_Smith_Resume.pdf`. Patterns are tried in order and the first one that
//! yields a 2-20 character name wins.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 20;

static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // 【岗位】姓名
        r"【[^】]*】\s*([\p{Han}A-Za-z·]{2,20})",
        // 姓名_简历, 姓名的个人简历
        r"^([\p{Han}·]{2,20}?)[_\-\s]*(?:的)?(?:个人)?简历",
        // 简历-姓名
        r"简历[_\-\s：:]*([\p{Han}·]{2,20})",
        // John_Smith_Resume
        r"(?i)^([A-Za-z]+(?:[ _.\-][A-Za-z]+){0,2})[_\-\s.]+(?:resume|cv)\b",
        // resume-jane-doe
        r"(?i)^(?:resume|cv)[_\-\s.]+([A-Za-z]+(?:[ _.\-][A-Za-z]+){0,2})$",
        // 赵六, 赵六-13800000000
        r"^([\p{Han}]{2,4})(?:[_\-\s（(].*)?$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Guess the candidate's name from a resume filename.
///
/// Returns `None` when no pattern yields a plausible name.
pub fn extract_candidate_name(file_name: &str) -> Option<String> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .trim();

    NAME_PATTERNS.iter().find_map(|pattern| {
        let captured = pattern.captures(stem)?.get(1)?.as_str();
        let name = normalize(captured);
        let chars = name.chars().count();
        ((MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&chars) && !is_keyword(&name))
            .then_some(name)
    })
}

fn is_keyword(name: &str) -> bool {
    name.contains("简历") || name.eq_ignore_ascii_case("resume") || name.eq_ignore_ascii_case("cv")
}

fn normalize(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chinese_name_before_keyword() {
        assert_eq!(extract_candidate_name("张三_简历.pdf").as_deref(), Some("张三"));
        assert_eq!(
            extract_candidate_name("欧阳娜娜的个人简历.docx").as_deref(),
            Some("欧阳娜娜")
        );
    }

    #[test]
    fn test_chinese_name_after_keyword() {
        assert_eq!(extract_candidate_name("简历-李四.docx").as_deref(), Some("李四"));
        assert_eq!(extract_candidate_name("简历：孙七.txt").as_deref(), Some("孙七"));
    }

    #[test]
    fn test_bracketed_position_prefix() {
        assert_eq!(
            extract_candidate_name("【前端开发】王五_3年.pdf").as_deref(),
            Some("王五")
        );
    }

    #[test]
    fn test_english_names() {
        assert_eq!(
            extract_candidate_name("John_Smith_Resume.pdf").as_deref(),
            Some("John Smith")
        );
        assert_eq!(
            extract_candidate_name("resume-jane-doe.txt").as_deref(),
            Some("jane doe")
        );
        assert_eq!(
            extract_candidate_name("Ada Lovelace CV.doc").as_deref(),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn test_bare_chinese_name() {
        assert_eq!(extract_candidate_name("赵六.pdf").as_deref(), Some("赵六"));
        assert_eq!(
            extract_candidate_name("赵六-13800000000.pdf").as_deref(),
            Some("赵六")
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract_candidate_name("scan_0001.pdf"), None);
        assert_eq!(extract_candidate_name("简历.pdf"), None);
        assert_eq!(extract_candidate_name("resume.pdf"), None);
    }
}
