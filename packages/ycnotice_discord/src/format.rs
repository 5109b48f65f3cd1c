//! Message text for announcements and the notice body preview.

use std::fmt::Write as _;

use ycnotice::{NoticeDetail, NoticeSummary};

/// Body characters kept in an announcement.
pub const BODY_LIMIT: usize = 1500;
/// Body characters kept in a preview requested by hand.
pub const PREVIEW_BODY_LIMIT: usize = 1800;
/// Discord's hard limit on message content.
pub const CONTENT_LIMIT: usize = 2000;

const TRUNCATION_MARKER: &str = "\n...(이하 생략)";
const PLACEHOLDER: &str = "-";

/// Keeps the first `limit` characters of `text`, marking the cut.
pub fn truncate_body(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn metadata_line(notice: &NoticeSummary) -> String {
    format!(
        "- 부서: {} / 날짜: {} / 조회수: {}",
        notice.department.as_deref().unwrap_or(PLACEHOLDER),
        notice.date.as_deref().unwrap_or(PLACEHOLDER),
        notice
            .views
            .map_or_else(|| PLACEHOLDER.to_string(), |views| views.to_string()),
    )
}

/// Announcement text. `linked_images` are images that could not be
/// uploaded and are linked instead.
pub fn notice_message(
    label: &str,
    notice: &NoticeSummary,
    detail: &NoticeDetail,
    linked_images: &[String],
) -> String {
    let mut message = format!(
        "**{label}**\n**{}**\n{}\n{}\n",
        notice.title,
        metadata_line(notice),
        notice.url
    );

    if !detail.text.is_empty() {
        let _ = write!(message, "\n{}", truncate_body(&detail.text, BODY_LIMIT));
    }
    if let Some(first) = detail.files.first() {
        let _ = write!(message, "\n\n📎 첨부파일 {}개\n{first}", detail.files.len());
    }
    for image in linked_images {
        let _ = write!(message, "\n🖼 이미지: {image}");
    }

    clip_content(&message)
}

/// The body of one notice as shown on request.
pub fn body_preview(url: &str, detail: &NoticeDetail) -> String {
    let mut message = format!(
        "📄 **공지 본문**\n{url}\n\n{}",
        truncate_body(&detail.text, PREVIEW_BODY_LIMIT)
    );
    if let Some(image) = detail.images.first() {
        let _ = write!(message, "\n\n🖼 이미지(첫 장): {image}");
    }
    clip_content(&message)
}

pub fn clip_content(text: &str) -> String {
    match text.char_indices().nth(CONTENT_LIMIT) {
        Some(_) => {
            let mut clipped: String = text.chars().take(CONTENT_LIMIT - 1).collect();
            clipped.push('…');
            clipped
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> NoticeSummary {
        NoticeSummary {
            id: "12345".to_string(),
            title: "장학금 신청 안내".to_string(),
            url: "https://www.yc.ac.kr/view.do?nttId=12345".to_string(),
            department: Some("학생처".to_string()),
            views: Some(1204),
            date: Some("2025-08-25".to_string()),
        }
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("가나다", 3), "가나다");
        assert_eq!(truncate_body("가나다라", 3), "가나다\n...(이하 생략)");
        assert_eq!(truncate_body("", 3), "");
    }

    #[test]
    fn test_metadata_placeholders() {
        let mut notice = notice();
        assert_eq!(
            metadata_line(&notice),
            "- 부서: 학생처 / 날짜: 2025-08-25 / 조회수: 1204"
        );
        notice.department = None;
        notice.views = None;
        notice.date = None;
        assert_eq!(metadata_line(&notice), "- 부서: - / 날짜: - / 조회수: -");
    }

    #[test]
    fn test_notice_message() {
        let detail = NoticeDetail {
            text: "신청 기간: 9월 1일~9월 5일".to_string(),
            files: vec![
                "https://www.yc.ac.kr/cmm/fms/FileDown.do?atchFileId=F&fileSn=0".to_string(),
                "https://www.yc.ac.kr/cmm/fms/FileDown.do?atchFileId=F&fileSn=1".to_string(),
            ],
            ..Default::default()
        };
        let message = notice_message(
            "📢 새 학교 공지",
            &notice(),
            &detail,
            &["https://www.yc.ac.kr/upload/a.png".to_string()],
        );
        assert_eq!(
            message,
            "**📢 새 학교 공지**\n\
             **장학금 신청 안내**\n\
             - 부서: 학생처 / 날짜: 2025-08-25 / 조회수: 1204\n\
             https://www.yc.ac.kr/view.do?nttId=12345\n\
             \n\
             신청 기간: 9월 1일~9월 5일\n\
             \n\
             📎 첨부파일 2개\n\
             https://www.yc.ac.kr/cmm/fms/FileDown.do?atchFileId=F&fileSn=0\n\
             🖼 이미지: https://www.yc.ac.kr/upload/a.png"
        );
    }

    #[test]
    fn test_empty_detail_still_announces() {
        let message = notice_message("📢 새 학과 공지", &notice(), &NoticeDetail::default(), &[]);
        assert!(message.ends_with("https://www.yc.ac.kr/view.do?nttId=12345\n"));
        assert!(!message.contains("📎"));
    }

    #[test]
    fn test_long_body_fits_discord_limit() {
        let detail = NoticeDetail {
            text: "가".repeat(5000),
            ..Default::default()
        };
        let message = notice_message("📢 새 학교 공지", &notice(), &detail, &[]);
        assert!(message.chars().count() <= CONTENT_LIMIT);
        assert!(message.ends_with("(이하 생략)"));
        assert_eq!(message.matches('가').count(), BODY_LIMIT);
    }

    #[test]
    fn test_body_preview() {
        let detail = NoticeDetail {
            text: "본문".to_string(),
            images: vec!["https://www.yc.ac.kr/upload/a.png".to_string()],
            ..Default::default()
        };
        assert_eq!(
            body_preview("https://www.yc.ac.kr/view.do", &detail),
            "📄 **공지 본문**\nhttps://www.yc.ac.kr/view.do\n\n본문\n\n🖼 이미지(첫 장): https://www.yc.ac.kr/upload/a.png"
        );
    }

    #[test]
    fn test_clip_content() {
        let text = "a".repeat(CONTENT_LIMIT + 10);
        let clipped = clip_content(&text);
        assert_eq!(clipped.chars().count(), CONTENT_LIMIT);
        assert!(clipped.ends_with('…'));
        assert_eq!(clip_content("short"), "short");
    }
}
