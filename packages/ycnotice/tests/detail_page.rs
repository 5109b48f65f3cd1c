use url::Url;
use ycnotice::{parse_detail, parse_list};

const LIST_URL: &str =
    "https://www.yc.ac.kr/yonam/web/cop/bbs/selectBoardList.do?bbsId=BBSMSTR_000000000590";

const LIST_PAGE: &str = r##"<html><body>
<table class="board_list">
  <thead><tr><th>번호</th><th>제목</th><th>부서</th><th>조회</th><th>등록일</th></tr></thead>
  <tbody>
    <tr>
      <td class="td_num2"><span class="notice">공지</span></td>
      <td class="td_subject"><a href="#" onclick="javascript:fn_egov_inqire_notice('BBSMSTR_000000000590', '12000', this);">[상시] 학사 일정 안내</a></td>
      <td class="td_name">교무처</td><td class="td_num">5,310</td><td class="td_datetime">2025-03-02</td>
    </tr>
    <tr>
      <td class="td_num2">812</td>
      <td class="td_subject"><a href="#" onclick="javascript:fn_egov_inqire_notice('BBSMSTR_000000000590', '12345', this);">2025학년도 장학금 신청 안내 <a class="new_icon"><img src="/images/new.gif" alt="new"></a></a></td>
      <td class="td_name">학생처</td><td class="td_num">1,204</td><td class="td_datetime">2025-08-25</td>
    </tr>
  </tbody>
</table>
</body></html>"##;

const DETAIL_PAGE: &str = r##"<html><head><title>공지사항</title><script>var ctx = "/yonam";</script></head>
<body>
<div id="header"><a href="/">연암대학교</a></div>
<div class="view_wrap">
  <div class="view_subject"><h3>2025학년도 장학금 신청 안내</h3></div>
  <ul class="meta"><li>작성자 학생처</li><li>조회수 1204</li></ul>
  <div class="view_cont">
    <p>2025학년도 2학기 장학금 신청을 아래와 같이 안내합니다.</p>
    <p>
      대상: 재학생 전원
    </p>
    <table><tbody>
      <tr><th>구분</th><th>기간</th><th>장소</th></tr>
      <tr><td>1차</td><td rowspan="2">9월 1일 ~ 9월 5일</td><td>학생처</td></tr>
      <tr><td>2차</td><td>온라인</td></tr>
    </tbody></table>
    <p><img src="/upload/poster.jpg" alt="포스터"></p>
    <p><img src="data:image/gif;base64,R0lGODlhAQABAAAAACw="></p>
    <p><img src="../../../../upload/poster.jpg"></p>
    <style>.view_cont p { margin: 0 }</style>
  </div>
</div>
<div class="board_file"><ul>
  <li><a href="javascript:fn_egov_downFile('FILE_000000000123','0')">신청서.hwp</a></li>
  <li><a href="#none" onclick="fn_egov_downFile('FILE_000000000123','1'); return false;">안내문.pdf</a></li>
</ul></div>
</body></html>"##;

#[test]
fn test_listing_to_detail_pipeline() {
    let list_url = Url::parse(LIST_URL).unwrap();
    let notices = parse_list(LIST_PAGE, &list_url, 10);

    assert_eq!(notices.len(), 1);
    let notice = &notices[0];
    assert_eq!(notice.id, "12345");
    assert_eq!(notice.title, "2025학년도 장학금 신청 안내");
    assert_eq!(notice.department.as_deref(), Some("학생처"));
    assert_eq!(notice.views, Some(1204));
    assert_eq!(
        notice.url,
        "https://www.yc.ac.kr/yonam/web/cop/bbs/selectBoardArticle.do?bbsId=BBSMSTR_000000000590&nttId=12345"
    );

    let detail = parse_detail(DETAIL_PAGE, &Url::parse(&notice.url).unwrap());

    let table = [
        format!("구분 | {:<13} | 장소", "기간"),
        "---+---------------+----".to_string(),
        "1차 | 9월 1일 ~ 9월 5일 | 학생처".to_string(),
        format!("2차 | {:<13} | 온라인", ""),
    ]
    .join("\n");
    assert_eq!(
        detail.text,
        format!(
            "2025학년도 2학기 장학금 신청을 아래와 같이 안내합니다.\n대상: 재학생 전원\n\n[일정]\n{table}"
        )
    );

    assert_eq!(detail.images, vec!["https://www.yc.ac.kr/upload/poster.jpg".to_string()]);
    assert_eq!(detail.image_blobs.len(), 1);
    assert_eq!(detail.image_blobs[0].mime, "image/gif");
    assert_eq!(detail.image_blobs[0].extension, "gif");
    assert!(detail.image_blobs[0].bytes.starts_with(b"GIF89a"));

    assert_eq!(
        detail.files,
        vec![
            "https://www.yc.ac.kr/cmm/fms/FileDown.do?atchFileId=FILE_000000000123&fileSn=0".to_string(),
            "https://www.yc.ac.kr/cmm/fms/FileDown.do?atchFileId=FILE_000000000123&fileSn=1".to_string(),
        ]
    );
}

#[test]
fn test_flyer_page_is_reformatted() {
    let fragments = [
        "■", "모집", "대상", "재학생", "■", "신청", "기간", "2025", ".", "11", ".", "26", ".", "~",
        "2025", ".", "12", ".", "5", ".", "①", "서류", "②", "면접", "1.", "온라인", "접수", "2.",
        "방문", "접수", "※", "기한", "엄수", "문의처", ":", "학생처", "(", "055", "751", "2088", ")",
    ];
    let spans: String = fragments
        .iter()
        .map(|fragment| format!("<span>{fragment}</span>\n"))
        .collect();
    let html = format!(r#"<html><body><div class="view_wrap">{spans}</div></body></html>"#);

    let detail = parse_detail(
        &html,
        &Url::parse("https://www.yc.ac.kr/smartsw/web/cop/bbs/selectBoardArticle.do").unwrap(),
    );
    let lines: Vec<&str> = detail.text.lines().map(str::trim).collect();

    assert_eq!(
        lines,
        [
            "■ 모집 대상 재학생",
            "■ 신청 기간 2025.11.26.~2025.12.5.",
            "① 서류",
            "② 면접",
            "1. 온라인 접수",
            "2. 방문 접수",
            "※ 기한 엄수",
            "문의처: 학생처 (055 751 2088)",
        ]
    );
}

#[test]
fn test_page_without_content_is_empty() {
    let detail = parse_detail(
        "<html><head><title>오류</title></head></html>",
        &Url::parse("https://www.yc.ac.kr/").unwrap(),
    );
    assert!(detail.is_empty());
}
