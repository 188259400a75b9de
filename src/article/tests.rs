use super::*;
use chrono::TimeZone;

fn fetched_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_canonicalize_url_normalizes_host_and_scheme() {
    assert_eq!(
        canonicalize_url("HTTPS://Example.COM/News/AI-Act/"),
        "https://example.com/News/AI-Act"
    );
}

#[test]
fn test_canonicalize_url_drops_fragment_and_tracking() {
    assert_eq!(
        canonicalize_url("https://example.com/a?id=7&utm_source=rss&utm_medium=feed#comments"),
        "https://example.com/a?id=7"
    );
    assert_eq!(
        canonicalize_url("https://example.com/a?utm_campaign=x"),
        "https://example.com/a"
    );
}

#[test]
fn test_canonicalize_url_root_path() {
    assert_eq!(
        canonicalize_url("https://example.com/"),
        canonicalize_url("https://example.com")
    );
}

#[test]
fn test_canonicalize_url_without_scheme_is_trimmed_only() {
    assert_eq!(canonicalize_url("  not a url "), "not a url");
}

#[test]
fn test_from_raw_uses_url_for_id() {
    let a = Article::from_raw(
        RawArticle {
            url: Some("https://example.com/story#top".to_string()),
            title: "Story".to_string(),
            body: "Body".to_string(),
            ..Default::default()
        },
        "feed",
        fetched_at(),
    );
    let b = Article::from_raw(
        RawArticle {
            url: Some("https://EXAMPLE.com/story/".to_string()),
            title: "Story (updated title)".to_string(),
            body: "Different body".to_string(),
            ..Default::default()
        },
        "feed",
        fetched_at(),
    );

    assert_eq!(a.id, b.id);
    assert_eq!(a.url.as_deref(), Some("https://example.com/story"));
    assert_eq!(a.source, "feed");
}

#[test]
fn test_from_raw_without_url_uses_content_hash() {
    let raw = RawArticle {
        url: Some("   ".to_string()),
        title: "Title".to_string(),
        body: "Body".to_string(),
        source: Some("hacker-news".to_string()),
        published_at: None,
    };
    let article = Article::from_raw(raw, "fallback", fetched_at());

    assert!(article.url.is_none());
    assert_eq!(article.id.as_str(), article_id_from_content("Title", "Body"));
    assert_eq!(article.source, "hacker-news");
}

#[test]
fn test_raw_article_accepts_content_and_date_aliases() {
    let raw: RawArticle = serde_json::from_str(
        r#"{"title":"T","content":"C","url":"https://x.io/1","date":"2024-03-01T08:00:00Z"}"#,
    )
    .unwrap();

    assert_eq!(raw.body, "C");
    assert!(raw.published_at.is_some());
}

#[test]
fn test_embedding_text_truncates_leading_chars() {
    let article = Article::from_raw(
        RawArticle {
            title: "T".to_string(),
            body: "héllo world".to_string(),
            ..Default::default()
        },
        "s",
        fetched_at(),
    );

    assert_eq!(article.embedding_text(5), Some("héllo"));
    assert_eq!(article.embedding_text(1_000), Some("héllo world"));
}

#[test]
fn test_embedding_text_falls_back_to_title() {
    let article = Article::from_raw(
        RawArticle {
            title: "Only a headline".to_string(),
            body: "   ".to_string(),
            ..Default::default()
        },
        "s",
        fetched_at(),
    );
    assert_eq!(article.embedding_text(100), Some("Only a headline"));

    let empty = Article::from_raw(RawArticle::default(), "s", fetched_at());
    assert_eq!(empty.embedding_text(100), None);
}

#[test]
fn test_truncate_chars_on_boundary() {
    assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    assert_eq!(truncate_chars("abc", 0), "");
    assert_eq!(truncate_chars("abc", 3), "abc");
}
