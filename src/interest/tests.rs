use super::*;

#[test]
fn test_parse_strips_markers_and_blank_lines() {
    let text = "# Questions\n\n- What is new in AI regulation?\n*  Who funds fusion startups? \n\n+ Rust adoption in kernels\n";
    let interests = parse_interest_lines(text, InterestKind::Question);

    let texts: Vec<_> = interests.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "What is new in AI regulation?",
            "Who funds fusion startups?",
            "Rust adoption in kernels",
        ]
    );
    assert!(interests.iter().all(|i| i.kind == InterestKind::Question));
    assert!(interests.iter().all(|i| i.id.starts_with("q-")));
}

#[test]
fn test_parse_collapses_case_insensitive_duplicates() {
    let text = "- Space launches\n- space launches\n- SPACE LAUNCHES";
    let interests = parse_interest_lines(text, InterestKind::Topic);
    assert_eq!(interests.len(), 1);
    assert_eq!(interests[0].text, "Space launches");
}

#[test]
fn test_interest_new_rejects_empty_text() {
    assert!(matches!(
        Interest::new("q1", InterestKind::Question, "  - "),
        Err(InterestError::EmptyText)
    ));
}

#[test]
fn test_interest_kind_from_str() {
    assert_eq!("Question".parse::<InterestKind>(), Ok(InterestKind::Question));
    assert_eq!("t".parse::<InterestKind>(), Ok(InterestKind::Topic));
    assert!("other".parse::<InterestKind>().is_err());
}

#[test]
fn test_snapshot_drops_duplicate_ids() {
    let a = Interest::new("q1", InterestKind::Question, "first").unwrap();
    let b = Interest::new("q1", InterestKind::Question, "second").unwrap();
    let snapshot = InterestSnapshot::new(3, vec![a, b]);

    assert_eq!(snapshot.version(), 3);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get("q1").unwrap().text, "first");
}

#[tokio::test]
async fn test_store_reload_creates_new_versioned_snapshot() {
    let source = std::sync::Arc::new(StaticInterestSource::new("- AI regulation", "- Fusion"));
    let store = InterestStore::new(Box::new(SharedSource(source.clone())));

    assert!(store.snapshot().is_empty());

    let first = store.reload().await.unwrap();
    assert_eq!(first.version(), 1);
    assert_eq!(first.count_of(InterestKind::Question), 1);
    assert_eq!(first.count_of(InterestKind::Topic), 1);

    source.set("- AI regulation\n- Chip export controls", "");
    let second = store.reload().await.unwrap();

    assert_eq!(second.version(), 2);
    assert_eq!(second.len(), 2);
    // The snapshot handed out earlier is untouched.
    assert_eq!(first.len(), 2);
    assert_eq!(first.count_of(InterestKind::Topic), 1);
    assert_eq!(store.snapshot().version(), 2);
}

#[tokio::test]
async fn test_store_reload_keeps_ids_stable() {
    let store = InterestStore::new(Box::new(StaticInterestSource::new("- AI regulation", "")));
    let first = store.reload().await.unwrap();
    let second = store.reload().await.unwrap();

    assert_eq!(first.interests()[0].id, second.interests()[0].id);
}

#[tokio::test]
async fn test_file_source_missing_files_are_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    let questions = dir.path().join("question_list.md");
    std::fs::write(&questions, "- Who regulates AI?\n").unwrap();

    let source = FileInterestSource::new(questions, dir.path().join("topic_list.md"));
    let texts = source.read().await.unwrap();

    assert_eq!(texts.questions, "- Who regulates AI?\n");
    assert!(texts.topics.is_empty());
}

struct SharedSource(std::sync::Arc<StaticInterestSource>);

#[async_trait::async_trait]
impl InterestSource for SharedSource {
    async fn read(&self) -> Result<InterestTexts, InterestError> {
        self.0.read().await
    }
}
