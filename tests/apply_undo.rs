//! Apply/undo scenarios against the in-memory repository.

use reviewfix::core::{
    FixEngine, FixError, MemoryRepository, MemoryUndoStore, MergeRequestTarget, RepositoryClient,
};

mod util;
use util::{BRANCH, DownStore, MR, PROJECT, request, target};

const PATH: &str = "src/lib.txt";

fn seeded(content: &str) -> (MemoryRepository, String) {
    let repo = MemoryRepository::new();
    let head = repo.push_file(PROJECT, BRANCH, PATH, content);
    (repo, head)
}

fn head_of(repo: &MemoryRepository) -> String {
    repo.branch_head(PROJECT, BRANCH).unwrap()
}

fn content_of(repo: &MemoryRepository) -> String {
    repo.head_content(PROJECT, BRANCH, PATH).unwrap()
}

#[test]
fn multi_line_replacement_then_undo() {
    // Given
    let (repo, head) = seeded("a\nb\nc\nd\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    // When
    let applied = engine
        .apply(&request(PATH, &head, 2, 3, "b\nc", "B\nC\nC2"))
        .unwrap();

    // Then
    assert_eq!(content_of(&repo), "a\nB\nC\nC2\nd\n");
    assert_eq!(
        (applied.updated_start_line, applied.updated_end_line),
        (2, 4)
    );
    assert_eq!(applied.commit_sha.as_deref(), Some(head_of(&repo).as_str()));
    assert!(applied.diff.contains("-b\n-c\n+B\n+C\n+C2\n"));
    assert_eq!(applied.snippet.highlighted_text(), "B\nC\nC2");
    assert_eq!(
        applied.commit_message,
        "fix: apply review suggestion to `src/lib.txt:2-3`"
    );
    let token = applied.undo_token.expect("undo token");

    let undone = engine.undo(&target(), &token).unwrap();
    assert_eq!(content_of(&repo), "a\nb\nc\nd\n");
    assert_eq!(undone.commit_sha, head_of(&repo));
    assert_ne!(undone.commit_sha, head);
    assert_eq!(undone.snippet.highlighted_text(), "b\nc");
    assert_eq!(undone.commit_message, "revert: undo AI fix for `src/lib.txt`");
    assert_eq!(repo.commit_calls(), 2);
}

#[test]
fn crlf_file_keeps_its_line_endings() {
    let (repo, head) = seeded("a\r\nb\r\nc\r\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let applied = engine
        .apply(&request(PATH, &head, 2, 2, "b\r\n", "X\nY"))
        .unwrap();
    assert_eq!(content_of(&repo), "a\r\nX\r\nY\r\nc\r\n");
    assert!(!applied.diff.contains('\r'));

    engine
        .undo(&target(), applied.undo_token.as_deref().unwrap())
        .unwrap();
    assert_eq!(content_of(&repo), "a\r\nb\r\nc\r\n");
}

#[test]
fn missing_trailing_newline_is_preserved() {
    let (repo, head) = seeded("a\nb");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let applied = engine.apply(&request(PATH, &head, 2, 2, "b", "B")).unwrap();
    assert_eq!(content_of(&repo), "a\nB");

    engine
        .undo(&target(), applied.undo_token.as_deref().unwrap())
        .unwrap();
    assert_eq!(content_of(&repo), "a\nb");
}

#[test]
fn empty_replacement_deletes_lines_and_undo_restores_them() {
    let (repo, head) = seeded("a\nb\nc\nd\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let applied = engine.apply(&request(PATH, &head, 2, 3, "b\nc", "")).unwrap();
    assert_eq!(content_of(&repo), "a\nd\n");
    assert_eq!(
        (applied.updated_start_line, applied.updated_end_line),
        (2, 1)
    );
    assert!(applied.snippet.is_degenerate());

    engine
        .undo(&target(), applied.undo_token.as_deref().unwrap())
        .unwrap();
    assert_eq!(content_of(&repo), "a\nb\nc\nd\n");
}

#[test]
fn deleting_every_line_round_trips() {
    let (repo, head) = seeded("only\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let applied = engine.apply(&request(PATH, &head, 1, 1, "only", "")).unwrap();
    assert_eq!(content_of(&repo), "");

    engine
        .undo(&target(), applied.undo_token.as_deref().unwrap())
        .unwrap();
    assert_eq!(content_of(&repo), "only\n");
}

#[test]
fn stale_branch_is_a_conflict_and_writes_nothing() {
    let (repo, seen) = seeded("a\nb\nc\n");
    // Someone else pushes after the suggestion was generated
    repo.push_file(PROJECT, BRANCH, "other.txt", "x\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let err = engine
        .apply(&request(PATH, &seen, 2, 2, "b", "B"))
        .unwrap_err();

    assert!(matches!(err, FixError::Conflict(_)), "{err}");
    assert_eq!(err.status(), 409);
    assert_eq!(repo.commit_calls(), 0);
    assert_eq!(content_of(&repo), "a\nb\nc\n");
}

#[test]
fn stale_content_is_a_conflict_and_writes_nothing() {
    let (repo, head) = seeded("a\nb\nc\n");
    let engine = FixEngine::new(&repo);

    let err = engine
        .apply(&request(PATH, &head, 2, 2, "not b", "B"))
        .unwrap_err();

    assert!(matches!(err, FixError::Conflict(_)), "{err}");
    assert_eq!(repo.commit_calls(), 0);
}

#[test]
fn abbreviated_ref_is_accepted() {
    let (repo, head) = seeded("a\nb\n");
    let engine = FixEngine::new(&repo);

    let applied = engine
        .apply(&request(PATH, &head[..8], 1, 1, "a", "A"))
        .unwrap();
    assert!(applied.commit_sha.is_some());
    assert_eq!(content_of(&repo), "A\nb\n");
}

#[test]
fn invalid_ranges_are_rejected_before_any_write() {
    let (repo, head) = seeded("a\nb\n");
    let engine = FixEngine::new(&repo);

    for (start, end) in [(0, 1), (2, 1), (2, 5)] {
        let err = engine
            .apply(&request(PATH, &head, start, end, "b", "B"))
            .unwrap_err();
        assert!(matches!(err, FixError::InvalidRange(_)), "{start}-{end}: {err}");
        assert_eq!(err.status(), 400);
    }
    assert_eq!(repo.commit_calls(), 0);
}

#[test]
fn dry_run_has_no_side_effects() {
    let (repo, head) = seeded("a\nb\nc\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let mut req = request(PATH, &head, 2, 2, "b", "B");
    req.dry_run = true;
    let preview = engine.apply(&req).unwrap();

    assert!(preview.dry_run);
    assert!(preview.commit_sha.is_none());
    assert!(preview.undo_token.is_none());
    assert!(preview.diff.contains("+B\n"));
    assert_eq!(preview.snippet.git_ref, head);
    assert_eq!(repo.commit_calls(), 0);
    assert_eq!(content_of(&repo), "a\nb\nc\n");
}

#[test]
fn custom_commit_message_is_used() {
    let (repo, head) = seeded("a\n");
    let engine = FixEngine::new(&repo);

    let mut req = request(PATH, &head, 1, 1, "a", "A");
    req.commit_message = Some("  tidy up  ".to_string());
    assert_eq!(engine.apply(&req).unwrap().commit_message, "tidy up");

    let head = head_of(&repo);
    let mut req = request(PATH, &head, 1, 1, "A", "a");
    req.commit_message = Some("   ".to_string());
    assert!(
        engine
            .apply(&req)
            .unwrap()
            .commit_message
            .starts_with("fix: ")
    );
}

#[test]
fn race_between_check_and_commit_is_a_conflict() {
    let (repo, head) = seeded("a\nb\nc\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    repo.race_next_commit(PROJECT, BRANCH, "other.txt", "concurrent\n");
    let err = engine
        .apply(&request(PATH, &head, 2, 2, "b", "B"))
        .unwrap_err();

    assert!(matches!(err, FixError::Conflict(_)), "{err}");
    assert_eq!(content_of(&repo), "a\nb\nc\n");
}

#[test]
fn undo_token_is_single_use() {
    let (repo, head) = seeded("a\nb\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let token = engine
        .apply(&request(PATH, &head, 1, 1, "a", "A"))
        .unwrap()
        .undo_token
        .unwrap();
    engine.undo(&target(), &token).unwrap();

    let err = engine.undo(&target(), &token).unwrap_err();
    assert!(matches!(err, FixError::NotFound(_)), "{err}");
    assert_eq!(err.status(), 404);
}

#[test]
fn unknown_token_is_not_found() {
    let (repo, _) = seeded("a\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let err = engine.undo(&target(), "no-such-token").unwrap_err();
    assert!(matches!(err, FixError::NotFound(_)));
}

#[test]
fn undo_after_new_push_is_refused() {
    let (repo, head) = seeded("a\nb\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let token = engine
        .apply(&request(PATH, &head, 1, 1, "a", "A"))
        .unwrap()
        .undo_token
        .unwrap();
    repo.push_file(PROJECT, BRANCH, "other.txt", "later\n");
    let calls = repo.commit_calls();

    let err = engine.undo(&target(), &token).unwrap_err();
    assert!(matches!(err, FixError::Conflict(_)), "{err}");
    assert_eq!(repo.commit_calls(), calls);
    assert_eq!(content_of(&repo), "A\nb\n");
}

#[test]
fn undo_for_another_branch_is_a_conflict() {
    let (repo, head) = seeded("a\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let token = engine
        .apply(&request(PATH, &head, 1, 1, "a", "A"))
        .unwrap()
        .undo_token
        .unwrap();

    let moved = MergeRequestTarget {
        source_branch: "renamed".to_string(),
        ..target()
    };
    let err = engine.undo(&moved, &token).unwrap_err();
    assert!(matches!(err, FixError::Conflict(_)), "{err}");
}

#[test]
fn undo_for_another_merge_request_is_not_found() {
    let (repo, head) = seeded("a\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    let token = engine
        .apply(&request(PATH, &head, 1, 1, "a", "A"))
        .unwrap()
        .undo_token
        .unwrap();

    let other = MergeRequestTarget {
        merge_request: format!("{MR}0"),
        ..target()
    };
    assert!(matches!(
        engine.undo(&other, &token).unwrap_err(),
        FixError::NotFound(_)
    ));
    // The token still works for its own merge request
    engine.undo(&target(), &token).unwrap();
}

#[test]
fn apply_without_store_commits_but_returns_no_token() {
    let (repo, head) = seeded("a\n");
    let engine = FixEngine::new(&repo);

    let applied = engine.apply(&request(PATH, &head, 1, 1, "a", "A")).unwrap();
    assert!(applied.commit_sha.is_some());
    assert!(applied.undo_token.is_none());
}

#[test]
fn apply_with_failing_store_still_succeeds() {
    let (repo, head) = seeded("a\n");
    let store = DownStore;
    let engine = FixEngine::new(&repo).with_store(&store);

    let applied = engine.apply(&request(PATH, &head, 1, 1, "a", "A")).unwrap();
    assert!(applied.commit_sha.is_some());
    assert!(applied.undo_token.is_none());
    assert_eq!(content_of(&repo), "A\n");
}

#[test]
fn undo_without_store_is_unavailable() {
    let (repo, _) = seeded("a\n");

    let err = FixEngine::new(&repo).undo(&target(), "tok").unwrap_err();
    assert!(matches!(err, FixError::StoreUnavailable(_)));
    assert_eq!(err.status(), 503);

    let store = DownStore;
    let err = FixEngine::new(&repo)
        .with_store(&store)
        .undo(&target(), "tok")
        .unwrap_err();
    assert_eq!(err.status(), 503);
}

#[test]
fn missing_file_is_an_upstream_not_found() {
    let (repo, head) = seeded("a\n");
    let engine = FixEngine::new(&repo);

    let err = engine
        .apply(&request("missing.txt", &head, 1, 1, "a", "A"))
        .unwrap_err();
    assert!(matches!(err, FixError::Upstream { status: Some(404), .. }));
    assert_eq!(err.status(), 502);
}

#[test]
fn snippet_text_ending_in_blank_line_applies_unchanged() {
    let (repo, _) = seeded("a\nb\n\nc\n");
    let store = MemoryUndoStore::default();
    let engine = FixEngine::new(&repo).with_store(&store);

    // Capture the edit context the way the review UI does
    let captured = engine.snippet(PROJECT, PATH, BRANCH, 2, 3).unwrap();
    assert_eq!(captured.highlighted_text(), "b\n");

    let applied = engine
        .apply(&request(
            PATH,
            &captured.git_ref,
            2,
            3,
            &captured.highlighted_text(),
            "B",
        ))
        .unwrap();
    assert_eq!(content_of(&repo), "a\nB\nc\n");

    engine
        .undo(&target(), applied.undo_token.as_deref().unwrap())
        .unwrap();
    assert_eq!(content_of(&repo), "a\nb\n\nc\n");
}

#[test]
fn deleting_lines_shifts_later_line_numbers_in_snippet() {
    let original: String = (1..=10).map(|i| format!("l{i}\n")).collect();
    let (repo, head) = seeded(&original);
    let engine = FixEngine::new(&repo);

    let applied = engine
        .apply(&request(PATH, &head, 5, 7, "l5\nl6\nl7", ""))
        .unwrap();

    let numbered: Vec<(usize, &str)> = applied
        .snippet
        .lines
        .iter()
        .map(|l| (l.line_number, l.content.as_str()))
        .collect();
    assert_eq!(
        numbered,
        vec![
            (1, "l1"),
            (2, "l2"),
            (3, "l3"),
            (4, "l4"),
            (5, "l8"),
            (6, "l9"),
            (7, "l10"),
        ]
    );
    assert!(applied.snippet.lines.iter().all(|l| !l.highlight));
    assert_eq!(applied.snippet.total_lines, 7);
}
