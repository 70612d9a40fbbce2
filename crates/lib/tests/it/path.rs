use treesync::path::{Path, PathError, Step};

#[test]
fn test_parse_team_score() {
    let path = Path::parse("Team(1).Score").unwrap();
    assert_eq!(
        path.steps(),
        &[Step::with_id("Team", "1").unwrap(), Step::named("Score").unwrap()]
    );
}

#[test]
fn test_ids_may_contain_dots_and_spaces() {
    let path = Path::parse("ScoreBoard.Team(1).Skater(Some Skater.name).Number").unwrap();
    assert_eq!(path.len(), 4);
    assert_eq!(path[2].id(), Some("Some Skater.name"));
    assert_eq!(
        path.to_string(),
        "ScoreBoard.Team(1).Skater(Some Skater.name).Number"
    );
}

#[test]
fn test_empty_id_differs_from_no_id() {
    let empty = Path::parse("Team()").unwrap();
    let none = Path::parse("Team").unwrap();
    assert_eq!(empty[0].id(), Some(""));
    assert_eq!(none[0].id(), None);
    assert_ne!(empty, none);
}

#[test]
fn test_malformed_paths_are_rejected() {
    for input in ["Team(1", "Team(1)Score", ".Score", "Score.", "Team((1))", "A..B"] {
        let err = Path::parse(input).unwrap_err();
        assert!(err.is_malformed(), "{input} should be malformed, got {err:?}");
    }
}

#[test]
fn test_lenient_parse_skips_junk() {
    assert_eq!(
        Path::parse_lenient("Team(1).$.Score").to_string(),
        "Team(1).Score"
    );
}

#[test]
fn test_step_validation() {
    assert!(matches!(
        Step::named("Bad Name"),
        Err(PathError::InvalidName { .. })
    ));
    assert!(matches!(
        Step::with_id("Team", "a(b"),
        Err(PathError::InvalidId { .. })
    ));
}
