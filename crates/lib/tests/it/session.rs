use treesync::{Element, events::Topic};

use crate::helpers::{document, logged_session, team};

#[test]
fn test_team_score_on_empty_tree() {
    let (mut session, log) = logged_session();

    session.apply(&document([team("1", "5")])).unwrap();

    assert_eq!(
        log.take(),
        vec![
            "add Team(1)",
            "add Team(1).Score",
            "content Team(1).Score None -> Some(\"5\")",
            "load",
        ]
    );
}

#[test]
fn test_identity_rules_never_cross_match() {
    let (mut session, _log) = logged_session();
    session
        .apply(&document([
            Element::new("Team").with_id("1"),
            Element::new("Team"),
            Element::new("Team").with_id(""),
        ]))
        .unwrap();

    assert_eq!(session.tree().len(), 3);
    let with_id = session.find("Team(1)").unwrap().unwrap();
    let without = session.find("Team").unwrap().unwrap();
    let empty_id = session.find("Team()").unwrap().unwrap();
    assert_ne!(with_id, without);
    assert_ne!(without, empty_id);
    assert_eq!(session.find("Team(2)").unwrap(), None);
}

#[test]
fn test_creation_queues_exactly_one_push() {
    let (mut session, _log) = logged_session();
    let node = session.node("A.B").unwrap();

    assert_eq!(session.get("A.B").unwrap(), None);
    assert_eq!(session.tree().text(node), None);

    let pushes = session.take_pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0], session.snapshot());
}

#[test]
fn test_suppressed_creation_leaves_tree_alone() {
    let (session, log) = logged_session();
    assert_eq!(session.find("A.B.C").unwrap(), None);
    assert!(session.tree().is_empty());
    assert!(log.take().is_empty());
}

#[test]
fn test_readd_after_remove_refires_add() {
    let (mut session, log) = logged_session();
    session.apply(&document([team("1", "5")])).unwrap();
    session
        .apply(&document([Element::new("Team").with_id("1").removed()]))
        .unwrap();
    log.take();

    session.apply(&document([team("1", "5")])).unwrap();
    assert_eq!(
        log.take(),
        vec![
            "add Team(1)",
            "add Team(1).Score",
            "content Team(1).Score None -> Some(\"5\")",
        ]
    );
}

#[test]
fn test_named_subscriptions_on_parent() {
    let (mut session, _log) = logged_session();
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

    for topic in ["add", "add:Team", "add:Other", "remove:Team"] {
        let sink = seen.clone();
        let label = topic.to_string();
        session.subscribe("", topic.parse::<Topic>().unwrap(), move |_| {
            sink.lock().unwrap().push(label.clone());
        });
    }

    session.apply(&document([team("1", "5")])).unwrap();
    session
        .apply(&document([Element::new("Team").with_id("1").removed()]))
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["add", "add:Team", "remove:Team"]);
}

#[test]
fn test_remove_notifications_after_all_mutations() {
    let (mut session, _log) = logged_session();
    session
        .apply(&document([Element::new("A")
            .with_child(Element::new("B"))
            .with_child(Element::new("C"))]))
        .unwrap();

    let bus = session.bus().clone();
    let observed = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = observed.clone();
    bus.subscribe("A", Topic::Remove, move |e| {
        sink.lock().unwrap().push(e.to_string());
    });

    session
        .apply(&document([Element::new("A").removed()]))
        .unwrap();
    assert_eq!(*observed.lock().unwrap(), vec!["remove A.B", "remove A.C"]);
    assert!(session.tree().is_empty());
}

#[test]
fn test_change_leaves_local_value_for_server() {
    let (mut session, log) = logged_session();
    session.apply(&document([team("1", "5")])).unwrap();
    log.take();

    session.change("Team(1).Score", "1").unwrap();
    assert!(log.take().is_empty());

    // The server applies the delta and sends back the result.
    session.apply(&document([team("1", "6")])).unwrap();
    assert_eq!(
        log.take(),
        vec!["content Team(1).Score Some(\"5\") -> Some(\"6\")"]
    );
}
