use std::time::Duration;

use tracker_core::{update, FileHandle, Msg, PollSession, StageKind};

#[test]
fn update_is_noop() {
    let session = PollSession::new(FileHandle::new("f"), StageKind::Graph, Duration::from_secs(300));
    let (next, effects) = update(session.clone(), Msg::NoOp);

    assert_eq!(session, next);
    assert!(effects.is_empty());
}
