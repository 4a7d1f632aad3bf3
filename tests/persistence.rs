mod support;

use chat_stream::{SessionController, UserInput};
use pretty_assertions::assert_eq;
use session_store::{FileStore, SessionStore};

use support::{chunks, content, done, usage, ScriptedTransport};

#[tokio::test]
async fn conversation_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let root = dir.path().join("sessions");

    let id = {
        let (transport, _) = ScriptedTransport::new(vec![chunks(vec![
            content("Stored "),
            content("reply"),
            usage(9, 2, 11),
            done(),
        ])]);
        let store = SessionStore::new(FileStore::open(&root).expect("open should succeed"));
        let mut controller = SessionController::new(transport, store, support::settings());
        controller
            .submit(UserInput::text("Remember this conversation"))
            .await
            .expect("turn should succeed");
        controller.session().id.clone().expect("id assigned")
    };

    let (transport, trace) = ScriptedTransport::new(vec![chunks(vec![content("Yes"), done()])]);
    let store = SessionStore::new(FileStore::open(&root).expect("reopen should succeed"));
    let mut controller = SessionController::new(transport, store, support::settings());

    let listed = controller.sessions().expect("list should succeed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Remember this conver...");

    controller.resume(&id).expect("resume should succeed");
    assert_eq!(controller.session().context_usage, 11);
    assert_eq!(controller.metrics().total_tokens, 11);

    controller
        .submit(UserInput::text("Do you remember?"))
        .await
        .expect("turn should succeed");

    let request = support::lock_unpoisoned(&trace).requests[0].clone();
    assert_eq!(request.messages.len(), 3);

    let reopened = SessionStore::new(FileStore::open(&root).expect("reopen should succeed"));
    let snapshot = reopened
        .read(&id)
        .expect("read should succeed")
        .expect("snapshot should exist");
    let contents: Vec<&str> = snapshot.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["Remember this conversation", "Stored reply", "Do you remember?", "Yes"]
    );
    assert_eq!(snapshot.context_usage, 11);
}
