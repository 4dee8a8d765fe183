//! Both store implementations checked against the same expectations.

use chatrs_core::{ChatRecord, ChatStore, ConversationState, Turn};
use chatrs_store::{MemoryChatStore, SqlChatStore};
use chrono::{Duration, Utc};

fn record(id: &str, user_id: &str, first: &str, age_days: i64) -> ChatRecord {
    let mut state = ConversationState::new(id);
    state.append(Turn::user(first));
    state.append(Turn::assistant("noted"));
    ChatRecord::from_state(&state, user_id, Utc::now() - Duration::days(age_days))
}

async fn exercise(store: &dyn ChatStore) {
    assert!(store.load("missing").await.unwrap().is_none());

    let older = record("c1", "alice", "first chat", 3);
    let newer = record("c2", "alice", "second chat", 1);
    let foreign = record("c3", "bob", "bob's chat", 0);
    for r in [&older, &newer, &foreign] {
        store.save(r).await.unwrap();
    }

    let loaded = store.load("c1").await.unwrap().unwrap();
    assert_eq!(loaded.title, "first chat");
    assert_eq!(loaded.user_id, "alice");
    assert_eq!(loaded.path, "/chat/c1");
    assert_eq!(loaded.turns, older.turns);
    assert_eq!(loaded.created_at.timestamp(), older.created_at.timestamp());

    let listed = store.list("alice").await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["c2", "c1"]);
    assert!(store.list("carol").await.unwrap().is_empty());

    let mut state = loaded.to_state();
    state.append(Turn::user("follow-up"));
    state.append(Turn::assistant("again"));
    let updated = ChatRecord::from_state(&state, "alice", loaded.created_at);
    store.save(&updated).await.unwrap();

    let reloaded = store.load("c1").await.unwrap().unwrap();
    assert_eq!(reloaded.turns.len(), 4);
    assert_eq!(reloaded.title, "first chat");
    assert_eq!(store.list("alice").await.unwrap().len(), 2);

    store.remove("c1").await.unwrap();
    assert!(store.load("c1").await.unwrap().is_none());
    store.remove("c1").await.unwrap();
}

#[tokio::test]
async fn memory_store_round_trip() {
    exercise(&MemoryChatStore::new()).await;
}

#[tokio::test]
async fn sqlite_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("chats.db").display());
    let store = SqlChatStore::new(&url).await.unwrap();
    exercise(&store).await;
}

#[tokio::test]
async fn sqlite_store_reopens_existing_table() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("chats.db").display());

    let first = SqlChatStore::new(&url).await.unwrap();
    first.save(&record("kept", "alice", "survives", 0)).await.unwrap();
    drop(first);

    let second = SqlChatStore::new(&url).await.unwrap();
    let loaded = second.load("kept").await.unwrap().unwrap();
    assert_eq!(loaded.title, "survives");
}
