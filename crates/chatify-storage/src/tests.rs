#[cfg(test)]
mod tests {
    use crate::Database;
    use chatify_core::config::AppConfig;
    use chatify_core::conversation::DEFAULT_TITLE;
    use chatify_core::error::StorageError;
    use chatify_core::message::*;
    use chatify_core::store::ConversationStore;
    use std::sync::Arc;
    use std::time::Duration;

    async fn test_db() -> (Database, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            working_dir: tmp.path().to_path_buf(),
            data_dir: "data".into(),
            ..Default::default()
        };
        let db = Database::open(&config).await.unwrap();
        db.run_migrations().await.unwrap();
        (db, tmp)
    }

    #[tokio::test]
    async fn test_migrations_are_rerunnable() {
        let (db, _tmp) = test_db().await;
        db.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn test_conversation_crud() {
        let (db, _tmp) = test_db().await;

        // Create
        let conv = db.create_conversation("user-1", None).await.unwrap();
        assert_eq!(conv.title, DEFAULT_TITLE);

        // Read
        let fetched = db.get_conversation(&conv.id).await.unwrap();
        assert_eq!(fetched.user_id, "user-1");
        assert_eq!(fetched.title, DEFAULT_TITLE);

        // Rename
        db.rename_conversation(&conv.id, "  Borrow checker  ")
            .await
            .unwrap();
        let renamed = db.get_conversation(&conv.id).await.unwrap();
        assert_eq!(renamed.title, "Borrow checker");
        assert!(renamed.updated_at >= fetched.updated_at);

        // Delete
        db.delete_conversation(&conv.id).await.unwrap();
        assert!(matches!(
            db.get_conversation(&conv.id).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_rejects_blank_and_unknown() {
        let (db, _tmp) = test_db().await;
        let conv = db.create_conversation("user-1", Some("Keep")).await.unwrap();

        assert!(matches!(
            db.rename_conversation(&conv.id, "   ").await,
            Err(StorageError::InvalidTitle)
        ));
        assert_eq!(db.get_conversation(&conv.id).await.unwrap().title, "Keep");

        assert!(matches!(
            db.rename_conversation("missing", "Title").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_conversation("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first_and_scoped_to_user() {
        let (db, _tmp) = test_db().await;

        let first = db.create_conversation("user-1", Some("first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = db.create_conversation("user-1", Some("second")).await.unwrap();
        db.create_conversation("user-2", Some("other")).await.unwrap();

        let listed = db.list_conversations("user-1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

        tokio::time::sleep(Duration::from_millis(5)).await;
        db.touch_conversation(&first.id).await.unwrap();

        let listed = db.list_conversations("user-1").await.unwrap();
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_append_and_load_messages() {
        let (db, _tmp) = test_db().await;
        let conv = db.create_conversation("user-1", None).await.unwrap();

        let stored = db
            .append_messages(
                &conv.id,
                "user-1",
                &[NewMessage::user("Hello"), NewMessage::assistant("Hello, world!")],
            )
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, Role::User);
        assert_eq!(stored[1].role, Role::Assistant);
        assert_ne!(stored[0].id, stored[1].id);
        assert!(stored[0].created_at < stored[1].created_at);

        let loaded = db.load_messages(&conv.id).await.unwrap();
        assert_eq!(loaded, stored);

        // A second exchange lands after the first
        db.append_messages(
            &conv.id,
            "user-1",
            &[NewMessage::user("Again"), NewMessage::assistant("Sure")],
        )
        .await
        .unwrap();
        let loaded = db.load_messages(&conv.id).await.unwrap();
        let contents: Vec<_> = loaded.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Hello", "Hello, world!", "Again", "Sure"]);
    }

    #[tokio::test]
    async fn test_append_to_unknown_conversation_writes_nothing() {
        let (db, _tmp) = test_db().await;

        let result = db
            .append_messages(
                "missing",
                "user-1",
                &[NewMessage::user("Hello"), NewMessage::assistant("Hi")],
            )
            .await;
        assert!(matches!(result, Err(StorageError::Database(_))));
        assert!(db.load_messages("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_messages() {
        let (db, _tmp) = test_db().await;
        let conv = db.create_conversation("user-1", None).await.unwrap();
        db.append_messages(&conv.id, "user-1", &[NewMessage::user("Hello")])
            .await
            .unwrap();

        db.delete_conversation(&conv.id).await.unwrap();
        assert!(db.load_messages(&conv.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_usable_as_shared_store() {
        let (db, _tmp) = test_db().await;
        let store: Arc<dyn ConversationStore> = Arc::new(db.clone());

        let conv = store.create_conversation("user-1", Some("shared")).await.unwrap();
        store
            .append_messages(&conv.id, "user-1", &[NewMessage::user("ping")])
            .await
            .unwrap();

        let loaded = db.messages().list(&conv.id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "ping");
    }
}
