use chrono::{Duration, Utc};
use noteai::db::Database;
use noteai::files::ProcessedUpload;
use noteai::models::*;
use serde_json::json;
use speculate2::speculate;
use uuid::Uuid;

fn create_test_user(db: &Database, email: &str) -> User {
    db.create_user("Test User", email, "hash")
        .expect("Failed to create user")
}

fn create_test_note(db: &Database, user: &User, title: &str) -> Note {
    db.create_note(
        user.id,
        CreateNoteInput {
            title: title.to_string(),
            content: Some(format!("Body of {title}")),
            ..Default::default()
        },
    )
    .expect("Failed to create note")
}

fn text_upload(name: &str, body: &str) -> ProcessedUpload {
    ProcessedUpload {
        filename: format!("stored_{name}"),
        original_filename: name.to_string(),
        file_type: "text/plain".to_string(),
        data: body.as_bytes().to_vec(),
        metadata: json!({ "category": "document", "extracted_text": body }),
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "open" {
        it "persists to a file across reopens" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("noteai.db");

            let first = Database::open(path.clone()).expect("Failed to open database");
            first.migrate().expect("Failed to run migrations");
            let user = create_test_user(&first, "disk@example.com");
            drop(first);

            let second = Database::open(path).expect("Failed to reopen database");
            second.migrate().expect("Migrations should be idempotent");
            let found = second.get_user(user.id).expect("Query failed");
            assert_eq!(found.map(|u| u.email), Some("disk@example.com".to_string()));
        }
    }

    describe "users" {
        it "finds a user by email" {
            let user = create_test_user(&db, "ada@example.com");

            let found = db.get_user_by_email("ada@example.com").expect("Query failed");
            assert_eq!(found.map(|u| u.id), Some(user.id));
            assert!(db.get_user_by_email("nobody@example.com").expect("Query failed").is_none());
        }

        it "rejects a duplicate email" {
            create_test_user(&db, "dup@example.com");
            assert!(db.create_user("Other", "dup@example.com", "hash").is_err());
        }

        it "updates only the given profile fields" {
            let user = create_test_user(&db, "bio@example.com");

            let updated = db.update_user(user.id, UpdateUserInput {
                bio: Some("Writes things down".to_string()),
                ..Default::default()
            }).expect("Update failed").expect("User missing");

            assert_eq!(updated.name, "Test User");
            assert_eq!(updated.bio.as_deref(), Some("Writes things down"));
        }

        it "records the login time" {
            let user = create_test_user(&db, "login@example.com");
            db.record_login(user.id).expect("Failed to record login");

            let found = db.get_user(user.id).expect("Query failed").expect("User missing");
            assert!(found.last_login.is_some());
        }

        describe "password reset" {
            it "ignores unknown emails" {
                let stored = db
                    .set_reset_token("ghost@example.com", "tok", Utc::now() + Duration::hours(1))
                    .expect("Query failed");
                assert!(!stored);
            }

            it "consumes a valid token once" {
                let user = create_test_user(&db, "reset@example.com");
                db.set_reset_token("reset@example.com", "tok", Utc::now() + Duration::hours(1))
                    .expect("Failed to store token");

                assert!(db.reset_password_with_token("tok", "new-hash").expect("Reset failed"));
                assert!(!db.reset_password_with_token("tok", "again").expect("Reset failed"));

                let found = db.get_user(user.id).expect("Query failed").expect("User missing");
                assert_eq!(found.password_hash, "new-hash");
            }

            it "rejects an expired token" {
                create_test_user(&db, "late@example.com");
                db.set_reset_token("late@example.com", "old", Utc::now() - Duration::minutes(1))
                    .expect("Failed to store token");

                assert!(!db.reset_password_with_token("old", "new-hash").expect("Reset failed"));
            }
        }
    }

    describe "notes" {
        it "starts at version one with a snapshot" {
            let user = create_test_user(&db, "v@example.com");
            let note = create_test_note(&db, &user, "First");

            assert_eq!(note.version, 1);
            let versions = db.get_note_versions(user.id, note.id)
                .expect("Query failed")
                .expect("Note missing");
            assert_eq!(versions.len(), 1);
            assert_eq!(versions[0].version_number, 1);
            assert_eq!(versions[0].title, "First");
        }

        it "bumps the version and snapshots the previous state on update" {
            let user = create_test_user(&db, "v2@example.com");
            let note = create_test_note(&db, &user, "Draft");

            db.update_note(user.id, note.id, UpdateNoteInput {
                title: Some("Second".to_string()),
                ..Default::default()
            }).expect("Update failed");
            let updated = db.update_note(user.id, note.id, UpdateNoteInput {
                title: Some("Final".to_string()),
                ..Default::default()
            }).expect("Update failed").expect("Note missing");

            assert_eq!(updated.version, 3);
            assert_eq!(updated.content.as_deref(), Some("Body of Draft"));

            let versions = db.get_note_versions(user.id, note.id)
                .expect("Query failed")
                .expect("Note missing");
            assert_eq!(versions.len(), 3);
            assert_eq!(versions[0].version_number, 2);
            assert_eq!(versions[0].title, "Second");
        }

        it "keeps notes private to their owner" {
            let owner = create_test_user(&db, "owner@example.com");
            let other = create_test_user(&db, "other@example.com");
            let note = create_test_note(&db, &owner, "Mine");

            assert!(db.get_note(other.id, note.id).expect("Query failed").is_none());
            assert!(db.update_note(other.id, note.id, UpdateNoteInput::default())
                .expect("Update failed")
                .is_none());
            assert!(!db.delete_note(other.id, note.id).expect("Delete failed"));
        }

        it "lists archived notes separately" {
            let user = create_test_user(&db, "arch@example.com");
            let keep = create_test_note(&db, &user, "Keep");
            let old = create_test_note(&db, &user, "Old");
            db.set_archived(user.id, old.id, true).expect("Archive failed");

            let active = db.list_notes(user.id, &NoteListQuery::default()).expect("Query failed");
            let archived = db.list_notes(user.id, &NoteListQuery {
                archived: true,
                ..Default::default()
            }).expect("Query failed");

            assert_eq!(active.iter().map(|n| n.id).collect::<Vec<_>>(), vec![keep.id]);
            assert_eq!(archived.iter().map(|n| n.id).collect::<Vec<_>>(), vec![old.id]);
        }

        it "stores enrichment without a new version" {
            let user = create_test_user(&db, "enrich@example.com");
            let note = create_test_note(&db, &user, "Budget");

            let enriched = db.apply_enrichment(
                user.id,
                note.id,
                Some(vec!["money".to_string()]),
                Some("finance"),
            ).expect("Enrichment failed").expect("Note missing");

            assert_eq!(enriched.tags, vec!["money"]);
            assert_eq!(enriched.category(), Some("finance"));
            assert_eq!(enriched.version, 1);
        }

        it "keeps enrichment and edits when they interleave" {
            let user = create_test_user(&db, "race@example.com");
            let note = create_test_note(&db, &user, "Shared");

            std::thread::scope(|s| {
                s.spawn(|| {
                    for i in 0..50 {
                        db.update_note(user.id, note.id, UpdateNoteInput {
                            content: Some(format!("edit {i}")),
                            ..Default::default()
                        }).expect("Update failed");
                    }
                });
                s.spawn(|| {
                    for _ in 0..50 {
                        db.apply_enrichment(user.id, note.id, Some(vec!["ai".to_string()]), Some("work"))
                            .expect("Enrichment failed");
                    }
                });
            });

            let note = db.get_note(user.id, note.id).expect("Query failed").expect("Note missing");
            assert_eq!(note.version, 51);
            assert_eq!(note.content.as_deref(), Some("edit 49"));
            assert_eq!(note.tags, vec!["ai"]);
            assert_eq!(note.category(), Some("work"));
        }
    }

    describe "search" {
        it "matches title or content case-insensitively" {
            let user = create_test_user(&db, "s@example.com");
            create_test_note(&db, &user, "Groceries");
            create_test_note(&db, &user, "Rust Notes");

            let results = db.search_notes(user.id, &NoteSearch {
                query: Some("RUST".to_string()),
                ..Default::default()
            }).expect("Search failed");

            assert_eq!(results.len(), 1);
            assert_eq!(results[0].title, "Rust Notes");
        }

        it "folds non-ASCII letters when matching" {
            let user = create_test_user(&db, "unicode@example.com");
            db.create_note(user.id, CreateNoteInput {
                title: "École notes".to_string(),
                content: Some("Über cool".to_string()),
                ..Default::default()
            }).expect("Failed to create note");
            create_test_note(&db, &user, "Ecole plain");

            for query in ["école", "ÉCOLE", "über"] {
                let results = db.search_notes(user.id, &NoteSearch {
                    query: Some(query.to_string()),
                    ..Default::default()
                }).expect("Search failed");
                assert_eq!(results.len(), 1, "query {query}");
                assert_eq!(results[0].title, "École notes");
            }
        }

        it "filters by tag overlap and favorites" {
            let user = create_test_user(&db, "tags@example.com");
            db.create_note(user.id, CreateNoteInput {
                title: "Tagged".to_string(),
                tags: vec!["work".to_string(), "q3".to_string()],
                is_favorite: true,
                ..Default::default()
            }).expect("Create failed");
            db.create_note(user.id, CreateNoteInput {
                title: "Also tagged".to_string(),
                tags: vec!["work".to_string()],
                ..Default::default()
            }).expect("Create failed");
            create_test_note(&db, &user, "Untagged");

            let by_tag = db.search_notes(user.id, &NoteSearch {
                tags: Some(vec!["q3".to_string(), "work".to_string()]),
                ..Default::default()
            }).expect("Search failed");
            assert_eq!(by_tag.len(), 2);

            let favorites = db.search_notes(user.id, &NoteSearch {
                tags: Some(vec!["work".to_string()]),
                is_favorite: Some(true),
                ..Default::default()
            }).expect("Search failed");
            assert_eq!(favorites.len(), 1);
            assert_eq!(favorites[0].title, "Tagged");
        }

        it "pages with limit and offset" {
            let user = create_test_user(&db, "page@example.com");
            for i in 0..5 {
                create_test_note(&db, &user, &format!("Note {i}"));
            }

            let page = db.search_notes(user.id, &NoteSearch {
                limit: 2,
                offset: 4,
                ..Default::default()
            }).expect("Search failed");

            assert_eq!(page.len(), 1);
        }
    }

    describe "privacy" {
        it "locks once and unlocks with the right pin" {
            let user = create_test_user(&db, "lock@example.com");
            let note = create_test_note(&db, &user, "Secret");

            assert_eq!(db.lock_note(user.id, note.id, "pin-hash").expect("Lock failed"), LockOutcome::Done);
            assert_eq!(db.lock_note(user.id, note.id, "pin-hash").expect("Lock failed"), LockOutcome::AlreadyLocked);

            let wrong = db.unlock_note(user.id, note.id, |_| false).expect("Unlock failed");
            assert_eq!(wrong, LockOutcome::WrongPin);

            let right = db.unlock_note(user.id, note.id, |hash| hash == "pin-hash").expect("Unlock failed");
            assert_eq!(right, LockOutcome::Done);
            assert_eq!(db.unlock_note(user.id, note.id, |_| true).expect("Unlock failed"), LockOutcome::NotLocked);
        }

        it "toggles the hidden flag" {
            let user = create_test_user(&db, "hide@example.com");
            let note = create_test_note(&db, &user, "Hide me");

            assert_eq!(db.toggle_hidden(user.id, note.id).expect("Toggle failed"), Some(true));
            assert_eq!(db.toggle_hidden(user.id, note.id).expect("Toggle failed"), Some(false));
            assert_eq!(db.toggle_hidden(user.id, Uuid::new_v4()).expect("Toggle failed"), None);
        }
    }

    describe "trash" {
        it "hides trashed notes until they are restored" {
            let user = create_test_user(&db, "trash@example.com");
            let note = create_test_note(&db, &user, "Binned");

            assert!(db.trash_note(user.id, note.id).expect("Trash failed"));
            assert!(db.get_note(user.id, note.id).expect("Query failed").is_none());
            assert_eq!(db.list_trash(user.id).expect("Query failed").len(), 1);

            let restored = db.restore_note(user.id, note.id).expect("Restore failed").expect("Note missing");
            assert!(!restored.is_deleted);
            assert!(restored.deleted_at.is_none());
            assert!(db.list_trash(user.id).expect("Query failed").is_empty());
        }

        it "only purges notes already in the trash" {
            let user = create_test_user(&db, "purge@example.com");
            let live = create_test_note(&db, &user, "Live");
            let binned = create_test_note(&db, &user, "Binned");
            db.trash_note(user.id, binned.id).expect("Trash failed");

            assert!(!db.purge_note(user.id, live.id).expect("Purge failed"));
            assert!(db.purge_note(user.id, binned.id).expect("Purge failed"));
            assert!(db.get_note(user.id, live.id).expect("Query failed").is_some());
        }

        it "empties the trash and reports the count" {
            let user = create_test_user(&db, "empty@example.com");
            for title in ["a", "b"] {
                let note = create_test_note(&db, &user, title);
                db.trash_note(user.id, note.id).expect("Trash failed");
            }
            create_test_note(&db, &user, "kept");

            assert_eq!(db.empty_trash(user.id).expect("Empty failed"), 2);
            assert_eq!(db.list_notes(user.id, &NoteListQuery::default()).expect("Query failed").len(), 1);
        }
    }

    describe "files" {
        it "stores bytes and loads attachments with the note" {
            let user = create_test_user(&db, "files@example.com");
            let note = create_test_note(&db, &user, "With file");

            let file = db.create_file(note.id, text_upload("todo.txt", "buy milk")).expect("Upload failed");
            assert_eq!(file.file_size, 8);

            let download = db.get_file_data(user.id, file.id).expect("Query failed").expect("File missing");
            assert_eq!(download.data, b"buy milk");
            assert_eq!(download.original_filename, "todo.txt");

            let loaded = db.get_note_with_files(user.id, note.id).expect("Query failed").expect("Note missing");
            assert_eq!(loaded.files.len(), 1);
            assert_eq!(FileContent::from(loaded.files[0].clone()).extracted_text.as_deref(), Some("buy milk"));
        }

        it "removes attachments when the note is deleted" {
            let user = create_test_user(&db, "cascade@example.com");
            let note = create_test_note(&db, &user, "Doomed");
            let file = db.create_file(note.id, text_upload("a.txt", "x")).expect("Upload failed");

            db.delete_note(user.id, note.id).expect("Delete failed");

            assert!(db.get_file(user.id, file.id).expect("Query failed").is_none());
        }

        it "does not expose files to other users" {
            let owner = create_test_user(&db, "fo@example.com");
            let other = create_test_user(&db, "fx@example.com");
            let note = create_test_note(&db, &owner, "Private file");
            let file = db.create_file(note.id, text_upload("a.txt", "x")).expect("Upload failed");

            assert!(db.get_file(other.id, file.id).expect("Query failed").is_none());
            assert!(!db.delete_file(other.id, file.id).expect("Delete failed"));
        }
    }

    describe "shares" {
        it "grants access and counts views" {
            let user = create_test_user(&db, "share@example.com");
            let note = create_test_note(&db, &user, "Shared");
            let link = db.create_share(note.id, "tok-open", None, None).expect("Share failed");
            assert!(!link.has_password);

            match db.access_shared_note("tok-open", |_| false).expect("Access failed") {
                SharedAccess::Granted(shared) => assert_eq!(shared.id, note.id),
                other => panic!("expected access, got {other:?}"),
            }

            let links = db.list_shares(note.id).expect("Query failed");
            assert_eq!(links[0].view_count, 1);
            assert!(links[0].last_viewed_at.is_some());
        }

        it "checks the password on protected links" {
            let user = create_test_user(&db, "pw@example.com");
            let note = create_test_note(&db, &user, "Guarded");
            db.create_share(note.id, "tok-pw", None, Some("pw-hash")).expect("Share failed");

            assert!(matches!(
                db.access_shared_note("tok-pw", |_| false).expect("Access failed"),
                SharedAccess::WrongPassword
            ));
            assert!(matches!(
                db.access_shared_note("tok-pw", |hash| hash == "pw-hash").expect("Access failed"),
                SharedAccess::Granted(_)
            ));
        }

        it "refuses expired, deactivated and unknown links" {
            let user = create_test_user(&db, "gone@example.com");
            let note = create_test_note(&db, &user, "Gone");
            db.create_share(note.id, "tok-old", Some(Utc::now() - Duration::hours(1)), None)
                .expect("Share failed");
            let active = db.create_share(note.id, "tok-off", None, None).expect("Share failed");
            assert!(db.deactivate_share(user.id, active.id).expect("Deactivate failed"));

            for token in ["tok-old", "tok-off", "tok-missing"] {
                assert!(matches!(
                    db.access_shared_note(token, |_| true).expect("Access failed"),
                    SharedAccess::Unavailable
                ));
            }
        }
    }

    describe "chat" {
        it "returns messages in the order they were added" {
            let user = create_test_user(&db, "chat@example.com");
            let session = db.create_chat_session(user.id).expect("Session failed");

            db.add_chat_message(session.id, ChatRole::User, "first").expect("Insert failed");
            db.add_chat_message(session.id, ChatRole::Assistant, "second").expect("Insert failed");
            db.add_chat_message(session.id, ChatRole::User, "third").expect("Insert failed");

            let messages = db.get_chat_messages(session.id, 50).expect("Query failed");
            let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, vec!["first", "second", "third"]);
            assert_eq!(messages[1].role, ChatRole::Assistant);
        }

        it "keeps the newest messages when the history is capped" {
            let user = create_test_user(&db, "long@example.com");
            let session = db.create_chat_session(user.id).expect("Session failed");

            for i in 0..60 {
                db.add_chat_message(session.id, ChatRole::User, &format!("m{i}")).expect("Insert failed");
            }

            let messages = db.get_chat_messages(session.id, 50).expect("Query failed");
            assert_eq!(messages.len(), 50);
            assert_eq!(messages.first().map(|m| m.content.as_str()), Some("m10"));
            assert_eq!(messages.last().map(|m| m.content.as_str()), Some("m59"));
        }

        it "scopes sessions to their owner" {
            let owner = create_test_user(&db, "co@example.com");
            let other = create_test_user(&db, "cx@example.com");
            let session = db.create_chat_session(owner.id).expect("Session failed");

            assert!(db.get_chat_session(other.id, session.id).expect("Query failed").is_none());
            assert_eq!(db.list_chat_sessions(owner.id, 0, 20).expect("Query failed").len(), 1);
            assert!(db.list_chat_sessions(other.id, 0, 20).expect("Query failed").is_empty());
        }
    }

    describe "analytics" {
        it "counts notes, files, shares and AI operations" {
            let user = create_test_user(&db, "stats@example.com");
            let note = db.create_note(user.id, CreateNoteInput {
                title: "Tagged".to_string(),
                tags: vec!["work".to_string()],
                ..Default::default()
            }).expect("Create failed");
            create_test_note(&db, &user, "Plain");
            db.create_file(note.id, text_upload("a.txt", "x")).expect("Upload failed");
            db.create_share(note.id, "tok-stats", None, None).expect("Share failed");

            db.log_activity(user.id, NewActivity::new("note_created").note(note.id)).expect("Log failed");
            db.log_activity(user.id, NewActivity::new("ai_summarize")).expect("Log failed");
            db.log_activity(user.id, NewActivity::new("ai_chat").meta("chat_id", "c1")).expect("Log failed");
            db.log_activity(user.id, NewActivity::new("aidless")).expect("Log failed");

            let stats = db.analytics(user.id).expect("Analytics failed");

            assert_eq!(stats.total_notes, 2);
            assert_eq!(stats.notes_this_week, 2);
            assert_eq!(stats.total_files, 1);
            assert_eq!(stats.total_shared, 1);
            assert_eq!(stats.ai_operations_count, 2);
            assert_eq!(stats.notes_by_tag.get("work"), Some(&1));
            assert_eq!(stats.recent_activities.len(), 4);
            assert_eq!(stats.recent_activities[0].activity_type, "aidless");
        }

        it "builds a seven day timeline ending today" {
            let user = create_test_user(&db, "timeline@example.com");
            db.log_activity(user.id, NewActivity::new("login")).expect("Log failed");

            let stats = db.analytics(user.id).expect("Analytics failed");
            let timeline = &stats.activity_timeline;

            assert_eq!(timeline.len(), 7);
            assert_eq!(timeline[6].date, Utc::now().format("%Y-%m-%d").to_string());
            assert_eq!(timeline[6].count, 1);
            assert!(timeline[..6].iter().all(|d| d.count == 0));
        }
    }
}
