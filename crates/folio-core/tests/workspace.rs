//! Workspace session tests: editing with undo, templates, databases and
//! persistence through the in-memory store.

use std::collections::HashMap;

use folio_api::{ApiError, BlockType, PropertyType, Value};
use folio_core::database::project;
use folio_core::ids::SequentialIds;
use folio_core::store::{MemoryStore, PageStore};
use folio_core::{IdScheme, PageUpdate, Workspace, WorkspaceConfig};

fn workspace() -> Workspace {
    Workspace::with_ids(WorkspaceConfig::default(), Box::new(SequentialIds::with_prefix("ws")))
}

fn texts(workspace: &Workspace, page_id: &str) -> Vec<String> {
    workspace
        .page(page_id)
        .unwrap()
        .content
        .flatten()
        .map(|b| b.text().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn new_page_starts_with_one_empty_paragraph() {
    let mut ws = workspace();
    let id = ws.create_page("Notes", None, None).unwrap();
    let page = ws.page(&id).unwrap();

    assert_eq!(page.icon.as_deref(), Some("📄"));
    assert_eq!(page.content.len(), 1);
    let first = page.content.top_level_blocks().next().unwrap();
    assert_eq!(first.block_type, BlockType::Paragraph);
    assert!(folio_core::is_empty(first));
}

#[test]
fn undo_and_redo_restore_page_content() {
    let mut ws = workspace();
    let page_id = ws.create_page("Notes", None, None).unwrap();
    let original = ws.page(&page_id).unwrap().content.clone();

    let focus = ws
        .edit_page(&page_id, "Insert heading", |engine, tree| {
            engine.insert(tree, None, BlockType::Heading1)
        })
        .unwrap()
        .unwrap();
    assert!(ws.page(&page_id).unwrap().content.contains(&focus));
    assert!(ws.can_undo());

    assert_eq!(ws.undo().unwrap().as_deref(), Some("Insert heading"));
    assert_eq!(ws.page(&page_id).unwrap().content, original);
    assert!(ws.can_redo());

    assert_eq!(ws.redo().unwrap().as_deref(), Some("Insert heading"));
    assert!(ws.page(&page_id).unwrap().content.contains(&focus));
    assert_eq!(ws.redo().unwrap(), None);
}

#[test]
fn failed_edit_leaves_page_and_history_alone() {
    let mut ws = workspace();
    let page_id = ws.create_page("Notes", None, None).unwrap();
    let before = ws.page(&page_id).unwrap().content.clone();

    let err = ws
        .edit_page(&page_id, "Remove ghost", |engine, tree| {
            engine.remove(tree, "ghost")
        })
        .unwrap_err();
    assert_eq!(err, ApiError::BlockNotFound { id: "ghost".into() });
    assert_eq!(ws.page(&page_id).unwrap().content, before);
    assert!(!ws.can_undo());
}

#[test]
fn deleting_last_block_leaves_a_fresh_paragraph() {
    let mut ws = workspace();
    let page_id = ws.create_page("Notes", None, None).unwrap();
    let only = ws.page(&page_id).unwrap().content.top_level()[0].clone();

    let focus = ws.delete_block_ui(&page_id, &only).unwrap().unwrap();
    let content = &ws.page(&page_id).unwrap().content;
    assert_eq!(content.len(), 1);
    assert_ne!(focus, only);
    assert_eq!(content.find(&focus).unwrap().block_type, BlockType::Paragraph);
}

#[test]
fn select_page_tracks_recents_and_updates_refresh_them() {
    let mut ws = workspace();
    let a = ws.create_page("A", None, None).unwrap();
    let b = ws.create_page("B", None, None).unwrap();

    ws.select_page(&a).unwrap();
    ws.select_page(&b).unwrap();
    ws.select_page(&a).unwrap();
    let order: Vec<&str> = ws.recents().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(order, vec![a.as_str(), b.as_str()]);
    assert_eq!(ws.selected_page(), Some(a.as_str()));

    ws.update_page(
        &b,
        PageUpdate {
            title: Some("Renamed".into()),
            ..PageUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(ws.recents().get(&b).unwrap().title, "Renamed");

    ws.delete_page(&a).unwrap();
    assert!(ws.recents().get(&a).is_none());
    assert_eq!(ws.selected_page(), None);
}

#[test]
fn templates_create_and_apply() {
    let mut ws = workspace();
    let page_id = ws.create_page_from_template("template-1", None).unwrap();
    let page = ws.page(&page_id).unwrap();
    assert_eq!(page.title, "Meeting Notes");
    assert!(!page.content.is_empty());

    let template_ids: Vec<String> = ws
        .templates()
        .page_template("template-1")
        .unwrap()
        .blocks
        .flatten()
        .map(|b| b.id.clone())
        .collect();
    for block in page.content.flatten() {
        assert!(!template_ids.contains(&block.id));
    }

    let target = ws.create_page("Target", None, None).unwrap();
    let anchor = ws.page(&target).unwrap().content.top_level()[0].clone();
    let before = ws.page(&target).unwrap().content.len();
    ws.apply_template(&target, Some(&anchor), "template-2").unwrap();
    let content = &ws.page(&target).unwrap().content;
    assert!(content.len() > before);
    assert_eq!(content.top_level()[0], anchor);
    assert!(content.validate().is_ok());
}

#[test]
fn database_edits_go_through_undo() {
    let mut ws = workspace();
    let page_id = ws.create_page("Tasks", None, None).unwrap();
    let db_id = ws
        .insert_database_from_template(&page_id, None, "db-template-1", true)
        .unwrap()
        .unwrap();

    let block = ws.page(&page_id).unwrap().content.find(&db_id).unwrap().clone();
    assert_eq!(block.block_type, BlockType::DatabaseInline);
    let content = block.content.as_database().unwrap();
    let rows_before = content.rows.len();
    let title_property = content
        .properties
        .iter()
        .find(|p| p.property_type == PropertyType::Title)
        .unwrap()
        .id
        .clone();

    ws.edit_database(&page_id, &db_id, "Add row", |model, content| {
        let initial = HashMap::from([(title_property.clone(), Value::String("Ship it".into()))]);
        model.add_row(content, Some(initial)).map(|(next, _)| next)
    })
    .unwrap();

    let content = ws
        .page(&page_id)
        .unwrap()
        .content
        .find(&db_id)
        .unwrap()
        .content
        .as_database()
        .unwrap()
        .clone();
    assert_eq!(content.rows.len(), rows_before + 1);
    assert_eq!(project(&content, None).unwrap().len(), rows_before + 1);

    ws.undo().unwrap();
    let rows = ws
        .page(&page_id)
        .unwrap()
        .content
        .find(&db_id)
        .unwrap()
        .content
        .as_database()
        .unwrap()
        .rows
        .len();
    assert_eq!(rows, rows_before);
}

#[test]
fn editing_a_non_database_block_as_database_fails() {
    let mut ws = workspace();
    let page_id = ws.create_page("Notes", None, None).unwrap();
    let paragraph = ws.page(&page_id).unwrap().content.top_level()[0].clone();

    let err = ws
        .edit_database(&page_id, &paragraph, "Add row", |model, content| {
            model.add_row(content, None).map(|(next, _)| next)
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidOperation { .. }));
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let store = MemoryStore::new();
    let mut ws = workspace();
    let root = ws.create_page("Root", None, None).unwrap();
    let child = ws.create_page_from_template("template-1", Some(&root)).unwrap();
    let db_id = ws
        .insert_database_from_template(&root, None, "db-template-1", false)
        .unwrap()
        .unwrap();
    ws.toggle_favorite(&child).unwrap();
    ws.save(&store).await.unwrap();

    let loaded = Workspace::load(WorkspaceConfig::default(), &store).await.unwrap();
    assert_eq!(loaded.pages().roots(), &[root.clone()]);
    assert_eq!(loaded.pages().get(&root).unwrap().children, vec![child.clone()]);
    assert!(loaded.pages().get(&child).unwrap().is_favorite);
    assert_eq!(texts(&loaded, &child), texts(&ws, &child));

    let original = ws.page(&root).unwrap().content.find(&db_id).unwrap();
    let restored = loaded.page(&root).unwrap().content.find(&db_id).unwrap();
    assert_eq!(restored.content, original.content);

    // Database tables hold the same content as the block
    let stored = store.load_database(&db_id).await.unwrap();
    assert_eq!(Some(&stored), original.content.as_database());
}

#[tokio::test]
async fn offline_save_reports_error_and_keeps_state() {
    let store = MemoryStore::new();
    let mut ws = workspace();
    let page_id = ws.create_page("Notes", None, None).unwrap();
    ws.save(&store).await.unwrap();

    ws.update_page(
        &page_id,
        PageUpdate {
            title: Some("Changed".into()),
            ..PageUpdate::default()
        },
    )
    .unwrap();
    store.set_offline(true);
    let err = ws.save(&store).await.unwrap_err();
    assert!(matches!(err, ApiError::StoreError { .. }));
    assert_eq!(ws.page(&page_id).unwrap().title, "Changed");

    store.set_offline(false);
    let stored = store.load_page_hierarchy().await.unwrap();
    assert_eq!(stored.get(&page_id).unwrap().title, "Notes");
}

#[tokio::test]
async fn sequential_ids_continue_after_load() {
    let config = WorkspaceConfig {
        id_scheme: IdScheme::Sequential,
        ..WorkspaceConfig::default()
    };
    let store = MemoryStore::new();
    let mut ws = Workspace::new(config.clone());
    let page_id = ws.create_page("Notes", None, None).unwrap();
    let db_id = ws
        .insert_database_from_template(&page_id, None, "db-template-1", true)
        .unwrap()
        .unwrap();
    ws.save(&store).await.unwrap();

    let mut loaded = Workspace::load(config, &store).await.unwrap();
    let first = loaded.page(&page_id).unwrap().content.top_level()[0].clone();
    for _ in 0..3 {
        loaded
            .edit_page(&page_id, "Insert", |engine, tree| {
                engine.insert(tree, Some(&first), BlockType::Paragraph)
            })
            .unwrap();
    }
    let content = &loaded.page(&page_id).unwrap().content;
    assert_eq!(content.top_level().len(), 5);
    assert!(content.validate().is_ok());

    loaded
        .edit_database(&page_id, &db_id, "Add row", |model, content| {
            model.add_row(content, None).map(|(next, _)| next)
        })
        .unwrap();
    let rows = &loaded
        .page(&page_id)
        .unwrap()
        .content
        .find(&db_id)
        .unwrap()
        .content
        .as_database()
        .unwrap()
        .rows;
    let row_ids: std::collections::HashSet<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(row_ids.len(), rows.len());

    let other = loaded.create_page("Other", None, None).unwrap();
    assert_ne!(other, page_id);
    assert!(!loaded.page(&page_id).unwrap().content.contains(&other));
}
