//! End-to-end memory scenarios against a file-backed store.

use shards_sdk::memory::{
    pointer, DeleteOptions, DiscrepancyKind, MoveTarget, NewRootMemory, NewSubMemory, SyncTarget,
};
use shards_sdk::{SDKConfig, SDK};
use tempfile::NamedTempFile;

fn open(file: &NamedTempFile) -> SDK {
    SDK::new(SDKConfig::new(file.path(), "scenarios").with_agent("scenario-agent")).unwrap()
}

async fn root(sdk: &SDK, title: &str) -> String {
    sdk.memory()
        .create_root(NewRootMemory {
            title: title.into(),
            body: format!("{} body", title),
            ..Default::default()
        })
        .await
        .unwrap()
}

async fn sub(sdk: &SDK, parent: &str, title: &str) -> String {
    sdk.memory()
        .create_sub_memory(NewSubMemory {
            parent_id: parent.into(),
            title: title.into(),
            body: format!("{} body", title),
            summary: format!("{} summary", title),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn expand_then_path_on_three_levels() {
    let file = NamedTempFile::new().unwrap();
    let sdk = open(&file);

    let r = root(&sdk, "R").await;
    let c1 = sub(&sdk, &r, "C1").await;
    let g = sub(&sdk, &c1, "G").await;

    let expanded = sdk.memory().expand(&r, 2).await.unwrap();
    assert_eq!(expanded.id, r);
    assert_eq!(expanded.children.len(), 1);
    assert_eq!(expanded.children[0].id, c1);
    assert_eq!(expanded.children[0].children.len(), 1);
    assert_eq!(expanded.children[0].children[0].id, g);

    for id in [&r, &c1, &g] {
        let stats = sdk.memory().access_stats(id).await.unwrap();
        assert_eq!(stats.access_count, 1, "node {} touched once", id);
        assert_eq!(stats.access_log[0].by, "scenario-agent");
    }

    let path = sdk.memory().path(&g).await.unwrap();
    let steps: Vec<_> = path.iter().map(|p| (p.id.as_str(), p.depth)).collect();
    assert_eq!(steps, vec![(r.as_str(), 0), (c1.as_str(), 1), (g.as_str(), 2)]);
}

#[tokio::test]
async fn recursive_delete_clears_subtree_and_pointer() {
    let file = NamedTempFile::new().unwrap();
    let sdk = open(&file);

    let top = root(&sdk, "Top").await;
    let node = sub(&sdk, &top, "Node").await;
    let a = sub(&sdk, &node, "A").await;
    sub(&sdk, &a, "A1").await;
    sub(&sdk, &node, "B").await;

    let result = sdk.memory().delete(&node, DeleteOptions::recursive()).await.unwrap();
    assert_eq!(result.deleted.len(), 4);
    assert_eq!(result.deleted.last(), Some(&node));
    assert_eq!(result.removed_from_parent.as_deref(), Some(top.as_str()));

    let tree = sdk.memory().tree(None, None).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].child_count, 0);

    let top_node = sdk.memory().get(&top).await.unwrap();
    assert!(top_node.pointers.iter().all(|p| p.id != node));
}

#[tokio::test]
async fn move_cycle_is_rejected_and_valid_move_updates_both_blocks() {
    let file = NamedTempFile::new().unwrap();
    let sdk = open(&file);

    let a = root(&sdk, "A").await;
    let x = sub(&sdk, &a, "X").await;
    let b = sub(&sdk, &x, "B").await;

    let err = sdk.memory().move_to(&a, MoveTarget::Parent(b.clone())).await.unwrap_err();
    assert!(err.is_cycle_rejected());

    let other = root(&sdk, "Other").await;
    sdk.memory().move_to(&b, MoveTarget::Parent(other.clone())).await.unwrap();

    let x_node = sdk.memory().get(&x).await.unwrap();
    assert!(x_node.pointers.is_empty());
    let other_node = sdk.memory().get(&other).await.unwrap();
    assert_eq!(other_node.pointers.len(), 1);
    assert_eq!(other_node.pointers[0].id, b);
    assert_eq!(other_node.pointers[0].title, "B");
    assert_eq!(other_node.pointers[0].summary, "B summary");

    assert!(sdk.memory().audit_cycles().await.unwrap().findings.is_empty());
}

#[tokio::test]
async fn repeated_touches_are_counted() {
    let file = NamedTempFile::new().unwrap();
    let sdk = open(&file);
    let id = root(&sdk, "Busy").await;

    for n in 0..55 {
        sdk.memory().touch(&id, &format!("agent-{}", n), 0).await;
    }

    let stats = sdk.memory().access_stats(&id).await.unwrap();
    assert_eq!(stats.access_count, 55);
    assert_eq!(stats.access_log.len(), 50);
    assert_eq!(stats.access_log[0].by, "agent-54");
}

#[tokio::test]
async fn display_reads_surface_promotion_candidates() {
    let file = NamedTempFile::new().unwrap();
    let sdk = open(&file);

    let r = root(&sdk, "R").await;
    let c = sub(&sdk, &r, "C").await;
    let g = sub(&sdk, &c, "G").await;

    // Expanding C repeatedly touches C and G but never R
    for _ in 0..3 {
        sdk.memory().expand(&c, 1).await.unwrap();
    }

    let hot = sdk.memory().hot(1, 10).await.unwrap();
    let ids: Vec<_> = hot.iter().map(|h| h.id.clone()).collect();
    assert_eq!(ids, vec![c.clone()]);
    assert_eq!(hot[0].access_count, 3);
    assert_eq!(hot[0].parent_access_count, 0);

    let promoted = sdk.memory().promote(&g).await.unwrap();
    assert_eq!(promoted.new_parent.as_deref(), Some(r.as_str()));
    assert_eq!(promoted.new_depth, 1);
}

#[tokio::test]
async fn sync_repairs_missing_and_stale_in_one_pass() {
    let file = NamedTempFile::new().unwrap();
    let sdk = open(&file);

    let p = root(&sdk, "P").await;
    let kept = sub(&sdk, &p, "Kept").await;
    let missing = sub(&sdk, &p, "Missing").await;

    // Drop one entry and add a stale one, as an out-of-band writer would
    {
        let db = sdk.db();
        let conn = db.write().await;
        let content = pointer::render(
            "P body",
            &[
                pointer::PointerEntry::new(&kept, "Kept", "Kept summary"),
                pointer::PointerEntry::new("ghost", "Ghost", "gone"),
            ],
        )
        .unwrap();
        shards_sdk::db::update_content(&conn, &p, &content).unwrap();
    }

    let before = sdk.memory().get(&p).await.unwrap();
    let dry = sdk.memory().sync(SyncTarget::Parent(p.clone()), true).await.unwrap();
    assert_eq!(dry.count(DiscrepancyKind::MissingPointer), 1);
    assert_eq!(dry.count(DiscrepancyKind::StalePointer), 1);
    assert_eq!(sdk.memory().get(&p).await.unwrap().pointers, before.pointers);

    let repaired = sdk.memory().sync(SyncTarget::All, false).await.unwrap();
    assert_eq!(repaired.for_parent(&p).count(), 2);
    assert_eq!(repaired.repaired, vec![p.clone()]);

    let ids: Vec<_> = sdk
        .memory()
        .get(&p)
        .await
        .unwrap()
        .pointers
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec![kept, missing]);

    let again = sdk.memory().sync(SyncTarget::Parent(p.clone()), false).await.unwrap();
    assert_eq!(again.for_parent(&p).count(), 0);
}
