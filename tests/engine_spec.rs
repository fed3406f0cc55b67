use marginalia::engine::{ChildOutcome, Consolidation, EngineError, SessionEngine};
use marginalia::models::{AnnotationKind, Card, EMPTY_COLLECTION_TEXT};
use marginalia::store::Store;
use speculate2::speculate;

const DOC: &str = "The cat sat on the mat. The cat slept.";

fn open_store() -> Store {
    let store = Store::open_memory().expect("Failed to create in-memory store");
    store.migrate().expect("Failed to run migrations");
    store
}

fn engine_with_document(text: &str) -> SessionEngine {
    let mut engine = SessionEngine::load(open_store());
    engine.install_root(text, "Original text");
    engine
}

fn card(id: &str, title: &str, content: &str) -> Card {
    Card {
        id: id.to_string(),
        title: title.to_string(),
        kind: AnnotationKind::Summarize,
        content: content.to_string(),
    }
}

/// Branch a child off the current node through the card path.
fn branch(engine: &mut SessionEngine, title: &str, content: &str) -> u64 {
    engine.set_cards(vec![card("card-helper", title, content)]);
    engine
        .promote_card("card-helper")
        .expect("Failed to promote card")
        .node_id()
}

speculate! {
    before {
        let mut engine = engine_with_document(DOC);
    }

    describe "annotations" {
        it "allocates ids from the session counter" {
            let first = engine.annotate("The cat", AnnotationKind::Known).expect("annotate failed");
            let second = engine.annotate("sat on", AnnotationKind::Summarize).expect("annotate failed");

            assert_eq!(first.id, "ann-1");
            assert_eq!(second.id, "ann-2");
        }

        it "rejects blank text without mutating state" {
            let err = engine.annotate("   \n ", AnnotationKind::Known).unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
            assert!(engine.active_annotations().is_empty());
            assert!(engine.collection().is_empty());
        }

        it "rejects text that does not occur in the document" {
            let err = engine.annotate("the dog barked", AnnotationKind::Summarize).unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
            assert!(engine.active_annotations().is_empty());
        }

        it "remove is idempotent" {
            let ann = engine.annotate("The cat", AnnotationKind::Summarize).expect("annotate failed");
            engine.remove_annotation(&ann.id);
            assert!(engine.active_annotations().is_empty());

            // Removing again is a no-op, not an error.
            engine.remove_annotation(&ann.id);
            engine.remove_annotation("ann-999");
            assert!(engine.active_annotations().is_empty());
        }

        it "known annotations are promoted into the collection" {
            let ann = engine.annotate("The cat sat", AnnotationKind::Known).expect("annotate failed");
            assert_eq!(engine.collection().len(), 1);
            assert_eq!(engine.collection().items()[0].id, ann.id);
        }

        it "removing a known annotation removes its collection item" {
            let ann = engine.annotate("The cat sat", AnnotationKind::Known).expect("annotate failed");
            engine.remove_annotation(&ann.id);
            assert!(engine.collection().is_empty());
        }

        it "lists only the active node's annotations after navigation" {
            engine.annotate("The cat sat", AnnotationKind::Summarize).expect("annotate failed");
            let child = branch(&mut engine, "kittens", "Kittens sleep a lot.");

            assert!(engine.active_annotations().is_empty());
            engine.annotate("Kittens sleep", AnnotationKind::Summarize).expect("annotate failed");
            assert_eq!(engine.active_annotations().len(), 1);
            assert_eq!(engine.active_annotations()[0].origin_node_id, child);

            engine.select_node(1).expect("select failed");
            assert_eq!(engine.active_annotations().len(), 1);
            assert_eq!(engine.active_annotations()[0].origin_node_id, 1);
        }
    }

    describe "anchoring" {
        it "anchors duplicate passages to distinct occurrences" {
            engine.annotate("The cat", AnnotationKind::Known).expect("annotate failed");
            engine.annotate("The cat", AnnotationKind::Unfamiliar).expect("annotate failed");

            let spans = engine.resolved_spans();
            assert_eq!(spans.len(), 2);
            let mut ranges: Vec<(usize, usize)> = spans.iter().map(|s| (s.start, s.end)).collect();
            ranges.sort();
            assert_eq!(ranges, vec![(0, 7), (24, 31)]);
        }

        it "keeps unresolvable annotations in the store but out of the spans" {
            // Three annotations, two occurrences: the third cannot anchor.
            engine.annotate("The cat", AnnotationKind::Summarize).expect("annotate failed");
            engine.annotate("The cat", AnnotationKind::Summarize).expect("annotate failed");
            engine.annotate("The cat", AnnotationKind::Summarize).expect("annotate failed");

            assert_eq!(engine.active_annotations().len(), 3);
            assert_eq!(engine.resolved_spans().len(), 2);
        }
    }

    describe "version tree" {
        it "promoting the same card twice resolves to the same node" {
            engine.set_cards(vec![card("card-1", "The cat", "Cats are small felines.")]);
            let first = engine.promote_card("card-1").expect("promote failed");

            engine.select_node(1).expect("select failed");
            engine.set_cards(vec![card("card-1", "The cat", "Cats are small felines.")]);
            let second = engine.promote_card("card-1").expect("promote failed");

            assert!(matches!(first, ChildOutcome::Created(_)));
            assert_eq!(second, ChildOutcome::Existing(first.node_id()));
            assert_eq!(engine.tree().len(), 2);
        }

        it "promotion navigates to the new branch" {
            let child = branch(&mut engine, "the mat", "Mats are floor coverings.");
            assert_eq!(engine.tree().current_id(), Some(child));
            assert!(engine.cards().is_empty());
        }

        it "deleting a node with two descendants removes exactly those three" {
            let child = branch(&mut engine, "cats", "Cats nap in sunbeams. Cats purr.");
            engine.annotate("Cats purr", AnnotationKind::Known).expect("annotate failed");
            let first_leaf = branch(&mut engine, "naps", "A nap is a short sleep.");
            engine.select_node(child).expect("select failed");
            let second_leaf = branch(&mut engine, "purring", "Purring is a low rumble.");
            engine.select_node(second_leaf).expect("select failed");

            let outcome = engine.delete_node(child).expect("delete failed");

            let mut removed = outcome.removed.clone();
            removed.sort();
            assert_eq!(removed, vec![child, first_leaf, second_leaf]);
            assert_eq!(engine.tree().len(), 1);
            assert!(engine.collection().is_empty());
            assert!(engine.list_for_node(child).is_empty());
            // Active node was in the deleted subtree: fall back to the parent.
            assert_eq!(engine.tree().current_id(), Some(1));
        }

        it "deleting the root fails and leaves the tree unchanged" {
            branch(&mut engine, "child", "A child branch.");
            let err = engine.delete_node(1).unwrap_err();

            assert!(matches!(err, EngineError::InvalidOperation(_)));
            assert_eq!(engine.tree().len(), 2);
            assert_eq!(engine.tree().root_id(), Some(1));
        }

        it "deleting an unknown node reports not found" {
            let err = engine.delete_node(42).unwrap_err();
            assert!(matches!(err, EngineError::NodeNotFound(42)));
        }
    }

    describe "collection" {
        it "the same text collected twice on one node grows the collection by exactly one" {
            engine.annotate("The cat sat", AnnotationKind::Known).expect("annotate failed");
            engine.annotate("The cat sat", AnnotationKind::Known).expect("annotate failed");

            assert_eq!(engine.active_annotations().len(), 2);
            assert_eq!(engine.collection().len(), 1);
        }

        it "the same passage collected in two branches counts twice" {
            engine.annotate("The cat", AnnotationKind::Known).expect("annotate failed");
            branch(&mut engine, "cats again", "The cat is back. The cat stays.");
            engine.annotate("The cat", AnnotationKind::Known).expect("annotate failed");

            assert_eq!(engine.collection().len(), 2);
        }

        it "locates a collected item at its origin node" {
            let ann = engine.annotate("the mat", AnnotationKind::Known).expect("annotate failed");
            branch(&mut engine, "elsewhere", "Another branch.");

            let (node_id, annotation_id) = engine.locate_collected(&ann.id).expect("item missing");
            assert_eq!(node_id, 1);
            assert_eq!(annotation_id, ann.id);
            assert!(engine.locate_collected("ann-999").is_none());
        }
    }

    describe "consolidation" {
        it "an empty collection yields the placeholder without external input" {
            match engine.select_consolidated(false) {
                Consolidation::Placeholder(text) => assert_eq!(text, EMPTY_COLLECTION_TEXT),
                other => panic!("expected placeholder, got {other:?}"),
            }
            assert!(!engine.has_consolidated());
            assert!(engine.consolidated_active());
        }

        it "goes stale on collection changes and fresh on reconsolidation" {
            engine.annotate("The cat sat", AnnotationKind::Known).expect("annotate failed");

            match engine.select_consolidated(false) {
                Consolidation::Pending(items) => assert_eq!(items.len(), 1),
                other => panic!("expected pending, got {other:?}"),
            }
            engine.install_consolidated("## Cats\n\nCats sit on mats.".to_string());
            assert!(engine.has_consolidated());
            assert!(!engine.is_consolidation_stale());

            // A fresh cache is reused.
            match engine.select_consolidated(false) {
                Consolidation::Cached(text) => assert!(text.contains("Cats sit")),
                other => panic!("expected cached, got {other:?}"),
            }

            // Any change to the collected set invalidates.
            engine.annotate("The cat slept", AnnotationKind::Known).expect("annotate failed");
            assert!(engine.is_consolidation_stale());

            engine.install_consolidated("## Cats\n\nCats sit and sleep.".to_string());
            assert!(!engine.is_consolidation_stale());
        }

        it "reordering the collection does not invalidate" {
            engine.annotate("The cat sat", AnnotationKind::Known).expect("annotate failed");
            engine.annotate("the mat", AnnotationKind::Known).expect("annotate failed");
            engine.install_consolidated("consolidated".to_string());

            assert!(engine.reorder_collection(0, 1));
            assert!(!engine.is_consolidation_stale());
        }

        it "removing a collected item invalidates" {
            let ann = engine.annotate("The cat sat", AnnotationKind::Known).expect("annotate failed");
            engine.annotate("the mat", AnnotationKind::Known).expect("annotate failed");
            engine.install_consolidated("consolidated".to_string());

            engine.remove_annotation(&ann.id);
            assert!(engine.is_consolidation_stale());
        }
    }

    describe "persistence" {
        it "a reloaded session restores tree, annotations, and collection" {
            let store = open_store();
            let mut engine = SessionEngine::load(store.clone());
            engine.install_root(DOC, "Original text");
            engine.annotate("The cat", AnnotationKind::Known).expect("annotate failed");
            engine.annotate("the mat", AnnotationKind::Summarize).expect("annotate failed");
            let child = branch(&mut engine, "mats", "All about mats.");
            drop(engine);

            let restored = SessionEngine::load(store);
            assert_eq!(restored.tree().len(), 2);
            assert_eq!(restored.tree().current_id(), Some(child));
            assert_eq!(restored.list_for_node(1).len(), 2);
            assert_eq!(restored.collection().len(), 1);

            // Restored annotations re-anchor against the rebuilt text.
            let mut reselected = restored;
            reselected.select_node(1).expect("select failed");
            assert_eq!(reselected.resolved_spans().len(), 2);
        }

        it "the selection counter survives a reload" {
            let store = open_store();
            let mut engine = SessionEngine::load(store.clone());
            engine.install_root(DOC, "Original text");
            engine.annotate("The cat", AnnotationKind::Summarize).expect("annotate failed");
            drop(engine);

            let mut restored = SessionEngine::load(store);
            let ann = restored.annotate("the mat", AnnotationKind::Summarize).expect("annotate failed");
            assert_eq!(ann.id, "ann-2");
        }

        it "a fresh question resets the session but keeps the collection" {
            engine.annotate("The cat sat", AnnotationKind::Known).expect("annotate failed");
            engine.annotate("the mat", AnnotationKind::Summarize).expect("annotate failed");
            engine.install_consolidated("old consolidation".to_string());

            engine.install_root("A brand new answer.", "Original text");

            assert_eq!(engine.tree().len(), 1);
            assert!(engine.list_for_node(1).is_empty());
            assert!(!engine.has_consolidated());
            // Collected knowledge belongs to the learner, not to one question.
            assert_eq!(engine.collection().len(), 1);

            let ann = engine.annotate("brand new", AnnotationKind::Summarize).expect("annotate failed");
            assert_eq!(ann.id, "ann-1");
        }
    }
}
