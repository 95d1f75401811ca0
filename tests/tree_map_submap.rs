// AVL sub-map insert/remove bound propagation (§8.3).

use coherence_rs::map::tree_map::TreeMap;

#[test]
fn submap_tracks_parent_through_insert_and_remove() {
    let parent: TreeMap<i32, &'static str> = TreeMap::new();
    for k in [1, 2, 3, 14, 15, 16] {
        parent.put(k, "v").unwrap();
    }

    let view = parent.sub_map(2, true, 15, false);
    assert_eq!(view.len(), 3);
    assert_eq!(view.first_key().unwrap(), 3);
    assert_eq!(view.last_key().unwrap(), 14);

    parent.remove(&2);
    assert_eq!(parent.len(), 5);
    assert_eq!(view.len(), 3);

    parent.remove(&15);
    assert_eq!(parent.len(), 4);
    assert_eq!(view.len(), 2);

    view.put(5, "v").unwrap();
    assert_eq!(parent.len(), 5);
    assert!(parent.contains_key(&5));

    assert!(view.put(20, "v").is_err());
}
