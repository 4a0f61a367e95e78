use rigid_core::{collision::tree::BoundsTree, Bounds, DVec3, EntityId, PhysicsError, Position};

fn id(i: u32) -> EntityId {
    EntityId::from_index(i)
}

fn cube(x: f64, y: f64, z: f64, half: f64) -> Bounds {
    Bounds::around(Position::new(x, y, z), DVec3::splat(half))
}

#[test]
fn grouped_objects_stay_discoverable_after_removing_the_representative() {
    let mut tree = BoundsTree::new();
    let (b1, b2) = (cube(0.0, 0.0, 0.0, 1.0), cube(5.0, 0.0, 0.0, 1.0));
    tree.add(id(1), b1);
    tree.add_to_group(id(2), b2, &id(1), &b1).unwrap();
    assert!(tree.are_in_same_group(&id(1), &b1, &id(2), &b2).unwrap());

    tree.remove(&id(1), &b1).unwrap();
    assert!(tree.contains(&id(2), &b2));
    assert_eq!(tree.iter().map(|(object, _)| object).collect::<Vec<_>>(), vec![id(2)]);
    tree.validate().unwrap();
}

#[test]
fn members_of_one_group_never_pair_up() {
    let mut tree = BoundsTree::new();
    let b1 = cube(0.0, 0.0, 0.0, 1.0);
    tree.add(id(1), b1);
    tree.add_to_group(id(2), cube(0.5, 0.0, 0.0, 1.0), &id(1), &b1).unwrap();
    tree.add(id(3), cube(1.0, 0.0, 0.0, 1.0));

    let mut pairs = tree.colission_pairs();
    for pair in &mut pairs {
        if pair.0.index() > pair.1.index() {
            *pair = (pair.1, pair.0);
        }
    }
    pairs.sort_by_key(|(a, b)| (a.index(), b.index()));
    assert_eq!(pairs, vec![(id(1), id(3)), (id(2), id(3))]);
}

#[test]
fn broad_phase_matches_brute_force() {
    let mut tree = BoundsTree::new();
    let mut boxes = Vec::new();
    for i in 0..200u32 {
        let x = ((i * 37) % 50) as f64 * 0.7;
        let y = ((i * 11) % 7) as f64 * 0.9;
        let z = ((i * 5) % 13) as f64 * 0.8;
        let bounds = cube(x, y, z, 0.5);
        tree.add(id(i), bounds);
        boxes.push(bounds);
    }

    let mut expected = 0;
    for i in 0..boxes.len() {
        for j in i + 1..boxes.len() {
            if boxes[i].intersects(&boxes[j]) {
                expected += 1;
            }
        }
    }
    assert_eq!(tree.colission_pairs().len(), expected);

    tree.improve_structure();
    tree.validate().unwrap();
    assert_eq!(tree.colission_pairs().len(), expected);
    assert_eq!(tree.len(), 200);
}

#[test]
fn cross_tree_pairs_only_report_overlaps() {
    let mut free = BoundsTree::new();
    let mut terrain = BoundsTree::new();
    free.add(id(1), cube(0.0, 1.0, 0.0, 0.5));
    free.add(id(2), cube(10.0, 1.0, 0.0, 0.5));
    terrain.add(id(100), Bounds::new(Position::new(-2.0, -1.0, -2.0), Position::new(2.0, 0.6, 2.0)));

    let mut pairs = Vec::new();
    free.for_each_colission_between(&terrain, |a, b| pairs.push((a, b)));
    assert_eq!(pairs, vec![(id(1), id(100))]);
}

#[test]
fn groups_move_between_trees_as_a_whole() {
    let mut free = BoundsTree::new();
    let mut terrain = BoundsTree::new();
    let b1 = cube(0.0, 0.0, 0.0, 1.0);
    let b2 = cube(2.0, 0.0, 0.0, 1.0);
    free.add(id(1), b1);
    free.add_to_group(id(2), b2, &id(1), &b1).unwrap();
    free.add(id(3), cube(9.0, 0.0, 0.0, 1.0));

    free.transfer_group(&mut terrain, &id(2), &b2).unwrap();
    assert_eq!(free.len(), 1);
    assert_eq!(terrain.len(), 2);
    assert!(terrain.are_in_same_group(&id(1), &b1, &id(2), &b2).unwrap());
    free.validate().unwrap();
    terrain.validate().unwrap();
}

#[test]
fn splitting_a_group_separates_members() {
    let mut tree = BoundsTree::new();
    let bounds: Vec<Bounds> = (0..4).map(|i| cube(i as f64, 0.0, 0.0, 0.6)).collect();
    tree.add(id(0), bounds[0]);
    for i in 1..4 {
        tree.add_to_group(id(i), bounds[i as usize], &id(0), &bounds[0]).unwrap();
    }
    assert!(tree.colission_pairs().is_empty());

    tree.split_group([(id(2), bounds[2]), (id(3), bounds[3])]).unwrap();
    assert!(tree.are_in_same_group(&id(2), &bounds[2], &id(3), &bounds[3]).unwrap());
    assert!(!tree.are_in_same_group(&id(0), &bounds[0], &id(2), &bounds[2]).unwrap());
    // Neighbours 1 and 2 now overlap across groups.
    assert!(tree.colission_pairs().contains(&(id(1), id(2))) || tree.colission_pairs().contains(&(id(2), id(1))));
    tree.validate().unwrap();
}

#[test]
fn stale_bounds_are_reported_as_not_found() {
    let mut tree = BoundsTree::new();
    tree.add(id(1), cube(0.0, 0.0, 0.0, 1.0));
    let err = tree
        .update_object_bounds(&id(1), &cube(50.0, 0.0, 0.0, 1.0), cube(1.0, 0.0, 0.0, 1.0))
        .unwrap_err();
    assert!(matches!(err, PhysicsError::NotFound { .. }));
}

#[test]
fn refreshed_bounds_are_used_for_queries() {
    let mut tree = BoundsTree::new();
    for i in 0..30 {
        tree.add(id(i), cube(i as f64 * 3.0, 0.0, 0.0, 0.5));
    }
    tree.refresh_bounds(|object| cube(object.index() as f64 * 3.0, 100.0, 0.0, 0.5));
    tree.validate().unwrap();

    let region = Bounds::around(Position::new(0.0, 100.0, 0.0), DVec3::new(7.0, 1.0, 1.0));
    let mut hits: Vec<u32> = tree
        .iter_intersecting(region)
        .map(|(object, _)| object.index() as u32)
        .collect();
    hits.sort_unstable();
    assert_eq!(hits, vec![0, 1, 2]);
    assert_eq!(tree.find_bounds(&id(4)), Some(cube(12.0, 100.0, 0.0, 0.5)));
}
