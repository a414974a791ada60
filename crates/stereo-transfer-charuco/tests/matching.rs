use nalgebra::Point2;
use stereo_transfer_charuco::{
    match_frame, CharucoBoard, CharucoBoardSpec, CorrespondenceError, CorrespondenceParams,
    MarkerObservations, StereoObservationSet,
};
use stereo_transfer_core::{CameraRole, StereoPair};

fn observations(ids: &[u32], shift: f64) -> MarkerObservations {
    MarkerObservations::from_pairs(
        ids.iter()
            .map(|&id| (id, Point2::new(100.0 + 40.0 * id as f64 + shift, 200.0))),
    )
    .expect("observations")
}

fn params(min_shared_markers: usize) -> CorrespondenceParams {
    CorrespondenceParams {
        min_shared_markers,
        ..CorrespondenceParams::default()
    }
}

#[test]
fn overlapping_sets_keep_three_shared_ids() {
    let board = CharucoBoard::new(CharucoBoardSpec::default()).expect("board");
    let a = observations(&[1, 2, 3, 4, 5], 0.0);
    let b = observations(&[3, 4, 5, 6, 7], -25.0);

    let m = match_frame(&board, StereoPair::new(&a, &b), &params(3)).expect("match");
    assert_eq!(m.ids, vec![3, 4, 5]);
    assert_eq!(m.len(), 3);
    for (i, &id) in m.ids.iter().enumerate() {
        assert_eq!(m.points(CameraRole::Left)[i], a.get(id).expect("left"));
        assert_eq!(m.points(CameraRole::Right)[i], b.get(id).expect("right"));
        assert_eq!(m.object_points[i], board.object_point(id).expect("board point"));
    }
}

#[test]
fn match_count_equals_intersection_size_across_thresholds() {
    let board = CharucoBoard::new(CharucoBoardSpec::default()).expect("board");
    let a = observations(&[0, 2, 4, 6, 8, 10, 12, 14, 16], 0.0);
    let b = observations(&[0, 3, 4, 6, 9, 12, 15, 16, 21], 0.0);
    // Shared: 0, 4, 6, 12, 16.
    for min in 1..=8 {
        let res = match_frame(&board, StereoPair::new(&a, &b), &params(min));
        if min <= 5 {
            let m = res.expect("enough shared ids");
            assert_eq!(m.ids, vec![0, 4, 6, 12, 16]);
            assert_eq!(m.image_points.left.len(), 5);
            assert_eq!(m.image_points.right.len(), 5);
            assert_eq!(m.object_points.len(), 5);
        } else {
            assert_eq!(
                res.unwrap_err(),
                CorrespondenceError::InsufficientCorrespondence {
                    shared: 5,
                    required: min
                }
            );
        }
    }
}

#[test]
fn accumulated_arrays_are_aligned_per_frame() {
    let board = CharucoBoard::new(CharucoBoardSpec::default()).expect("board");
    let mut set = StereoObservationSet::new(board, params(4));
    let frames = [
        (vec![0, 1, 2, 3, 4, 5], vec![2, 3, 4, 5, 6]),
        (vec![10, 11], vec![10, 11]),
        (vec![12, 13, 14, 15], vec![12, 13, 14, 15]),
    ];
    for (l, r) in &frames {
        set.push_frame(&observations(l, 0.0), &observations(r, -10.0));
    }
    assert_eq!(set.accepted(), 2);
    assert_eq!(set.skipped(), 1);
    let left = set.image_points(CameraRole::Left);
    let right = set.image_points(CameraRole::Right);
    let objects = set.object_points();
    for ((l, r), o) in left.iter().zip(&right).zip(&objects) {
        assert_eq!(l.len(), r.len());
        assert_eq!(l.len(), o.len());
        for (pl, pr) in l.iter().zip(r) {
            assert_eq!(pl.x - pr.x, 10.0);
        }
    }
}
