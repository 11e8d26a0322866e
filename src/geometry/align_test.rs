use super::*;
use crate::doc::ShapeKind;
use crate::state::test_helpers::shape_at;

const EPS: f64 = 1e-9;

fn apply(shapes: &mut [Shape], placements: &[Placement]) {
    for p in placements {
        if let Some(s) = shapes.iter_mut().find(|s| s.id == p.id) {
            s.x = p.x;
            s.y = p.y;
        }
    }
}

fn three_rects() -> Vec<Shape> {
    vec![
        shape_at(ShapeKind::Rectangle, 40.0, 10.0, 50.0, 30.0),
        shape_at(ShapeKind::Rectangle, 10.0, 80.0, 20.0, 60.0),
        shape_at(ShapeKind::Rectangle, 120.0, 40.0, 70.0, 20.0),
    ]
}

// =============================================================
// align
// =============================================================

#[test]
fn align_left_sets_every_x_to_minimum() {
    let mut shapes = three_rects();
    let min_x = shapes.iter().map(|s| s.x).fold(f64::INFINITY, f64::min);
    let placements = align(&shapes, AlignMode::Left).unwrap();
    apply(&mut shapes, &placements);
    for s in &shapes {
        assert!((s.x - min_x).abs() < EPS);
    }
}

#[test]
fn align_left_leaves_y_alone() {
    let shapes = three_rects();
    let placements = align(&shapes, AlignMode::Left).unwrap();
    for (s, p) in shapes.iter().zip(&placements) {
        assert!((s.y - p.y).abs() < EPS);
    }
}

#[test]
fn align_right_and_bottom_use_union_edges() {
    let mut shapes = three_rects();
    let placements = align(&shapes, AlignMode::Right).unwrap();
    apply(&mut shapes, &placements);
    for s in &shapes {
        assert!((s.bounds().right() - 190.0).abs() < EPS);
    }
    let placements = align(&shapes, AlignMode::Bottom).unwrap();
    apply(&mut shapes, &placements);
    for s in &shapes {
        assert!((s.bounds().bottom() - 140.0).abs() < EPS);
    }
}

#[test]
fn align_center_h_shares_center_x() {
    let mut shapes = three_rects();
    let placements = align(&shapes, AlignMode::CenterH).unwrap();
    apply(&mut shapes, &placements);
    // Union spans x 10..190.
    for s in &shapes {
        assert!((s.bounds().center().x - 100.0).abs() < EPS);
    }
}

#[test]
fn align_top_handles_center_origin_circles() {
    let rect = shape_at(ShapeKind::Rectangle, 0.0, 20.0, 10.0, 10.0);
    let mut circle = shape_at(ShapeKind::Circle, 100.0, 100.0, 0.0, 0.0);
    circle.radius = Some(10.0);
    let placements = align(&[rect, circle.clone()], AlignMode::Top).unwrap();
    let p = placements.iter().find(|p| p.id == circle.id).unwrap();
    // Circle's top edge moves to y=20, so its center sits at 30.
    assert!((p.y - 30.0).abs() < EPS);
    assert!((p.x - 100.0).abs() < EPS);
}

#[test]
fn align_rejects_single_shape() {
    let shapes = vec![shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0)];
    let err = align(&shapes, AlignMode::Left).unwrap_err();
    assert_eq!(err, InsufficientSelection { required: 2, actual: 1 });
}

// =============================================================
// distribute
// =============================================================

#[test]
fn distribute_horizontal_keeps_ends_and_equalizes_gaps() {
    let mut shapes = vec![
        shape_at(ShapeKind::Rectangle, 0.0, 0.0, 20.0, 20.0),
        shape_at(ShapeKind::Rectangle, 35.0, 5.0, 10.0, 20.0),
        shape_at(ShapeKind::Rectangle, 300.0, 0.0, 40.0, 20.0),
        shape_at(ShapeKind::Rectangle, 60.0, 9.0, 30.0, 20.0),
    ];
    let first = shapes[0].clone();
    let last = shapes[2].clone();

    let placements = distribute(&shapes, DistributeDirection::Horizontal).unwrap();
    assert_eq!(placements.len(), 2);
    assert!(placements.iter().all(|p| p.id != first.id && p.id != last.id));
    apply(&mut shapes, &placements);

    assert!((shapes[0].x - first.x).abs() < EPS);
    assert!((shapes[2].x - last.x).abs() < EPS);

    let mut boxes: Vec<Bounds> = shapes.iter().map(Shape::bounds).collect();
    boxes.sort_by(|a, b| a.x.total_cmp(&b.x));
    let gaps: Vec<f64> = boxes.windows(2).map(|w| w[1].x - w[0].right()).collect();
    for g in &gaps {
        assert!((g - gaps[0]).abs() < 1e-6, "gaps differ: {gaps:?}");
    }
    // span 340, widths 100 -> 240 / 3.
    assert!((gaps[0] - 80.0).abs() < 1e-6);
}

#[test]
fn distribute_vertical_only_moves_y() {
    let shapes = vec![
        shape_at(ShapeKind::Rectangle, 5.0, 0.0, 10.0, 10.0),
        shape_at(ShapeKind::Rectangle, 50.0, 12.0, 10.0, 10.0),
        shape_at(ShapeKind::Rectangle, 7.0, 100.0, 10.0, 10.0),
    ];
    let placements = distribute(&shapes, DistributeDirection::Vertical).unwrap();
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].id, shapes[1].id);
    assert!((placements[0].x - 50.0).abs() < EPS);
    assert!((placements[0].y - 50.0).abs() < EPS);
}

#[test]
fn distribute_rejects_two_shapes() {
    let shapes = vec![
        shape_at(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0),
        shape_at(ShapeKind::Rectangle, 50.0, 0.0, 10.0, 10.0),
    ];
    let err = distribute(&shapes, DistributeDirection::Horizontal).unwrap_err();
    assert_eq!(err.required, 3);
    assert_eq!(err.actual, 2);
}

#[test]
fn mode_and_direction_parse() {
    assert_eq!(AlignMode::parse("centerH"), Some(AlignMode::CenterH));
    assert_eq!(AlignMode::parse("center_v"), Some(AlignMode::CenterV));
    assert_eq!(AlignMode::parse("middle"), None);
    assert_eq!(DistributeDirection::parse("vertical"), Some(DistributeDirection::Vertical));
}
