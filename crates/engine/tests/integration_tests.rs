//! End-to-end labeling passes through the public API.

use cartolabel_engine::{
    Aabb, Arrangement, CharBox, EngineConfig, LabelInfo, LabelPosition, Layer, Pal, PlacedLabel,
    SearchMethod,
};
use geo::{line_string, point, polygon, Geometry};

fn extent() -> Aabb {
    Aabb::new(0.0, 0.0, 200.0, 200.0)
}

fn seeded() -> Pal {
    Pal::with_config(EngineConfig::new().with_seed(1234))
}

/// Rebuilds the oriented box of a placement for overlap checks.
fn as_position(label: &PlacedLabel) -> LabelPosition {
    let position = LabelPosition::new(
        label.feature.clone(),
        label.x,
        label.y,
        label.width,
        label.height,
        label.angle,
        label.cost,
    );
    if label.chars.is_empty() {
        position
    } else {
        position.with_chars(
            label
                .chars
                .iter()
                .map(|c| CharBox {
                    x: c.x,
                    y: c.y,
                    angle: c.angle,
                    width: c.width,
                    height: label.height,
                })
                .collect(),
        )
    }
}

fn assert_pairwise_disjoint(labels: &[PlacedLabel]) {
    let positions: Vec<LabelPosition> = labels.iter().map(as_position).collect();
    for (i, a) in positions.iter().enumerate() {
        for b in positions.iter().skip(i + 1) {
            assert!(
                !a.overlaps_with(b),
                "labels '{}' and '{}' overlap",
                a.feature,
                b.feature
            );
        }
    }
}

mod dense_scenes {
    use super::*;

    /// A cluster of nearby points: every accepted label must be disjoint
    /// from every other, whatever the engine had to drop.
    #[test]
    fn cluster_labels_never_overlap() {
        let mut pal = seeded();
        let layer = Layer::new("poi", Arrangement::AroundPoint);
        for i in 0..12 {
            let x = 90.0 + (i % 4) as f64 * 6.0;
            let y = 90.0 + (i / 4) as f64 * 6.0;
            layer
                .register_feature(
                    LabelInfo::new(format!("p{i}"), format!("P{i}"), 14.0, 5.0)
                        .with_distance(1.0),
                    &Geometry::Point(point!(x: x, y: y)),
                )
                .unwrap();
        }
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        assert!(result.placed_count() >= 1);
        assert_eq!(result.placed_count() + result.unplaced_count(), 12);
        assert_pairwise_disjoint(&result.labels);
    }

    /// Mixed geometry kinds competing for the same area.
    #[test]
    fn mixed_layers_disjoint() {
        let mut pal = seeded();

        let roads = Layer::new("roads", Arrangement::Line);
        roads
            .register_feature(
                LabelInfo::new("r1", "High Street", 30.0, 5.0),
                &Geometry::LineString(line_string![(x: 0.0, y: 100.0), (x: 200.0, y: 100.0)]),
            )
            .unwrap();
        pal.add_layer(roads);

        let parks = Layer::new("parks", Arrangement::Free);
        parks
            .register_feature(
                LabelInfo::new("g1", "Green", 20.0, 6.0),
                &Geometry::Polygon(polygon![
                    (x: 60.0, y: 60.0),
                    (x: 140.0, y: 60.0),
                    (x: 140.0, y: 140.0),
                    (x: 60.0, y: 140.0),
                ]),
            )
            .unwrap();
        pal.add_layer(parks);

        let poi = Layer::new("poi", Arrangement::AroundPoint);
        poi.register_feature(
            LabelInfo::new("c1", "Cafe", 14.0, 5.0).with_distance(1.0),
            &Geometry::Point(point!(x: 100.0, y: 102.0)),
        )
        .unwrap();
        pal.add_layer(poi);

        let result = pal.compute_labeling(&extent()).unwrap();
        assert_pairwise_disjoint(&result.labels);
    }

    /// Always-show labels survive and are exempt from the disjointness
    /// guarantee.
    #[test]
    fn always_show_is_exempt() {
        let mut pal = seeded();
        let layer = Layer::new("poi", Arrangement::OverPoint);
        for id in ["v1", "v2"] {
            layer
                .register_feature(
                    LabelInfo::new(id, id, 10.0, 4.0).with_always_show(true),
                    &Geometry::Point(point!(x: 100.0, y: 100.0)),
                )
                .unwrap();
        }
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        // Both placed despite coinciding exactly
        assert_eq!(result.placed_count(), 2);
    }
}

mod determinism {
    use super::*;

    fn busy_scene(seed: u64) -> Vec<(String, f64, f64)> {
        let mut pal = Pal::with_config(EngineConfig::new().with_seed(seed));
        let layer = Layer::new("poi", Arrangement::AroundPoint);
        for i in 0..8 {
            layer
                .register_feature(
                    LabelInfo::new(format!("p{i}"), "label", 12.0, 4.0).with_distance(1.0),
                    &Geometry::Point(point!(x: 95.0 + i as f64 * 3.0, y: 100.0)),
                )
                .unwrap();
        }
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        result
            .labels
            .iter()
            .map(|l| (l.feature.clone(), l.x, l.y))
            .collect()
    }

    #[test]
    fn same_seed_same_placements() {
        assert_eq!(busy_scene(99), busy_scene(99));
    }
}

mod line_features {
    use super::*;

    /// A repeated line label is chopped into ceil(length / distance)
    /// pieces, each eligible for its own label.
    #[test]
    fn repeat_distance_yields_multiple_labels() {
        let mut pal = seeded();
        let layer = Layer::new("roads", Arrangement::Line);
        layer
            .register_feature(
                LabelInfo::new("road", "A1", 8.0, 3.0).with_repeat_distance(50.0),
                &Geometry::LineString(line_string![(x: 0.0, y: 100.0), (x: 190.0, y: 100.0)]),
            )
            .unwrap();
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        let road_labels = result
            .labels
            .iter()
            .filter(|l| l.feature == "road")
            .count();
        assert!(road_labels >= 2, "got {road_labels} repeated labels");
        assert_pairwise_disjoint(&result.labels);
    }

    /// Connected same-text segments merge into one feature before labeling.
    #[test]
    fn merged_segments_get_one_label() {
        let mut pal = seeded();
        let layer = Layer::new("roads", Arrangement::Line).with_merge_connected(true);
        layer
            .register_feature(
                LabelInfo::new("a", "Ring Road", 20.0, 4.0),
                &Geometry::LineString(line_string![(x: 0.0, y: 50.0), (x: 100.0, y: 50.0)]),
            )
            .unwrap();
        layer
            .register_feature(
                LabelInfo::new("b", "Ring Road", 20.0, 4.0),
                &Geometry::LineString(line_string![(x: 100.0, y: 50.0), (x: 200.0, y: 50.0)]),
            )
            .unwrap();
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        assert_eq!(result.placed_count(), 1);
    }

    /// Curved placement emits one character box per character, following
    /// the line tangent.
    #[test]
    fn curved_label_has_char_positions() {
        let mut pal = seeded();
        let layer = Layer::new("rivers", Arrangement::Curved);
        layer
            .register_feature(
                LabelInfo::new("r", "Avon", 16.0, 4.0)
                    .with_char_widths(vec![4.0, 4.0, 4.0, 4.0]),
                &Geometry::LineString(line_string![(x: 0.0, y: 100.0), (x: 200.0, y: 100.0)]),
            )
            .unwrap();
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        assert_eq!(result.placed_count(), 1);
        let label = &result.labels[0];
        assert_eq!(label.chars.len(), 4);
        for c in &label.chars {
            assert!(c.angle.abs() < 1e-9);
            assert!((c.y - 100.0).abs() < 1e-9);
        }
    }
}

mod placement_rules {
    use super::*;

    #[test]
    fn fixed_position_is_honored() {
        let mut pal = seeded();
        let layer = Layer::new("poi", Arrangement::AroundPoint);
        layer
            .register_feature(
                LabelInfo::new("pin", "Here", 10.0, 4.0).with_fixed_position(120.0, 80.0),
                &Geometry::Point(point!(x: 50.0, y: 50.0)),
            )
            .unwrap();
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        assert_eq!(result.placed_count(), 1);
        let label = &result.labels[0];
        // The label anchors at the fixed position, not the geometry
        let bbox = as_position(label).bbox();
        assert!(bbox.contains_point(120.0, 80.0) || bbox.expanded(10.0).contains_point(120.0, 80.0));
        assert!(!bbox.contains_point(50.0, 50.0));
    }

    /// With partial labels disabled, every accepted box lies inside the
    /// requested extent.
    #[test]
    fn no_partial_labels_outside_extent() {
        let mut pal = Pal::with_config(
            EngineConfig::new().with_seed(5).with_show_partial(false),
        );
        let layer = Layer::new("poi", Arrangement::AroundPoint);
        // Near the corner: most of the fan overhangs the extent
        layer
            .register_feature(
                LabelInfo::new("edge", "Edge", 20.0, 6.0).with_distance(1.0),
                &Geometry::Point(point!(x: 2.0, y: 2.0)),
            )
            .unwrap();
        layer
            .register_feature(
                LabelInfo::new("mid", "Mid", 20.0, 6.0).with_distance(1.0),
                &Geometry::Point(point!(x: 100.0, y: 100.0)),
            )
            .unwrap();
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        let extent = extent();
        for label in &result.labels {
            assert!(
                extent.contains(&as_position(label).bbox()),
                "label '{}' overhangs the extent",
                label.feature
            );
        }
        assert!(result.labels.iter().any(|l| l.feature == "mid"));
    }

    /// When two single-candidate features collide, the lower priority
    /// value (more important) wins.
    #[test]
    fn priority_decides_forced_conflicts() {
        let mut pal = seeded();
        let layer = Layer::new("poi", Arrangement::OverPoint);
        layer
            .register_feature(
                LabelInfo::new("minor", "m", 10.0, 4.0).with_priority(0.9),
                &Geometry::Point(point!(x: 100.0, y: 100.0)),
            )
            .unwrap();
        layer
            .register_feature(
                LabelInfo::new("major", "M", 10.0, 4.0).with_priority(0.1),
                &Geometry::Point(point!(x: 100.0, y: 100.0)),
            )
            .unwrap();
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        assert!(result.labels.iter().any(|l| l.feature == "major"));
        assert!(result.unplaced.contains(&"minor".to_string()));
    }

    /// Greedy produces a valid (if not optimal) disjoint labeling.
    #[test]
    fn greedy_is_still_disjoint() {
        let mut pal = Pal::with_config(
            EngineConfig::new()
                .with_search_method(SearchMethod::Greedy)
                .with_seed(3),
        );
        let layer = Layer::new("poi", Arrangement::AroundPoint);
        for i in 0..6 {
            layer
                .register_feature(
                    LabelInfo::new(format!("p{i}"), "x", 12.0, 4.0).with_distance(1.0),
                    &Geometry::Point(point!(x: 98.0 + i as f64 * 2.0, y: 100.0)),
                )
                .unwrap();
        }
        pal.add_layer(layer);

        let result = pal.compute_labeling(&extent()).unwrap();
        assert_pairwise_disjoint(&result.labels);
        assert_eq!(result.method.as_deref(), Some("Greedy"));
    }
}

mod registration {
    use super::*;

    #[test]
    fn duplicate_ids_are_rejected_once() {
        let layer = Layer::new("poi", Arrangement::AroundPoint);
        let geom = Geometry::Point(point!(x: 1.0, y: 1.0));
        assert!(layer
            .register_feature(LabelInfo::new("f", "A", 5.0, 2.0), &geom)
            .unwrap());
        assert!(!layer
            .register_feature(LabelInfo::new("f", "B", 5.0, 2.0), &geom)
            .unwrap());
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn invalid_sizes_error_out() {
        let layer = Layer::new("poi", Arrangement::AroundPoint);
        let geom = Geometry::Point(point!(x: 1.0, y: 1.0));
        assert!(layer
            .register_feature(LabelInfo::new("f", "A", 5.0, -2.0), &geom)
            .is_err());
    }

    #[test]
    fn empty_multi_geometry_is_ignored() {
        let layer = Layer::new("roads", Arrangement::Line);
        let mls = geo::MultiLineString::<f64>::new(Vec::new());
        assert!(!layer
            .register_feature(
                LabelInfo::new("f", "A", 5.0, 2.0),
                &Geometry::MultiLineString(mls)
            )
            .unwrap());
        assert!(layer.is_empty());
    }
}
