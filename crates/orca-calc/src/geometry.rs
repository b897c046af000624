//! Reference marker geometry.
//!
//! All functions are pure. A zero-length (or non-finite) axis produces an
//! empty [`ReferenceMarkers`] instead of NaN coordinates.

use orca_model::Point;

use crate::markers::ReferenceMarkers;

/// Marker half-length as a fraction of the axis length.
const MARKER_HALF_LENGTH: f64 = 0.025;

/// Upper bound on tick marks per rule.
const MAX_TICKS: usize = 1000;

/// Label template used when a rule has none. `{}` is replaced by the percentage.
pub const DEFAULT_MEASUREMENT_LABEL: &str = "{}% measurement";

pub const AXIS_LABEL: &str = "axis";
pub const REF_TOP_LABEL: &str = "ref top";
pub const REF_BOTTOM_LABEL: &str = "ref bottom";

/// A line segment as `(start, end)`.
pub type Segment = (Point, Point);

/// Percent range for tick marks: `start..=end` in increments of `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

/// Order two anchors so the upper one (smaller y, then smaller x) comes first.
pub fn upper_first(a: Point, b: Point) -> Segment {
    if (b.y, b.x) < (a.y, a.x) { (b, a) } else { (a, b) }
}

fn axis_length((start, end): Segment) -> Option<f64> {
    let length = start.distance(end);
    (length.is_finite() && length > 0.0).then_some(length)
}

/// Half of a marker: the axis direction rotated 90 degrees, scaled to
/// [`MARKER_HALF_LENGTH`] of the axis length.
fn marker_half((start, end): Segment) -> (f64, f64) {
    (
        (start.y - end.y) * MARKER_HALF_LENGTH,
        (end.x - start.x) * MARKER_HALF_LENGTH,
    )
}

fn marker(center: Point, (dx, dy): (f64, f64)) -> Segment {
    (center.offset(-dx, -dy), center.offset(dx, dy))
}

/// Integral percentages print without a fractional part.
pub fn format_percent(percent: f64) -> String {
    if percent.fract() == 0.0 && percent.abs() < 1e15 {
        format!("{}", percent as i64)
    } else {
        format!("{percent}")
    }
}

pub fn apply_label(template: &str, percent: f64) -> String {
    template.replace("{}", &format_percent(percent))
}

/// Projection onto `axis` of the point `percent`% of the way along `reference`.
pub fn offset_reference(axis: Segment, reference: Segment, percent: f64) -> Option<Point> {
    let length = axis_length(axis)?;
    let (start, end) = axis;
    let (ux, uy) = ((end.x - start.x) / length, (end.y - start.y) / length);
    let target = reference.0.lerp(reference.1, percent / 100.0);
    let along = (target.x - start.x) * ux + (target.y - start.y) * uy;
    Some(start.offset(along * ux, along * uy))
}

/// Axis between two anchors with perpendicular markers where the reference
/// line's ends (`ref top`, `ref bottom`) and each offset project onto it.
pub fn offset_reference_markers(
    anchors: Segment,
    reference: Segment,
    offsets: &[f64],
    label: &str,
) -> ReferenceMarkers {
    let axis = upper_first(anchors.0, anchors.1);
    let mut markers = ReferenceMarkers::new();
    if axis_length(axis).is_none() {
        return markers;
    }
    let half = marker_half(axis);
    markers.insert_segment(AXIS_LABEL, axis.0, axis.1);

    let mut place = |name: String, percent: f64| {
        if let Some(center) = offset_reference(axis, reference, percent) {
            let (start, end) = marker(center, half);
            markers.insert_segment(name, start, end);
        }
    };
    place(REF_TOP_LABEL.to_string(), 0.0);
    place(REF_BOTTOM_LABEL.to_string(), 100.0);
    for &offset in offsets {
        place(apply_label(label, offset), offset);
    }
    markers
}

/// Tick marks along `axis` every `range.step` percent of the length of
/// `base`, kept while they fall on the axis, labelled `"{p + label_offset}%"`.
pub fn interval_markers(
    axis: Segment,
    base: Segment,
    range: TickRange,
    label_offset: f64,
) -> ReferenceMarkers {
    let mut markers = ReferenceMarkers::new();
    let Some(length) = axis_length(axis) else {
        return markers;
    };
    let TickRange { start, end, step } = range;
    let usable = step > 0.0 && start.is_finite() && end.is_finite();
    if !usable {
        return markers;
    }

    let base_length = base.0.distance(base.1);
    let (ux, uy) = ((axis.1.x - axis.0.x) / length, (axis.1.y - axis.0.y) / length);
    let half = marker_half(axis);
    let span = ((end - start) / step).floor();
    // Cap before casting: a tiny step makes `span` huge or infinite.
    let ticks = if span < 0.0 {
        0
    } else if span >= MAX_TICKS as f64 {
        tracing::warn!(span, max = MAX_TICKS, "Truncating reference tick marks");
        MAX_TICKS
    } else {
        span as usize + 1
    };

    for index in 0..ticks {
        let percent = start + index as f64 * step;
        let distance = percent * base_length / 100.0;
        if distance > length {
            continue;
        }
        let center = axis.0.offset(ux * distance, uy * distance);
        let (from, to) = marker(center, half);
        markers.insert_segment(format!("{}%", format_percent(percent + label_offset)), from, to);
    }
    markers.insert_segment(AXIS_LABEL, axis.0, axis.1);
    markers
}

/// The line itself (label `""`) and the point `percent`% along it.
pub fn point_along_line(line: Segment, percent: f64) -> ReferenceMarkers {
    let mut markers = ReferenceMarkers::new();
    markers.insert_segment("", line.0, line.1);
    markers.insert(
        format!("{}%", format_percent(percent)),
        vec![line.0.lerp(line.1, percent / 100.0)],
    );
    markers
}

pub fn landmark(label: &str, point: Point) -> ReferenceMarkers {
    let mut markers = ReferenceMarkers::new();
    markers.insert(label, vec![point]);
    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    const SN: Point = Point::new(100.0, 928.0);
    const DF: Point = Point::new(101.0, 551.0);
    const REF_TOP: Point = Point::new(52.0, 865.0);
    const REF_BOTTOM: Point = Point::new(39.0, 772.0);

    fn midpoint(markers: &ReferenceMarkers, label: &str) -> Point {
        let (start, end) = markers.segment(label).unwrap();
        start.midpoint(end)
    }

    #[test]
    fn projects_offset_onto_axis() {
        let markers =
            offset_reference_markers((SN, DF), (REF_TOP, REF_BOTTOM), &[75.0], DEFAULT_MEASUREMENT_LABEL);

        let center = midpoint(&markers, "75% measurement");
        assert!((center.x - 100.0).abs() < 0.5, "{center:?}");
        assert!((center.y - 795.0).abs() < 0.5, "{center:?}");
        assert_eq!(
            markers.labels().collect::<Vec<_>>(),
            ["75% measurement", "axis", "ref bottom", "ref top"]
        );
    }

    #[test]
    fn anchor_order_does_not_matter() {
        let forward =
            offset_reference_markers((SN, DF), (REF_TOP, REF_BOTTOM), &[75.0], DEFAULT_MEASUREMENT_LABEL);
        let backward =
            offset_reference_markers((DF, SN), (REF_TOP, REF_BOTTOM), &[75.0], DEFAULT_MEASUREMENT_LABEL);
        assert_eq!(forward, backward);
        assert_eq!(forward.segment("axis"), Some((DF, SN)));
    }

    #[test]
    fn markers_are_perpendicular_and_sized_to_the_axis() {
        let axis = (Point::new(0.0, 0.0), Point::new(0.0, 200.0));
        let markers = offset_reference_markers(
            axis,
            (Point::new(10.0, 50.0), Point::new(10.0, 150.0)),
            &[50.0],
            "{} mid",
        );
        assert_eq!(
            markers.segment("50 mid"),
            Some((Point::new(5.0, 100.0), Point::new(-5.0, 100.0)))
        );
        assert_eq!(midpoint(&markers, "ref top"), Point::new(0.0, 50.0));
        assert_eq!(midpoint(&markers, "ref bottom"), Point::new(0.0, 150.0));
    }

    #[test]
    fn degenerate_axis_yields_nothing() {
        let markers = offset_reference_markers((SN, SN), (REF_TOP, REF_BOTTOM), &[75.0], "{}");
        assert!(markers.is_empty());

        let range = TickRange {
            start: 5.0,
            end: 95.0,
            step: 5.0,
        };
        assert!(interval_markers((SN, SN), (SN, DF), range, 0.0).is_empty());
    }

    #[test]
    fn interval_ticks_cover_the_range() {
        let axis = (Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let range = TickRange {
            start: 5.0,
            end: 95.0,
            step: 5.0,
        };
        let markers = interval_markers(axis, axis, range, 0.0);

        assert_eq!(markers.len(), 20);
        assert_eq!(midpoint(&markers, "5%"), Point::new(5.0, 0.0));
        assert_eq!(midpoint(&markers, "95%"), Point::new(95.0, 0.0));
        assert_eq!(markers.segment("axis"), Some(axis));
    }

    #[test]
    fn interval_ticks_use_base_length_and_stop_at_axis_end() {
        let axis = (Point::new(0.0, 0.0), Point::new(0.0, 100.0));
        let base = (Point::new(0.0, 0.0), Point::new(200.0, 0.0));
        let range = TickRange {
            start: 10.0,
            end: 90.0,
            step: 10.0,
        };
        let markers = interval_markers(axis, base, range, 5.0);

        let labels: Vec<&str> = markers.labels().collect();
        assert_eq!(labels, ["15%", "25%", "35%", "45%", "55%", "axis"]);
        assert_eq!(midpoint(&markers, "55%"), Point::new(0.0, 100.0));
    }

    #[test]
    fn non_positive_step_yields_nothing() {
        let axis = (Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let range = TickRange {
            start: 0.0,
            end: 100.0,
            step: 0.0,
        };
        assert!(interval_markers(axis, axis, range, 0.0).is_empty());
    }

    #[test]
    fn tick_count_is_capped_for_tiny_steps_and_huge_ranges() {
        let axis = (Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let tiny = TickRange {
            start: 0.0,
            end: 100.0,
            step: 1e-300,
        };
        let markers = interval_markers(axis, axis, tiny, 0.0);
        assert!(markers.len() <= MAX_TICKS + 1);
        assert_eq!(markers.segment("axis"), Some(axis));

        let huge = TickRange {
            start: 0.0,
            end: 1e300,
            step: 1.0,
        };
        let markers = interval_markers(axis, axis, huge, 0.0);
        // 0% through 100% fall on the axis.
        assert_eq!(markers.len(), 102);
        assert_eq!(midpoint(&markers, "100%"), Point::new(100.0, 0.0));
    }

    #[test]
    fn along_line_and_landmark() {
        let line = (Point::new(0.0, 0.0), Point::new(10.0, 20.0));
        let markers = point_along_line(line, 50.0);
        assert_eq!(markers.segment(""), Some(line));
        assert_eq!(markers.get("50%"), Some(&[Point::new(5.0, 10.0)][..]));

        let markers = landmark("SN", SN);
        assert_eq!(markers.get("SN"), Some(&[SN][..]));
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(format_percent(75.0), "75");
        assert_eq!(format_percent(12.5), "12.5");
        assert_eq!(apply_label("{}% measurement", 75.0), "75% measurement");
    }
}
