use orca_calc::{
    CalcError, Calculator, CalculatorItem, MeasurementSession, Parameter, ReferenceCalculator,
    ReferenceMarkers,
};
use orca_config::{ConfigManager, embedded, parse_column_map};
use orca_model::{ColumnSchema, Point};
use tempfile::TempDir;

const IMAGE: &str = "IMG_0001.jpg";

fn open_session() -> (TempDir, MeasurementSession) {
    let dir = TempDir::new().unwrap();
    let config = ConfigManager::new(dir.path().join("config")).unwrap();
    let session = MeasurementSession::open(&config).unwrap();
    (dir, session)
}

fn place(session: &mut MeasurementSession, name: &str, x: f64, y: f64) {
    session
        .store_mut()
        .set_point(IMAGE, name, Some(Point::new(x, y)))
        .unwrap();
}

fn place_reference_points(session: &mut MeasurementSession, sn: Point, df: Point) {
    place(session, "SN", sn.x, sn.y);
    place(session, "DF", df.x, df.y);
    place(session, "REFLINE TOP", 52.0, 865.0);
    place(session, "REFLINE BOTTOM", 39.0, 772.0);
}

fn line_refs(session: &MeasurementSession) -> ReferenceMarkers {
    session
        .references()
        .do_measurement(session.store(), "Line Refs", IMAGE)
        .unwrap()
}

fn midpoint(markers: &ReferenceMarkers, label: &str) -> Point {
    let (start, end) = markers.segment(label).unwrap();
    start.midpoint(end)
}

fn schema() -> ColumnSchema {
    parse_column_map(embedded::DEFAULT_COLUMN_MAP, "CSV-Columns.csv").unwrap()
}

fn text(value: &str) -> Parameter {
    Parameter::Text(value.to_string())
}

#[test]
fn offset_marker_projects_onto_snout_fin_axis() {
    let (_dir, mut session) = open_session();
    place_reference_points(&mut session, Point::new(100.0, 928.0), Point::new(101.0, 551.0));

    assert!(
        session
            .references()
            .preflight_measurement(session.store(), "Line Refs", IMAGE)
    );
    let markers = line_refs(&session);
    let center = midpoint(&markers, "75% measurement");
    assert!((center.x - 100.0).abs() < 0.5, "{center:?}");
    assert!((center.y - 795.0).abs() < 0.5, "{center:?}");
    assert!(markers.segment("ref top").is_some());
    assert!(markers.segment("ref bottom").is_some());
}

#[test]
fn swapping_anchors_gives_the_same_markers() {
    let (_dir, mut session) = open_session();
    place_reference_points(&mut session, Point::new(100.0, 928.0), Point::new(101.0, 551.0));
    let forward = line_refs(&session);

    place_reference_points(&mut session, Point::new(101.0, 551.0), Point::new(100.0, 928.0));
    let backward = line_refs(&session);

    assert_eq!(forward, backward);
}

#[test]
fn missing_input_gives_empty_markers() {
    let (_dir, mut session) = open_session();
    place(&mut session, "SN", 100.0, 928.0);
    place(&mut session, "DF", 101.0, 551.0);

    let references = session.references();
    assert!(!references.preflight_measurement(session.store(), "Line Refs", IMAGE));
    assert!(line_refs(&session).is_empty());
    assert!(
        references
            .do_measurement(session.store(), "Line Refs", "unknown.jpg")
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        references.do_measurement(session.store(), "Nope", IMAGE),
        Err(CalcError::UnknownRule(_))
    ));
}

#[test]
fn default_rules_draw_ticks_midline_and_landmark() {
    let (_dir, mut session) = open_session();
    place(&mut session, "SN", 0.0, 0.0);
    place(&mut session, "DF", 0.0, 100.0);
    session
        .store_mut()
        .set_endpoints(
            IMAGE,
            "TL",
            Some((Point::new(0.0, 0.0), Point::new(0.0, 200.0))),
        )
        .unwrap();
    let references = session.references();
    let store = session.store();

    let ticks = references.do_measurement(store, "TL Ticks", IMAGE).unwrap();
    assert_eq!(ticks.len(), 20);
    assert_eq!(midpoint(&ticks, "50%"), Point::new(0.0, 100.0));

    let based = references.do_measurement(store, "SNDF Ticks", IMAGE).unwrap();
    assert_eq!(
        based.labels().collect::<Vec<_>>(),
        ["10%", "20%", "30%", "40%", "50%", "axis"]
    );

    let midline = references
        .do_measurement(store, "SNDF Midline", IMAGE)
        .unwrap();
    assert_eq!(midline.get("50%"), Some(&[Point::new(0.0, 50.0)][..]));

    let snout = references.do_measurement(store, "Snout", IMAGE).unwrap();
    assert_eq!(snout.get("SN"), Some(&[Point::new(0.0, 0.0)][..]));
}

#[test]
fn cue_markers_follow_the_active_subject() {
    let (_dir, mut session) = open_session();
    place_reference_points(&mut session, Point::new(100.0, 928.0), Point::new(101.0, 551.0));
    assert!(session.cue_markers("SNDF").unwrap().is_empty());

    session.set_active(IMAGE);
    let cues = session.cue_markers("SNDF").unwrap();
    let names: Vec<&str> = cues.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["Line Refs", "SNDF Midline", "Snout"]);
    assert!(cues.iter().all(|(_, markers)| !markers.is_empty()));
    assert!(session.cue_markers("Frame").unwrap().is_empty());
}

#[test]
fn rule_errors_are_raised_at_load() {
    let schema = schema();
    let build =
        |item: CalculatorItem| ReferenceCalculator::new(&[item], &schema, "ReferenceConf.json");

    let zero_step = CalculatorItem::new(
        "Ticks",
        "interval_reference_markers",
        [
            text("SN_x"),
            text("SN_y"),
            text("DF_x"),
            text("DF_y"),
            Parameter::Number(0.0),
            Parameter::Number(100.0),
            Parameter::Number(0.0),
        ]
        .to_vec(),
    );
    assert!(matches!(
        build(zero_step),
        Err(CalcError::InvalidParameter { index: 6, .. })
    ));

    let unquoted = CalculatorItem::new(
        "Snout",
        "render_landmark",
        vec![text("SN"), text("SN_x"), text("SN_y")],
    );
    assert!(matches!(
        build(unquoted),
        Err(CalcError::InvalidParameter { index: 0, .. })
    ));

    let no_offsets = CalculatorItem::new(
        "Line Refs",
        "compute_offset_reference_markers",
        ["SN_x", "SN_y", "DF_x", "DF_y", "SN_x", "SN_y", "DF_x", "DF_y"]
            .map(text)
            .to_vec(),
    );
    let err = build(no_offsets).unwrap_err();
    assert!(err.to_string().contains("takes at least 9 parameters, got 8"), "{err}");

    let text_column = CalculatorItem::new(
        "Midline",
        "draw_ref_along_line",
        vec![
            text("Comments"),
            text("SN_y"),
            text("DF_x"),
            text("DF_y"),
            Parameter::Number(50.0),
        ],
    );
    assert!(matches!(
        build(text_column),
        Err(CalcError::NonNumericColumn { .. })
    ));
}

#[test]
fn several_offsets_use_the_label_template() {
    let schema = schema();
    let mut item = CalculatorItem::new(
        "Line Refs",
        "compute_offset_reference_markers",
        [
            "SN_x",
            "SN_y",
            "DF_x",
            "DF_y",
            "REFLINE TOP_x",
            "REFLINE TOP_y",
            "REFLINE BOTTOM_x",
            "REFLINE BOTTOM_y",
        ]
        .map(text)
        .to_vec(),
    );
    item.parameters.extend([Parameter::Number(25.0), Parameter::Number(50.0)]);
    item.label = Some("{} pct".to_string());
    let calculator = ReferenceCalculator::new(&[item], &schema, "ReferenceConf.json").unwrap();

    let (_dir, mut session) = open_session();
    place_reference_points(&mut session, Point::new(100.0, 928.0), Point::new(101.0, 551.0));
    let markers = calculator
        .do_measurement(session.store(), "Line Refs", IMAGE)
        .unwrap();
    assert_eq!(
        markers.labels().collect::<Vec<_>>(),
        ["25 pct", "50 pct", "axis", "ref bottom", "ref top"]
    );
}
