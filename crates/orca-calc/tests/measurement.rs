use orca_calc::{CalcError, Calculator, MeasurementSession};
use orca_config::ConfigManager;
use orca_model::{Point, Value};
use orca_store::StoreError;
use tempfile::TempDir;

const IMAGE: &str = "IMG_0001.jpg";

fn open_session() -> (TempDir, MeasurementSession) {
    let dir = TempDir::new().unwrap();
    let config = ConfigManager::new(dir.path().join("config")).unwrap();
    let session = MeasurementSession::open(&config).unwrap();
    (dir, session)
}

fn float(session: &MeasurementSession, column: &str) -> Option<f64> {
    session
        .store()
        .get_value(IMAGE, column)
        .and_then(Value::as_f64)
}

#[test]
fn length_follows_its_endpoints() {
    let (_dir, mut session) = open_session();
    let store = session.store_mut();
    store
        .set_point(IMAGE, "SN", Some(Point::new(0.0, 3.0)))
        .unwrap();
    assert_eq!(float(&session, "SNDF"), None);

    session
        .store_mut()
        .set_point(IMAGE, "DF", Some(Point::new(4.0, 0.0)))
        .unwrap();
    assert_eq!(float(&session, "SNDF"), Some(5.0));
    assert_eq!(float(&session, "SNDF_x_end"), Some(4.0));
    assert!(session.store().is_dirty());

    session.store_mut().clear_value(IMAGE, "SN_x").unwrap();
    assert_eq!(float(&session, "SNDF"), None);
    assert_eq!(float(&session, "SNDF_x_start"), None);
    assert_eq!(float(&session, "SNDF_y_start"), Some(3.0));
}

#[test]
fn chained_measurements_update_together() {
    let (_dir, mut session) = open_session();
    let store = session.store_mut();
    store
        .set_point(IMAGE, "SN", Some(Point::new(0.0, 0.0)))
        .unwrap();
    store
        .set_point(IMAGE, "DF", Some(Point::new(0.0, 4.0)))
        .unwrap();
    store
        .set_endpoints(
            IMAGE,
            "TL",
            Some((Point::new(0.0, 0.0), Point::new(0.0, 10.0))),
        )
        .unwrap();

    assert_eq!(float(&session, "TL"), Some(10.0));
    assert_eq!(float(&session, "SNDF_TL"), Some(0.4));
    assert_eq!(
        session.store().get_point(IMAGE, "TL_mid"),
        Some(Point::new(0.0, 5.0))
    );

    session
        .store_mut()
        .set_point(IMAGE, "DF", Some(Point::new(0.0, 5.0)))
        .unwrap();
    assert_eq!(float(&session, "SNDF_TL"), Some(0.5));

    session
        .store_mut()
        .set_endpoints(IMAGE, "TL", None)
        .unwrap();
    assert_eq!(float(&session, "TL"), None);
    assert_eq!(float(&session, "SNDF_TL"), None);
    assert_eq!(session.store().get_point(IMAGE, "TL_mid"), None);
}

#[test]
fn calculator_interface_reports_absence() {
    let (_dir, mut session) = open_session();
    session
        .store_mut()
        .set_point(IMAGE, "SN", Some(Point::new(0.0, 3.0)))
        .unwrap();

    let manager = session.measurements().clone();
    assert!(!manager.preflight_measurement(session.store(), "SNDF", IMAGE));
    assert_eq!(
        manager
            .do_measurement(session.store(), "SNDF", IMAGE)
            .unwrap(),
        None
    );

    session
        .store_mut()
        .set_point(IMAGE, "DF", Some(Point::new(4.0, 0.0)))
        .unwrap();
    assert!(manager.preflight_measurement(session.store(), "SNDF", IMAGE));
    assert_eq!(
        manager
            .do_measurement(session.store(), "SNDF", IMAGE)
            .unwrap(),
        Some(Value::Float(5.0))
    );
    assert!(!manager.preflight_measurement(session.store(), "SN_x", IMAGE));
    assert!(matches!(
        manager.do_measurement(session.store(), "SN_x", IMAGE),
        Err(CalcError::UnknownRule(_))
    ));
}

#[test]
fn loading_data_fills_derived_columns_without_dirtying() {
    let (dir, mut session) = open_session();
    let csv = dir.path().join("measurements.csv");
    std::fs::write(&csv, "Filename,SN_x,SN_y,DF_x,DF_y\nIMG_0001.jpg,0,3,4,0\n").unwrap();

    session.set_active(IMAGE);
    session.load_data(Some(csv.as_path())).unwrap();

    assert_eq!(float(&session, "SNDF"), Some(5.0));
    assert!(!session.store().is_dirty());
    assert!(!session.active().is_open());
}

#[test]
fn derived_columns_cannot_be_written_directly() {
    let (_dir, mut session) = open_session();
    let store = session.store_mut();
    store
        .set_point(IMAGE, "SN", Some(Point::new(0.0, 3.0)))
        .unwrap();
    store
        .set_point(IMAGE, "DF", Some(Point::new(4.0, 0.0)))
        .unwrap();

    for column in ["SNDF", "SNDF_x_start", "TL_mid_x"] {
        assert!(
            matches!(
                session.store_mut().set_value(IMAGE, column, 99.0),
                Err(StoreError::DerivedColumn(_))
            ),
            "{column}"
        );
    }
    assert!(matches!(
        session
            .store_mut()
            .set_point(IMAGE, "TL_mid", Some(Point::new(1.0, 1.0))),
        Err(StoreError::DerivedColumn(_))
    ));
    assert_eq!(float(&session, "SNDF"), Some(5.0));
    assert_eq!(float(&session, "SNDF_x_start"), Some(0.0));
}

#[test]
fn rules_are_addressed_by_target_or_derived_column() {
    let (_dir, mut session) = open_session();
    session
        .store_mut()
        .set_endpoints(
            IMAGE,
            "TL",
            Some((Point::new(0.0, 0.0), Point::new(0.0, 10.0))),
        )
        .unwrap();
    let manager = session.measurements().clone();
    let store = session.store();

    assert!(manager.preflight_measurement(store, "TL_mid", IMAGE));
    assert!(manager.preflight_measurement(store, "TL_mid_y", IMAGE));
    assert_eq!(
        manager.measure_point(store, "TL_mid", IMAGE).unwrap(),
        Some(Point::new(0.0, 5.0))
    );
    assert_eq!(
        manager.do_measurement(store, "TL_mid_y", IMAGE).unwrap(),
        Some(Value::Float(5.0))
    );
    assert!(matches!(
        manager.do_measurement(store, "TL_mid", IMAGE),
        Err(CalcError::MultipleOutputs { ref columns, .. }) if columns == &["TL_mid_x", "TL_mid_y"]
    ));
    assert!(matches!(
        manager.measure_point(store, "TL", IMAGE),
        Err(CalcError::UnknownRule(_))
    ));
    assert_eq!(manager.measure_point(store, "TL_mid", "other.jpg").unwrap(), None);
}
