//! Multimeter drivers end to end over the mock transport.
//!
//! Run with: cargo test --test multimeter_integration

use lab_instruments::drivers::{self, DriverKind, Fluke45, Hp34401a};
use lab_instruments::hardware::{MockConnector, MockHandle, MockTransport};
use lab_instruments::{
    Function, Instrument, InstrumentError, InstrumentGuard, Multimeter, MultimeterSetup, Range,
    Rate, ResourceManager, TriggerSource,
};

const FLUKE_PORT: &str = "ASRL7::INSTR";
const HP_ADDRESS: &str = "GPIB0::22::INSTR";

fn setup(function: Function, rate: Rate, range: Range, trigger: TriggerSource) -> MultimeterSetup {
    MultimeterSetup {
        function,
        rate,
        range,
        trigger_source: trigger,
        echo: false,
    }
}

fn fluke_bench(mock: MockTransport) -> (ResourceManager, MockHandle) {
    let mock = mock.terminated_by("\r\n").with_ack_prompt("=>");
    let log = mock.handle();
    (ResourceManager::new(MockConnector::new(&mock)), log)
}

fn hp_bench(mock: MockTransport) -> (ResourceManager, MockHandle) {
    let mock = mock.terminated_by("\r\n");
    let log = mock.handle();
    (ResourceManager::new(MockConnector::new(&mock)), log)
}

#[test]
fn fluke_setup_and_bus_triggered_measurement() {
    let (manager, log) = fluke_bench(MockTransport::new().with_reply("VAL?", "+1.2345E+0"));
    let mut dmm =
        Fluke45::open(&manager, FLUKE_PORT, Fluke45::DIALECT.session_config()).unwrap();
    log.clear_log();

    dmm.setup(&setup(
        Function::VoltageDc,
        Rate::Slow,
        Range::Volts10,
        TriggerSource::Bus,
    ))
    .unwrap();
    assert_eq!(
        log.commands_without_handshake(),
        vec!["VDC", "RATE S", "RANGE 3", "TRIGGER 3"]
    );

    log.clear_log();
    let value = dmm.measure().unwrap();
    assert!((value - 1.2345).abs() < 1e-12);
    assert_eq!(log.commands_without_handshake(), vec!["*TRG", "VAL?"]);
}

#[test]
fn fluke_internal_trigger_reads_without_triggering() {
    let (manager, log) = fluke_bench(MockTransport::new().with_reply("VAL?", "-0.0021"));
    let mut dmm =
        Fluke45::open(&manager, FLUKE_PORT, Fluke45::DIALECT.session_config()).unwrap();
    dmm.setup(&setup(
        Function::Resistance,
        Rate::Fast,
        Range::Kiloohms10,
        TriggerSource::Internal,
    ))
    .unwrap();
    log.clear_log();

    assert!((dmm.measure().unwrap() + 0.0021).abs() < 1e-12);
    assert_eq!(log.commands_without_handshake(), vec!["VAL?"]);
}

#[test]
fn hp_setup_commands_are_function_relative() {
    let (manager, log) = hp_bench(MockTransport::new().with_reply("READ?", "+9.87654321E-01"));
    let mut dmm = Hp34401a::open(&manager, HP_ADDRESS, Hp34401a::DIALECT.session_config()).unwrap();
    assert_eq!(
        log.commands_without_handshake(),
        vec!["*IDN?", "*RST", "*CLS", "SYST:REM"]
    );
    log.clear_log();

    dmm.setup(&setup(
        Function::VoltageDc,
        Rate::Medium,
        Range::Volts10,
        TriggerSource::Bus,
    ))
    .unwrap();
    let value = dmm.measure().unwrap();
    assert!((value - 0.987654321).abs() < 1e-12);
    assert_eq!(
        log.commands_without_handshake(),
        vec![
            "FUNC \"VOLT:DC\"",
            "VOLT:DC:NPLC 1",
            "VOLT:DC:RANG 10",
            "TRIG:SOUR BUS",
            "*TRG",
            "READ?",
        ]
    );
}

#[test]
fn unsupported_range_fails_before_any_write() {
    let (manager, log) = fluke_bench(MockTransport::new());
    let mut fluke =
        Fluke45::open(&manager, FLUKE_PORT, Fluke45::DIALECT.session_config()).unwrap();
    log.clear_log();
    let err = fluke
        .setup(&setup(
            Function::CurrentDc,
            Rate::Slow,
            Range::Amps1,
            TriggerSource::Internal,
        ))
        .unwrap_err();
    assert!(matches!(err, InstrumentError::InvalidChoice { .. }));
    assert!(err.is_validation());
    assert!(log.commands().is_empty());

    let (manager, log) = hp_bench(MockTransport::new());
    let mut hp = Hp34401a::open(&manager, HP_ADDRESS, Hp34401a::DIALECT.session_config()).unwrap();
    log.clear_log();
    let err = hp
        .setup(&setup(
            Function::VoltageDc,
            Rate::Slow,
            Range::Volts3,
            TriggerSource::Internal,
        ))
        .unwrap_err();
    assert!(matches!(err, InstrumentError::InvalidChoice { .. }));
    assert!(log.commands().is_empty());
}

#[test]
fn hp_range_before_function_is_a_configuration_error() {
    let (manager, log) = hp_bench(MockTransport::new());
    let mut dmm = Hp34401a::open(&manager, HP_ADDRESS, Hp34401a::DIALECT.session_config()).unwrap();
    log.clear_log();
    assert!(matches!(
        dmm.set_range(Range::Volts10),
        Err(InstrumentError::Configuration(_))
    ));
    assert!(log.commands().is_empty());
}

#[test]
fn boxed_multimeter_from_driver_kind() {
    let (manager, log) = hp_bench(MockTransport::new().with_reply("READ?", "4.2"));
    let config = DriverKind::Hp34401a.session_config();
    let mut meter: Box<dyn Multimeter> =
        drivers::open_multimeter(DriverKind::Hp34401a, &manager, HP_ADDRESS, config).unwrap();
    meter
        .setup(&setup(
            Function::VoltageAc,
            Rate::Max,
            Range::Volts100,
            TriggerSource::Internal,
        ))
        .unwrap();
    assert_eq!(meter.measure().unwrap(), 4.2);
    assert!(log
        .commands_without_handshake()
        .contains(&"VOLT:AC:NPLC 100".to_string()));

    meter.close().unwrap();
    assert!(log.is_closed());
    assert!(!manager.is_open(HP_ADDRESS));
}

#[test]
fn guard_returns_to_local_and_frees_endpoint() {
    let (manager, log) = hp_bench(MockTransport::new());
    {
        let dmm = Hp34401a::open(&manager, HP_ADDRESS, Hp34401a::DIALECT.session_config()).unwrap();
        let _guard = InstrumentGuard::new(dmm);
        assert!(manager.is_open(HP_ADDRESS));
        log.clear_log();
    }
    assert_eq!(log.commands_without_handshake(), vec!["SYST:LOC"]);
    assert!(log.is_closed());
    assert!(!manager.is_open(HP_ADDRESS));

    // The endpoint can be opened again once the guard is gone
    let again = Hp34401a::open(&manager, HP_ADDRESS, Hp34401a::DIALECT.session_config());
    assert!(again.is_ok());
}

#[test]
fn second_driver_on_same_endpoint_is_refused() {
    let (manager, _log) = hp_bench(MockTransport::new());
    let _first = Hp34401a::open(&manager, HP_ADDRESS, Hp34401a::DIALECT.session_config()).unwrap();
    let second = Hp34401a::open(&manager, HP_ADDRESS, Hp34401a::DIALECT.session_config());
    assert!(matches!(second, Err(InstrumentError::Connection { .. })));
}

#[test]
fn port_aliases_count_as_one_endpoint() {
    let (manager, _log) = fluke_bench(MockTransport::new());
    let _first =
        Fluke45::open(&manager, "ASRL7::INSTR", Fluke45::DIALECT.session_config()).unwrap();

    let again = Fluke45::open(&manager, "COM7", Fluke45::DIALECT.session_config());
    assert!(matches!(again, Err(InstrumentError::Connection { .. })));
    assert!(manager.is_open("com7"));
    assert_eq!(manager.session_count(), 1);
}

#[test]
fn operations_after_close_fail() {
    let (manager, _log) = fluke_bench(MockTransport::new());
    let mut dmm =
        Fluke45::open(&manager, FLUKE_PORT, Fluke45::DIALECT.session_config()).unwrap();
    dmm.close().unwrap();
    assert!(matches!(
        dmm.read_val(),
        Err(InstrumentError::ClosedResource(_))
    ));
    assert!(matches!(dmm.close(), Err(InstrumentError::ClosedResource(_))));
}
