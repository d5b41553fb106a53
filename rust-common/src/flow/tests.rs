use assert_approx_eq::assert_approx_eq;

use super::*;
use crate::fixtures::{producer_consumer, tiles, CountingRepetition};

#[test]
fn settings_default_to_generic_half_split() {
    let settings = FlowSettingsBuilder::default()
        .max_app_bindings(2)
        .build()
        .unwrap();
    assert_eq!(settings.max_app_bindings, 2);
    assert_eq!(settings.communication, CommunicationKind::Generic);
    assert_eq!(settings.storage_split, StorageSplitKind::Half);
    assert_eq!(settings.pareto_basis, ParetoBasis::Tdma);
}

#[test]
fn settings_keep_at_least_one_binding() {
    assert!(FlowSettingsBuilder::default()
        .max_app_bindings(0)
        .build()
        .is_err());
}

#[test]
fn single_tile_mapping() {
    let app = producer_consumer(1, 1.0 / 2000.0);
    let platform = tiles(1, 1000);
    let report = MappingFlow::new(&app, &platform, FlowSettings::default())
        .run()
        .unwrap()
        .unwrap();
    assert_eq!(report.binding, "binding_0");
    assert_eq!(report.storage_steps, 1);
    assert_approx_eq!(report.throughput, 1.0 / 2000.0);
    let scenario = &report.scenarios[0];
    assert_eq!(scenario.actors["a"].processor, "p0");
    assert_eq!(scenario.slices["p0"], 100);
    assert_eq!(scenario.schedules["p0"], vec!["a", "b"]);
    assert_eq!(
        scenario.channels["ab"],
        ChannelPlacement::Tile {
            memory: String::from("m0"),
            buffer: BufferSize {
                src: 1,
                dst: 1,
                mem: 1
            },
        }
    );
}

#[test]
fn two_tile_mapping_uses_a_connection() {
    // without a throughput constraint channels get the full interface bandwidth
    let app = producer_consumer(1, 0.0);
    // one actor state per tile
    let platform = tiles(2, 12);
    let settings = FlowSettingsBuilder::default()
        .communication(CommunicationKind::Dma)
        .build()
        .unwrap();
    let report = MappingFlow::new(&app, &platform, settings)
        .run()
        .unwrap()
        .unwrap();
    let scenario = &report.scenarios[0];
    assert_ne!(scenario.actors["a"].processor, scenario.actors["b"].processor);
    assert!(matches!(
        scenario.channels["ab"],
        ChannelPlacement::Connection { .. }
    ));
}

#[test]
fn unreachable_throughput_gives_no_mapping() {
    let app = producer_consumer(1, 1.0);
    let platform = tiles(1, 1000);
    let report = MappingFlow::new(&app, &platform, FlowSettings::default())
        .run()
        .unwrap();
    assert!(report.is_none());
}

#[test]
fn report_serialises_with_names() {
    let app = producer_consumer(1, 1.0 / 2000.0);
    let platform = tiles(1, 1000);
    let report = MappingFlow::new(&app, &platform, FlowSettings::default())
        .run()
        .unwrap()
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["scenarios"][0]["channels"]["ab"]["kind"], "tile");
    let back: MappingReport = serde_json::from_value(json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn flow_uses_the_given_repetition_computer() {
    let app = producer_consumer(1, 1.0 / 2000.0);
    let platform = tiles(1, 1000);
    let counting = CountingRepetition::default();
    let report = MappingFlow::new(&app, &platform, FlowSettings::default())
        .with_repetition(Box::new(counting.clone()))
        .run()
        .unwrap();
    assert!(report.is_some());
    // once for the application, once for the binding-aware graph
    assert_eq!(counting.calls(), 2);
}
