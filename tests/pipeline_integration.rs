//! Integration tests for the acquisition pipeline
//!
//! These tests run a real scope with its real-time thread:
//! - Frame accounting between sampler and drainer
//! - Reconfiguration without misattributing values
//! - Channel management, pause and timebase handling

mod common;

use common::builders::{test_config, ScopeBuilder};
use common::{assert_float_eq, poll_until, settle};
use rtscope::config::{LineStyle, Timebase, TraceColor, TraceStyle};
use rtscope::{
    ChannelEdit, Scope, ScopeError, SourceRegistry, TriggerConfig, TriggerDirection, ValueKind,
};
use std::sync::Arc;
use serial_test::serial;
use std::time::Duration;

#[test]
#[serial]
fn test_every_written_frame_is_drained() {
    let mut rig = ScopeBuilder::new().fixed("fixed", &[1.0, 2.0]).build();
    let source = rig.ids[0];
    rig.scope.add_channel(source, ValueKind::Output, 0).unwrap();
    rig.scope.add_channel(source, ValueKind::Output, 1).unwrap();

    for _ in 0..5 {
        std::thread::sleep(Duration::from_millis(10));
        rig.scope.poll();
    }
    settle(&mut rig.scope);

    let stats = rig.scope.stats();
    assert!(stats.frames_written > 0, "producer should have written frames");
    assert_eq!(stats.frames_dropped, 0);
    assert_eq!(stats.frames_discarded, 0);
    assert_eq!(stats.frames_drained, stats.frames_written);
}

#[test]
#[serial]
fn test_empty_scope_produces_no_frames() {
    let mut rig = ScopeBuilder::new().fixed("fixed", &[1.0]).build();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(rig.scope.poll(), 0);

    let stats = rig.scope.stats();
    assert!(stats.periods > 0);
    assert_eq!(stats.frames_written, 0);
}

#[test]
#[serial]
fn test_removal_never_misattributes_values() {
    let mut rig = ScopeBuilder::new().fixed("fixed", &[1.0, 2.0, 3.0]).build();
    let source = rig.ids[0];
    let a = rig.scope.add_channel(source, ValueKind::Output, 0).unwrap();
    let b = rig.scope.add_channel(source, ValueKind::Output, 1).unwrap();
    let c = rig.scope.add_channel(source, ValueKind::Output, 2).unwrap();

    // Leave frames of the old width queued across the removal
    assert!(poll_until(&mut rig.scope, |s| s.stats().frames_drained > 3));
    std::thread::sleep(Duration::from_millis(20));
    rig.scope.remove_channel(b).unwrap();

    assert!(poll_until(&mut rig.scope, |s| {
        s.channel(c).map(|t| t.waveform.len()).unwrap_or(0) > 3
    }));
    settle(&mut rig.scope);

    let ids: Vec<_> = rig.scope.channels().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![a, c]);
    assert!(rig.scope.channel(a).unwrap().waveform.samples().all(|v| v == 1.0));
    assert!(rig.scope.channel(c).unwrap().waveform.samples().all(|v| v == 3.0));
    assert_eq!(rig.scope.stats().frames_discarded, 0);
}

#[test]
#[serial]
fn test_add_channel_validation() {
    let mut rig = ScopeBuilder::new().fixed("fixed", &[1.0]).build();
    let source = rig.ids[0];

    let first = rig.scope.add_channel(source, ValueKind::Output, 0).unwrap();
    let again = rig.scope.add_channel(source, ValueKind::Output, 0).unwrap();
    assert_eq!(first, again);
    assert_eq!(rig.scope.channels().len(), 1);

    let out_of_range = rig.scope.add_channel(source, ValueKind::Output, 1);
    assert!(matches!(out_of_range, Err(ScopeError::IndexOutOfRange { count: 1, .. })));

    let wrong_kind = rig.scope.add_channel(source, ValueKind::Input, 0);
    assert!(matches!(wrong_kind, Err(ScopeError::IndexOutOfRange { count: 0, .. })));

    rig.sources.unregister(source);
    let other = rig.scope.add_channel(source, ValueKind::Output, 0);
    // Already monitored: returns the existing handle without resolving
    assert_eq!(other.unwrap(), first);

    let unknown = rig.scope.add_channel(source, ValueKind::Output, 3);
    assert!(matches!(unknown, Err(ScopeError::UnknownSource(id)) if id == source));
}

#[test]
#[serial]
fn test_new_channel_defaults() {
    let mut rig = ScopeBuilder::new().fixed("Sine", &[0.5]).build();
    let source = rig.ids[0];
    let id = rig.scope.add_channel(source, ValueKind::Output, 0).unwrap();

    let trace = rig.scope.channel(id).unwrap();
    assert_eq!(trace.scale, 2.0);
    assert_eq!(trace.offset, 0.0);
    assert_eq!(trace.style, TraceStyle::default());
    assert_eq!(trace.name, format!("{} Sine output0", source));
    assert_eq!(trace.label, format!("{} Sine 2 V/div", source));
}

#[test]
#[serial]
fn test_edit_channel_updates_label() {
    let mut rig = ScopeBuilder::new().fixed("Sine", &[0.5]).build();
    let source = rig.ids[0];
    let id = rig.scope.add_channel(source, ValueKind::Output, 0).unwrap();

    rig.scope.set_channel_scale(id, 0.5).unwrap();
    rig.scope
        .edit_channel(
            id,
            ChannelEdit {
                offset: Some(-1.0),
                style: Some(TraceStyle {
                    color: TraceColor::Blue,
                    width: 2,
                    line: LineStyle::Dash,
                }),
                ..Default::default()
            },
        )
        .unwrap();

    let trace = rig.scope.channel(id).unwrap();
    assert_eq!(trace.label, format!("{} Sine 500 mV/div", source));
    assert_eq!(trace.offset, -1.0);
    assert_eq!(trace.style.color, TraceColor::Blue);

    let invalid = rig.scope.set_channel_scale(id, 0.0);
    assert!(matches!(invalid, Err(ScopeError::Config(_))));
}

#[test]
#[serial]
fn test_source_removed_cascades() {
    let mut rig = ScopeBuilder::new()
        .fixed("a", &[1.0, 2.0])
        .fixed("b", &[3.0])
        .build();
    let (a, b) = (rig.ids[0], rig.ids[1]);
    let a0 = rig.scope.add_channel(a, ValueKind::Output, 0).unwrap();
    rig.scope.add_channel(a, ValueKind::Output, 1).unwrap();
    let b0 = rig.scope.add_channel(b, ValueKind::Output, 0).unwrap();
    rig.scope
        .set_trigger(TriggerConfig::on(a0, TriggerDirection::Rising, 0.0))
        .unwrap();

    rig.sources.unregister(a);
    assert_eq!(rig.scope.source_removed(a).unwrap(), 2);
    assert_eq!(rig.scope.source_removed(a).unwrap(), 0);

    let ids: Vec<_> = rig.scope.channels().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![b0]);
    assert_eq!(rig.scope.trigger().direction, TriggerDirection::None);
    assert_eq!(rig.scope.trigger().channel, None);

    assert!(poll_until(&mut rig.scope, |s| {
        s.channel(b0).map(|t| t.waveform.len()).unwrap_or(0) > 0
    }));
    assert!(rig.scope.channel(b0).unwrap().waveform.samples().all(|v| v == 3.0));
}

#[test]
#[serial]
fn test_unregistered_source_reads_nan_until_removed() {
    let mut rig = ScopeBuilder::new().fixed("a", &[1.0]).build();
    let source = rig.ids[0];
    let id = rig.scope.add_channel(source, ValueKind::Output, 0).unwrap();

    rig.sources.unregister(source);
    assert!(poll_until(&mut rig.scope, |s| {
        s.channel(id)
            .and_then(|t| t.waveform.last())
            .map(f64::is_nan)
            .unwrap_or(false)
    }));
}

#[test]
#[serial]
fn test_pause_drains_but_discards() {
    let mut rig = ScopeBuilder::new().fixed("a", &[1.0]).build();
    let id = rig.scope.add_channel(rig.ids[0], ValueKind::Output, 0).unwrap();
    rig.scope.set_paused(true);
    assert!(rig.scope.is_paused());

    assert!(poll_until(&mut rig.scope, |s| s.stats().frames_drained > 5));
    assert!(rig.scope.channel(id).unwrap().waveform.is_empty());

    rig.scope.set_paused(false);
    assert!(poll_until(&mut rig.scope, |s| {
        !s.channel(id).unwrap().waveform.is_empty()
    }));
}

#[test]
#[serial]
fn test_timebase_resizes_waveforms() {
    let mut rig = ScopeBuilder::new().fixed("a", &[1.0]).build();
    let id = rig.scope.add_channel(rig.ids[0], ValueKind::Output, 0).unwrap();

    // 10 divisions at 1 ms/div with a 1 ms period
    assert_eq!(rig.scope.channel(id).unwrap().waveform.capacity(), 11);

    rig.scope.set_timebase(Timebase {
        div_x: 4,
        div_y: 8,
        div_t_ms: 2.0,
    });
    assert_eq!(rig.scope.channel(id).unwrap().waveform.capacity(), 9);

    assert!(poll_until(&mut rig.scope, |s| {
        s.channel(id).unwrap().waveform.len() == 9
    }));
}

#[test]
#[serial]
fn test_out_of_range_time_per_division_is_clamped() {
    let mut rig = ScopeBuilder::new().fixed("a", &[1.0, 2.0]).build();
    let id = rig.scope.add_channel(rig.ids[0], ValueKind::Output, 0).unwrap();

    rig.scope.set_timebase(Timebase {
        div_t_ms: f64::INFINITY,
        ..Timebase::default()
    });
    assert_eq!(rig.scope.timebase().div_t_ms, 1.0);
    assert_eq!(rig.scope.channel(id).unwrap().waveform.capacity(), 11);

    // 5 s/div is the slowest setting; 10 divisions at a 1 ms period
    rig.scope.set_timebase(Timebase {
        div_t_ms: 1e300,
        ..Timebase::default()
    });
    assert_eq!(rig.scope.channel(id).unwrap().waveform.capacity(), 50_001);

    // 1 us/div is the fastest; channels added afterwards get the same size
    rig.scope.set_timebase(Timebase {
        div_t_ms: -1.0,
        ..Timebase::default()
    });
    assert!(rig.scope.timebase().div_t_ms > 0.0);
    let second = rig.scope.add_channel(rig.ids[0], ValueKind::Output, 1).unwrap();
    assert_eq!(rig.scope.channel(second).unwrap().waveform.capacity(), 2);
    assert_eq!(rig.scope.channels().len(), 2);
}

#[test]
#[serial]
fn test_non_finite_time_per_division_rejected_at_startup() {
    let mut config = test_config();
    config.timebase.div_t_ms = f64::NAN;
    let result = Scope::new(config, Arc::new(SourceRegistry::new()));
    assert!(matches!(result, Err(ScopeError::WithContext { .. })));
}

#[test]
#[serial]
fn test_stopped_producer_stays_stopped_across_reconfigure() {
    let mut rig = ScopeBuilder::new().fixed("a", &[1.0, 2.0]).build();
    let source = rig.ids[0];
    rig.scope.add_channel(source, ValueKind::Output, 0).unwrap();
    settle(&mut rig.scope);
    assert!(!rig.scope.is_running());

    rig.scope.add_channel(source, ValueKind::Output, 1).unwrap();
    assert!(!rig.scope.is_running());

    let written = rig.scope.stats().frames_written;
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(rig.scope.stats().frames_written, written);

    rig.scope.set_running(true);
    assert!(poll_until(&mut rig.scope, |s| s.stats().frames_written > written));
}

#[test]
#[serial]
fn test_trigger_threshold_from_display() {
    let mut rig = ScopeBuilder::new().fixed("a", &[1.0]).build();
    let id = rig.scope.add_channel(rig.ids[0], ValueKind::Output, 0).unwrap();

    // No trigger channel yet
    assert_eq!(rig.scope.set_trigger_threshold_from_display(0.25).unwrap(), None);

    rig.scope
        .set_trigger(TriggerConfig::on(id, TriggerDirection::Falling, 0.0))
        .unwrap();
    rig.scope.set_channel_offset(id, 1.0).unwrap();

    // A quarter from the top of 8 divisions is +2 div; 2 div * 2 V/div - 1 V
    let threshold = rig.scope.set_trigger_threshold_from_display(0.25).unwrap();
    assert_float_eq(threshold.unwrap(), 3.0, 1e-12);
    assert_float_eq(rig.scope.trigger().threshold, 3.0, 1e-12);
    assert_eq!(rig.scope.trigger().direction, TriggerDirection::Falling);
}
