use dot2_protocol::wire::{ExecutorBlock, FaderBlock, ItemGroup, PlaybackItem};
use dot2_protocol::ExecutorId;

use crate::store::{ButtonChange, ExecutorChange, ExecutorStateStore, FaderChange};

fn item(i_exec: u32, is_run: i64, fader: Option<f64>) -> PlaybackItem {
    PlaybackItem {
        i_exec: Some(i_exec),
        is_run,
        executor_blocks: fader
            .map(|v| {
                vec![ExecutorBlock {
                    fader: Some(FaderBlock { v }),
                }]
            })
            .unwrap_or_default(),
    }
}

fn fader_group(items: Vec<PlaybackItem>) -> ItemGroup {
    ItemGroup {
        items_type: 2,
        items: vec![items],
    }
}

fn button_group(items: Vec<PlaybackItem>) -> ItemGroup {
    ItemGroup {
        items_type: 3,
        items: vec![items],
    }
}

#[test]
fn first_snapshot_emits_then_identical_snapshot_is_silent() {
    let mut store = ExecutorStateStore::default();
    let groups = [fader_group(vec![
        item(0, 1, Some(0.5)),
        item(1, 0, Some(0.0)),
    ])];

    let first = store.apply_playbacks(&groups);
    assert_eq!(first.len(), 2);
    assert_eq!(
        first[0],
        ExecutorChange::Fader(FaderChange {
            id: ExecutorId(1),
            active: true,
            position: 0.5,
        })
    );

    let second = store.apply_playbacks(&groups);
    assert!(second.is_empty());
}

#[test]
fn fader_fires_on_position_change() {
    let mut store = ExecutorStateStore::default();
    store.apply_playbacks(&[fader_group(vec![item(0, 1, Some(0.5))])]);

    let changes = store.apply_playbacks(&[fader_group(vec![item(0, 1, Some(0.75))])]);
    assert_eq!(
        changes,
        vec![ExecutorChange::Fader(FaderChange {
            id: ExecutorId(1),
            active: true,
            position: 0.75,
        })]
    );
}

#[test]
fn fader_fires_on_active_change() {
    let mut store = ExecutorStateStore::default();
    store.apply_playbacks(&[fader_group(vec![item(0, 1, Some(0.5))])]);

    let changes = store.apply_playbacks(&[fader_group(vec![item(0, 0, Some(0.5))])]);
    assert_eq!(
        changes,
        vec![ExecutorChange::Fader(FaderChange {
            id: ExecutorId(1),
            active: false,
            position: 0.5,
        })]
    );
}

#[test]
fn button_fires_only_on_active_change() {
    let mut store = ExecutorStateStore::default();
    let first = store.apply_playbacks(&[button_group(vec![item(4, 1, None)])]);
    assert_eq!(
        first,
        vec![ExecutorChange::Button(ButtonChange {
            id: ExecutorId(5),
            active: true,
        })]
    );

    // a fader block riding along on a button item is not tracked state
    let noise = store.apply_playbacks(&[button_group(vec![item(4, 1, Some(0.9))])]);
    assert!(noise.is_empty());

    let released = store.apply_playbacks(&[button_group(vec![item(4, 0, None)])]);
    assert_eq!(
        released,
        vec![ExecutorChange::Button(ButtonChange {
            id: ExecutorId(5),
            active: false,
        })]
    );
}

#[test]
fn fader_and_button_ids_are_namespaced_independently() {
    let mut store = ExecutorStateStore::default();
    let changes = store.apply_playbacks(&[
        fader_group(vec![item(0, 1, Some(0.5))]),
        button_group(vec![item(0, 0, None)]),
    ]);
    assert_eq!(changes.len(), 2);
    assert!(matches!(changes[0], ExecutorChange::Fader(_)));
    assert!(matches!(changes[1], ExecutorChange::Button(_)));

    // toggling the button leaves the same-numbered fader untouched
    let changes = store.apply_playbacks(&[
        fader_group(vec![item(0, 1, Some(0.5))]),
        button_group(vec![item(0, 1, None)]),
    ]);
    assert_eq!(
        changes,
        vec![ExecutorChange::Button(ButtonChange {
            id: ExecutorId(1),
            active: true,
        })]
    );
}

#[test]
fn unregistered_group_types_are_skipped() {
    let mut store = ExecutorStateStore::default();
    let group = ItemGroup {
        items_type: 7,
        items: vec![vec![item(0, 1, Some(0.5))]],
    };
    assert!(store.apply_playbacks(&[group]).is_empty());
}

#[test]
fn items_without_an_executor_id_are_skipped() {
    let mut store = ExecutorStateStore::default();
    let malformed = PlaybackItem {
        i_exec: None,
        is_run: 1,
        ..Default::default()
    };
    let changes = store.apply_playbacks(&[fader_group(vec![malformed, item(2, 1, Some(0.1))])]);
    assert_eq!(changes.len(), 1);
    assert_eq!(
        changes[0],
        ExecutorChange::Fader(FaderChange {
            id: ExecutorId(3),
            active: true,
            position: 0.1,
        })
    );
}

#[test]
fn missing_fader_block_defaults_to_zero_position() {
    let mut store = ExecutorStateStore::default();
    let changes = store.apply_playbacks(&[fader_group(vec![item(0, 1, None)])]);
    assert_eq!(
        changes,
        vec![ExecutorChange::Fader(FaderChange {
            id: ExecutorId(1),
            active: true,
            position: 0.0,
        })]
    );
}

#[test]
fn clear_forgets_all_state() {
    let mut store = ExecutorStateStore::default();
    let groups = [
        fader_group(vec![item(0, 1, Some(0.5))]),
        button_group(vec![item(1, 1, None)]),
    ];
    assert_eq!(store.apply_playbacks(&groups).len(), 2);
    store.clear();
    assert_eq!(store.apply_playbacks(&groups).len(), 2);
}
