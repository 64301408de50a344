use anyhow::Result;
use ironbasket::testing::sample_baskets;
use ironbasket::{
    FileStateStore, ListPhase, MemoryStateStore, MiningError, PassState, Runner, StateStore,
    mine_frequent_itemsets,
};
use std::path::Path;

fn mine_with(
    store: &dyn StateStore,
    path: &Path,
    initial: PassState,
) -> Result<ironbasket::mining::MiningRun> {
    Ok(mine_frequent_itemsets(
        &Runner::sequential(),
        &sample_baskets(),
        ",",
        initial,
        store,
        path,
        |_, _| Ok(()),
    )?)
}

#[test]
fn store_holds_the_state_of_the_last_pass() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("_state/pass-state.bin");
    let store = FileStateStore::new();

    let run = mine_with(&store, &path, PassState::new(10, 3))?;
    let saved = store.load(&path)?;
    assert_eq!(saved, run.state);
    assert_eq!(saved.list_phase, ListPhase::Frequent);
    assert!(saved.has_converged());
    Ok(())
}

#[test]
fn resuming_from_a_saved_pass_matches_a_single_run() -> Result<()> {
    let store = MemoryStateStore::new();
    let path = Path::new("resume");

    let full = mine_with(&store, path, PassState::new(10, 2))?;

    let first_two = mine_with(&store, path, PassState::new(2, 2))?;
    assert_eq!(first_two.state.current_pass, 3);
    let mut resumed_from = store.load(path)?;
    resumed_from.max_pass = 10;
    let rest = mine_with(&store, path, resumed_from)?;

    assert_eq!(rest.state.frequent, full.state.frequent);
    assert_eq!(first_two.passes.len() + rest.passes.len(), full.passes.len());
    Ok(())
}

#[test]
fn corrupted_state_stops_the_run() -> Result<()> {
    let store = MemoryStateStore::new();
    let path = Path::new("state");
    store.save(path, &PassState::new(3, 1))?;

    let mut bytes = store.raw(path).unwrap_or_default();
    assert!(!bytes.is_empty());
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x5A;
    store.put_raw(path, bytes);

    match store.load(path) {
        Err(MiningError::StatePersistence { path: at, .. }) => assert_eq!(at, path),
        other => panic!("expected a persistence error, got {other:?}"),
    }
    Ok(())
}
