use redacta::history::{HistoryRecord, HistoryStore};
use redacta::options::{GenerationOptions, LengthTier};
use redacta::source::{Source, SourceSet};
use redacta::RedactaError;
use tempfile::TempDir;

fn seeded_store(temp: &TempDir, count: usize) -> (HistoryStore, Vec<HistoryRecord>) {
  let store = HistoryStore::new(temp.path().join("history"));
  let records: Vec<HistoryRecord> = (0..count)
    .map(|i| {
      let mut record = HistoryRecord::new(
        &format!("Instruction {i}"),
        format!("Text {i}"),
        GenerationOptions { length: LengthTier::Short, ..Default::default() },
      );
      record.created_at = record.created_at - chrono::Duration::seconds((count - i) as i64);
      store.append(&record).unwrap();
      record
    })
    .collect();
  (store, records)
}

#[test]
fn test_delete_removes_exactly_one_record() {
  let temp = TempDir::new().unwrap();
  let (store, records) = seeded_store(&temp, 3);

  store.delete(&records[1].id).unwrap();

  let remaining: Vec<String> = store.list().unwrap().into_iter().map(|r| r.id).collect();
  assert_eq!(remaining, vec![records[2].id.clone(), records[0].id.clone()]);
  assert!(matches!(store.get(&records[1].id), Err(RedactaError::NotFound { .. })));
  assert!(matches!(store.delete(&records[1].id), Err(RedactaError::NotFound { .. })));
}

#[test]
fn test_clear_empties_history() {
  let temp = TempDir::new().unwrap();
  let (store, _) = seeded_store(&temp, 4);

  assert_eq!(store.clear().unwrap(), 4);
  assert!(store.list().unwrap().is_empty());
  assert_eq!(store.clear().unwrap(), 0);
}

#[test]
fn test_records_survive_a_new_store_instance() {
  let temp = TempDir::new().unwrap();
  let (_, records) = seeded_store(&temp, 2);

  let reopened = HistoryStore::new(temp.path().join("history"));
  let loaded = reopened.get(&records[0].id).unwrap();
  assert_eq!(loaded, records[0]);
}

#[test]
fn test_duplicate_source_name_leaves_set_untouched() {
  let mut set = SourceSet::new();
  set.add(Source::from_text("Interview", "first transcript").unwrap()).unwrap();
  let before: Vec<Source> = set.as_slice().to_vec();

  let err = set.add(Source::from_text("Interview", "second transcript").unwrap()).unwrap_err();

  assert!(err.is_validation());
  assert_eq!(set.as_slice(), before.as_slice());
}

#[test]
fn test_remove_source_by_id() {
  let mut set = SourceSet::new();
  let a = Source::from_text("A", "alpha").unwrap();
  let b = Source::from_text("B", "beta").unwrap();
  set.add(a.clone()).unwrap();
  set.add(b.clone()).unwrap();

  assert_eq!(set.remove(&a.id), Some(a));
  assert_eq!(set.remove("missing"), None);
  assert_eq!(set.as_slice(), &[b]);
}
