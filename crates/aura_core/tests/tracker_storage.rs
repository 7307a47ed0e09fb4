use std::fs;
use std::sync::Arc;

use aura_core::checklist;
use aura_core::clock::FixedClock;
use aura_core::frequency::FrequencySpec;
use aura_core::item::{ItemEdit, Transition};
use aura_core::schedule::DueStatus;
use aura_core::tracker::TrackerState;
use aura_core::{EngineConfig, Tracker, TrackerError};
use chrono::NaiveDate;
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn open(path: &std::path::Path, clock: Arc<FixedClock>) -> Tracker {
    Tracker::builder()
        .with_storage(path)
        .with_clock(clock)
        .with_username("ada")
        .build()
        .expect("tracker builds")
}

#[test]
fn state_survives_a_reopen() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("tracker.json");
    let clock = Arc::new(FixedClock::on(date(2024, 1, 1)));

    let (habit_id, routine_id, task_id) = {
        let tracker = open(&path, clock.clone());
        let habit = tracker
            .add_habit("stretch", FrequencySpec::days(3).expect("frequency"))
            .expect("habit");
        let routine = tracker
            .add_routine(
                "morning",
                FrequencySpec::weeks(1).expect("frequency"),
                &["wash".to_string(), "dress".to_string()],
            )
            .expect("routine");
        let task = tracker
            .add_task("file taxes", date(2024, 2, 1))
            .expect("task");

        clock.set_today(date(2024, 1, 2));
        tracker.toggle_item(&habit.id).expect("toggle habit");
        tracker.toggle_task(&task.id).expect("toggle task");
        (habit.id, routine.id, task.id)
    };

    assert!(path.exists());
    let raw = fs::read_to_string(&path).expect("read state");
    let parsed: TrackerState = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(parsed.player.username, "ada");

    let tracker = open(&path, clock.clone());
    assert_eq!(tracker.player().aura, 25);
    assert_eq!(tracker.history().len(), 2);
    let habit = tracker.item(&habit_id).expect("habit reloads");
    assert!(habit.is_completed_now());
    assert_eq!(habit.next_due_date(Default::default()).expect("due"), date(2024, 1, 5));
    assert_eq!(tracker.item(&routine_id).expect("routine").checklist.len(), 2);
    assert!(tracker.tasks().iter().any(|task| task.id == task_id && task.completed));
}

#[test]
fn refresh_all_writes_reopened_items_back() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("tracker.json");
    let clock = Arc::new(FixedClock::on(date(2024, 3, 1)));
    let tracker = open(&path, clock.clone());

    let routine = tracker
        .add_routine(
            "evening",
            FrequencySpec::days(1).expect("frequency"),
            &["floss".to_string()],
        )
        .expect("routine");
    let entry = routine.checklist[0].id.clone();
    let outcome = tracker
        .toggle_checklist_entry(&routine.id, &entry)
        .expect("tick");
    assert_eq!(outcome.transition, Transition::Completed);

    clock.set_today(date(2024, 3, 10));
    let views = tracker.items().expect("views");
    assert!(!views[0].is_completed);
    assert_eq!(views[0].next_due, date(2024, 3, 11));
    assert_eq!(views[0].status, DueStatus::DueSoon(1));

    assert_eq!(tracker.refresh_all().expect("refresh"), 1);
    assert_eq!(tracker.refresh_all().expect("refresh again"), 0);

    let reopened = open(&path, clock);
    let stored = reopened.item(&routine.id).expect("routine");
    assert_eq!(stored.start_date, date(2024, 3, 10));
    assert!(!checklist::find(&stored.checklist, &entry)
        .expect("entry")
        .completed);
}

#[test]
fn items_are_sorted_by_days_remaining() {
    let clock = Arc::new(FixedClock::on(date(2024, 5, 1)));
    let tracker = Tracker::builder()
        .with_clock(clock)
        .with_config(EngineConfig::default())
        .build()
        .expect("in-memory tracker");
    tracker
        .add_habit("monthly review", FrequencySpec::months(1).expect("frequency"))
        .expect("habit");
    let daily = tracker
        .add_habit("water plants", FrequencySpec::days(1).expect("frequency"))
        .expect("habit");
    tracker
        .add_routine("weekly reset", FrequencySpec::weeks(1).expect("frequency"), &[])
        .expect("routine");

    let names: Vec<String> = tracker
        .items()
        .expect("views")
        .into_iter()
        .map(|view| view.name)
        .collect();
    assert_eq!(names, vec!["water plants", "weekly reset", "monthly review"]);

    let edited = tracker
        .edit_item(
            &daily.id,
            ItemEdit {
                frequency: Some(FrequencySpec::weeks(2).expect("frequency")),
                ..ItemEdit::default()
            },
        )
        .expect("edit");
    assert_eq!(edited.start_date, date(2024, 5, 1));
    assert_eq!(tracker.items().expect("views").last().expect("view").name, "monthly review");
    tracker.delete_item(&daily.id).expect("delete");
    assert_eq!(tracker.items().expect("views").len(), 2);
}

#[test]
fn corrupt_storage_is_reported() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("tracker.json");
    fs::write(&path, "{ not json").expect("write fixture");
    let result = Tracker::builder().with_storage(&path).build();
    assert!(matches!(result, Err(TrackerError::Json { .. })));
}

#[test]
fn failed_writes_leave_the_tracker_untouched() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path().join("sub");
    let path = dir.join("tracker.json");
    let clock = Arc::new(FixedClock::on(date(2024, 1, 1)));
    let tracker = open(&path, clock);
    let habit = tracker
        .add_habit("stretch", FrequencySpec::days(1).expect("frequency"))
        .expect("habit");

    fs::remove_dir_all(&dir).expect("remove storage dir");
    fs::write(&dir, "not a directory").expect("block storage dir");

    let added = tracker.add_habit("read", FrequencySpec::days(1).expect("frequency"));
    assert!(matches!(added, Err(TrackerError::Io { .. })));
    let names: Vec<String> = tracker
        .items()
        .expect("views")
        .into_iter()
        .map(|view| view.name)
        .collect();
    assert_eq!(names, vec!["stretch"]);

    let toggled = tracker.toggle_item(&habit.id);
    assert!(matches!(toggled, Err(TrackerError::Io { .. })));
    assert_eq!(tracker.player().aura, 0);
    assert!(tracker.history().is_empty());
    assert!(!tracker.item(&habit.id).expect("habit").is_completed_now());

    let removed = tracker.delete_item(&habit.id);
    assert!(matches!(removed, Err(TrackerError::Io { .. })));
    assert!(tracker.item(&habit.id).is_ok());
}
