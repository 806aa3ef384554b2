//! Demo: a full task-list session
//!
//! Adds, completes, edits, filters and clears tasks against a file backend,
//! then reopens the store to show everything survived.
//!
//! Run with: cargo run --example basic_session

use chrono::{NaiveDate, NaiveTime};
use eyre::Result;
use taskboard::{EditSession, FileBackend, FilterMode, Store};

fn main() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let data_dir = temp_dir.path().to_path_buf();

    println!("taskboard Session Demo");
    println!("======================\n");
    println!("Data dir: {}\n", data_dir.display());

    let mut store = Store::open(FileBackend::open(&data_dir)?)?;

    println!("1. ADD - three tasks, newest first...");
    let milk = store.add("Buy milk", None, None)?.expect("non-empty text");
    let dentist = store
        .add("Dentist", NaiveDate::from_ymd_opt(2026, 3, 14), NaiveTime::from_hms_opt(15, 45, 0))?
        .expect("non-empty text");
    store.add("Call mom", None, None)?;
    for task in store.tasks() {
        println!("   - #{} {}", task.id, task.text);
    }
    println!("   Blank text is ignored: {:?}\n", store.add("   ", None, None)?);

    println!("2. TOGGLE - buying milk...");
    store.toggle(milk.id)?;
    println!("   {:?}\n", store.stats());

    println!("3. EDIT - moving the dentist...");
    let mut session = EditSession::begin(&store, dentist.id).expect("task exists");
    session.text = "Dentist (rescheduled)".to_string();
    session.date = NaiveDate::from_ymd_opt(2026, 3, 21);
    println!("   Commit: {:?}\n", session.commit(&mut store)?);

    println!("4. FILTER...");
    for mode in FilterMode::ALL {
        let texts: Vec<&str> = store.filtered(mode).iter().map(|t| t.text.as_str()).collect();
        println!("   {:<9} {:?}", mode.to_string(), texts);
    }
    println!();

    println!("5. CLEAR COMPLETED...");
    println!("   Removed {}", store.clear_completed()?);
    println!("   Removed {} on second call\n", store.clear_completed()?);

    println!("6. REOPEN...");
    drop(store);
    let store = Store::open(FileBackend::open(&data_dir)?)?;
    for task in store.tasks() {
        println!("   - #{} {} (date: {:?})", task.id, task.text, task.date);
    }

    println!("\nDemo complete!");
    Ok(())
}
