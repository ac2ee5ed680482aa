//! Hand-off of reminder times to whatever delivers notifications.

use chrono::{DateTime, Utc};

use crate::repository::NoteRepository;
use crate::store::NoteStore;

/// Receives reminder times. Delivery is up to the implementor.
pub trait ReminderScheduler {
    fn schedule(&mut self, note_id: i64, title: &str, at: DateTime<Utc>);
}

/// Feeds every reminder in the store's view that is due after `now` to
/// `scheduler`, soonest first. Returns how many were scheduled.
pub fn schedule_upcoming<R: NoteRepository>(
    store: &NoteStore<R>,
    scheduler: &mut impl ReminderScheduler,
    now: DateTime<Utc>,
) -> usize {
    let upcoming = store.upcoming_reminders(now);
    for note in &upcoming {
        if let Some(at) = note.remind_at {
            scheduler.schedule(note.id, &note.title, at);
        }
    }
    upcoming.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotePatch, ReminderChange};
    use crate::repository::testing::FlakyRepository;
    use chrono::Duration;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder(Vec<(i64, String, DateTime<Utc>)>);

    impl ReminderScheduler for Recorder {
        fn schedule(&mut self, note_id: i64, title: &str, at: DateTime<Utc>) {
            self.0.push((note_id, title.to_string(), at));
        }
    }

    #[tokio::test]
    async fn only_future_reminders_are_fed() {
        let dir = tempdir().unwrap();
        let mut store = NoteStore::new(FlakyRepository::open(&dir).await);
        store.refresh().await.unwrap();
        let folder = store.add_folder("Inbox").await.unwrap();
        store.set_current_folder(folder.id).await.unwrap();

        let now = Utc::now();
        let past = store.add_note().await.unwrap().unwrap();
        let future = store.add_note().await.unwrap().unwrap();
        store
            .update_note(&NotePatch {
                remind_at: ReminderChange::Set(now - Duration::minutes(5)),
                ..NotePatch::new(past.id)
            })
            .await
            .unwrap();
        store
            .update_note(&NotePatch {
                title: Some("Dentist".into()),
                remind_at: ReminderChange::Set(now + Duration::minutes(5)),
                ..NotePatch::new(future.id)
            })
            .await
            .unwrap();

        let mut recorder = Recorder::default();
        let count = schedule_upcoming(&store, &mut recorder, now);

        assert_eq!(count, 1);
        assert_eq!(recorder.0[0].0, future.id);
        assert_eq!(recorder.0[0].1, "Dentist");
    }
}
