//! The persisted user-progress record and its update functions.
//!
//! `UserState` is the only cross-component shared mutable resource. Every
//! update is a pure value-to-value function so regeneration ticks and quiz
//! scoring compose regardless of interleaving; callers persist after each
//! mutation. The serialized form keeps the original field names so existing
//! saved blobs keep loading.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::hearts::MAX_HEARTS;

/// Key under which the state blob is stored.
pub const STATE_KEY: &str = "cyberquest_user_state_v2";

/// XP awarded for finishing a lesson reader.
pub const LESSON_XP: u32 = 50;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct DailyXp {
    pub day: String,
    pub xp: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase", default)]
pub struct UserState {
    pub xp: u32,
    pub streak: u32,
    pub level: u32,
    pub hearts: u8,
    /// Epoch milliseconds of the last regeneration credit (or of the
    /// full-to-damaged transition, see `spend_heart`).
    pub last_heart_regen: i64,
    pub completed_lessons: im::OrdSet<String>,
    pub completed_courses: im::OrdSet<String>,
    pub unlocked_levels: Vec<u32>,
    /// Rolling seven-day XP series, oldest first; the last entry is today.
    pub weekly_progress: Vec<DailyXp>,
    /// ISO date (YYYY-MM-DD) of the last recorded login.
    pub last_login_date: String,
}

impl Default for UserState {
    /// Default used when deserializing partial blobs. Fresh installs should
    /// go through [`UserState::initial`], which stamps real timestamps.
    fn default() -> Self {
        Self {
            xp: 0,
            streak: 1,
            level: 1,
            hearts: MAX_HEARTS,
            last_heart_regen: 0,
            completed_lessons: im::OrdSet::new(),
            completed_courses: im::OrdSet::new(),
            unlocked_levels: vec![1, 2],
            weekly_progress: Vec::new(),
            last_login_date: String::new(),
        }
    }
}

fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// Day labels for the trailing week ending on `today`, oldest first.
fn week_labels(today: NaiveDate) -> [&'static str; 7] {
    std::array::from_fn(|i| weekday_label((today - Duration::days(6 - i as i64)).weekday()))
}

fn empty_week(today: NaiveDate) -> Vec<DailyXp> {
    week_labels(today)
        .into_iter()
        .map(|day| DailyXp {
            day: day.to_string(),
            xp: 0,
        })
        .collect()
}

impl UserState {
    /// The record for a brand-new user.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            last_heart_regen: now.timestamp_millis(),
            weekly_progress: empty_week(now.date_naive()),
            last_login_date: now.date_naive().to_string(),
            ..Self::default()
        }
    }

    /// Marks a lesson finished: fixed XP award plus idempotent membership in
    /// the completed set. Completing the same lesson twice still pays (the
    /// user did the work), it just cannot inflate the set.
    pub fn complete_lesson(self, lesson_id: &str) -> Self {
        Self {
            xp: self.xp + LESSON_XP,
            completed_lessons: self.completed_lessons.update(lesson_id.to_string()),
            weekly_progress: bump_today(self.weekly_progress, LESSON_XP),
            ..self
        }
    }

    /// Credits a finished quiz's score.
    pub fn add_quiz_xp(self, score: u32) -> Self {
        Self {
            xp: self.xp + score,
            weekly_progress: bump_today(self.weekly_progress, score),
            ..self
        }
    }

    /// Rolls the weekly window and advances or resets the streak when a new
    /// calendar day is seen. Idempotent within a day.
    pub fn record_login(self, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let last = NaiveDate::parse_from_str(&self.last_login_date, "%Y-%m-%d").ok();

        let gap = match last {
            Some(last) => (today - last).num_days(),
            // Unparsable or missing date: treat as a fresh window.
            None => i64::MAX,
        };
        if gap <= 0 {
            return self;
        }

        let streak = if gap == 1 { self.streak + 1 } else { 1 };

        // Shift the seven-day window forward by `gap` days, zero-filling the
        // new days and relabeling for the new end date.
        let mut xp_values: Vec<u32> = if gap >= 7 {
            vec![0; 7]
        } else {
            let mut values: Vec<u32> = self
                .weekly_progress
                .iter()
                .map(|daily| daily.xp)
                .skip(gap as usize)
                .collect();
            values.resize(7, 0);
            values
        };
        if self.weekly_progress.len() != 7 {
            // Corrupt or legacy blob; start the window over.
            xp_values = vec![0; 7];
        }
        let weekly_progress = week_labels(today)
            .into_iter()
            .zip(xp_values)
            .map(|(day, xp)| DailyXp {
                day: day.to_string(),
                xp,
            })
            .collect();

        Self {
            streak,
            weekly_progress,
            last_login_date: today.to_string(),
            ..self
        }
    }
}

fn bump_today(mut weekly: Vec<DailyXp>, amount: u32) -> Vec<DailyXp> {
    if let Some(today) = weekly.last_mut() {
        today.xp += amount;
    }
    weekly
}

/// Opaque blob storage for the user state. The browser implementation sits
/// over localStorage; tests and native harnesses use [`MemoryStore`].
pub trait StateStore {
    fn load(&self) -> Option<String>;
    fn save(&self, blob: &str);
}

/// In-memory store for tests and native harnesses.
#[derive(Default)]
pub struct MemoryStore {
    blob: std::cell::RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preloaded(blob: &str) -> Self {
        Self {
            blob: std::cell::RefCell::new(Some(blob.to_string())),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.blob.borrow().clone()
    }

    fn save(&self, blob: &str) {
        *self.blob.borrow_mut() = Some(blob.to_string());
    }
}

/// Browser-backed store over `window.localStorage`. Storage being denied
/// (private mode, quota) degrades to the in-memory default state.
#[cfg(target_arch = "wasm32")]
pub struct LocalStorageStore;

#[cfg(target_arch = "wasm32")]
impl LocalStorageStore {
    fn storage(&self) -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }
}

#[cfg(target_arch = "wasm32")]
impl StateStore for LocalStorageStore {
    fn load(&self) -> Option<String> {
        self.storage()?.get_item(STATE_KEY).ok().flatten()
    }

    fn save(&self, blob: &str) {
        if let Some(storage) = self.storage()
            && let Err(e) = storage.set_item(STATE_KEY, blob)
        {
            log::error!("failed to persist user state: {e:?}");
        }
    }
}

/// Loads the persisted state, falling back to the fixed default record when
/// the blob is absent or unparsable. Never fails.
pub fn load_user_state(store: &dyn StateStore, now: DateTime<Utc>) -> UserState {
    match store.load() {
        Some(blob) => match serde_json::from_str::<UserState>(&blob) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("saved user state is corrupt, starting fresh: {e}");
                UserState::initial(now)
            }
        },
        None => UserState::initial(now),
    }
}

/// Serializes and writes the state. Serialization of `UserState` cannot
/// fail in practice; an error is logged rather than propagated.
pub fn save_user_state(store: &dyn StateStore, state: &UserState) {
    match serde_json::to_string(state) {
        Ok(blob) => store.save(&blob),
        Err(e) => log::error!("failed to serialize user state: {e}"),
    }
}
