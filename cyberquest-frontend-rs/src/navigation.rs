//! View navigation synchronized with the platform back stack.
//!
//! Forward navigation (tapping a menu item) and backward navigation (hardware
//! button, browser gesture) must land on identical state, so every meaningful
//! transition goes through [`NavigationController`] and is mirrored onto the
//! platform history stack. The controller keeps no stack of its own: the
//! platform stack is ground truth and the controller only mirrors its top
//! entry.

use serde::{Deserialize, Serialize};

#[derive(
    Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Ord, PartialOrd, tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Dashboard,
    Curriculum,
    KaliCourse,
    Tutor,
    Practice,
    Admin,
    Lesson,
}

/// Secondary dimension of view state: a quiz overlays whatever view launched
/// it without needing its own `View` variant.
#[derive(
    Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Ord, PartialOrd, tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    None,
    Quiz,
}

/// The state payload recorded on each platform history entry.
#[derive(
    Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Ord, PartialOrd, tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct NavEntry {
    pub view: View,
    pub mode: GameMode,
}

impl NavEntry {
    pub const ROOT: NavEntry = NavEntry {
        view: View::Dashboard,
        mode: GameMode::None,
    };
}

/// The platform history stack. Browser and test implementations both deliver
/// pops asynchronously relative to `back()`: the browser via the popstate
/// listener, [`MemoryHistory`] via `take_pending`.
pub trait HistoryBackend {
    /// Replace the current top entry (used once, to stamp the root state).
    fn replace(&mut self, entry: NavEntry);
    fn push(&mut self, entry: NavEntry);
    /// Request one backward step. The resulting state arrives later as a pop.
    fn back(&mut self);
    /// Drains one pending pop, if the backend delivers pops by polling.
    /// Browser pops arrive through the popstate listener instead.
    fn take_pending(&mut self) -> Option<Option<NavEntry>> {
        None
    }
}

/// Result of a navigation step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: NavEntry,
    /// True when the transition left the lesson view; the shell must clear
    /// its active-lesson pointer, since lesson identity is not part of
    /// navigation state.
    pub left_lesson: bool,
    pub changed: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackAction {
    /// A backward step was requested from the platform stack.
    Popped,
    /// Already at the root: the host should prompt before exiting the app,
    /// because there is nothing further to pop.
    ConfirmExit,
}

#[derive(Clone, Debug)]
pub struct NavigationController {
    current: NavEntry,
}

impl NavigationController {
    /// Stamps the root state onto the platform stack so the very first back
    /// gesture has a well-defined entry to land on.
    pub fn new(backend: &mut dyn HistoryBackend) -> Self {
        backend.replace(NavEntry::ROOT);
        Self {
            current: NavEntry::ROOT,
        }
    }

    pub fn current(&self) -> NavEntry {
        self.current
    }

    /// Pushes a new entry only when `(view, mode)` actually changes;
    /// navigating to the current state is an idempotent no-op that records
    /// nothing on the stack.
    pub fn navigate(
        &mut self,
        backend: &mut dyn HistoryBackend,
        view: View,
        mode: GameMode,
    ) -> Transition {
        let next = NavEntry { view, mode };
        if next == self.current {
            return Transition {
                state: next,
                left_lesson: false,
                changed: false,
            };
        }
        let left_lesson = self.current.view == View::Lesson && next.view != View::Lesson;
        backend.push(next);
        self.current = next;
        Transition {
            state: next,
            left_lesson,
            changed: true,
        }
    }

    /// Mirrors a platform pop into local state. An entry without state (stack
    /// exhausted, initial load) falls back to the root destination.
    pub fn handle_pop(&mut self, entry: Option<NavEntry>) -> Transition {
        let next = entry.unwrap_or(NavEntry::ROOT);
        let left_lesson = self.current.view == View::Lesson && next.view != View::Lesson;
        let changed = next != self.current;
        self.current = next;
        Transition {
            state: next,
            left_lesson,
            changed,
        }
    }

    /// Routes a hardware/gesture back press: pop one level, or signal
    /// intent-to-exit when already at the root.
    pub fn back_pressed(&mut self, backend: &mut dyn HistoryBackend) -> BackAction {
        if self.current == NavEntry::ROOT {
            BackAction::ConfirmExit
        } else {
            backend.back();
            BackAction::Popped
        }
    }
}

/// In-memory history stack with browser push/pop/listen semantics, for tests
/// and native harnesses. `back()` queues the popped-to entry; callers drain
/// it with `take_pending` and feed it to `handle_pop`, mirroring the
/// asynchronous popstate delivery of the real backend.
#[derive(Default, Debug)]
pub struct MemoryHistory {
    stack: Vec<NavEntry>,
    pending: std::collections::VecDeque<Option<NavEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl HistoryBackend for MemoryHistory {
    fn replace(&mut self, entry: NavEntry) {
        match self.stack.last_mut() {
            Some(top) => *top = entry,
            None => self.stack.push(entry),
        }
    }

    fn push(&mut self, entry: NavEntry) {
        self.stack.push(entry);
    }

    fn back(&mut self) {
        self.stack.pop();
        self.pending.push_back(self.stack.last().copied());
    }

    fn take_pending(&mut self) -> Option<Option<NavEntry>> {
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (MemoryHistory, NavigationController) {
        let mut history = MemoryHistory::new();
        let controller = NavigationController::new(&mut history);
        (history, controller)
    }

    fn pop_once(history: &mut MemoryHistory, controller: &mut NavigationController) -> Transition {
        let entry = history
            .take_pending()
            .expect("a pop should have been queued");
        controller.handle_pop(entry)
    }

    #[test]
    fn test_starts_at_the_root_with_one_stamped_entry() {
        let (history, controller) = setup();
        assert_eq!(controller.current(), NavEntry::ROOT);
        assert_eq!(history.depth(), 1);
    }

    #[test]
    fn test_navigate_pushes_one_entry_per_meaningful_transition() {
        let (mut history, mut controller) = setup();
        let transition = controller.navigate(&mut history, View::Curriculum, GameMode::None);
        assert!(transition.changed);
        assert_eq!(history.depth(), 2);

        // Same destination twice: exactly one history entry, not two.
        let transition = controller.navigate(&mut history, View::Curriculum, GameMode::None);
        assert!(!transition.changed);
        assert_eq!(history.depth(), 2);
    }

    #[test]
    fn test_mode_change_alone_is_a_meaningful_transition() {
        let (mut history, mut controller) = setup();
        controller.navigate(&mut history, View::Practice, GameMode::None);
        let transition = controller.navigate(&mut history, View::Practice, GameMode::Quiz);
        assert!(transition.changed);
        assert_eq!(history.depth(), 3);
        assert_eq!(
            controller.current(),
            NavEntry {
                view: View::Practice,
                mode: GameMode::Quiz
            }
        );
    }

    #[test]
    fn test_back_undoes_exactly_one_navigation_step() {
        let (mut history, mut controller) = setup();
        controller.navigate(&mut history, View::Curriculum, GameMode::None);
        controller.navigate(&mut history, View::Lesson, GameMode::None);

        assert_eq!(controller.back_pressed(&mut history), BackAction::Popped);
        let transition = pop_once(&mut history, &mut controller);
        assert_eq!(transition.state.view, View::Curriculum);
        assert!(transition.left_lesson);

        assert_eq!(controller.back_pressed(&mut history), BackAction::Popped);
        let transition = pop_once(&mut history, &mut controller);
        assert_eq!(transition.state, NavEntry::ROOT);
    }

    #[test]
    fn test_back_at_root_asks_for_exit_confirmation() {
        let (mut history, mut controller) = setup();
        assert_eq!(
            controller.back_pressed(&mut history),
            BackAction::ConfirmExit
        );
        assert_eq!(history.depth(), 1, "nothing was popped");
    }

    #[test]
    fn test_pop_without_state_falls_back_to_root() {
        let (_, mut controller) = setup();
        let transition = controller.handle_pop(None);
        assert_eq!(transition.state, NavEntry::ROOT);
    }

    #[test]
    fn test_leaving_lesson_by_forward_navigation_reports_it() {
        let (mut history, mut controller) = setup();
        controller.navigate(&mut history, View::Lesson, GameMode::None);

        // Lesson -> quiz overlay keeps the lesson view: pointer stays.
        let transition = controller.navigate(&mut history, View::Lesson, GameMode::Quiz);
        assert!(!transition.left_lesson);

        let transition = controller.navigate(&mut history, View::Dashboard, GameMode::None);
        assert!(transition.left_lesson);
    }

    #[test]
    fn test_forward_and_backward_navigation_agree_on_state() {
        let (mut history, mut controller) = setup();
        controller.navigate(&mut history, View::Practice, GameMode::None);
        controller.navigate(&mut history, View::Practice, GameMode::Quiz);

        controller.back_pressed(&mut history);
        let transition = pop_once(&mut history, &mut controller);

        // Popping lands exactly on the state that forward navigation had
        // recorded, never on something synthesized.
        assert_eq!(
            transition.state,
            NavEntry {
                view: View::Practice,
                mode: GameMode::None
            }
        );
        assert_eq!(controller.current(), transition.state);
    }

    #[test]
    fn test_nav_entry_serde_matches_history_payload_format() {
        let entry = NavEntry {
            view: View::KaliCourse,
            mode: GameMode::Quiz,
        };
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(json["view"], "kali_course");
        assert_eq!(json["mode"], "quiz");
    }
}
