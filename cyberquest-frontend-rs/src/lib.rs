#![deny(clippy::string_slice)]

//! CyberQuest core: quiz sessions with spaced retries, the hearts resource,
//! local user progress, and back-stack-synchronized navigation, exposed to
//! the JS shell through a single `CyberQuest` facade.

mod hearts;
mod navigation;
mod progress;
mod quiz;
pub mod tutor;
mod utils;

pub use hearts::{HEART_REGEN_INTERVAL_MS, MAX_HEARTS};
pub use navigation::{
    BackAction, GameMode, HistoryBackend, MemoryHistory, NavEntry, NavigationController,
    Transition, View,
};
pub use progress::{
    DailyXp, LESSON_XP, MemoryStore, STATE_KEY, StateStore, UserState, load_user_state,
    save_user_state,
};
#[cfg(target_arch = "wasm32")]
pub use progress::LocalStorageStore;
pub use quiz::{
    AdvanceOutcome, AttemptId, ExplainRequest, FIRST_PASS_XP, QueuedAttempt, QuizSession,
    RETRY_OFFSET, SubmitOutcome,
};

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use curriculum_utils::{Curriculum, Question, UnderstandingLevel};
use serde::{Deserialize, Serialize};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
#[cfg(target_arch = "wasm32")]
#[allow(clippy::declare_interior_mutable_const)]
const LOGGER: std::sync::LazyLock<()> = std::sync::LazyLock::new(|| {
    utils::set_panic_hook();

    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Logging initialized");
});

/// What the quiz surface should render right now.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No session object exists.
    Inactive,
    /// Hearts are exhausted: the session is paused, not destroyed.
    Locked,
    Question,
    Complete,
}

/// Synchronous result of an answer submission, for immediate rendering.
/// The AI analysis of a mistake arrives later via `ai_feedback`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFeedback {
    /// False when the submission was a guarded no-op (locked, double
    /// submit, or no active session).
    pub accepted: bool,
    pub correct: bool,
    /// Whether XP was awarded (correct first-pass answers only).
    pub scored: bool,
    pub correct_answer_index: usize,
    /// The authored explanation for the question.
    pub explanation: String,
    pub hearts_left: u8,
}

impl SubmitFeedback {
    fn rejected(hearts_left: u8) -> Self {
        Self {
            accepted: false,
            correct: false,
            scored: false,
            correct_answer_index: 0,
            explanation: String::new(),
            hearts_left,
        }
    }
}

struct Inner {
    user_state: RefCell<UserState>,
    session: RefCell<Option<QuizSession>>,
    nav: RefCell<NavigationController>,
    history: RefCell<Box<dyn HistoryBackend>>,
    store: Box<dyn StateStore>,
    curriculum: Curriculum,
    active_lesson: RefCell<Option<String>>,
}

impl Inner {
    /// Side effects every navigation step shares: lesson identity is not
    /// part of navigation state, so leaving the lesson view clears the
    /// pointer; leaving quiz mode drops the session, which also logically
    /// cancels any in-flight tutor request via the attempt-id guard.
    fn apply_transition(&self, transition: Transition) {
        if transition.left_lesson {
            *self.active_lesson.borrow_mut() = None;
        }
        if transition.state.mode != GameMode::Quiz {
            *self.session.borrow_mut() = None;
        }
    }

    fn update_user_state(&self, update: impl FnOnce(UserState) -> UserState) {
        let next = update(self.user_state.borrow().clone());
        let changed = {
            let mut state = self.user_state.borrow_mut();
            if next == *state {
                false
            } else {
                *state = next;
                true
            }
        };
        if changed {
            save_user_state(self.store.as_ref(), &self.user_state.borrow());
        }
    }
}

#[wasm_bindgen]
pub struct CyberQuest {
    inner: Rc<Inner>,
    #[cfg(target_arch = "wasm32")]
    popstate: RefCell<Option<Closure<dyn FnMut(web_sys::PopStateEvent)>>>,
}

/// Construction and the time-explicit API. Everything here is callable from
/// native code; the wasm bindings below delegate with `Utc::now()`.
impl CyberQuest {
    pub fn with_backends(
        curriculum: Curriculum,
        history: Box<dyn HistoryBackend>,
        store: Box<dyn StateStore>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut history = history;
        let nav = NavigationController::new(history.as_mut());
        let user_state = load_user_state(store.as_ref(), now)
            .record_login(now)
            .regen_hearts(now);
        save_user_state(store.as_ref(), &user_state);

        let inner = Rc::new(Inner {
            user_state: RefCell::new(user_state),
            session: RefCell::new(None),
            nav: RefCell::new(nav),
            history: RefCell::new(history),
            store,
            curriculum,
            active_lesson: RefCell::new(None),
        });
        Self {
            inner,
            #[cfg(target_arch = "wasm32")]
            popstate: RefCell::new(None),
        }
    }

    /// Regeneration tick. The host calls this eagerly at startup and then on
    /// a coarse once-per-minute timer; it only ever increases hearts.
    pub fn check_hearts_at(&self, now: DateTime<Utc>) {
        self.inner.update_user_state(|state| state.regen_hearts(now));
    }

    pub fn submit_answer_at(&self, selected: usize, now: DateTime<Utc>) -> SubmitFeedback {
        let hearts_left = self.inner.user_state.borrow().hearts;
        if self.inner.user_state.borrow().out_of_hearts() {
            return SubmitFeedback::rejected(hearts_left);
        }

        let mut session_ref = self.inner.session.borrow_mut();
        let Some(session) = session_ref.as_mut() else {
            return SubmitFeedback::rejected(hearts_left);
        };
        let Some(attempt) = session.current() else {
            return SubmitFeedback::rejected(hearts_left);
        };
        let correct_answer_index = attempt.question.correct_answer_index;
        let explanation = attempt.question.explanation.clone();

        match session.submit_answer(selected) {
            SubmitOutcome::Correct { scored } => SubmitFeedback {
                accepted: true,
                correct: true,
                scored,
                correct_answer_index,
                explanation,
                hearts_left,
            },
            SubmitOutcome::Incorrect { explain, .. } => {
                drop(session_ref);
                self.inner.update_user_state(|state| state.spend_heart(now));
                let hearts_left = self.inner.user_state.borrow().hearts;
                self.dispatch_explain(explain);
                SubmitFeedback {
                    accepted: true,
                    correct: false,
                    scored: false,
                    correct_answer_index,
                    explanation,
                    hearts_left,
                }
            }
            SubmitOutcome::AlreadySubmitted | SubmitOutcome::SessionComplete => {
                SubmitFeedback::rejected(hearts_left)
            }
        }
    }

    /// Fires the "explain the mistake" request. The response is attached
    /// through the attempt-id guard, so a reply that arrives after the user
    /// moved on is discarded instead of mislabeling the next question.
    fn dispatch_explain(&self, explain: ExplainRequest) {
        #[cfg(target_arch = "wasm32")]
        {
            let inner = Rc::clone(&self.inner);
            wasm_bindgen_futures::spawn_local(async move {
                let text = tutor::explain_mistake(
                    &explain.question,
                    &explain.user_answer,
                    &explain.correct_answer,
                    tutor::TUTOR_TOPIC,
                )
                .await;
                if let Some(session) = inner.session.borrow_mut().as_mut() {
                    session.attach_feedback(explain.attempt_id, text);
                }
            });
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = explain;
        }
    }

    /// Delivers a tutor explanation into the active session, if any.
    /// Used by tests and native harnesses; the wasm path goes through
    /// `dispatch_explain`'s spawned future.
    pub fn attach_feedback(&self, attempt_id: AttemptId, text: Option<String>) -> bool {
        match self.inner.session.borrow_mut().as_mut() {
            Some(session) => session.attach_feedback(attempt_id, text),
            None => false,
        }
    }

    fn do_navigate(&self, view: View, mode: GameMode) {
        let transition = {
            let mut history = self.inner.history.borrow_mut();
            self.inner.nav.borrow_mut().navigate(history.as_mut(), view, mode)
        };
        self.inner.apply_transition(transition);
    }

    /// Drains pops queued by a polling history backend. Browser pops arrive
    /// through the popstate listener instead, so this is a no-op there.
    pub fn pump_history(&self) {
        loop {
            let pending = self.inner.history.borrow_mut().take_pending();
            let Some(entry) = pending else { break };
            let transition = self.inner.nav.borrow_mut().handle_pop(entry);
            self.inner.apply_transition(transition);
        }
    }

    fn start_session(&self, questions: Vec<Question>) -> bool {
        match QuizSession::new(questions) {
            Some(session) => {
                *self.inner.session.borrow_mut() = Some(session);
                true
            }
            None => false,
        }
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
impl CyberQuest {
    #[cfg(target_arch = "wasm32")]
    #[wasm_bindgen(constructor)]
    pub fn new(curriculum: Curriculum) -> CyberQuest {
        // used to only initialize the logger once
        #[allow(clippy::borrow_interior_mutable_const)]
        *LOGGER;

        let app = Self::with_backends(
            curriculum,
            Box::new(BrowserHistory),
            Box::new(LocalStorageStore),
            Utc::now(),
        );
        app.register_popstate_listener();
        app
    }

    /// Removes the popstate listener. Call when unmounting the app shell;
    /// exactly one listener exists in between.
    pub fn teardown(&self) {
        #[cfg(target_arch = "wasm32")]
        if let Some(closure) = self.popstate.borrow_mut().take()
            && let Some(window) = web_sys::window()
        {
            let _ = window.remove_event_listener_with_callback(
                "popstate",
                closure.as_ref().unchecked_ref(),
            );
        }
    }

    pub fn navigate(&self, view: View, mode: GameMode) {
        self.do_navigate(view, mode);
    }

    pub fn current_view(&self) -> NavEntry {
        self.inner.nav.borrow().current()
    }

    /// Hardware/gesture back press. Returns true when the app is at the
    /// root and the host should ask for exit confirmation.
    pub fn back_pressed(&self) -> bool {
        let mut history = self.inner.history.borrow_mut();
        match self.inner.nav.borrow_mut().back_pressed(history.as_mut()) {
            BackAction::ConfirmExit => true,
            BackAction::Popped => false,
        }
    }

    /// In-app back button: always a plain backward step.
    pub fn ui_back(&self) {
        self.inner.history.borrow_mut().back();
    }

    pub fn select_lesson(&self, lesson_id: String) -> bool {
        if self.inner.curriculum.lesson(&lesson_id).is_none() {
            log::warn!("unknown lesson id {lesson_id:?}");
            return false;
        }
        *self.inner.active_lesson.borrow_mut() = Some(lesson_id);
        self.do_navigate(View::Lesson, GameMode::None);
        true
    }

    pub fn active_lesson(&self) -> Option<String> {
        self.inner.active_lesson.borrow().clone()
    }

    /// Finishing the reader awards the lesson and rolls straight into its
    /// quiz when it has questions; otherwise it steps back.
    pub fn lesson_complete(&self, understanding: UnderstandingLevel) {
        log::debug!("lesson finished with understanding {understanding:?}");
        let Some(lesson_id) = self.inner.active_lesson.borrow().clone() else {
            self.inner.history.borrow_mut().back();
            return;
        };
        self.inner
            .update_user_state(|state| state.complete_lesson(&lesson_id));

        let questions = self
            .inner
            .curriculum
            .lesson(&lesson_id)
            .map(|lesson| lesson.questions.clone())
            .unwrap_or_default();
        if self.start_session(questions) {
            // Pushing (rather than replacing) means Back returns to the lesson.
            self.do_navigate(View::Lesson, GameMode::Quiz);
        } else {
            self.inner.history.borrow_mut().back();
        }
    }

    /// Launches a practice quiz over an externally-selected question set,
    /// overlaying the current view. False when the set is empty.
    pub fn start_practice_quiz(&self, questions: Vec<Question>) -> bool {
        if !self.start_session(questions) {
            return false;
        }
        let view = self.inner.nav.borrow().current().view;
        self.do_navigate(view, GameMode::Quiz);
        true
    }

    pub fn session_phase(&self) -> SessionPhase {
        let session = self.inner.session.borrow();
        match session.as_ref() {
            None => SessionPhase::Inactive,
            Some(session) if session.is_complete() => SessionPhase::Complete,
            Some(_) if self.inner.user_state.borrow().out_of_hearts() => SessionPhase::Locked,
            Some(_) => SessionPhase::Question,
        }
    }

    pub fn current_card(&self) -> Option<QueuedAttempt> {
        self.inner.session.borrow().as_ref()?.current().cloned()
    }

    pub fn submit_answer(&self, selected: usize) -> SubmitFeedback {
        self.submit_answer_at(selected, Utc::now())
    }

    pub fn advance(&self) -> SessionPhase {
        if let Some(session) = self.inner.session.borrow_mut().as_mut() {
            session.advance();
        }
        self.session_phase()
    }

    /// AI analysis of the current mistake, once it has arrived.
    pub fn ai_feedback(&self) -> Option<String> {
        self.inner
            .session
            .borrow()
            .as_ref()?
            .feedback()
            .map(str::to_string)
    }

    pub fn quiz_progress(&self) -> f64 {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map(QuizSession::progress_fraction)
            .unwrap_or(0.0)
    }

    /// Banks the final score of a completed session and exits quiz mode.
    /// Returns the banked score (0 when the session was not complete).
    pub fn collect_quiz_reward(&self) -> u32 {
        let score = self
            .inner
            .session
            .borrow()
            .as_ref()
            .and_then(QuizSession::final_score);
        if let Some(score) = score {
            self.inner.update_user_state(|state| state.add_quiz_xp(score));
        }
        self.inner.history.borrow_mut().back();
        score.unwrap_or(0)
    }

    /// Tactical retreat: abandon the session without banking anything.
    pub fn exit_quiz(&self) {
        self.inner.history.borrow_mut().back();
    }

    pub fn check_hearts(&self) {
        self.check_hearts_at(Utc::now());
    }

    pub fn hearts(&self) -> u8 {
        self.inner.user_state.borrow().hearts
    }

    pub fn xp(&self) -> u32 {
        self.inner.user_state.borrow().xp
    }

    pub fn streak(&self) -> u32 {
        self.inner.user_state.borrow().streak
    }

    pub fn get_user_state(&self) -> UserState {
        self.inner.user_state.borrow().clone()
    }

    /// Wipes all progress back to the fresh-install record.
    pub fn reset_progress(&self) {
        self.inner
            .update_user_state(|_| UserState::initial(Utc::now()));
    }

    /// Moves to the next lesson in the linear flow, pushing a duplicate
    /// history entry so Back returns to the previous lesson. Returns false
    /// (and steps back) for the last lesson and for standalone ones.
    pub fn next_lesson(&self) -> bool {
        let active = self.inner.active_lesson.borrow().clone();
        let Some(active) = active else { return false };
        match self.inner.curriculum.next_lesson(&active) {
            Some(next) => {
                *self.inner.active_lesson.borrow_mut() = Some(next.to_string());
                let current = self.inner.nav.borrow().current();
                self.inner.history.borrow_mut().push(current);
                true
            }
            None => {
                self.inner.history.borrow_mut().back();
                false
            }
        }
    }

    pub fn prev_lesson(&self) {
        self.inner.history.borrow_mut().back();
    }
}

#[cfg(target_arch = "wasm32")]
impl CyberQuest {
    fn register_popstate_listener(&self) {
        let inner = Rc::clone(&self.inner);
        let closure = Closure::<dyn FnMut(web_sys::PopStateEvent)>::new(
            move |event: web_sys::PopStateEvent| {
                let entry: Option<NavEntry> =
                    serde_wasm_bindgen::from_value(event.state()).unwrap_or(None);
                let transition = inner.nav.borrow_mut().handle_pop(entry);
                inner.apply_transition(transition);
            },
        );
        match web_sys::window() {
            Some(window) => {
                if let Err(e) = window
                    .add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref())
                {
                    log::error!("failed to register popstate listener: {e:?}");
                }
                *self.popstate.borrow_mut() = Some(closure);
            }
            None => log::error!("no window to register popstate listener on"),
        }
    }
}

/// Browser history backend: the platform back stack is the source of truth
/// for navigation state.
#[cfg(target_arch = "wasm32")]
struct BrowserHistory;

#[cfg(target_arch = "wasm32")]
impl BrowserHistory {
    fn history(&self) -> Option<web_sys::History> {
        web_sys::window()?.history().ok()
    }
}

#[cfg(target_arch = "wasm32")]
impl HistoryBackend for BrowserHistory {
    fn replace(&mut self, entry: NavEntry) {
        if let Some(history) = self.history() {
            let state = serde_wasm_bindgen::to_value(&entry).unwrap_or(JsValue::NULL);
            if let Err(e) = history.replace_state(&state, "") {
                log::error!("history.replaceState failed: {e:?}");
            }
        }
    }

    fn push(&mut self, entry: NavEntry) {
        if let Some(history) = self.history() {
            let state = serde_wasm_bindgen::to_value(&entry).unwrap_or(JsValue::NULL);
            if let Err(e) = history.push_state(&state, "") {
                log::error!("history.pushState failed: {e:?}");
            }
        }
    }

    fn back(&mut self) {
        if let Some(history) = self.history() {
            let _ = history.back();
        }
    }
}

/// Summarizes a lesson body for quick review. `None` when the tutor is
/// unreachable; the UI renders its neutral unavailable state.
#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
pub async fn simplify_lesson(content: String) -> Option<String> {
    tutor::simplify(&content).await
}

/// One chat turn with the tutor; always returns displayable text.
#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
pub async fn ask_tutor(
    query: String,
    history: Vec<String>,
    image_base64: Option<String>,
) -> String {
    tutor::chat(&query, &history, image_base64.as_deref()).await
}
