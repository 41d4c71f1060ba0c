//! The quiz session engine.
//!
//! A session plays a fixed list of questions front to back. Missed questions
//! are cloned and re-inserted a few slots ahead of the cursor so the user sees
//! them again soon, but not immediately. Retry clones are graded pass/fail
//! only and never award XP, so the score is capped at 10 points per question
//! of the original set.

use curriculum_utils::Question;
use serde::{Deserialize, Serialize};

/// How many slots ahead of the cursor a missed question is re-inserted.
/// Close enough to reinforce short-term memory, far enough to avoid showing
/// the same question twice in a row.
pub const RETRY_OFFSET: usize = 3;

/// XP awarded for a correct first-pass answer.
pub const FIRST_PASS_XP: u32 = 10;

/// Distinguishes two queue entries wrapping the same underlying question.
/// Unique within one session; also used to match late-arriving tutor
/// explanations to the attempt they were requested for.
#[derive(
    Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Ord, PartialOrd, Hash, tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(transparent)]
pub struct AttemptId(u64);

/// One entry in the session queue: a question plus its per-session identity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAttempt {
    pub question: Question,
    pub is_retry: bool,
    pub attempt_id: AttemptId,
}

/// Everything the tutor needs to explain a wrong answer. Produced by
/// `submit_answer` so the caller can fire the request without re-reading
/// session state; `attempt_id` guards the eventual response against the
/// session having moved on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplainRequest {
    pub attempt_id: AttemptId,
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// `scored` is false for retry attempts, which are never paid.
    Correct { scored: bool },
    /// The caller must deduct one heart and should dispatch `explain`.
    /// `retry_position` is where the retry clone landed in the queue.
    Incorrect {
        retry_position: usize,
        explain: ExplainRequest,
    },
    /// Submission is locked until `advance`.
    AlreadySubmitted,
    SessionComplete,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced,
    /// `advance` before `submit_answer` is a guarded no-op.
    NotSubmitted,
    SessionComplete,
}

#[derive(Clone, Debug)]
pub struct QuizSession {
    queue: Vec<QueuedAttempt>,
    cursor: usize,
    score: u32,
    next_attempt_id: u64,
    // Per-attempt transient state, cleared on advance.
    selected: Option<usize>,
    submitted: Option<bool>,
    feedback: Option<String>,
}

impl QuizSession {
    /// Builds the initial queue in the given order. Returns `None` for an
    /// empty question list; the caller surfaces an empty state instead.
    pub fn new(questions: Vec<Question>) -> Option<Self> {
        if questions.is_empty() {
            return None;
        }
        let mut session = Self {
            queue: Vec::with_capacity(questions.len()),
            cursor: 0,
            score: 0,
            next_attempt_id: 0,
            selected: None,
            submitted: None,
            feedback: None,
        };
        for question in questions {
            let attempt_id = session.fresh_attempt_id();
            session.queue.push(QueuedAttempt {
                question,
                is_retry: false,
                attempt_id,
            });
        }
        Some(session)
    }

    fn fresh_attempt_id(&mut self) -> AttemptId {
        let id = AttemptId(self.next_attempt_id);
        self.next_attempt_id += 1;
        id
    }

    /// The attempt under the cursor, or `None` once the session is complete.
    pub fn current(&self) -> Option<&QueuedAttempt> {
        self.queue.get(self.cursor)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.queue.len()
    }

    /// Valid only once the session is complete.
    pub fn final_score(&self) -> Option<u32> {
        self.is_complete().then_some(self.score)
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Fraction of the queue already played, for the progress bar. The
    /// denominator grows as retries are inserted.
    pub fn progress_fraction(&self) -> f64 {
        if self.queue.is_empty() {
            return 0.0;
        }
        self.cursor as f64 / self.queue.len() as f64
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn has_submitted(&self) -> bool {
        self.submitted.is_some()
    }

    /// Whether the submitted answer for the current attempt was correct.
    pub fn last_answer_correct(&self) -> Option<bool> {
        self.submitted
    }

    /// Tutor explanation attached to the current attempt, if it has arrived.
    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Grades the selected option against the current attempt. Locked after
    /// the first call until `advance`. An out-of-range index grades as
    /// incorrect rather than erroring; nothing here panics.
    pub fn submit_answer(&mut self, selected: usize) -> SubmitOutcome {
        if self.is_complete() {
            return SubmitOutcome::SessionComplete;
        }
        if self.submitted.is_some() {
            return SubmitOutcome::AlreadySubmitted;
        }

        let (question, is_retry) = {
            let attempt = &self.queue[self.cursor];
            (attempt.question.clone(), attempt.is_retry)
        };
        let correct = selected == question.correct_answer_index;
        self.selected = Some(selected);
        self.submitted = Some(correct);

        if correct {
            let scored = !is_retry;
            if scored {
                self.score += FIRST_PASS_XP;
            }
            return SubmitOutcome::Correct { scored };
        }

        // Clone the question for spaced re-exposure. Each miss schedules its
        // own independent retry instance, measured from the cursor at the
        // time of insertion.
        let attempt_id = self.fresh_attempt_id();
        let retry = QueuedAttempt {
            question: question.clone(),
            is_retry: true,
            attempt_id,
        };
        let retry_position = (self.cursor + RETRY_OFFSET).min(self.queue.len());
        self.queue.insert(retry_position, retry);

        let explain = ExplainRequest {
            attempt_id: self.queue[self.cursor].attempt_id,
            question: question.text.clone(),
            user_answer: question.options.get(selected).cloned().unwrap_or_default(),
            correct_answer: question
                .options
                .get(question.correct_answer_index)
                .cloned()
                .unwrap_or_default(),
        };
        SubmitOutcome::Incorrect {
            retry_position,
            explain,
        }
    }

    /// Moves to the next attempt and clears per-attempt transient state.
    /// Valid only after `submit_answer` for the current attempt.
    pub fn advance(&mut self) -> AdvanceOutcome {
        if self.is_complete() {
            return AdvanceOutcome::SessionComplete;
        }
        if self.submitted.is_none() {
            return AdvanceOutcome::NotSubmitted;
        }
        self.cursor += 1;
        self.selected = None;
        self.submitted = None;
        self.feedback = None;
        AdvanceOutcome::Advanced
    }

    /// Delivers an async tutor explanation. Responses for attempts that have
    /// already been advanced past are discarded rather than mis-attached to
    /// whatever is current now. Returns whether the text was attached.
    pub fn attach_feedback(&mut self, attempt_id: AttemptId, text: Option<String>) -> bool {
        let Some(text) = text else {
            // Tutor unavailable; the UI renders its neutral state.
            return false;
        };
        let current_id = match self.current() {
            Some(attempt) => attempt.attempt_id,
            None => return false,
        };
        if current_id != attempt_id {
            log::debug!("discarding stale tutor feedback for {attempt_id:?}");
            return false;
        }
        self.feedback = Some(text);
        true
    }
}
