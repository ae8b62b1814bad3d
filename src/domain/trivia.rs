/// Trivia engine: a linear walk over a fixed question set.
///
/// No backtracking. An answer is locked the moment it is chosen; the
/// pass mark is an absolute count (`score > required_correct`). A failed
/// run can only be retried from the first question.

use super::timer::{ScheduledTask, TokenSource};

pub const DEFAULT_REQUIRED_CORRECT: u32 = 3;
pub const DEFAULT_FEEDBACK_MS: u64 = 2000;

#[derive(Clone, Debug, PartialEq)]
pub struct Question {
    pub id: u32,
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnswerRecord {
    pub question_id: u32,
    pub chosen: usize,
    pub correct: usize,
    pub was_correct: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriviaPhase {
    Intro,
    Playing,
    Complete { passed: bool },
}

pub struct Trivia {
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub score: u32,
    pub answers: Vec<AnswerRecord>,
    pub phase: TriviaPhase,

    required_correct: u32,
    feedback_ms: u64,
    tokens: TokenSource,
    /// Auto-advance after the answer feedback has been shown.
    pending: Option<ScheduledTask>,
}

impl Trivia {
    pub fn new(questions: Vec<Question>, required_correct: u32, feedback_ms: u64) -> Self {
        Trivia {
            questions,
            current_index: 0,
            score: 0,
            answers: vec![],
            phase: TriviaPhase::Intro,
            required_correct,
            feedback_ms,
            tokens: TokenSource::default(),
            pending: None,
        }
    }

    pub fn required_correct(&self) -> u32 {
        self.required_correct
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            TriviaPhase::Playing => self.questions.get(self.current_index),
            _ => None,
        }
    }

    /// The current question already has a locked-in answer.
    pub fn is_locked(&self) -> bool {
        self.answers.len() > self.current_index
    }

    pub fn last_answer(&self) -> Option<&AnswerRecord> {
        self.answers.last()
    }

    pub fn passed(&self) -> Option<bool> {
        match self.phase {
            TriviaPhase::Complete { passed } => Some(passed),
            _ => None,
        }
    }

    pub fn start(&mut self) {
        self.clear();
        self.phase = TriviaPhase::Playing;
        if self.questions.is_empty() {
            self.finish();
        }
    }

    /// Full restart: every per-question field is cleared.
    pub fn restart(&mut self) {
        self.clear();
        self.phase = TriviaPhase::Intro;
    }

    /// Lock in an answer. Returns whether it was correct, or None when the
    /// choice was ignored.
    pub fn select_answer(&mut self, option: usize) -> Option<bool> {
        if self.phase != TriviaPhase::Playing || self.is_locked() {
            return None;
        }
        let q = self.questions.get(self.current_index)?;
        if option >= q.options.len() {
            return None;
        }
        let was_correct = option == q.correct;
        self.answers.push(AnswerRecord {
            question_id: q.id,
            chosen: option,
            correct: q.correct,
            was_correct,
        });
        if was_correct {
            self.score += 1;
        }
        let token = self.tokens.issue();
        self.pending = Some(ScheduledTask::once(token, self.feedback_ms));
        Some(was_correct)
    }

    /// Move past an answered question, finishing after the last one.
    pub fn advance(&mut self) -> TriviaPhase {
        if self.phase != TriviaPhase::Playing || !self.is_locked() {
            return self.phase;
        }
        self.pending = None;
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        } else {
            self.current_index = self.questions.len();
            self.finish();
        }
        self.phase
    }

    /// Feed elapsed time. Returns true when the feedback delay moved the
    /// game on.
    pub fn elapse(&mut self, dt_ms: u64) -> bool {
        let fired = match self.pending.as_mut() {
            Some(task) => task.advance(dt_ms) > 0,
            None => false,
        };
        if fired {
            self.advance();
        }
        fired
    }

    pub fn teardown(&mut self) {
        self.pending = None;
    }

    /// Percent of questions answered.
    pub fn progress(&self) -> u32 {
        if self.questions.is_empty() {
            return 100;
        }
        (self.answers.len() * 100 / self.questions.len()) as u32
    }

    fn finish(&mut self) {
        let passed = self.score > self.required_correct;
        self.phase = TriviaPhase::Complete { passed };
        log::info!(
            "trivia finished: {}/{} ({})",
            self.score,
            self.questions.len(),
            if passed { "passed" } else { "failed" }
        );
    }

    fn clear(&mut self) {
        self.pending = None;
        self.current_index = 0;
        self.score = 0;
        self.answers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_questions() -> Vec<Question> {
        (1..=5)
            .map(|i| Question {
                id: i,
                prompt: format!("Question {}", i),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct: 1,
            })
            .collect()
    }

    fn play(correct_answers: usize) -> Trivia {
        let mut t = Trivia::new(five_questions(), DEFAULT_REQUIRED_CORRECT, DEFAULT_FEEDBACK_MS);
        t.start();
        for i in 0..5 {
            let pick = if i < correct_answers { 1 } else { 0 };
            t.select_answer(pick);
            t.advance();
        }
        t
    }

    #[test]
    fn four_correct_passes() {
        let t = play(4);
        assert_eq!(t.score, 4);
        assert_eq!(t.phase, TriviaPhase::Complete { passed: true });
    }

    #[test]
    fn three_correct_fails() {
        let t = play(3);
        assert_eq!(t.score, 3);
        assert_eq!(t.phase, TriviaPhase::Complete { passed: false });
    }

    #[test]
    fn restart_after_fail_clears_everything() {
        let mut t = play(2);
        t.restart();
        assert_eq!(t.score, 0);
        assert_eq!(t.current_index, 0);
        assert!(t.answers.is_empty());
        assert_eq!(t.phase, TriviaPhase::Intro);
    }

    #[test]
    fn second_answer_is_ignored() {
        let mut t = Trivia::new(five_questions(), 3, DEFAULT_FEEDBACK_MS);
        t.start();
        assert_eq!(t.select_answer(0), Some(false));
        assert_eq!(t.select_answer(1), None);
        assert_eq!(t.score, 0);
        assert_eq!(t.answers.len(), 1);
    }

    #[test]
    fn answer_record_tracks_index_and_score() {
        let mut t = Trivia::new(five_questions(), 3, DEFAULT_FEEDBACK_MS);
        t.start();
        for pick in [1, 0, 1] {
            t.select_answer(pick);
            assert_eq!(t.answers.len(), t.current_index + 1);
            t.advance();
        }
        assert_eq!(t.answers.len(), t.current_index);
        let correct = t.answers.iter().filter(|a| a.was_correct).count() as u32;
        assert_eq!(t.score, correct);
        assert_eq!(t.answers[1].chosen, 0);
        assert_eq!(t.answers[1].correct, 1);
    }

    #[test]
    fn advance_requires_an_answer() {
        let mut t = Trivia::new(five_questions(), 3, DEFAULT_FEEDBACK_MS);
        t.start();
        t.advance();
        assert_eq!(t.current_index, 0);
    }

    #[test]
    fn out_of_range_option_ignored() {
        let mut t = Trivia::new(five_questions(), 3, DEFAULT_FEEDBACK_MS);
        t.start();
        assert_eq!(t.select_answer(9), None);
        assert!(!t.is_locked());
    }

    #[test]
    fn feedback_delay_auto_advances() {
        let mut t = Trivia::new(five_questions(), 3, DEFAULT_FEEDBACK_MS);
        t.start();
        t.select_answer(1);
        assert!(!t.elapse(1999));
        assert!(t.elapse(1));
        assert_eq!(t.current_index, 1);
        // Nothing pending until the next answer.
        assert!(!t.elapse(10_000));
        assert_eq!(t.current_index, 1);
    }

    #[test]
    fn manual_advance_cancels_feedback_timer() {
        let mut t = Trivia::new(five_questions(), 3, DEFAULT_FEEDBACK_MS);
        t.start();
        t.select_answer(1);
        t.advance();
        assert!(!t.elapse(5000));
        assert_eq!(t.current_index, 1);
    }

    #[test]
    fn empty_set_completes_on_start() {
        let mut t = Trivia::new(vec![], 3, DEFAULT_FEEDBACK_MS);
        t.start();
        assert_eq!(t.phase, TriviaPhase::Complete { passed: false });
        assert_eq!(t.progress(), 100);
    }
}
