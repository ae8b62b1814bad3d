/// Events emitted while the session handles input and time.
/// The presentation layer consumes these for sound.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    StageEntered { id: u32 },
    StageCompleted { id: u32 },
    BalloonPopped { score: u32 },
    BalloonRoundOver { score: u32 },
    CardFlipped,
    PairMatched,
    PairMissed,
    MemoryWon,
    AnswerLocked { correct: bool },
    TriviaFinished { passed: bool },
    TextRevealed,
    CandlesBlown,
    Celebration,
    LetterOpened,
    DevToggled { on: bool },
    /// Input that had no effect (locked answer, blocked flip, ...).
    Rejected,
}
