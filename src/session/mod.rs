pub mod machine;
pub mod step;
pub mod timer;

pub use machine::{Attempt, ExamPhase, ExamSession, SessionCommand, SessionError};
pub use step::{AppStep, StepController};
pub use timer::{exam_duration_secs, CountdownTimer, TimerTick};
