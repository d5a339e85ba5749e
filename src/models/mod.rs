pub mod exercise;
pub mod group;
pub mod member;
pub mod penalty;
pub mod recovery;

pub use exercise::ExerciseLog;
pub use group::{Group, GroupSettings};
pub use member::{Member, WeekMode};
pub use penalty::{NewPendingPenalty, PaymentTransaction, PenaltyStatus, PendingPenalty};
pub use recovery::{RecoveryDayActivation, SickRecord};
