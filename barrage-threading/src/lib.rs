pub mod killable_thread;

pub use killable_thread::{fixed_rate, Control, FinishResult, KillSignal, KillSwitch, KillableThread};
