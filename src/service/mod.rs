pub mod delivery;
pub mod notifier;
pub mod queue;
pub mod reauth;

pub use delivery::{Delay, SheetsDeliveryClient};
pub use notifier::{FailureKind, FailureNotice, LogNotifier, NoticeLinks, Notifier, WebhookNotifier};
pub use queue::{DrainReport, DurableQueue};
pub use reauth::ReauthorizationFlow;
