/// Who a notification is addressed to. Phone and email are both optional;
/// the dispatcher skips channels it has no address for.
#[derive(Debug, Clone)]
pub struct Contact {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Which address class a channel delivers through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Phone,
    Email,
}

/// Caller-supplied channel ordering. Phone-first with email fallback unless
/// the caller asks for email first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPreference {
    PhoneFirst,
    EmailFirst,
}

/// One message rendered for every channel it might travel through.
#[derive(Debug, Clone)]
pub struct Notice {
    pub subject: String,
    pub sms_text: String,
    pub email_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { channel: &'static str },
    /// Every reachable channel failed. The caller is never failed over this;
    /// operators see it in the report and the logs.
    Undelivered,
}

#[derive(Debug, Clone)]
pub struct ChannelAttempt {
    pub channel: &'static str,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub outcome: DeliveryOutcome,
    pub failed_attempts: Vec<ChannelAttempt>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }
}
