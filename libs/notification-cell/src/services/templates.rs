use crate::models::Notice;

/// Renders every outbound message in one place, with the clinic identity
/// injected at startup instead of read from the environment at call sites.
#[derive(Debug, Clone)]
pub struct Templates {
    clinic_name: String,
    clinic_phone: String,
}

impl Templates {
    pub fn new(clinic_name: String, clinic_phone: String) -> Self {
        Self {
            clinic_name,
            clinic_phone,
        }
    }

    pub fn otp(&self, code: &str, validity_minutes: i64) -> Notice {
        Notice {
            subject: format!("{} verification code", self.clinic_name),
            sms_text: format!(
                "Your OTP for {} is: {}. Valid for {} minutes. Do not share this code.",
                self.clinic_name, code, validity_minutes
            ),
            email_html: format!(
                "<h2>Verification code</h2>\
                 <p>Your OTP for {} is: <strong>{}</strong></p>\
                 <p>It is valid for {} minutes. Do not share this code.</p>",
                self.clinic_name, code, validity_minutes
            ),
        }
    }

    pub fn booking_confirmation(&self, name: &str, date: &str, time: &str, pain_type: &str) -> Notice {
        Notice {
            subject: format!("Appointment confirmed - {}", self.clinic_name),
            sms_text: format!(
                "Appointment confirmed at {} on {} at {}. Contact: {}",
                self.clinic_name, date, time, self.clinic_phone
            ),
            email_html: format!(
                "<h2>Appointment confirmed</h2>\
                 <p>Hi {},</p>\
                 <p>Your {} consultation at {} is booked for <strong>{}</strong>, <strong>{}</strong>.</p>\
                 <p>Contact us: {}</p>",
                name, pain_type, self.clinic_name, date, time, self.clinic_phone
            ),
        }
    }

    pub fn cancellation_notice(&self, name: &str, date: &str, time: &str) -> Notice {
        Notice {
            subject: format!("Appointment cancelled - {}", self.clinic_name),
            sms_text: format!(
                "Your appointment at {} has been cancelled. Contact: {}",
                self.clinic_name, self.clinic_phone
            ),
            email_html: format!(
                "<h2>Appointment cancelled</h2>\
                 <p>Hi {},</p>\
                 <p>Your appointment on {} at {} has been cancelled.</p>\
                 <p>Contact us: {}</p>",
                name, date, time, self.clinic_phone
            ),
        }
    }

    pub fn payment_confirmation(
        &self,
        name: &str,
        amount: i64,
        currency: &str,
        payment_ref: &str,
    ) -> Notice {
        Notice {
            subject: format!("Payment received - {}", self.clinic_name),
            sms_text: format!(
                "Payment of {} {} received at {}. Ref: {}",
                currency, amount, self.clinic_name, payment_ref
            ),
            email_html: format!(
                "<h2>Payment received</h2>\
                 <p>Hi {},</p>\
                 <p>We received your payment of <strong>{} {}</strong>.</p>\
                 <p>Payment reference: {}</p>",
                name, currency, amount, payment_ref
            ),
        }
    }

    pub fn welcome(&self, name: &str) -> Notice {
        Notice {
            subject: format!("Welcome to {}", self.clinic_name),
            sms_text: format!(
                "Welcome to {}! You can now book appointments online. Contact: {}",
                self.clinic_name, self.clinic_phone
            ),
            email_html: format!(
                "<h2>Welcome {}!</h2>\
                 <p>Your account has been successfully created.</p>\
                 <p>You can now book appointments online.</p>\
                 <p>Contact us: {}</p>",
                name, self.clinic_phone
            ),
        }
    }

    pub fn password_changed(&self, name: &str) -> Notice {
        Notice {
            subject: "Password changed successfully".to_string(),
            sms_text: format!(
                "Your {} account password was changed. Not you? Contact: {}",
                self.clinic_name, self.clinic_phone
            ),
            email_html: format!(
                "<h2>Password changed</h2>\
                 <p>Hi {},</p>\
                 <p>Your password has been successfully changed.</p>\
                 <p>If you didn't make this change, please contact us immediately.</p>\
                 <p>Contact: {}</p>",
                name, self.clinic_phone
            ),
        }
    }
}
