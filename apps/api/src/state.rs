use std::sync::Arc;

use tracing::warn;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::pricing::PricingResolver;
use appointment_cell::store::{
    AppointmentStore, DocumentAppointmentStore, DocumentSettingsStore, InMemoryAppointmentStore,
    InMemorySettingsStore, SettingsStore,
};
use auth_cell::handlers::AuthState;
use auth_cell::services::account::AccountService;
use auth_cell::services::otp::OtpService;
use auth_cell::store::{
    DocumentOtpStore, DocumentUserStore, InMemoryOtpStore, InMemoryUserStore, OtpStore, UserStore,
};
use notification_cell::services::dispatcher::{NotificationChannel, NotificationDispatcher};
use notification_cell::services::email::EmailChannel;
use notification_cell::services::sms::SmsGatewayChannel;
use notification_cell::services::templates::Templates;
use payment_cell::handlers::PaymentState;
use payment_cell::services::gateway::{PaymentGateway, RazorpayGateway};
use payment_cell::services::orders::PaymentService;
use payment_cell::store::{DocumentPaymentStore, InMemoryPaymentStore, PaymentStore};
use shared_config::ClinicConfig;
use shared_database::atlas::AtlasClient;
use shared_utils::extractor::AuthContext;

pub struct AppState {
    pub auth: Arc<AuthState>,
    pub appointments: Arc<AppointmentState>,
    pub payments: Arc<PaymentState>,
    pub auth_ctx: Arc<AuthContext>,
}

struct Stores {
    users: Arc<dyn UserStore>,
    otps: Arc<dyn OtpStore>,
    appointments: Arc<dyn AppointmentStore>,
    settings: Arc<dyn SettingsStore>,
    payments: Arc<dyn PaymentStore>,
}

fn build_stores(config: &ClinicConfig) -> Stores {
    if config.is_store_configured() {
        let atlas = Arc::new(AtlasClient::new(config));
        Stores {
            users: Arc::new(DocumentUserStore::new(atlas.clone())),
            otps: Arc::new(DocumentOtpStore::new(atlas.clone())),
            appointments: Arc::new(DocumentAppointmentStore::new(atlas.clone())),
            settings: Arc::new(DocumentSettingsStore::new(atlas.clone())),
            payments: Arc::new(DocumentPaymentStore::new(atlas)),
        }
    } else {
        warn!("Document store not configured - using in-memory stores (data is not durable)");
        Stores {
            users: Arc::new(InMemoryUserStore::new()),
            otps: Arc::new(InMemoryOtpStore::new()),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            settings: Arc::new(InMemorySettingsStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
        }
    }
}

fn build_dispatcher(config: &ClinicConfig) -> Arc<NotificationDispatcher> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if config.is_sms_configured() {
        channels.push(Arc::new(SmsGatewayChannel::new(config)));
    } else {
        warn!("SMS gateway not configured - phone notifications disabled");
    }

    if config.is_smtp_configured() {
        match EmailChannel::new(config) {
            Ok(channel) => channels.push(Arc::new(channel)),
            Err(e) => warn!("Email channel disabled: {}", e),
        }
    } else {
        warn!("SMTP not configured - email notifications disabled");
    }

    if channels.is_empty() {
        warn!("No notification channels available; deliveries will be logged as undelivered");
    }

    Arc::new(NotificationDispatcher::new(channels))
}

pub async fn build(config: &ClinicConfig) -> AppState {
    let stores = build_stores(config);
    let dispatcher = build_dispatcher(config);
    let templates = Templates::new(config.clinic_name.clone(), config.admin_phone.clone());
    let auth_ctx = Arc::new(AuthContext::new(config));

    // The persisted pricing table wins over the built-in defaults
    let pricing_table = match stores.settings.load_pricing().await {
        Ok(Some(table)) => table,
        Ok(None) => Default::default(),
        Err(e) => {
            warn!("Failed to load pricing settings, using defaults: {}", e);
            Default::default()
        }
    };
    let pricing = Arc::new(PricingResolver::new(pricing_table));

    let otps = Arc::new(OtpService::new(
        stores.otps.clone(),
        stores.users.clone(),
        dispatcher.clone(),
        templates.clone(),
        config.otp_policy(),
        config.admin_phone.clone(),
    ));
    let accounts = AccountService::new(
        stores.users.clone(),
        otps.clone(),
        dispatcher.clone(),
        templates.clone(),
        config.admin_phone.clone(),
        config.jwt_secret.clone(),
    );
    let auth = Arc::new(AuthState { accounts, otps });

    let bookings = AppointmentBookingService::new(
        stores.appointments.clone(),
        stores.settings.clone(),
        stores.users.clone(),
        pricing,
        dispatcher.clone(),
        templates.clone(),
        config.booking_rules(),
    );
    let appointments = Arc::new(AppointmentState { bookings });

    if !config.is_payment_configured() {
        warn!("Payment gateway not configured - online payments will fail");
    }
    let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(config));
    let payments_service = PaymentService::new(
        stores.payments.clone(),
        stores.appointments.clone(),
        stores.users.clone(),
        gateway,
        dispatcher,
        templates,
        config.razorpay_key_id.clone(),
        config.razorpay_key_secret.clone(),
    );
    let payments = Arc::new(PaymentState {
        payments: payments_service,
    });

    AppState {
        auth,
        appointments,
        payments,
        auth_ctx,
    }
}
