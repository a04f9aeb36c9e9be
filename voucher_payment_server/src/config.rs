use std::env;

use log::*;
use vpg_common::Secret;

const DEFAULT_VPG_HOST: &str = "127.0.0.1";
const DEFAULT_VPG_PORT: u16 = 8360;
const DEFAULT_MOOLRE_API_URL: &str = "https://api.moolre.com";
const DEFAULT_ARKESEL_SMS_URL: &str = "https://sms.arkesel.com/api/v2/sms/send";
const DEFAULT_SMS_SENDER_ID: &str = "WAEC-GH";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the admin endpoints, sent in the `vpg-admin-key` header.
    pub admin_api_key: Secret<String>,
    pub moolre: MoolreConfig,
    pub sms: SmsConfig,
}

/// Credentials for the Moolre open-banking API, used to verify payment status and to receive webhooks.
#[derive(Clone, Debug, Default)]
pub struct MoolreConfig {
    pub api_url: String,
    pub api_user: String,
    pub api_pubkey: String,
    pub api_key: Secret<String>,
    /// The merchant account that receives voucher payments.
    pub account_number: String,
    /// Webhook posts carry this value in their payload; posts without it are ignored.
    pub webhook_secret: Secret<String>,
    /// The public base URL of this server, used for the webhook callback and post-payment redirect in payment
    /// links.
    pub public_base_url: String,
}

/// Arkesel SMS gateway credentials. When no API key is configured, SMS delivery is disabled and vouchers are only
/// returned in HTTP responses.
#[derive(Clone, Debug, Default)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub sender_id: String,
    /// Operator number for backlog and low-stock alerts.
    pub operator_phone: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VPG_HOST.to_string(),
            port: DEFAULT_VPG_PORT,
            database_url: String::default(),
            admin_api_key: Secret::default(),
            moolre: MoolreConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VPG_HOST").ok().unwrap_or_else(|| DEFAULT_VPG_HOST.into());
        let port = env::var("VPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for VPG_PORT. {e} Using the default, {DEFAULT_VPG_PORT}, instead."
                    );
                    DEFAULT_VPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_VPG_PORT);
        let database_url = env::var("VPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ VPG_DATABASE_URL is not set. Please set it to the URL for the voucher database.");
            String::default()
        });
        let admin_api_key = env::var("VPG_ADMIN_API_KEY").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ VPG_ADMIN_API_KEY is not set. The admin endpoints will reject every request.");
            Secret::default()
        });
        let moolre = MoolreConfig::from_env_or_default();
        let sms = SmsConfig::from_env_or_default();
        Self { host, port, database_url, admin_api_key, moolre, sms }
    }
}

impl MoolreConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("VPG_MOOLRE_API_URL").ok().unwrap_or_else(|| DEFAULT_MOOLRE_API_URL.into());
        let api_user = env::var("VPG_MOOLRE_API_USER").unwrap_or_default();
        let api_pubkey = env::var("VPG_MOOLRE_API_PUBKEY").unwrap_or_default();
        let api_key = env::var("VPG_MOOLRE_API_KEY").map(Secret::new).unwrap_or_default();
        let account_number = env::var("VPG_MOOLRE_ACCOUNT_NUMBER").unwrap_or_default();
        let webhook_secret = env::var("VPG_MOOLRE_WEBHOOK_SECRET").map(Secret::new).unwrap_or_else(|_| {
            warn!("🪛️ VPG_MOOLRE_WEBHOOK_SECRET is not set. Webhook posts will be ignored.");
            Secret::default()
        });
        let public_base_url = env::var("VPG_PUBLIC_BASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ VPG_PUBLIC_BASE_URL is not set. Payment links will carry relative callback URLs.");
            String::default()
        });
        Self { api_url, api_user, api_pubkey, api_key, account_number, webhook_secret, public_base_url }
    }
}

impl SmsConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("VPG_ARKESEL_SMS_URL").ok().unwrap_or_else(|| DEFAULT_ARKESEL_SMS_URL.into());
        let api_key = env::var("VPG_ARKESEL_API_KEY").map(Secret::new).unwrap_or_else(|_| {
            info!("🪛️ VPG_ARKESEL_API_KEY is not set. SMS delivery is disabled.");
            Secret::default()
        });
        let sender_id = env::var("VPG_SMS_SENDER_ID").ok().unwrap_or_else(|| DEFAULT_SMS_SENDER_ID.into());
        let operator_phone = env::var("VPG_OPERATOR_PHONE").ok().filter(|s| !s.trim().is_empty());
        Self { api_url, api_key, sender_id, operator_phone }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.reveal().is_empty()
    }
}
