use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use dukaan_order::{Order, PaymentMethod};
use dukaan_shared::money::{round_minor, to_major_string};

use crate::identity::secure_eq;

/// Form fields exchanged with a gateway, kept sorted by name.
pub type GatewayFields = BTreeMap<String, String>;

/// Where the storefront should POST the customer to start paying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRedirect {
    pub gateway: PaymentMethod,
    pub url: String,
    pub method: String,
    pub fields: GatewayFields,
}

/// A verified gateway callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOutcome {
    pub order_number: String,
    pub reference: Option<String>,
    pub succeeded: bool,
    pub amount: Option<i64>,
    pub message: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Build the signed form that hands the customer over to the gateway
    async fn initiate(&self, order: &Order, now: DateTime<Utc>) -> Result<PaymentRedirect, PaymentError>;

    /// Check the signature on a callback and read its result
    async fn verify_callback(&self, fields: &GatewayFields) -> Result<PaymentOutcome, PaymentError>;

    /// Amount in minor units the customer was asked to pay for `order`.
    fn expected_amount(&self, order: &Order) -> i64 {
        order.total
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JazzCashSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub merchant_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub integrity_salt: String,
    #[serde(default)]
    pub return_url: String,
    #[serde(default = "default_jazzcash_endpoint")]
    pub endpoint: String,
}

fn default_jazzcash_endpoint() -> String {
    "https://sandbox.jazzcash.com.pk/CustomerPortal/transactionmanagement/merchantform/".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EasyPaisaSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub hash_key: String,
    #[serde(default)]
    pub return_url: String,
    #[serde(default = "default_easypaisa_endpoint")]
    pub endpoint: String,
}

fn default_easypaisa_endpoint() -> String {
    "https://easypaystg.easypaisa.com.pk/easypay/Index.jsf".to_string()
}

const PKT_OFFSET_SECONDS: i32 = 5 * 3600;

/// Pakistan Standard Time; gateways expect local timestamps.
fn pkt(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(PKT_OFFSET_SECONDS) {
        Some(offset) => now.with_timezone(&offset),
        None => now.fixed_offset(),
    }
}

fn required<'a>(fields: &'a GatewayFields, key: &str) -> Result<&'a str, PaymentError> {
    fields
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaymentError::MissingField(key.to_string()))
}

pub struct JazzCashGateway {
    settings: JazzCashSettings,
}

impl JazzCashGateway {
    pub const SUCCESS_CODE: &'static str = "000";

    pub fn new(settings: JazzCashSettings) -> Result<Self, PaymentError> {
        if settings.merchant_id.is_empty() || settings.integrity_salt.is_empty() {
            return Err(PaymentError::NotConfigured("jazzcash".to_string()));
        }
        Ok(Self { settings })
    }

    /// Upper-case hex HMAC-SHA256, keyed by the integrity salt, over
    /// `salt&v1&v2…` for every non-empty `pp_` field in key order.
    pub fn secure_hash(&self, fields: &GatewayFields) -> String {
        let mut message = self.settings.integrity_salt.clone();
        for (key, value) in fields {
            if key.starts_with("pp_") && key != "pp_SecureHash" && !value.is_empty() {
                message.push('&');
                message.push_str(value);
            }
        }
        let mut mac = match Hmac::<Sha256>::new_from_slice(self.settings.integrity_salt.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(message.as_bytes());
        hex::encode_upper(mac.finalize().into_bytes())
    }
}

#[async_trait]
impl PaymentGateway for JazzCashGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::JazzCash
    }

    async fn initiate(&self, order: &Order, now: DateTime<Utc>) -> Result<PaymentRedirect, PaymentError> {
        let local = pkt(now);
        let suffix = order.order_number.rsplit('-').next().unwrap_or_default();
        let txn_ref = format!("T{}{}", local.format("%Y%m%d%H%M%S"), suffix);

        let mut fields = GatewayFields::new();
        let mut put = |k: &str, v: String| {
            fields.insert(k.to_string(), v);
        };
        put("pp_Version", "1.1".to_string());
        put("pp_TxnType", "MWALLET".to_string());
        put("pp_Language", "EN".to_string());
        put("pp_MerchantID", self.settings.merchant_id.clone());
        put("pp_Password", self.settings.password.clone());
        put("pp_TxnRefNo", txn_ref);
        put("pp_Amount", order.total.to_string());
        put("pp_TxnCurrency", "PKR".to_string());
        put("pp_TxnDateTime", local.format("%Y%m%d%H%M%S").to_string());
        put("pp_TxnExpiryDateTime", (local + Duration::days(1)).format("%Y%m%d%H%M%S").to_string());
        put("pp_BillReference", order.order_number.clone());
        put("pp_Description", format!("Order {}", order.order_number));
        put("pp_ReturnURL", self.settings.return_url.clone());

        let hash = self.secure_hash(&fields);
        fields.insert("pp_SecureHash".to_string(), hash);

        Ok(PaymentRedirect {
            gateway: PaymentMethod::JazzCash,
            url: self.settings.endpoint.clone(),
            method: "POST".to_string(),
            fields,
        })
    }

    async fn verify_callback(&self, fields: &GatewayFields) -> Result<PaymentOutcome, PaymentError> {
        let received = required(fields, "pp_SecureHash")?;
        let expected = self.secure_hash(fields);
        if !secure_eq(&expected, &received.to_ascii_uppercase()) {
            return Err(PaymentError::InvalidSignature);
        }

        let order_number = required(fields, "pp_BillReference")?.to_string();
        let code = required(fields, "pp_ResponseCode")?;
        let reference = ["pp_RetreivalReferenceNo", "pp_TxnRefNo"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .find(|v| !v.is_empty())
            .cloned();

        Ok(PaymentOutcome {
            order_number,
            reference,
            succeeded: code == Self::SUCCESS_CODE,
            amount: fields.get("pp_Amount").and_then(|a| a.parse().ok()),
            message: fields.get("pp_ResponseMessage").cloned(),
        })
    }
}

pub struct EasyPaisaGateway {
    settings: EasyPaisaSettings,
}

impl EasyPaisaGateway {
    pub const SUCCESS_STATUS: &'static str = "0000";
    /// `amount` is sent in rupees with one decimal place.
    const AMOUNT_DECIMALS: usize = 1;

    pub fn new(settings: EasyPaisaSettings) -> Result<Self, PaymentError> {
        if settings.store_id.is_empty() || settings.hash_key.is_empty() {
            return Err(PaymentError::NotConfigured("easypaisa".to_string()));
        }
        Ok(Self { settings })
    }

    /// Lower-case hex SHA-256 of `k1=v1&k2=v2…` (sorted, hash field excluded) followed by the hash key.
    pub fn request_hash(&self, fields: &GatewayFields) -> String {
        let joined = fields
            .iter()
            .filter(|(k, _)| k.as_str() != "merchantHashedReq")
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Sha256::digest(format!("{}{}", joined, self.settings.hash_key).as_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for EasyPaisaGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::EasyPaisa
    }

    async fn initiate(&self, order: &Order, now: DateTime<Utc>) -> Result<PaymentRedirect, PaymentError> {
        let expiry = pkt(now) + Duration::days(1);

        let mut fields = GatewayFields::new();
        fields.insert("storeId".to_string(), self.settings.store_id.clone());
        fields.insert(
            "amount".to_string(),
            to_major_string(order.total, Self::AMOUNT_DECIMALS),
        );
        fields.insert("postBackURL".to_string(), self.settings.return_url.clone());
        fields.insert("orderRefNum".to_string(), order.order_number.clone());
        fields.insert("expiryDate".to_string(), expiry.format("%Y%m%d %H%M%S").to_string());
        fields.insert("autoRedirect".to_string(), "1".to_string());

        let hash = self.request_hash(&fields);
        fields.insert("merchantHashedReq".to_string(), hash);

        Ok(PaymentRedirect {
            gateway: PaymentMethod::EasyPaisa,
            url: self.settings.endpoint.clone(),
            method: "POST".to_string(),
            fields,
        })
    }

    async fn verify_callback(&self, fields: &GatewayFields) -> Result<PaymentOutcome, PaymentError> {
        let received = required(fields, "merchantHashedReq")?;
        if !secure_eq(&self.request_hash(fields), &received.to_ascii_lowercase()) {
            return Err(PaymentError::InvalidSignature);
        }

        let order_number = required(fields, "orderRefNum")?.to_string();
        let status = required(fields, "status")?;
        let amount = fields
            .get("amount")
            .and_then(|a| a.parse::<f64>().ok())
            .map(|major| (major * 100.0).round() as i64);

        Ok(PaymentOutcome {
            order_number,
            reference: fields.get("transactionRefNumber").filter(|v| !v.is_empty()).cloned(),
            succeeded: status == Self::SUCCESS_STATUS,
            amount,
            message: fields.get("desc").cloned(),
        })
    }

    fn expected_amount(&self, order: &Order) -> i64 {
        round_minor(order.total, Self::AMOUNT_DECIMALS)
    }
}

/// Gateways enabled in configuration, keyed by payment method.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(
        jazzcash: &JazzCashSettings,
        easypaisa: &EasyPaisaSettings,
    ) -> Result<Self, PaymentError> {
        let mut registry = Self::new();
        if jazzcash.enabled {
            registry.register(Arc::new(JazzCashGateway::new(jazzcash.clone())?));
        }
        if easypaisa.enabled {
            registry.register(Arc::new(EasyPaisaGateway::new(easypaisa.clone())?));
        }
        Ok(registry)
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        tracing::info!("Payment gateway enabled: {}", gateway.method().as_str());
        self.gateways.insert(gateway.method(), gateway);
    }

    pub fn get(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(&method).cloned()
    }

    /// Cash on delivery is always offered.
    pub fn enabled_methods(&self) -> Vec<PaymentMethod> {
        let mut methods = vec![PaymentMethod::CashOnDelivery];
        for method in [PaymentMethod::JazzCash, PaymentMethod::EasyPaisa] {
            if self.gateways.contains_key(&method) {
                methods.push(method);
            }
        }
        methods
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Missing payment field: {0}")]
    MissingField(String),

    #[error("Payment gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown payment gateway: {0}")]
    UnknownGateway(String),
}
