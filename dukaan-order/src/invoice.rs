use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use dukaan_shared::format_amount;

use crate::models::{Order, OrderItemType};

/// Seller details printed at the top of an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopProfile {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Default for ShopProfile {
    fn default() -> Self {
        Self {
            name: "Dukaan".to_string(),
            address: "Lahore, Pakistan".to_string(),
            phone: None,
            email: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BilledTo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceLine {
    pub description: String,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price: i64,
    pub unit_price_display: String,
    pub amount: i64,
    pub amount_display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceTotal {
    pub label: String,
    pub amount: i64,
    pub display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentSummary {
    pub method: String,
    pub status: String,
    pub reference: Option<String>,
}

/// JSON invoice document for an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub invoice_number: String,
    pub order_number: String,
    pub issued_at: DateTime<Utc>,
    pub seller: ShopProfile,
    pub billed_to: BilledTo,
    pub lines: Vec<InvoiceLine>,
    pub totals: Vec<InvoiceTotal>,
    pub payment: PaymentSummary,
    pub currency: String,
}

impl Invoice {
    pub fn from_order(order: &Order, shop: &ShopProfile) -> Self {
        let currency = order.currency.as_str();
        let lines = order
            .items
            .iter()
            .map(|item| {
                let description = match item.item_type {
                    OrderItemType::Product => item.name.clone(),
                    OrderItemType::Bundle if item.components.is_empty() => item.name.clone(),
                    OrderItemType::Bundle => {
                        let contents: Vec<String> = item
                            .components
                            .iter()
                            .map(|c| format!("{} x{}", c.name, c.quantity))
                            .collect();
                        format!("{} ({})", item.name, contents.join(", "))
                    }
                };
                InvoiceLine {
                    description,
                    sku: item.sku.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    unit_price_display: format_amount(item.unit_price, currency),
                    amount: item.line_total,
                    amount_display: format_amount(item.line_total, currency),
                }
            })
            .collect();

        let mut totals = vec![total("Subtotal", order.subtotal, currency)];
        if order.discount > 0 {
            let label = match &order.coupon_code {
                Some(code) => format!("Discount ({})", code),
                None => "Discount".to_string(),
            };
            totals.push(total(&label, -order.discount, currency));
        }
        totals.push(total("Shipping", order.shipping_fee, currency));
        totals.push(total("Total", order.total, currency));

        Self {
            invoice_number: invoice_number(&order.order_number),
            order_number: order.order_number.clone(),
            issued_at: order.created_at,
            seller: shop.clone(),
            billed_to: BilledTo {
                name: order.customer.name.clone(),
                email: order.customer.email.as_inner().clone(),
                phone: order.customer.phone.as_inner().clone(),
                address: order.shipping_address.lines(),
            },
            lines,
            totals,
            payment: PaymentSummary {
                method: order.payment_method.as_str().to_string(),
                status: order.payment_status.as_str().to_string(),
                reference: order.payment_reference.clone(),
            },
            currency: order.currency.clone(),
        }
    }
}

fn total(label: &str, amount: i64, currency: &str) -> InvoiceTotal {
    InvoiceTotal {
        label: label.to_string(),
        amount,
        display: format_amount(amount, currency),
    }
}

pub fn invoice_number(order_number: &str) -> String {
    let suffix = order_number.strip_prefix("ORD-").unwrap_or(order_number);
    format!("INV-{}", suffix)
}
