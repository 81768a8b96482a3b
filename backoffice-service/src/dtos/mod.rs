//! Request and response bodies.
//!
//! Validation happens here, before any handler logic runs: negative
//! quantities, prices and amounts never reach the totals math or the
//! database.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{Invoice, InvoiceItem, LineInput, Quote, QuoteItem};

fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_positive"))
    }
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("must_not_be_negative"))
    }
}

fn validate_tax_rate(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO && *value <= Decimal::from(100) {
        Ok(())
    } else {
        Err(ValidationError::new("tax_rate_out_of_range"))
    }
}

/// One quote or invoice line.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,
    #[validate(custom(function = "validate_non_negative"))]
    pub unit_price: Decimal,
}

impl LineItemRequest {
    pub fn into_line_input(self) -> LineInput {
        LineInput {
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
        }
    }
}

pub fn into_line_inputs(items: Vec<LineItemRequest>) -> Vec<LineInput> {
    items.into_iter().map(LineItemRequest::into_line_input).collect()
}

// -----------------------------------------------------------------------------
// Companies and onboarding
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct OnboardCompanyRequest {
    #[validate(length(min = 1, max = 200))]
    pub company_name: String,
    pub address: Option<String>,
    #[validate(email)]
    pub admin_email: String,
    #[validate(length(min = 1, max = 200))]
    pub admin_full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub address: Option<String>,
}

// -----------------------------------------------------------------------------
// Users
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct InviteUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRoleRequest {
    pub role: String,
}

// -----------------------------------------------------------------------------
// Customers
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_address: Option<String>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(custom(function = "validate_tax_rate"))]
    pub default_tax_rate: Option<Decimal>,
    #[validate(range(min = 0, max = 365))]
    pub payment_terms_days: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_address: Option<String>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(custom(function = "validate_tax_rate"))]
    pub default_tax_rate: Option<Decimal>,
    #[validate(range(min = 0, max = 365))]
    pub payment_terms_days: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ListCustomersQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

// -----------------------------------------------------------------------------
// Quotes
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuoteRequest {
    pub customer_id: Uuid,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuoteRequest {
    pub customer_id: Option<Uuid>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Option<Decimal>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Option<Vec<LineItemRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuotesQuery {
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuoteRequest {
    pub due_date: Option<NaiveDate>,
    pub load_id: Option<Uuid>,
}

/// Quote with its line items and the date-derived display status.
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: Quote,
    pub effective_status: String,
    pub items: Vec<QuoteItem>,
}

// -----------------------------------------------------------------------------
// Invoices
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub load_id: Option<Uuid>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Option<Vec<LineItemRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PayInvoiceRequest {
    pub method: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundInvoiceRequest {
    /// Omitted means a full refund.
    #[validate(custom(function = "validate_positive"))]
    pub amount: Option<Decimal>,
}

/// Invoice with its line items and the date-derived display status.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub effective_status: String,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Serialize)]
pub struct ReminderResponse {
    pub invoice_id: Uuid,
    pub channel: String,
}

// -----------------------------------------------------------------------------
// Loads
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLoadRequest {
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    #[validate(length(min = 1, max = 500))]
    pub origin: String,
    #[validate(length(min = 1, max = 500))]
    pub destination: String,
    pub pickup_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLoadRequest {
    #[validate(length(min = 1, max = 500))]
    pub origin: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub destination: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListLoadsQuery {
    pub status: Option<String>,
    pub driver_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AssignLoadRequest {
    pub driver_id: Uuid,
    pub vehicle_unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetLoadStatusRequest {
    pub status: String,
}

// -----------------------------------------------------------------------------
// Expenses
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub description: Option<String>,
    #[validate(custom(function = "validate_positive"))]
    pub amount: Decimal,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub load_id: Option<Uuid>,
    pub vehicle_unit: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(custom(function = "validate_positive"))]
    pub amount: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub load_id: Option<Uuid>,
    pub vehicle_unit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListExpensesQuery {
    pub status: Option<String>,
}

// -----------------------------------------------------------------------------
// Admin and reporting
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CompanyDashboard {
    pub loads_by_status: std::collections::HashMap<String, i64>,
    pub revenue_paid: Decimal,
    pub revenue_outstanding: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: &str, unit_price: &str) -> LineItemRequest {
        LineItemRequest {
            description: "Freight".to_string(),
            quantity: quantity.parse().unwrap(),
            unit_price: unit_price.parse().unwrap(),
        }
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let request = CreateQuoteRequest {
            customer_id: Uuid::new_v4(),
            currency: None,
            tax_rate: None,
            valid_until: None,
            notes: None,
            items: vec![line("-1", "100")],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn negative_unit_price_is_rejected() {
        let request = CreateQuoteRequest {
            customer_id: Uuid::new_v4(),
            currency: None,
            tax_rate: None,
            valid_until: None,
            notes: None,
            items: vec![line("1", "-0.01")],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn empty_item_list_is_rejected() {
        let request = CreateInvoiceRequest {
            customer_id: Uuid::new_v4(),
            quote_id: None,
            load_id: None,
            currency: None,
            tax_rate: None,
            due_date: None,
            notes: None,
            items: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn tax_rate_above_hundred_is_rejected() {
        let request = CreateQuoteRequest {
            customer_id: Uuid::new_v4(),
            currency: None,
            tax_rate: Some("101".parse().unwrap()),
            valid_until: None,
            notes: None,
            items: vec![line("1", "100")],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn zero_unit_price_is_allowed() {
        let request = CreateQuoteRequest {
            customer_id: Uuid::new_v4(),
            currency: Some("USD".to_string()),
            tax_rate: Some("15".parse().unwrap()),
            valid_until: None,
            notes: None,
            items: vec![line("1", "0")],
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn expense_amount_must_be_positive() {
        let request = CreateExpenseRequest {
            category: "fuel".to_string(),
            description: None,
            amount: Decimal::ZERO,
            currency: None,
            load_id: None,
            vehicle_unit: None,
        };
        assert!(request.validate().is_err());
    }
}
