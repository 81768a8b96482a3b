//! Domain models for the back-office service.

pub mod company;
pub mod customer;
pub mod expense;
pub mod invoice;
pub mod load;
pub mod payment;
pub mod profile;
pub mod quote;

pub use company::{Company, CompanyStatus, CreateCompany, UpdateCompany};
pub use customer::{CreateCustomer, Customer, UpdateCustomer};
pub use expense::{CreateExpense, Expense, ExpenseStatus, UpdateExpense};
pub use invoice::{CreateInvoice, Invoice, InvoiceItem, InvoiceStatus, UpdateInvoice};
pub use load::{CreateLoad, Load, LoadStatus, UpdateLoad};
pub use payment::{Payment, PaymentKind, RecordPayment};
pub use profile::{CreateProfile, Profile, Role};
pub use quote::{CreateQuote, Quote, QuoteItem, QuoteStatus, UpdateQuote};

use rust_decimal::Decimal;

/// A quantity/unit-price line contributing to a document's subtotal.
///
/// Quote and invoice items share this shape; `position` preserves the order
/// the user entered the lines in.
#[derive(Debug, Clone)]
pub struct LineInput {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}
