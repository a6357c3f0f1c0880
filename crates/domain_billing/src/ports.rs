//! Storage ports for invoices, payments and the ledger
//!
//! A [`BillingUnit`] is one storage transaction. Invoice and account balance
//! rows read through `lock_*` stay locked until commit or drop.

use async_trait::async_trait;

use core_kernel::{
    ChargeableId, DomainPort, InvoiceId, OrganizationId, PortError, UserId,
};

use crate::account::AccountBalance;
use crate::invoice::{Invoice, InvoiceItem, InvoiceView};
use crate::payment::Payment;
use crate::transaction::Transaction;

/// Entry point to billing storage
#[async_trait]
pub trait BillingPort: DomainPort {
    /// Opens a unit of work
    async fn begin(&self) -> Result<Box<dyn BillingUnit>, PortError>;

    /// Reads an invoice with items, payments and transactions
    async fn get_invoice_view(&self, id: InvoiceId) -> Result<Option<InvoiceView>, PortError>;
}

/// One atomic set of billing reads and writes
#[async_trait]
pub trait BillingUnit: Send {
    /// Draws the next invoice number of the organization
    async fn next_invoice_number(&mut self, organization_id: OrganizationId) -> Result<String, PortError>;

    async fn chargeable_in_org(
        &mut self,
        organization_id: OrganizationId,
        chargeable_id: ChargeableId,
    ) -> Result<bool, PortError>;

    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError>;

    async fn invoice_items(&mut self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>, PortError>;

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError>;

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError>;

    async fn insert_items(&mut self, items: &[InvoiceItem]) -> Result<(), PortError>;

    async fn update_item(&mut self, item: &InvoiceItem) -> Result<(), PortError>;

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError>;

    async fn lock_account_balance(
        &mut self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Option<AccountBalance>, PortError>;

    async fn update_account_balance(&mut self, balance: &AccountBalance) -> Result<(), PortError>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    /// Reads the expanded invoice as this unit sees it
    async fn invoice_view(&mut self, id: InvoiceId) -> Result<Option<InvoiceView>, PortError>;

    async fn commit(self: Box<Self>) -> Result<(), PortError>;
}

/// In-memory billing storage for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use core_kernel::InvoiceItemId;

    use crate::invoice::Chargeable;

    #[derive(Debug, Clone, Default)]
    struct BillingState {
        invoices: HashMap<InvoiceId, Invoice>,
        items: Vec<InvoiceItem>,
        payments: Vec<Payment>,
        transactions: Vec<Transaction>,
        balances: HashMap<(OrganizationId, UserId), AccountBalance>,
        chargeables: HashMap<ChargeableId, Chargeable>,
        sequences: HashMap<OrganizationId, u64>,
    }

    impl BillingState {
        fn view(&self, id: InvoiceId) -> Option<InvoiceView> {
            let invoice = self.invoices.get(&id)?.clone();
            Some(InvoiceView {
                invoice,
                items: self.items.iter().filter(|i| i.invoice_id == id).cloned().collect(),
                payments: self.payments.iter().filter(|p| p.invoice_id == id).cloned().collect(),
                transactions: self
                    .transactions
                    .iter()
                    .filter(|t| t.invoice_id == Some(id))
                    .cloned()
                    .collect(),
            })
        }
    }

    #[derive(Debug, Default)]
    struct Faults {
        invoice_number: AtomicBool,
        item_insert: AtomicBool,
        payment_insert: AtomicBool,
    }

    /// Billing store backed by a mutex-guarded map
    ///
    /// Units work on a copy of the state and publish it on commit.
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryBillingStore {
        state: Arc<Mutex<BillingState>>,
        faults: Arc<Faults>,
    }

    impl InMemoryBillingStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_chargeable(&self, chargeable: Chargeable) {
            self.state.lock().await.chargeables.insert(chargeable.id, chargeable);
        }

        /// Sets the member's account credit, creating the row if needed
        pub async fn set_account_balance(
            &self,
            organization_id: OrganizationId,
            user_id: UserId,
            balance: Decimal,
        ) {
            let mut state = self.state.lock().await;
            state
                .balances
                .entry((organization_id, user_id))
                .and_modify(|row| row.balance = balance)
                .or_insert_with(|| AccountBalance::new(organization_id, user_id, balance));
        }

        pub async fn account_balance(
            &self,
            organization_id: OrganizationId,
            user_id: UserId,
        ) -> Option<AccountBalance> {
            self.state.lock().await.balances.get(&(organization_id, user_id)).cloned()
        }

        pub async fn invoice_count(&self) -> usize {
            self.state.lock().await.invoices.len()
        }

        pub async fn item_count(&self) -> usize {
            self.state.lock().await.items.len()
        }

        pub async fn payment_count(&self) -> usize {
            self.state.lock().await.payments.len()
        }

        pub async fn transaction_count(&self) -> usize {
            self.state.lock().await.transactions.len()
        }

        /// Makes invoice number generation fail
        pub fn fail_invoice_number(&self, fail: bool) {
            self.faults.invoice_number.store(fail, Ordering::SeqCst);
        }

        /// Makes item inserts fail
        pub fn fail_item_insert(&self, fail: bool) {
            self.faults.item_insert.store(fail, Ordering::SeqCst);
        }

        /// Makes payment inserts fail
        pub fn fail_payment_insert(&self, fail: bool) {
            self.faults.payment_insert.store(fail, Ordering::SeqCst);
        }
    }

    impl DomainPort for InMemoryBillingStore {}

    #[async_trait]
    impl BillingPort for InMemoryBillingStore {
        async fn begin(&self) -> Result<Box<dyn BillingUnit>, PortError> {
            let guard = Arc::clone(&self.state).lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(InMemoryBillingUnit {
                guard,
                working,
                faults: Arc::clone(&self.faults),
            }))
        }

        async fn get_invoice_view(&self, id: InvoiceId) -> Result<Option<InvoiceView>, PortError> {
            Ok(self.state.lock().await.view(id))
        }
    }

    struct InMemoryBillingUnit {
        guard: OwnedMutexGuard<BillingState>,
        working: BillingState,
        faults: Arc<Faults>,
    }

    #[async_trait]
    impl BillingUnit for InMemoryBillingUnit {
        async fn next_invoice_number(&mut self, organization_id: OrganizationId) -> Result<String, PortError> {
            if self.faults.invoice_number.load(Ordering::SeqCst) {
                return Err(PortError::internal("invoice sequence unavailable"));
            }
            let next = self.working.sequences.entry(organization_id).or_insert(0);
            *next += 1;
            Ok(format!("INV-{:06}", next))
        }

        async fn chargeable_in_org(
            &mut self,
            organization_id: OrganizationId,
            chargeable_id: ChargeableId,
        ) -> Result<bool, PortError> {
            Ok(self
                .working
                .chargeables
                .get(&chargeable_id)
                .is_some_and(|c| c.organization_id == organization_id))
        }

        async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
            Ok(self.working.invoices.get(&id).cloned())
        }

        async fn invoice_items(&mut self, invoice_id: InvoiceId) -> Result<Vec<InvoiceItem>, PortError> {
            Ok(self
                .working
                .items
                .iter()
                .filter(|i| i.invoice_id == invoice_id)
                .cloned()
                .collect())
        }

        async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
            if self
                .working
                .invoices
                .values()
                .any(|i| i.organization_id == invoice.organization_id && i.invoice_number == invoice.invoice_number)
            {
                return Err(PortError::conflict(format!(
                    "invoice number {} already used",
                    invoice.invoice_number
                )));
            }
            self.working.invoices.insert(invoice.id, invoice.clone());
            Ok(())
        }

        async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
            match self.working.invoices.get_mut(&invoice.id) {
                Some(row) => {
                    *row = invoice.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("Invoice", invoice.id)),
            }
        }

        async fn insert_items(&mut self, items: &[InvoiceItem]) -> Result<(), PortError> {
            if self.faults.item_insert.load(Ordering::SeqCst) {
                return Err(PortError::internal("injected item insert failure"));
            }
            self.working.items.extend_from_slice(items);
            Ok(())
        }

        async fn update_item(&mut self, item: &InvoiceItem) -> Result<(), PortError> {
            let id: InvoiceItemId = item.id;
            match self.working.items.iter_mut().find(|i| i.id == id) {
                Some(row) => {
                    *row = item.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("InvoiceItem", id)),
            }
        }

        async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), PortError> {
            self.working.transactions.push(transaction.clone());
            Ok(())
        }

        async fn lock_account_balance(
            &mut self,
            organization_id: OrganizationId,
            user_id: UserId,
        ) -> Result<Option<AccountBalance>, PortError> {
            Ok(self.working.balances.get(&(organization_id, user_id)).cloned())
        }

        async fn update_account_balance(&mut self, balance: &AccountBalance) -> Result<(), PortError> {
            self.working
                .balances
                .insert((balance.organization_id, balance.user_id), balance.clone());
            Ok(())
        }

        async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
            if self.faults.payment_insert.load(Ordering::SeqCst) {
                return Err(PortError::internal("injected payment insert failure"));
            }
            self.working.payments.push(payment.clone());
            Ok(())
        }

        async fn invoice_view(&mut self, id: InvoiceId) -> Result<Option<InvoiceView>, PortError> {
            Ok(self.working.view(id))
        }

        async fn commit(self: Box<Self>) -> Result<(), PortError> {
            let InMemoryBillingUnit { mut guard, working, .. } = *self;
            *guard = working;
            Ok(())
        }
    }
}
