mod handler;
mod model;

pub use handler::{add_transaction, list_transactions};
pub use model::{
    AddTransactionRequest, BalanceView, NewTransaction, Transaction, TransactionInfo,
    TransactionListResponse, TransactionView,
};
