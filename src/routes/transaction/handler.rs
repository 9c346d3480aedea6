use axum::{
    Extension,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    common::MessageResponse,
    error::AppResult,
    ledger::from_cents,
    models::member::Member,
    routes::{current_member, require_group},
    utils::{Claims, success_to_api_response},
};

use super::model::{
    AddTransactionRequest, BalanceView, Transaction, TransactionListResponse, TransactionView,
};

#[axum::debug_handler]
pub async fn add_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddTransactionRequest>,
) -> AppResult<impl IntoResponse> {
    let member = current_member(&state.pool, &claims).await?;
    let group_id = require_group(&member)?;

    let members = Member::list_by_group(&state.pool, group_id).await?;
    let new = req.validate(&members)?;
    let transaction_id = Transaction::create(&state.pool, group_id, &member.id, &new).await?;

    tracing::info!(
        "Transaction {} of {} cents split between {} member(s)",
        transaction_id,
        new.amount,
        new.split_between.len()
    );
    Ok((
        StatusCode::CREATED,
        success_to_api_response(MessageResponse::new("Transaction added")),
    ))
}

#[axum::debug_handler]
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<impl IntoResponse> {
    let member = current_member(&state.pool, &claims).await?;
    let group_id = require_group(&member)?;

    let members = Member::list_by_group(&state.pool, group_id).await?;
    let transactions = Transaction::recent(&state.pool, group_id).await?;
    let ledger = Transaction::ledger(&state.pool, group_id).await?;

    let member_ids = members.iter().map(|m| m.id.clone()).collect::<Vec<_>>();
    let balances = ledger
        .pairwise_for(&member.id, &member_ids)
        .into_iter()
        .map(|pair| BalanceView {
            other_user_name: members
                .iter()
                .find(|m| m.id == pair.other_user_id)
                .map(|m| m.name.clone())
                .unwrap_or_default(),
            other_user_id: pair.other_user_id,
            balance: pair.balance,
        })
        .collect();

    Ok(success_to_api_response(TransactionListResponse {
        transactions: transactions.into_iter().map(TransactionView::from).collect(),
        balances,
        my_balance: from_cents(ledger.net_balance(&member.id)),
    }))
}
