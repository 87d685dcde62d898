use std::sync::Arc;

use coin_shop::account::{AccountStore, MemoryAccountStore};
use coin_shop::catalog::StaticCatalog;
use coin_shop::state::AppState;
use coin_shop::user_auth::{Credentials, SigningSecret, TokenPolicy};
use coin_shop::{CallerIdentity, LedgerError};

const SECRET: &[u8] = b"scenario-test-signing-secret-0123456789abcdef";

/// Services over an in-memory store with the standard merch catalog
fn shop() -> (AppState, Arc<MemoryAccountStore>) {
    let store = Arc::new(MemoryAccountStore::with_default_catalog());
    let state = AppState::with_secret(
        store.clone(),
        Arc::new(StaticCatalog::merch()),
        SigningSecret::new(SECRET).unwrap(),
        TokenPolicy::default(),
    );
    (state, store)
}

/// Create an account directly in the store (skips password hashing)
async fn open_account(store: &MemoryAccountStore, identity: &str, balance: i64) {
    store
        .create_account(identity, "$argon2id$unused", balance)
        .await
        .unwrap();
}

/// Go through the gate the way a request would
fn login_as(state: &AppState, identity: &str) -> CallerIdentity {
    let token = state.identity.issue_token(identity).unwrap().token;
    state
        .gate
        .admit(Some(&format!("Bearer {}", token)))
        .require()
        .unwrap()
}

#[tokio::test]
async fn qa_tc_transfer_between_fresh_accounts() {
    let (state, store) = shop();
    open_account(&store, "A", 1000).await;
    open_account(&store, "B", 1000).await;

    let a = login_as(&state, "A");
    state.ledger.transfer(&a, "B", 10).await.unwrap();

    assert_eq!(store.balance("A").await.unwrap(), 990);
    assert_eq!(store.balance("B").await.unwrap(), 1010);

    // Exactly one ledger line, visible from both sides
    assert_eq!(store.transaction_history("A").await.unwrap().len(), 1);
    assert_eq!(store.transaction_history("B").await.unwrap().len(), 1);

    let b = login_as(&state, "B");
    let summary = state.ledger.user_summary(&b).await.unwrap();
    assert_eq!(summary.coin_history.received.len(), 1);
    assert_eq!(summary.coin_history.received[0].from_user, "A");
    assert_eq!(summary.coin_history.received[0].amount, 10);
}

#[tokio::test]
async fn qa_tc_purchase_beyond_balance_changes_nothing() {
    let (state, store) = shop();
    open_account(&store, "poor", 100).await;
    let caller = login_as(&state, "poor");

    let result = state.ledger.purchase(&caller, "pink-hoody").await;
    assert_eq!(result, Err(LedgerError::InsufficientBalance));

    assert_eq!(store.balance("poor").await.unwrap(), 100);
    assert!(store.inventory("poor").await.unwrap().is_empty());
    assert_eq!(store.transaction_count().unwrap(), 0);
}

#[tokio::test]
async fn qa_tc_repeat_purchase_increments_single_row() {
    let (state, store) = shop();
    open_account(&store, "buyer", 1000).await;
    let caller = login_as(&state, "buyer");

    state.ledger.purchase(&caller, "socks").await.unwrap();
    state.ledger.purchase(&caller, "socks").await.unwrap();

    let inventory = store.inventory("buyer").await.unwrap();
    assert_eq!(inventory.len(), 1, "Repeat purchases share one inventory row");
    assert_eq!(inventory[0].item, "socks");
    assert_eq!(inventory[0].quantity, 2);
    assert_eq!(store.balance("buyer").await.unwrap(), 980);
}

#[tokio::test]
async fn qa_tc_login_registers_then_rejects_wrong_password() {
    let (state, store) = shop();

    let token = state
        .identity
        .authenticate(Credentials::new("newuser", "pw1"))
        .await
        .unwrap()
        .token;
    assert_eq!(state.identity.verify(&token).unwrap(), "newuser");
    assert_eq!(store.balance("newuser").await.unwrap(), 1000);

    let wrong = state
        .identity
        .authenticate(Credentials::new("newuser", "wrongpw"))
        .await;
    assert_eq!(wrong.unwrap_err(), LedgerError::Unauthorized);
}

#[tokio::test]
async fn qa_tc_summary_is_idempotent() {
    let (state, store) = shop();
    open_account(&store, "A", 1000).await;
    open_account(&store, "B", 1000).await;
    let a = login_as(&state, "A");
    state.ledger.transfer(&a, "B", 25).await.unwrap();
    state.ledger.purchase(&a, "pen").await.unwrap();

    let first = state.ledger.user_summary(&a).await.unwrap();
    let second = state.ledger.user_summary(&a).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.coins, 1000 - 25 - 10);
}

#[tokio::test]
async fn qa_tc_gate_rejects_before_ledger() {
    let (state, _) = shop();

    assert_eq!(
        state.gate.admit(None).require().unwrap_err(),
        LedgerError::Unauthorized
    );
    assert_eq!(
        state.gate.admit(Some("Bearer forged.token.value")).require().unwrap_err(),
        LedgerError::InvalidToken
    );

    // A token signed by some other deployment does not get in either
    let foreign = AppState::with_secret(
        Arc::new(MemoryAccountStore::default()),
        Arc::new(StaticCatalog::merch()),
        SigningSecret::new(b"another-deployment-secret-0123456789abcdef").unwrap(),
        TokenPolicy::default(),
    );
    let token = foreign.identity.issue_token("A").unwrap().token;
    assert!(
        !state
            .gate
            .admit(Some(&format!("Bearer {}", token)))
            .is_authenticated()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn qa_tc_concurrent_transfers_conserve_coins() {
    let (state, store) = shop();
    let names = ["u0", "u1", "u2", "u3", "u4"];
    for name in names {
        open_account(&store, name, 200).await;
    }
    let initial_total = store.total_balance().unwrap();

    let mut handles = Vec::new();
    for i in 0..300usize {
        let from = names[i % names.len()];
        let to = names[(i * 3 + 1) % names.len()];
        if from == to {
            continue;
        }
        let amount = (i % 70) as i64 + 1;
        let caller = login_as(&state, from);
        let ledger = state.ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.transfer(&caller, to, amount).await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(LedgerError::InsufficientBalance) => {}
            Err(e) => panic!("unexpected transfer error: {}", e),
        }
    }

    assert_eq!(store.total_balance().unwrap(), initial_total);
    assert_eq!(store.transaction_count().unwrap(), committed);
    for name in names {
        assert!(store.balance(name).await.unwrap() >= 0, "{} went negative", name);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn qa_tc_opposite_direction_transfers_both_commit() {
    let (state, store) = shop();
    open_account(&store, "A", 1000).await;
    open_account(&store, "B", 1000).await;

    let a = login_as(&state, "A");
    let b = login_as(&state, "B");
    let ab = tokio::spawn({
        let ledger = state.ledger.clone();
        async move { ledger.transfer(&a, "B", 100).await }
    });
    let ba = tokio::spawn({
        let ledger = state.ledger.clone();
        async move { ledger.transfer(&b, "A", 40).await }
    });

    assert!(ab.await.unwrap().is_ok());
    assert!(ba.await.unwrap().is_ok());
    assert_eq!(store.balance("A").await.unwrap(), 940);
    assert_eq!(store.balance("B").await.unwrap(), 1060);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn qa_tc_concurrent_spend_never_overdraws() {
    let (state, store) = shop();
    open_account(&store, "spender", 100).await;
    open_account(&store, "sink", 0).await;

    // 10 purchases of 10 plus 10 transfers of 10 compete for 100 coins
    let mut handles = Vec::new();
    for i in 0..20 {
        let caller = login_as(&state, "spender");
        let ledger = state.ledger.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                ledger.purchase(&caller, "pen").await
            } else {
                ledger.transfer(&caller, "sink", 10).await
            }
        }));
    }

    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            committed += 1;
        }
    }

    assert_eq!(committed, 10, "Exactly the affordable operations commit");
    assert_eq!(store.balance("spender").await.unwrap(), 0);
}
