mod common;

use semver::Version;

use send_tokens_adapters::TxMiningAdapter;
use send_tokens_core::{
    DeploymentMode, FormInvalid, Modal, Route, SendOutcome, SendSettings, SubFormData, WalletKind,
};

use common::{
    emulator, new_wallet, pay, token_a, wallet_fixture, Harness, CHANGE_ADDRESS_1,
    CHANGE_ADDRESS_2, PIN, TOKEN_A_UID,
};

#[test]
fn two_token_send_advances_pool_and_leaves_screen() {
    let mut h = Harness::software();
    h.orch.activate().expect("activate");
    assert!(h.orch.add_token().expect("add token"));
    assert_eq!(h.orch.screen().selection.tokens()[1], token_a());

    let htr = pay("00", 120);
    let tst = pay(TOKEN_A_UID, 20);
    let outcome = h.orch.send(&[&htr, &tst]).expect("send");
    assert_eq!(outcome, SendOutcome::AwaitingPin);
    assert_eq!(h.orch.screen().modal, Some(Modal::Pin));

    let outcome = h.orch.submit_pin(PIN).expect("submit pin");
    let SendOutcome::Submitted(submitted) = outcome else {
        panic!("expected submission, got {outcome:?}");
    };
    assert_eq!(submitted.change_outputs, 2);
    assert_eq!(h.wallet.current_address_index().expect("pool"), 3);
    assert_eq!(h.orch.screen().navigate_to, Some(Route::WalletHome));
    assert!(h.orch.screen().modal.is_none());
    assert!(h.orch.pending().is_none());

    let pushed = h.mining.submitted().expect("submitted");
    assert_eq!(pushed.len(), 1);
    let signed = &pushed[0];
    assert!(signed.tx.is_complete());
    assert_eq!(signed.tx.inputs.len(), 3);
    assert_eq!(signed.input_signatures.len(), 3);
    assert!(signed.input_signatures.iter().all(|s| s.len() == 64));
    assert_eq!(signed.tx.tokens, vec![TOKEN_A_UID.to_owned()]);
    assert_eq!(signed.change_key_indices, vec![1, 2]);
    let change: Vec<&str> = signed
        .tx
        .change_outputs()
        .map(|(_, o)| o.address.as_str())
        .collect();
    assert_eq!(change, vec![CHANGE_ADDRESS_1, CHANGE_ADDRESS_2]);
}

#[test]
fn wrong_pin_keeps_the_attempt_open() {
    let mut h = Harness::software();
    h.orch.activate().expect("activate");
    let form = pay("00", 10);
    h.orch.send(&[&form]).expect("send");

    for pin in ["654321", "12ab56", "1234"] {
        let outcome = h.orch.submit_pin(pin).expect("submit pin");
        assert_eq!(outcome, SendOutcome::AwaitingPin);
        assert_eq!(h.orch.screen().pin_error.as_deref(), Some("Invalid PIN"));
        assert_eq!(h.orch.screen().modal, Some(Modal::Pin));
    }
    assert!(h.mining.submitted().expect("submitted").is_empty());

    let outcome = h.orch.submit_pin(PIN).expect("submit pin");
    assert!(matches!(outcome, SendOutcome::Submitted(_)));
}

#[test]
fn insufficient_funds_is_shown_and_nothing_moves() {
    let mut h = Harness::software();
    h.orch.activate().expect("activate");
    let form = pay("00", 1_000);
    h.orch.send(&[&form]).expect("send");

    let outcome = h.orch.submit_pin(PIN).expect("submit pin");
    let SendOutcome::Halted(failure) = outcome else {
        panic!("expected a halted attempt, got {outcome:?}");
    };
    let message = failure.message.expect("message");
    assert!(message.contains("Insufficient amount of HTR"), "{message}");
    assert_eq!(h.orch.screen().error_message.as_deref(), Some(message.as_str()));
    assert!(h.orch.screen().navigate_to.is_none());
    assert!(!h.orch.screen().in_progress);
    assert_eq!(h.wallet.current_address_index().expect("pool"), 1);
    assert!(h.mining.submitted().expect("submitted").is_empty());

    let retry = pay("00", 100);
    h.orch.send(&[&retry]).expect("resend");
    let outcome = h.orch.submit_pin(PIN).expect("submit pin");
    assert!(matches!(outcome, SendOutcome::Submitted(_)));
}

#[test]
fn malformed_address_is_reported_verbatim() {
    let mut h = Harness::software();
    h.orch.activate().expect("activate");
    let mut form = pay("00", 10);
    form.outputs[0].address = "Wbad".to_owned();
    h.orch.send(&[&form]).expect("send");

    h.orch.submit_pin(PIN).expect("submit pin");
    assert_eq!(
        h.orch.screen().error_message.as_deref(),
        Some("Invalid address: Wbad")
    );
}

#[test]
fn invalid_subform_aborts_before_any_signer() {
    let mut h = Harness::software();
    h.orch.activate().expect("activate");
    let valid = Some(pay("00", 10));
    let invalid: Option<SubFormData> = None;

    let outcome = h.orch.send(&[&valid, &invalid]).expect("send");
    assert_eq!(outcome, SendOutcome::Aborted(FormInvalid { form_index: 1 }));
    assert!(h.orch.screen().modal.is_none());
    assert!(h.orch.pending().is_none());
}

#[test]
fn rejected_push_is_recoverable() {
    let mut h = Harness::new(
        new_wallet(wallet_fixture(WalletKind::Software)),
        emulator(Version::new(1, 1, 0)),
        TxMiningAdapter::rejecting("Transaction is invalid: double spend"),
        SendSettings::default(),
    );
    h.orch.activate().expect("activate");
    let form = pay("00", 10);
    h.orch.send(&[&form]).expect("send");

    let outcome = h.orch.submit_pin(PIN).expect("submit pin");
    assert!(matches!(outcome, SendOutcome::Halted(_)));
    assert_eq!(
        h.orch.screen().error_message.as_deref(),
        Some("Transaction is invalid: double spend")
    );
    assert_eq!(h.wallet.current_address_index().expect("pool"), 1);
}

#[test]
fn wallet_service_deployment_signs_and_submits() {
    let settings = SendSettings {
        deployment: DeploymentMode::WalletService,
        ..SendSettings::default()
    };
    let mut h = Harness::new(
        new_wallet(wallet_fixture(WalletKind::Software)),
        emulator(Version::new(1, 1, 0)),
        TxMiningAdapter::in_memory(),
        settings,
    );
    h.orch.activate().expect("activate");
    let form = pay("00", 150);
    h.orch.send(&[&form]).expect("send");

    let outcome = h.orch.submit_pin(PIN).expect("submit pin");
    let SendOutcome::Submitted(submitted) = outcome else {
        panic!("expected submission, got {outcome:?}");
    };
    assert_eq!(submitted.change_outputs, 0);
    assert_eq!(h.wallet.current_address_index().expect("pool"), 1);
}

#[test]
fn cancelling_the_pin_dialog_drops_the_attempt() {
    let mut h = Harness::software();
    h.orch.activate().expect("activate");
    let form = pay("00", 10);
    h.orch.send(&[&form]).expect("send");

    h.orch.cancel_pin();
    assert!(h.orch.screen().modal.is_none());
    assert!(h.orch.pending().is_none());
    assert_eq!(h.orch.submit_pin(PIN).expect("late pin"), SendOutcome::Ignored);
}

#[test]
fn every_wallet_token_selected_reports_it() {
    let mut h = Harness::software();
    h.orch.activate().expect("activate");
    assert!(h.orch.add_token().expect("first"));
    assert!(h.orch.add_token().expect("second"));
    assert!(!h.orch.add_token().expect("third"));
    assert_eq!(
        h.orch.screen().error_message.as_deref(),
        Some("All your tokens were already added")
    );

    let removed = h.orch.remove_token(1).expect("remove");
    assert_eq!(removed, token_a());
    h.orch
        .select_token(1, token_a())
        .expect("replace second token");
    assert_eq!(h.orch.screen().selection.len(), 2);
    h.orch
        .select_token(1, send_tokens_core::TokenConfig::primary())
        .expect_err("primary token is already selected");
}
