use send_tokens_core::{ledger_transition, LedgerAction, LedgerStep, SendError};

const ALL_STEPS: [LedgerStep; 7] = [
    LedgerStep::Idle,
    LedgerStep::VerifyingTokens,
    LedgerStep::AwaitingDeviceConfirmation,
    LedgerStep::CollectingSignatures,
    LedgerStep::Finalizing,
    LedgerStep::Submitted,
    LedgerStep::Failed,
];

#[test]
fn happy_path_with_token_verification() {
    let path = [
        (LedgerAction::VerifyTokens, LedgerStep::VerifyingTokens),
        (LedgerAction::SendOutline, LedgerStep::AwaitingDeviceConfirmation),
        (LedgerAction::DeviceAccepted, LedgerStep::CollectingSignatures),
        (LedgerAction::SignaturesReceived, LedgerStep::Finalizing),
        (LedgerAction::Submit, LedgerStep::Submitted),
    ];

    let mut step = LedgerStep::Idle;
    for (action, expected) in path {
        let (next, transition) = ledger_transition(step, action).expect("legal transition");
        assert_eq!(next, expected);
        assert_eq!(transition.from, step);
        assert_eq!(transition.to, expected);
        step = next;
    }
    assert!(step.is_terminal());
}

#[test]
fn outline_can_be_sent_straight_from_idle() {
    let (next, transition) =
        ledger_transition(LedgerStep::Idle, LedgerAction::SendOutline).expect("legal");
    assert_eq!(next, LedgerStep::AwaitingDeviceConfirmation);
    assert_eq!(transition.reason, "send_outline");
}

#[test]
fn fail_is_accepted_from_every_non_terminal_step() {
    for step in ALL_STEPS {
        let result = ledger_transition(step, LedgerAction::Fail);
        if step.is_terminal() {
            assert!(result.is_err(), "{step:?} must not fail again");
        } else {
            let (next, _) = result.expect("fail");
            assert_eq!(next, LedgerStep::Failed);
        }
    }
}

#[test]
fn skipping_a_step_is_rejected() {
    let err = ledger_transition(LedgerStep::Idle, LedgerAction::SignaturesReceived)
        .expect_err("signatures before the outline");
    assert_eq!(
        err,
        SendError::IllegalTransition {
            from: LedgerStep::Idle,
            action: LedgerAction::SignaturesReceived,
        }
    );
    assert!(err.to_string().contains("illegal ledger transition"));
}

#[test]
fn terminal_steps_accept_nothing() {
    let actions = [
        LedgerAction::VerifyTokens,
        LedgerAction::SendOutline,
        LedgerAction::DeviceAccepted,
        LedgerAction::SignaturesReceived,
        LedgerAction::Submit,
        LedgerAction::Fail,
    ];
    for step in [LedgerStep::Submitted, LedgerStep::Failed] {
        for action in actions {
            assert!(ledger_transition(step, action).is_err());
        }
    }
}

#[test]
fn submit_requires_finalizing() {
    ledger_transition(LedgerStep::CollectingSignatures, LedgerAction::Submit)
        .expect_err("submit before signatures are attached");
}
