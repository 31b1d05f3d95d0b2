use send_tokens_core::{
    classify, recover, ErrorClass, LedgerAction, LedgerStep, PortError, SendError,
};

#[test]
fn wallet_input_errors_are_recoverable_with_their_message() {
    let cases = [
        SendError::Address("Invalid address: Wxyz".to_owned()),
        SendError::OutputValue("Value must be positive".to_owned()),
        SendError::ConstantNotSet("Network constants were not loaded".to_owned()),
        SendError::MaximumOutputs("Too many outputs".to_owned()),
        SendError::MaximumInputs("Too many inputs".to_owned()),
        SendError::Device("Transaction rejected by user".to_owned()),
    ];
    for err in cases {
        let expected = err.to_string();
        assert_eq!(classify(&err), ErrorClass::Recoverable(expected));
    }
}

#[test]
fn invalid_pin_is_recoverable() {
    assert_eq!(
        classify(&SendError::InvalidPin),
        ErrorClass::Recoverable("Invalid PIN".to_owned())
    );
}

#[test]
fn programming_faults_are_fatal() {
    let cases = [
        SendError::IllegalTransition {
            from: LedgerStep::Submitted,
            action: LedgerAction::Fail,
        },
        SendError::Protocol("device returned 1 signatures for 2 inputs".to_owned()),
        SendError::Port(PortError::Transport("socket closed".to_owned())),
    ];
    for err in cases {
        assert_eq!(classify(&err), ErrorClass::Fatal, "{err}");
    }
}

#[test]
fn recover_passes_fatal_errors_through() {
    let message = recover(SendError::Submission("rejected by node".to_owned()))
        .expect("recoverable");
    assert_eq!(message, "rejected by node");

    let err = recover(SendError::Protocol("broken".to_owned())).expect_err("fatal");
    assert_eq!(err, SendError::Protocol("broken".to_owned()));
}
