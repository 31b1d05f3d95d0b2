use crate::error::SendError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Shown on the form; the user can fix the input and retry.
    Recoverable(String),
    /// A programming or environment fault. Re-raised, never swallowed.
    Fatal,
}

pub fn classify(err: &SendError) -> ErrorClass {
    match err {
        SendError::Address(message)
        | SendError::OutputValue(message)
        | SendError::ConstantNotSet(message)
        | SendError::MaximumOutputs(message)
        | SendError::MaximumInputs(message)
        | SendError::Device(message)
        | SendError::Preparation(message)
        | SendError::Submission(message)
        | SendError::Validation(message) => ErrorClass::Recoverable(message.clone()),
        SendError::InvalidPin => ErrorClass::Recoverable(err.to_string()),
        SendError::IllegalTransition { .. } | SendError::Protocol(_) | SendError::Port(_) => {
            ErrorClass::Fatal
        }
    }
}

/// `Ok(message)` for a recoverable error, the error itself otherwise.
pub fn recover(err: SendError) -> Result<String, SendError> {
    match classify(&err) {
        ErrorClass::Recoverable(message) => Ok(message),
        ErrorClass::Fatal => Err(err),
    }
}
