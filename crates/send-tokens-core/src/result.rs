use crate::context::AttemptFailure;
use crate::domain::{AttemptId, SubmittedTx};
use crate::error::SendError;
use crate::ports::WalletPort;
use crate::screen::{AlertBody, Route, SendScreen};

/// Advances the address pool past the change addresses just used and leaves
/// the send screen. Runs at most once per attempt.
pub fn on_send_success<W: WalletPort>(
    screen: &mut SendScreen,
    wallet: &W,
    attempt: AttemptId,
    submitted: &SubmittedTx,
) -> Result<(), SendError> {
    if screen.settled_attempt == Some(attempt) {
        tracing::debug!(%attempt, "duplicate success ignored");
        return Ok(());
    }
    wallet.advance_address_pool(submitted.change_outputs)?;
    screen.settled_attempt = Some(attempt);
    screen.in_progress = false;
    screen.pin_error = None;
    screen.error_message = None;
    screen.modal = None;
    screen.navigate_to = Some(Route::WalletHome);
    tracing::info!(%attempt, tx_id = %submitted.tx_id, "send completed");
    Ok(())
}

/// Puts the screen back in a retry-ready state. Selection and form contents
/// are left alone; navigation and the address pool are never touched, so
/// repeated calls are harmless.
pub fn on_send_error(screen: &mut SendScreen, failure: &AttemptFailure) {
    screen.in_progress = false;
    if failure.cancelled {
        if screen.device_modal_title().is_some() {
            screen.close_modal();
        }
        return;
    }
    match &failure.title {
        Some(title) => {
            let body = match &failure.message {
                Some(message) if failure.tokens.is_empty() => AlertBody::Text(message.clone()),
                _ => AlertBody::Tokens(failure.tokens.clone()),
            };
            screen.show_alert(title.clone(), body);
        }
        None => {
            screen.modal = None;
            if let Some(message) = &failure.message {
                screen.set_error(message.clone());
            }
        }
    }
}
