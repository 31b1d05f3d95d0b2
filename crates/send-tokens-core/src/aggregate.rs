use thiserror::Error;

use crate::domain::{AggregatedTxData, TxTokenSelection};
use crate::ports::SubForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("sub-form {form_index} reported invalid data")]
pub struct FormInvalid {
    pub form_index: usize,
}

/// Merges every sub-form into one candidate transaction. Inputs and outputs
/// keep sub-form order, then each sub-form's own order. The first invalid
/// sub-form aborts the whole aggregation, as does one moving a token that is
/// not in the selection.
pub fn aggregate<F>(
    forms: &[&F],
    selection: &TxTokenSelection,
) -> Result<AggregatedTxData, FormInvalid>
where
    F: SubForm + ?Sized,
{
    let mut data = AggregatedTxData {
        inputs: Vec::new(),
        outputs: Vec::new(),
        tokens: selection.tokens().to_vec(),
    };
    for (form_index, form) in forms.iter().enumerate() {
        let one = form.get_data().ok_or(FormInvalid { form_index })?;
        let unselected = one
            .inputs
            .iter()
            .map(|i| i.token.as_str())
            .chain(one.outputs.iter().map(|o| o.token.as_str()))
            .find(|uid| !selection.contains(uid));
        if let Some(uid) = unselected {
            tracing::debug!(form = form_index, token = uid, "sub-form spends an unselected token");
            return Err(FormInvalid { form_index });
        }
        data.inputs.extend(one.inputs);
        data.outputs.extend(one.outputs);
    }
    Ok(data)
}
