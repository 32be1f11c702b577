use thiserror::Error;

pub type Result<T> = std::result::Result<T, CometError>;

#[derive(Debug, Error)]
pub enum CometError {
    /// The action's selection state cannot satisfy its rule, e.g. an empty
    /// `selected_indices` for an action that needs its first or last element.
    #[error("invalid selection state for `{action}`: {reason}")]
    InvalidActionState { action: String, reason: String },

    /// A cell or output is missing a field its declared type requires.
    #[error("malformed document at cell {index}{}: {reason}", output_suffix(.output))]
    MalformedDocument {
        index: usize,
        output: Option<usize>,
        reason: String,
    },
}

fn output_suffix(output: &Option<usize>) -> String {
    output.map(|o| format!(", output {o}")).unwrap_or_default()
}
