/// How stochastic layers behave during a forward pass.
///
/// Normalization layers are unaffected: they follow the backend (running
/// statistics without autodiff, batch statistics with it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceMode {
    /// Deterministic evaluation, dropout disabled.
    #[default]
    Eval,
    /// Dropout stays active so repeated passes sample the predictive
    /// distribution.
    McDropout,
}

impl InferenceMode {
    pub const fn dropout_active(self) -> bool {
        matches!(self, Self::McDropout)
    }
}
