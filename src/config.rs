/// Immutable configuration for one connection attempt. The flag selects which
/// credential structure is delegated; the smart-card names only matter when it
/// is set.
#[derive(Debug, Clone, Default)]
pub struct CredSspConfig {
    /// Delegate `TSSmartCardCreds` with the password acting as the PIN
    /// instead of `TSPasswordCreds`.
    pub use_password_as_pin: bool,
    pub smart_card: SmartCardConfig,
}

/// Names describing the smart-card environment of the client machine. Every
/// field is optional; an absent value is simply left out of the encoded
/// `TSCspDataDetail`.
#[derive(Debug, Clone, Default)]
pub struct SmartCardConfig {
    pub csp_name: Option<String>,
    pub reader_name: Option<String>,
    pub card_name: Option<String>,
    pub container_name: Option<String>,
}
